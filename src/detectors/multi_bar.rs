//! Chart formation detectors over a trailing window
//!
//! Triangle Breakout and Head-and-Shoulders. Both read the full series up to
//! `index` rather than a fixed bar count.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    numeric::{self, safe_divide},
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Period, Ratio, Result,
    Signal, TaError, OHLCV,
};

impl_with_defaults!(TriangleBreakoutDetector, HeadAndShouldersDetector);

// ============================================================
// TRIANGLE BREAKOUT
// ============================================================

/// Wide-range bar closing beyond the recent trading range.
///
/// The current range must reach `range_factor` times the mean range of the
/// preceding `lookback - 1` bars, and the close must clear the highest high (BUY)
/// or lowest low (SELL) of the preceding `lookback` bars.
#[derive(Debug, Clone, Copy)]
pub struct TriangleBreakoutDetector {
    pub lookback: Period,
    pub range_factor: Ratio,
}

impl Default for TriangleBreakoutDetector {
    fn default() -> Self {
        Self {
            lookback: Period::new_const(10),
            range_factor: Ratio::new_const(dec!(1.5)),
        }
    }
}

impl PatternDetector for TriangleBreakoutDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::TriangleBreakout
    }

    fn min_bars(&self) -> usize {
        self.lookback.get() + 1
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let lookback = self.lookback.get();
        if index < lookback {
            return None;
        }
        let curr = bars.get(index)?;
        let prior = &bars[index - lookback..index];

        let ranges: Vec<Decimal> = prior[1..].iter().map(|b| b.range()).collect();
        let mean_range = numeric::window_mean(&ranges);
        let range = curr.range();
        // A bar with no range cannot expand on anything
        if range <= Decimal::ZERO || range < self.range_factor.get() * mean_range {
            return None;
        }

        let high = numeric::highest(prior.iter().map(|b| b.high()))?;
        let low = numeric::lowest(prior.iter().map(|b| b.low()))?;

        let (signal, breakout_pct) = if curr.close() > high {
            (Signal::Buy, numeric::pct_change(high, curr.close()))
        } else if curr.close() < low {
            (Signal::Sell, -numeric::pct_change(low, curr.close()))
        } else {
            return None;
        };

        // A flat prior window expands by any amount; score it at the cap
        let range_ratio = safe_divide(range, mean_range, dec!(3));
        let confidence = dec!(60)
            + dec!(10) * range_ratio.min(dec!(3))
            + dec!(5) * breakout_pct.abs().min(dec!(2));

        Some(
            PatternMatch::new(PatternKind::TriangleBreakout, signal, curr, index, confidence)
                .starting_at(index - lookback),
        )
    }

    fn validate_config(&self) -> Result<()> {
        if self.lookback.get() < 2 {
            return Err(TaError::InvalidConfig(
                "triangle breakout lookback must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

/// Head-and-Shoulders top completed by a close below the shoulders.
///
/// Local maxima of the highs are collected over the trailing `window` bars. The
/// last three must form left shoulder, head and right shoulder: the head above
/// both, the shoulders within `shoulder_tolerance` of each other.
#[derive(Debug, Clone, Copy)]
pub struct HeadAndShouldersDetector {
    pub window: Period,
    pub shoulder_tolerance: Ratio,
}

impl Default for HeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(15),
            shoulder_tolerance: Ratio::new_const(dec!(0.1)),
        }
    }
}

impl PatternDetector for HeadAndShouldersDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::HeadAndShoulders
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let window = self.window.get();
        if index + 1 < window {
            return None;
        }
        let curr = bars.get(index)?;
        let start = index + 1 - window;
        let highs: Vec<Decimal> = bars[start..=index].iter().map(|b| b.high()).collect();

        let peaks: Vec<usize> = highs
            .windows(3)
            .enumerate()
            .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
            .map(|(i, _)| i + 1)
            .collect();
        if peaks.len() < 3 {
            return None;
        }

        let last = &peaks[peaks.len() - 3..];
        let (left, head, right) = (highs[last[0]], highs[last[1]], highs[last[2]]);
        if head <= left || head <= right {
            return None;
        }

        let spread = safe_divide((left - right).abs(), left, Decimal::MAX);
        if spread > self.shoulder_tolerance.get() {
            return None;
        }

        let neckline = (left + right) / Decimal::TWO;
        if curr.close() >= neckline {
            return None;
        }

        Some(
            PatternMatch::new(
                PatternKind::HeadAndShoulders,
                Signal::Sell,
                curr,
                index,
                dec!(75),
            )
            .starting_at(start + last[0]),
        )
    }

    fn validate_config(&self) -> Result<()> {
        if self.window.get() < 5 {
            return Err(TaError::InvalidConfig(
                "head and shoulders window must hold at least 5 bars".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

const TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("lookback", 10.0, (5.0, 30.0, 5.0), "Bars defining the prior range"),
    ParamMeta::ratio(
        "range_factor",
        1.5,
        (1.0, 3.0, 0.25),
        "Minimum range expansion over the prior mean range",
    ),
];

const HEAD_AND_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("window", 15.0, (10.0, 40.0, 5.0), "Trailing bars searched for peaks"),
    ParamMeta::ratio(
        "shoulder_tolerance",
        0.1,
        (0.02, 0.2, 0.02),
        "Maximum relative difference between the shoulders",
    ),
];

impl ParameterizedDetector for TriangleBreakoutDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            lookback: get_period(params, "lookback", 10)?,
            range_factor: get_ratio(params, "range_factor", 1.5)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::TriangleBreakout
    }
}

impl ParameterizedDetector for HeadAndShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_AND_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 15)?,
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.1)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::HeadAndShoulders
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bar(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar::new("000001.SZ", "20240102", o, h, l, c, dec!(1000))
    }

    fn ctx() -> MarketContext {
        MarketContext::default()
    }

    /// Ten quiet bars between 9.8 and 10.2
    fn consolidation() -> Vec<Bar> {
        (0..10)
            .map(|_| bar(dec!(10), dec!(10.2), dec!(9.8), dec!(10)))
            .collect()
    }

    #[test]
    fn test_triangle_breakout_up() {
        let mut bars = consolidation();
        bars.push(bar(dec!(10), dec!(10.5), dec!(9.9), dec!(10.4)));
        let m = TriangleBreakoutDetector::default()
            .detect(&bars, 10, &ctx())
            .unwrap();
        assert_eq!(m.signal, Signal::Buy);
        // range ratio 1.5 → 15, breakout 0.2 / 10.2 ≈ 1.96% → ~9.8
        assert!(m.confidence > dec!(84) && m.confidence < dec!(85));
    }

    #[test]
    fn test_triangle_breakout_down() {
        let mut bars = consolidation();
        bars.push(bar(dec!(10), dec!(10), dec!(9.2), dec!(9.3)));
        let m = TriangleBreakoutDetector::default()
            .detect(&bars, 10, &ctx())
            .unwrap();
        assert_eq!(m.signal, Signal::Sell);
        assert_eq!(m.start_index, 0);
    }

    #[test]
    fn test_triangle_requires_range_expansion() {
        let mut bars = consolidation();
        bars.push(bar(dec!(10.1), dec!(10.35), dec!(10.05), dec!(10.3)));
        assert!(TriangleBreakoutDetector::default()
            .detect(&bars, 10, &ctx())
            .is_none());
    }

    #[test]
    fn test_triangle_ignores_zero_range_gap_after_flat_window() {
        let mut bars: Vec<Bar> = (0..10)
            .map(|_| bar(dec!(10), dec!(10), dec!(10), dec!(10)))
            .collect();
        bars.push(bar(dec!(11), dec!(11), dec!(11), dec!(11)));
        assert!(TriangleBreakoutDetector::default()
            .detect(&bars, 10, &ctx())
            .is_none());

        // A real range after the flat window still scores at the ratio cap
        bars[10] = bar(dec!(10.5), dec!(11), dec!(10.5), dec!(11));
        let m = TriangleBreakoutDetector::default()
            .detect(&bars, 10, &ctx())
            .unwrap();
        assert_eq!(m.signal, Signal::Buy);
        assert_eq!(m.confidence, dec!(100));
    }

    #[test]
    fn test_triangle_needs_lookback() {
        let bars = consolidation();
        assert!(TriangleBreakoutDetector::default()
            .detect(&bars, 9, &ctx())
            .is_none());
    }

    fn head_and_shoulders(last_close: Decimal) -> Vec<Bar> {
        let highs = [
            dec!(10),
            dec!(10.5),
            dec!(11),
            dec!(10.5),
            dec!(10.2),
            dec!(11),
            dec!(12),
            dec!(11),
            dec!(10.3),
            dec!(10.6),
            dec!(11.1),
            dec!(10.6),
            dec!(10.2),
            dec!(10),
            dec!(10),
        ];
        let mut bars: Vec<Bar> = highs
            .iter()
            .map(|&h| bar(h - dec!(0.2), h, h - dec!(0.4), h - dec!(0.2)))
            .collect();
        let last = bars.len() - 1;
        bars[last].close = last_close;
        bars[last].low = last_close.min(bars[last].low);
        bars
    }

    #[test]
    fn test_head_and_shoulders() {
        let bars = head_and_shoulders(dec!(9.6));
        let m = HeadAndShouldersDetector::default()
            .detect(&bars, 14, &ctx())
            .unwrap();
        assert_eq!(m.signal, Signal::Sell);
        assert_eq!(m.confidence, dec!(75));
        assert_eq!(m.start_index, 2);
    }

    #[test]
    fn test_head_and_shoulders_close_above_neckline() {
        let bars = head_and_shoulders(dec!(11.2));
        assert!(HeadAndShouldersDetector::default()
            .detect(&bars, 14, &ctx())
            .is_none());
    }

    #[test]
    fn test_head_and_shoulders_uneven_shoulders() {
        let mut bars = head_and_shoulders(dec!(9.6));
        bars[2].high = dec!(10.8);
        bars[10].high = dec!(11.95);
        assert!(HeadAndShouldersDetector::default()
            .detect(&bars, 14, &ctx())
            .is_none());
    }
}
