//! Two-bar candlestick detectors
//!
//! Engulfing, Harami, Dark Cloud Cover, Double Cannon. Each compares the bar at
//! `index` with the one before it.

#![allow(clippy::default_constructed_unit_structs)]

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::helpers;
use crate::{
    numeric::{self, safe_divide},
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Ratio, Result, Signal,
    OHLCV,
};

impl_with_defaults!(
    EngulfingDetector,
    HaramiDetector,
    DarkCloudCoverDetector,
    DoubleCannonDetector,
);

/// Previous and current bar, `None` at index 0 or out of bounds
#[inline]
fn pair<T: OHLCV>(bars: &[T], index: usize) -> Option<(&T, &T)> {
    if index < 1 {
        return None;
    }
    Some((bars.get(index - 1)?, bars.get(index)?))
}

// ============================================================
// ENGULFING / HARAMI
// ============================================================

/// Engulfing: current body strictly engulfs a prior body of the opposite colour.
///
/// BUY when a white body engulfs a black one, SELL for the reverse. A zero body
/// counts as white.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngulfingDetector;

impl PatternDetector for EngulfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Engulfing
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (prev, curr) = pair(bars, index)?;
        if curr.is_white() == prev.is_white() {
            return None;
        }
        if curr.body_top() <= prev.body_top() || curr.body_bottom() >= prev.body_bottom() {
            return None;
        }

        let signal = if curr.is_white() {
            Signal::Buy
        } else {
            Signal::Sell
        };

        let confidence = if prev.body().is_zero() {
            dec!(70)
        } else {
            let ratio = curr.body() / prev.body();
            numeric::clamp(
                dec!(50) + dec!(25) * (ratio - Decimal::ONE),
                dec!(50),
                dec!(95),
            )
        };

        Some(
            PatternMatch::new(PatternKind::Engulfing, signal, curr, index, confidence)
                .starting_at(index - 1),
        )
    }
}

/// Harami: current body strictly inside a prior body of the opposite colour.
///
/// BUY when a white body sits inside a black one, SELL for the reverse. Smaller
/// inside bodies score higher.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaramiDetector;

impl PatternDetector for HaramiDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Harami
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (prev, curr) = pair(bars, index)?;
        if curr.is_white() == prev.is_white() {
            return None;
        }
        if curr.body_top() >= prev.body_top() || curr.body_bottom() <= prev.body_bottom() {
            return None;
        }

        let signal = if curr.is_white() {
            Signal::Buy
        } else {
            Signal::Sell
        };

        let confidence = if prev.body().is_zero() {
            dec!(50)
        } else {
            let ratio = curr.body() / prev.body();
            numeric::clamp(dec!(80) - dec!(40) * ratio, dec!(40), dec!(80))
        };

        Some(
            PatternMatch::new(PatternKind::Harami, signal, curr, index, confidence)
                .starting_at(index - 1),
        )
    }
}

// ============================================================
// DARK CLOUD COVER
// ============================================================

/// Dark Cloud Cover: big white candle, then a big black candle opening above the
/// prior high and closing below the prior body's midpoint
#[derive(Debug, Clone, Copy)]
pub struct DarkCloudCoverDetector {
    /// Minimum intraday move of both candles, in percent
    pub min_change_pct: Ratio,
}

impl Default for DarkCloudCoverDetector {
    fn default() -> Self {
        Self {
            min_change_pct: Ratio::new_const(helpers::BIG_CANDLE_PCT),
        }
    }
}

impl PatternDetector for DarkCloudCoverDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DarkCloudCover
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (prev, curr) = pair(bars, index)?;
        let min = self.min_change_pct.get();

        let prev_pct = prev.change_pct();
        let curr_pct = curr.change_pct();
        let prev_mid = prev.open() + prev.change() / Decimal::TWO;

        if prev_pct <= min
            || curr_pct >= -min
            || curr.open() <= prev.high()
            || curr.close() >= prev_mid
        {
            return None;
        }

        let confidence =
            numeric::weighted_confidence(prev_pct.abs(), curr_pct.abs(), Decimal::ZERO);
        Some(
            PatternMatch::new(
                PatternKind::DarkCloudCover,
                Signal::Sell,
                curr,
                index,
                confidence,
            )
            .starting_at(index - 1),
        )
    }
}

// ============================================================
// DOUBLE CANNON
// ============================================================

/// Double Cannon: two strong white candles with the second on expanded volume
#[derive(Debug, Clone, Copy)]
pub struct DoubleCannonDetector {
    /// Minimum move of the first candle, in percent
    pub first_min_pct: Ratio,
    /// Minimum move of the second candle, in percent
    pub second_min_pct: Ratio,
    /// Minimum second/first volume ratio
    pub min_volume_ratio: Ratio,
}

impl Default for DoubleCannonDetector {
    fn default() -> Self {
        Self {
            first_min_pct: Ratio::new_const(dec!(2)),
            second_min_pct: Ratio::new_const(dec!(3)),
            min_volume_ratio: Ratio::new_const(dec!(1.5)),
        }
    }
}

impl PatternDetector for DoubleCannonDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DoubleCannon
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (prev, curr) = pair(bars, index)?;
        if !prev.is_bullish() || !curr.is_bullish() {
            return None;
        }

        let prev_pct = prev.change_pct();
        let curr_pct = curr.change_pct();
        let volume_ratio = safe_divide(curr.volume(), prev.volume(), Decimal::ZERO);

        if prev_pct <= self.first_min_pct.get()
            || curr_pct <= self.second_min_pct.get()
            || volume_ratio <= self.min_volume_ratio.get()
        {
            return None;
        }

        let confidence = numeric::weighted_confidence(prev_pct, curr_pct, volume_ratio);
        Some(
            PatternMatch::new(
                PatternKind::DoubleCannon,
                Signal::Buy,
                curr,
                index,
                confidence,
            )
            .starting_at(index - 1),
        )
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

const DARK_CLOUD_COVER_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "min_change_pct",
    2.0,
    (1.0, 5.0, 0.5),
    "Minimum intraday move of both candles in percent",
)];

const DOUBLE_CANNON_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "first_min_pct",
        2.0,
        (1.0, 4.0, 0.5),
        "Minimum move of the first candle in percent",
    ),
    ParamMeta::ratio(
        "second_min_pct",
        3.0,
        (2.0, 6.0, 0.5),
        "Minimum move of the second candle in percent",
    ),
    ParamMeta::ratio(
        "min_volume_ratio",
        1.5,
        (1.2, 3.0, 0.1),
        "Minimum volume expansion of the second candle",
    ),
];

impl ParameterizedDetector for DarkCloudCoverDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DARK_CLOUD_COVER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_change_pct: get_ratio(params, "min_change_pct", 2.0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DarkCloudCover
    }
}

impl ParameterizedDetector for DoubleCannonDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOUBLE_CANNON_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            first_min_pct: get_ratio(params, "first_min_pct", 2.0)?,
            second_min_pct: get_ratio(params, "second_min_pct", 3.0)?,
            min_volume_ratio: get_ratio(params, "min_volume_ratio", 1.5)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DoubleCannon
    }
}

// ============================================================
// TESTS
// ============================================================
