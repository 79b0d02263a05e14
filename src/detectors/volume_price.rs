//! Volume-price detectors
//!
//! Compare the current bar's volume and close against the trailing window carried
//! in [`MarketContext`] (the 20 bars before the current one by default), or against
//! the previous bar. Every match carries a `volume_ratio`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::helpers;
use crate::{
    numeric::{self, pct_change, safe_divide},
    params::{get_period, get_ratio, ParamMeta, ParameterizedDetector},
    MarketContext, PatternDetector, PatternKind, PatternMatch, Period, Ratio, Result, Signal,
    VolumeWindow, OHLCV,
};

impl_with_defaults!(
    LowVolumePriceDetector,
    HighVolumePriceDetector,
    VolumeDecreasePriceIncreaseDetector,
    VolumeIncreasePriceDecreaseDetector,
    VolumePriceRiseDetector,
    VolumePriceDivergenceDetector,
    VolumeBreakoutDetector,
);

/// Current bar, its predecessor and the trailing window
#[inline]
fn with_window<'a, T: OHLCV>(
    bars: &'a [T],
    index: usize,
    ctx: &MarketContext,
) -> Option<(&'a T, &'a T, VolumeWindow)> {
    let window = ctx.volume_window?;
    if index < 1 {
        return None;
    }
    Some((bars.get(index)?, bars.get(index - 1)?, window))
}

/// Build a volume-price match; price change is close-to-close
#[inline]
fn volume_match<T: OHLCV>(
    kind: PatternKind,
    signal: Signal,
    prev: &T,
    curr: &T,
    index: usize,
    confidence: Decimal,
    volume_ratio: Decimal,
) -> PatternMatch {
    PatternMatch::new(kind, signal, curr, index, confidence)
        .with_price_change(curr.close() - prev.close())
        .with_volume_ratio(volume_ratio)
}

// ============================================================
// TRAILING-WINDOW PATTERNS
// ============================================================

/// Low volume and low price: possible bottom
#[derive(Debug, Clone, Copy)]
pub struct LowVolumePriceDetector {
    /// Volume below this fraction of the average volume
    pub max_volume_ratio: Ratio,
    /// Close below this fraction of the average close
    pub max_price_ratio: Ratio,
}

impl Default for LowVolumePriceDetector {
    fn default() -> Self {
        Self {
            max_volume_ratio: Ratio::new_const(dec!(0.5)),
            max_price_ratio: Ratio::new_const(dec!(0.95)),
        }
    }
}

impl PatternDetector for LowVolumePriceDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::LowVolumePrice
    }

    // Window readiness comes from the context provider
    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (curr, prev, window) = with_window(bars, index, ctx)?;

        if curr.volume() >= self.max_volume_ratio.get() * window.avg_volume
            || curr.close() >= self.max_price_ratio.get() * window.avg_close
        {
            return None;
        }

        let price_gap = pct_change(window.avg_close, curr.close());
        let volume_gap = pct_change(window.avg_volume, curr.volume());
        let confidence = numeric::weighted_confidence(price_gap, volume_gap, Decimal::ZERO);
        let volume_ratio = safe_divide(curr.volume(), window.avg_volume, Decimal::ZERO);

        Some(volume_match(
            PatternKind::LowVolumePrice,
            Signal::Buy,
            prev,
            curr,
            index,
            confidence,
            volume_ratio,
        ))
    }
}

/// Heavy volume with price near the window high: possible top
#[derive(Debug, Clone, Copy)]
pub struct HighVolumePriceDetector {
    /// Volume above this multiple of the average volume
    pub min_volume_ratio: Ratio,
    /// Close at or above this fraction of the highest high
    pub min_high_ratio: Ratio,
}

impl Default for HighVolumePriceDetector {
    fn default() -> Self {
        Self {
            min_volume_ratio: Ratio::new_const(dec!(2)),
            min_high_ratio: Ratio::new_const(dec!(0.95)),
        }
    }
}

impl PatternDetector for HighVolumePriceDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::HighVolumePrice
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (curr, prev, window) = with_window(bars, index, ctx)?;

        if curr.volume() <= self.min_volume_ratio.get() * window.avg_volume
            || curr.close() < self.min_high_ratio.get() * window.highest_high
        {
            return None;
        }

        let price_change = pct_change(window.avg_close, curr.close());
        let volume_change = pct_change(window.avg_volume, curr.volume());
        let volume_ratio = safe_divide(curr.volume(), window.avg_volume, Decimal::ZERO);
        let confidence = numeric::weighted_confidence(price_change, volume_change, volume_ratio);

        Some(volume_match(
            PatternKind::HighVolumePrice,
            Signal::Sell,
            prev,
            curr,
            index,
            confidence,
            volume_ratio,
        ))
    }
}

/// Rising close on shrinking volume: weakening advance
#[derive(Debug, Clone, Copy)]
pub struct VolumeDecreasePriceIncreaseDetector {
    /// Volume below this fraction of the average volume
    pub max_volume_ratio: Ratio,
    /// Close above this multiple of the average close
    pub min_price_ratio: Ratio,
}

impl Default for VolumeDecreasePriceIncreaseDetector {
    fn default() -> Self {
        Self {
            max_volume_ratio: Ratio::new_const(dec!(0.7)),
            min_price_ratio: Ratio::new_const(dec!(1.02)),
        }
    }
}

impl PatternDetector for VolumeDecreasePriceIncreaseDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumeDecreasePriceIncrease
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (curr, prev, window) = with_window(bars, index, ctx)?;

        if curr.volume() >= self.max_volume_ratio.get() * window.avg_volume
            || curr.close() <= self.min_price_ratio.get() * window.avg_close
            || curr.close() <= prev.close()
        {
            return None;
        }

        let price_change = pct_change(window.avg_close, curr.close());
        let volume_change = pct_change(window.avg_volume, curr.volume());
        let confidence = numeric::weighted_confidence(price_change, volume_change, Decimal::ZERO);
        let volume_ratio = safe_divide(curr.volume(), window.avg_volume, Decimal::ZERO);

        Some(volume_match(
            PatternKind::VolumeDecreasePriceIncrease,
            Signal::Sell,
            prev,
            curr,
            index,
            confidence,
            volume_ratio,
        ))
    }
}

/// Falling close on expanding volume: capitulation
#[derive(Debug, Clone, Copy)]
pub struct VolumeIncreasePriceDecreaseDetector {
    /// Volume above this multiple of the average volume
    pub min_volume_ratio: Ratio,
    /// Close below this fraction of the average close
    pub max_price_ratio: Ratio,
}

impl Default for VolumeIncreasePriceDecreaseDetector {
    fn default() -> Self {
        Self {
            min_volume_ratio: Ratio::new_const(dec!(1.5)),
            max_price_ratio: Ratio::new_const(dec!(0.98)),
        }
    }
}

impl PatternDetector for VolumeIncreasePriceDecreaseDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumeIncreasePriceDecrease
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (curr, prev, window) = with_window(bars, index, ctx)?;

        if curr.volume() <= self.min_volume_ratio.get() * window.avg_volume
            || curr.close() >= self.max_price_ratio.get() * window.avg_close
            || curr.close() >= prev.close()
        {
            return None;
        }

        let price_change = pct_change(window.avg_close, curr.close());
        let volume_change = pct_change(window.avg_volume, curr.volume());
        let volume_ratio = safe_divide(curr.volume(), window.avg_volume, Decimal::ZERO);
        let confidence = numeric::weighted_confidence(price_change, volume_change, volume_ratio);

        Some(volume_match(
            PatternKind::VolumeIncreasePriceDecrease,
            Signal::Buy,
            prev,
            curr,
            index,
            confidence,
            volume_ratio,
        ))
    }
}

// ============================================================
// DAY-OVER-DAY PATTERNS
// ============================================================

/// Close and volume both up on the previous day
#[derive(Debug, Clone, Copy)]
pub struct VolumePriceRiseDetector {
    /// Minimum close-to-close gain, in percent
    pub min_price_pct: Ratio,
    /// Minimum volume gain, in percent
    pub min_volume_pct: Ratio,
}

impl Default for VolumePriceRiseDetector {
    fn default() -> Self {
        Self {
            min_price_pct: Ratio::new_const(dec!(1)),
            min_volume_pct: Ratio::new_const(dec!(20)),
        }
    }
}

impl PatternDetector for VolumePriceRiseDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumePriceRise
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
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        let price_pct = helpers::close_change_pct(prev, curr);
        let volume_pct = helpers::volume_change_pct(prev, curr);
        if price_pct <= self.min_price_pct.get() || volume_pct <= self.min_volume_pct.get() {
            return None;
        }

        let confidence = numeric::weighted_confidence(price_pct, volume_pct, Decimal::ZERO);
        let volume_ratio = safe_divide(curr.volume(), prev.volume(), Decimal::ZERO);
        Some(
            volume_match(
                PatternKind::VolumePriceRise,
                Signal::Buy,
                prev,
                curr,
                index,
                confidence,
                volume_ratio,
            )
            .starting_at(index - 1),
        )
    }
}

/// Close and volume moving in opposite directions.
///
/// Price up on falling volume is a top (SELL); price down on rising volume is a
/// bottom (BUY).
#[derive(Debug, Clone, Copy)]
pub struct VolumePriceDivergenceDetector {
    pub min_price_pct: Ratio,
    pub min_volume_pct: Ratio,
}

impl Default for VolumePriceDivergenceDetector {
    fn default() -> Self {
        Self {
            min_price_pct: Ratio::new_const(dec!(1)),
            min_volume_pct: Ratio::new_const(dec!(20)),
        }
    }
}

impl PatternDetector for VolumePriceDivergenceDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumePriceDivergence
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
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        let price_pct = helpers::close_change_pct(prev, curr);
        let volume_pct = helpers::volume_change_pct(prev, curr);
        let min_price = self.min_price_pct.get();
        let min_volume = self.min_volume_pct.get();

        let signal = if price_pct > min_price && volume_pct < -min_volume {
            Signal::Sell
        } else if price_pct < -min_price && volume_pct > min_volume {
            Signal::Buy
        } else {
            return None;
        };

        let confidence =
            numeric::weighted_confidence(price_pct.abs(), volume_pct.abs(), Decimal::ZERO);
        let volume_ratio = safe_divide(curr.volume(), prev.volume(), Decimal::ZERO);
        Some(
            volume_match(
                PatternKind::VolumePriceDivergence,
                signal,
                prev,
                curr,
                index,
                confidence,
                volume_ratio,
            )
            .starting_at(index - 1),
        )
    }
}

/// Close crosses above the moving average of the last `period` closes (current
/// bar included) on volume above `min_volume_ratio` times its average
#[derive(Debug, Clone, Copy)]
pub struct VolumeBreakoutDetector {
    pub period: Period,
    pub min_volume_ratio: Ratio,
}

impl Default for VolumeBreakoutDetector {
    fn default() -> Self {
        Self {
            period: Period::new_const(helpers::VOLUME_WINDOW),
            min_volume_ratio: Ratio::new_const(dec!(2)),
        }
    }
}

impl PatternDetector for VolumeBreakoutDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumeBreakout
    }

    fn min_bars(&self) -> usize {
        self.period.get() + 1
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let period = self.period.get();
        if index < period {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;
        let window = &bars[index + 1 - period..=index];

        let n = Decimal::from(period);
        let (sum_close, sum_volume) = window
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(c, v), b| {
                (c + b.close(), v + b.volume())
            });
        let ma = sum_close / n;
        let volume_ratio = safe_divide(curr.volume(), sum_volume / n, Decimal::ZERO);

        if curr.close() <= ma || prev.close() > ma || volume_ratio <= self.min_volume_ratio.get()
        {
            return None;
        }

        let breakout_pct = pct_change(ma, curr.close());
        let confidence = numeric::weighted_confidence(breakout_pct, Decimal::ZERO, volume_ratio);
        Some(
            volume_match(
                PatternKind::VolumeBreakout,
                Signal::Buy,
                prev,
                curr,
                index,
                confidence,
                volume_ratio,
            )
            .starting_at(index + 1 - period),
        )
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

const LOW_VOLUME_PRICE_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "max_volume_ratio",
        0.5,
        (0.3, 0.8, 0.1),
        "Volume ceiling as a fraction of the average volume",
    ),
    ParamMeta::ratio(
        "max_price_ratio",
        0.95,
        (0.85, 1.0, 0.05),
        "Close ceiling as a fraction of the average close",
    ),
];

const HIGH_VOLUME_PRICE_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "min_volume_ratio",
        2.0,
        (1.5, 4.0, 0.5),
        "Volume floor as a multiple of the average volume",
    ),
    ParamMeta::ratio(
        "min_high_ratio",
        0.95,
        (0.85, 1.0, 0.05),
        "Close floor as a fraction of the highest high",
    ),
];

const VOLUME_PRICE_RISE_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio("min_price_pct", 1.0, (0.5, 3.0, 0.5), "Minimum close gain in percent"),
    ParamMeta::ratio(
        "min_volume_pct",
        20.0,
        (10.0, 50.0, 10.0),
        "Minimum volume gain in percent",
    ),
];

const VOLUME_BREAKOUT_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("period", 20.0, (5.0, 60.0, 5.0), "Closes and volumes in the moving averages"),
    ParamMeta::ratio(
        "min_volume_ratio",
        2.0,
        (1.5, 4.0, 0.5),
        "Volume floor as a multiple of the average volume",
    ),
];

impl ParameterizedDetector for LowVolumePriceDetector {
    fn param_meta() -> &'static [ParamMeta] {
        LOW_VOLUME_PRICE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_volume_ratio: get_ratio(params, "max_volume_ratio", 0.5)?,
            max_price_ratio: get_ratio(params, "max_price_ratio", 0.95)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::LowVolumePrice
    }
}

impl ParameterizedDetector for HighVolumePriceDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HIGH_VOLUME_PRICE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_volume_ratio: get_ratio(params, "min_volume_ratio", 2.0)?,
            min_high_ratio: get_ratio(params, "min_high_ratio", 0.95)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::HighVolumePrice
    }
}

impl ParameterizedDetector for VolumePriceRiseDetector {
    fn param_meta() -> &'static [ParamMeta] {
        VOLUME_PRICE_RISE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_price_pct: get_ratio(params, "min_price_pct", 1.0)?,
            min_volume_pct: get_ratio(params, "min_volume_pct", 20.0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::VolumePriceRise
    }
}

impl ParameterizedDetector for VolumeBreakoutDetector {
    fn param_meta() -> &'static [ParamMeta] {
        VOLUME_BREAKOUT_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            period: get_period(params, "period", helpers::VOLUME_WINDOW)?,
            min_volume_ratio: get_ratio(params, "min_volume_ratio", 2.0)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::VolumeBreakout
    }
}

// ============================================================
// TESTS
// ============================================================
