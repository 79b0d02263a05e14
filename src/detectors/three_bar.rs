//! Three-bar candlestick detectors
//!
//! Three Black Crows, Red Three Soldiers, Morning Star, Evening Star.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::helpers;
use crate::{
    numeric,
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Ratio, Result, Signal,
    OHLCV,
};

impl_with_defaults!(
    ThreeBlackCrowsDetector,
    RedThreeSoldiersDetector,
    MorningStarDetector,
    EveningStarDetector,
);

/// The three bars ending at `index`, oldest first
#[inline]
fn triple<T: OHLCV>(bars: &[T], index: usize) -> Option<(&T, &T, &T)> {
    if index < 2 {
        return None;
    }
    Some((bars.get(index - 2)?, bars.get(index - 1)?, bars.get(index)?))
}

/// Mean intraday change of three bars as a percentage of the first open
#[inline]
fn average_change_pct<T: OHLCV>(first: &T, second: &T, third: &T) -> Decimal {
    let avg = (first.change() + second.change() + third.change()) / dec!(3);
    numeric::safe_divide(avg, first.open(), Decimal::ZERO) * Decimal::ONE_HUNDRED
}

// ============================================================
// THREE BLACK CROWS / RED THREE SOLDIERS
// ============================================================

/// Three Black Crows: three black candles with falling closes, each opening
/// inside the previous real body
#[derive(Debug, Clone, Copy)]
pub struct ThreeBlackCrowsDetector {
    /// Minimum average decline, in percent
    pub min_avg_change_pct: Ratio,
}

impl Default for ThreeBlackCrowsDetector {
    fn default() -> Self {
        Self {
            min_avg_change_pct: Ratio::new_const(helpers::THREE_CANDLE_MIN_PCT),
        }
    }
}

impl PatternDetector for ThreeBlackCrowsDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::ThreeBlackCrows
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (first, second, third) = triple(bars, index)?;

        if !(first.is_bearish() && second.is_bearish() && third.is_bearish()) {
            return None;
        }
        if second.close() >= first.close() || third.close() >= second.close() {
            return None;
        }
        if !helpers::opens_within_body(second.open(), first)
            || !helpers::opens_within_body(third.open(), second)
        {
            return None;
        }

        let decline = average_change_pct(first, second, third).abs();
        if decline <= self.min_avg_change_pct.get() {
            return None;
        }

        let confidence = numeric::weighted_confidence(decline, Decimal::ZERO, Decimal::ZERO);
        Some(
            PatternMatch::new(
                PatternKind::ThreeBlackCrows,
                Signal::Sell,
                third,
                index,
                confidence,
            )
            .starting_at(index - 2),
        )
    }
}

/// Red Three Soldiers: three white candles, each opening inside the previous
/// real body
#[derive(Debug, Clone, Copy)]
pub struct RedThreeSoldiersDetector {
    /// Minimum average advance, in percent
    pub min_avg_change_pct: Ratio,
}

impl Default for RedThreeSoldiersDetector {
    fn default() -> Self {
        Self {
            min_avg_change_pct: Ratio::new_const(helpers::THREE_CANDLE_MIN_PCT),
        }
    }
}

impl PatternDetector for RedThreeSoldiersDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::RedThreeSoldiers
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let (first, second, third) = triple(bars, index)?;

        if !(first.is_bullish() && second.is_bullish() && third.is_bullish()) {
            return None;
        }
        if !helpers::opens_within_body(second.open(), first)
            || !helpers::opens_within_body(third.open(), second)
        {
            return None;
        }

        let advance = average_change_pct(first, second, third);
        if advance <= self.min_avg_change_pct.get() {
            return None;
        }

        let confidence = numeric::weighted_confidence(advance, Decimal::ZERO, Decimal::ZERO);
        Some(
            PatternMatch::new(
                PatternKind::RedThreeSoldiers,
                Signal::Buy,
                third,
                index,
                confidence,
            )
            .starting_at(index - 2),
        )
    }
}

// ============================================================
// MORNING / EVENING STAR
// ============================================================

/// Morning Star: after falling closes, a big black candle, a small-bodied star
/// and a big white candle
#[derive(Debug, Clone, Copy)]
pub struct MorningStarDetector {
    /// Minimum move of the outer candles, in percent
    pub min_change_pct: Ratio,
    /// Maximum star body, in percent of its open
    pub max_star_body_pct: Ratio,
}

impl Default for MorningStarDetector {
    fn default() -> Self {
        Self {
            min_change_pct: Ratio::new_const(helpers::BIG_CANDLE_PCT),
            max_star_body_pct: Ratio::new_const(helpers::STAR_BODY_PCT),
        }
    }
}

impl PatternDetector for MorningStarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::MorningStar
    }

    fn min_bars(&self) -> usize {
        6
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        if index < 5 || !helpers::closes_trend(bars, index - 5, index - 2, true) {
            return None;
        }
        let (first, star, last) = triple(bars, index)?;
        let min = self.min_change_pct.get();

        let first_pct = first.change_pct();
        let last_pct = last.change_pct();
        if first_pct >= -min
            || helpers::body_pct(star) >= self.max_star_body_pct.get()
            || last_pct <= min
        {
            return None;
        }

        let confidence = numeric::weighted_confidence(first_pct.abs(), last_pct, Decimal::ZERO);
        Some(
            PatternMatch::new(
                PatternKind::MorningStar,
                Signal::Buy,
                last,
                index,
                confidence,
            )
            .starting_at(index - 2),
        )
    }
}

/// Evening Star: after rising closes, a big white candle, a small-bodied star
/// and a big black candle
#[derive(Debug, Clone, Copy)]
pub struct EveningStarDetector {
    pub min_change_pct: Ratio,
    pub max_star_body_pct: Ratio,
}

impl Default for EveningStarDetector {
    fn default() -> Self {
        Self {
            min_change_pct: Ratio::new_const(helpers::BIG_CANDLE_PCT),
            max_star_body_pct: Ratio::new_const(helpers::STAR_BODY_PCT),
        }
    }
}

impl PatternDetector for EveningStarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::EveningStar
    }

    fn min_bars(&self) -> usize {
        6
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        if index < 5 || !helpers::closes_trend(bars, index - 5, index - 2, false) {
            return None;
        }
        let (first, star, last) = triple(bars, index)?;
        let min = self.min_change_pct.get();

        let first_pct = first.change_pct();
        let last_pct = last.change_pct();
        if first_pct <= min
            || helpers::body_pct(star) >= self.max_star_body_pct.get()
            || last_pct >= -min
        {
            return None;
        }

        let confidence = numeric::weighted_confidence(first_pct, last_pct.abs(), Decimal::ZERO);
        Some(
            PatternMatch::new(
                PatternKind::EveningStar,
                Signal::Sell,
                last,
                index,
                confidence,
            )
            .starting_at(index - 2),
        )
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

const THREE_CANDLE_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "min_avg_change_pct",
    1.5,
    (0.5, 4.0, 0.5),
    "Minimum average move of the three candles in percent",
)];

impl ParameterizedDetector for ThreeBlackCrowsDetector {
    fn param_meta() -> &'static [ParamMeta] {
        THREE_CANDLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_avg_change_pct: get_ratio(params, "min_avg_change_pct", 1.5)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::ThreeBlackCrows
    }
}

impl ParameterizedDetector for RedThreeSoldiersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        THREE_CANDLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_avg_change_pct: get_ratio(params, "min_avg_change_pct", 1.5)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::RedThreeSoldiers
    }
}

// ============================================================
// TESTS
// ============================================================
