//! Single-bar candlestick detectors
//!
//! Doji, Hammer, Shooting Star / Inverted Hammer, Spinning Top. Each looks only at
//! the geometry of the bar at `index`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::helpers;
use crate::{
    numeric::{self, safe_divide},
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    MarketContext, OHLCVExt, PatternDetector, PatternKind, PatternMatch, Ratio, Result, Signal,
    TaError, OHLCV,
};

impl_with_defaults!(DojiDetector, HammerDetector, ShootingStarDetector, SpinningTopDetector);

// ============================================================
// DOJI
// ============================================================

/// Doji: open and close nearly equal relative to the day's range
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    /// Body must be strictly below this fraction of the range
    pub max_body_ratio: Ratio,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: Ratio::new_const(helpers::DOJI_BODY_RATIO),
        }
    }
}

impl PatternDetector for DojiDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Doji
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if bar.range() <= Decimal::ZERO {
            return None;
        }

        let max = self.max_body_ratio.get();
        let ratio = helpers::body_ratio(bar);
        if ratio >= max {
            return None;
        }

        // Tighter bodies score higher: 60 at the limit, 90 for a zero body
        let tightness = Decimal::ONE - safe_divide(ratio, max, Decimal::ONE);
        let confidence = numeric::clamp(dec!(60) + dec!(30) * tightness, dec!(60), dec!(90));

        Some(PatternMatch::new(
            PatternKind::Doji,
            Signal::Hold,
            bar,
            index,
            confidence,
        ))
    }
}

// ============================================================
// HAMMER
// ============================================================

/// Hammer: long lower shadow, short upper shadow, non-zero body
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    pub lower_shadow_factor: Ratio,
    pub upper_shadow_factor: Ratio,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            lower_shadow_factor: Ratio::new_const(helpers::LONG_SHADOW_FACTOR),
            upper_shadow_factor: Ratio::new_const(helpers::SHORT_SHADOW_FACTOR),
        }
    }
}

impl PatternDetector for HammerDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Hammer
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        let body = bar.body();
        if body <= Decimal::ZERO {
            return None;
        }

        let lower = bar.lower_shadow();
        if lower <= body * self.lower_shadow_factor.get()
            || bar.upper_shadow() >= body * self.upper_shadow_factor.get()
        {
            return None;
        }

        let confidence = (lower / body).min(dec!(10)) * dec!(10);
        Some(PatternMatch::new(
            PatternKind::Hammer,
            Signal::Buy,
            bar,
            index,
            confidence,
        ))
    }
}

// ============================================================
// SHOOTING STAR / INVERTED HAMMER
// ============================================================

/// Long upper shadow over a small body.
///
/// Shooting Star and Inverted Hammer share this geometry; the caller assigns the
/// signal. `SELL` reports a Shooting Star, `BUY` an Inverted Hammer.
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarDetector {
    pub signal: Signal,
    /// Upper shadow must be at least this multiple of the body
    pub upper_shadow_factor: Ratio,
    /// Lower shadow must be at most this multiple of the body
    pub lower_shadow_factor: Ratio,
}

impl Default for ShootingStarDetector {
    fn default() -> Self {
        Self::shooting_star()
    }
}

impl ShootingStarDetector {
    pub fn shooting_star() -> Self {
        Self {
            signal: Signal::Sell,
            upper_shadow_factor: Ratio::new_const(helpers::LONG_SHADOW_FACTOR),
            lower_shadow_factor: Ratio::new_const(helpers::SHORT_SHADOW_FACTOR),
        }
    }

    pub fn inverted_hammer() -> Self {
        Self {
            signal: Signal::Buy,
            ..Self::shooting_star()
        }
    }
}

impl PatternDetector for ShootingStarDetector {
    fn kind(&self) -> PatternKind {
        match self.signal {
            Signal::Buy => PatternKind::InvertedHammer,
            _ => PatternKind::ShootingStar,
        }
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        let body = bar.body();
        if body <= Decimal::ZERO {
            return None;
        }

        let upper = bar.upper_shadow();
        if upper < body * self.upper_shadow_factor.get()
            || bar.lower_shadow() > body * self.lower_shadow_factor.get()
        {
            return None;
        }

        let confidence = numeric::clamp(
            (upper / body).min(dec!(10)) * dec!(10),
            dec!(50),
            dec!(95),
        );
        Some(PatternMatch::new(
            PatternDetector::kind(self),
            self.signal,
            bar,
            index,
            confidence,
        ))
    }

    fn validate_config(&self) -> Result<()> {
        if !self.signal.is_directional() {
            return Err(TaError::InvalidConfig(format!(
                "shooting star signal must be BUY or SELL, got {}",
                self.signal
            )));
        }
        Ok(())
    }
}

// ============================================================
// SPINNING TOP
// ============================================================

/// Spinning Top: small body with shadows longer than the body on both sides
#[derive(Debug, Clone, Copy)]
pub struct SpinningTopDetector {
    pub min_body_ratio: Ratio,
    pub max_body_ratio: Ratio,
}

impl Default for SpinningTopDetector {
    fn default() -> Self {
        Self {
            min_body_ratio: Ratio::new_const(helpers::SPINNING_MIN_BODY_RATIO),
            max_body_ratio: Ratio::new_const(helpers::SPINNING_MAX_BODY_RATIO),
        }
    }
}

impl PatternDetector for SpinningTopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::SpinningTop
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        _ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        if bar.range() <= Decimal::ZERO {
            return None;
        }

        let ratio = helpers::body_ratio(bar);
        let max = self.max_body_ratio.get();
        if ratio < self.min_body_ratio.get() || ratio > max {
            return None;
        }
        let body = bar.body();
        if bar.upper_shadow() <= body || bar.lower_shadow() <= body {
            return None;
        }

        let tightness = Decimal::ONE - safe_divide(ratio, max, Decimal::ONE);
        let confidence = numeric::clamp(dec!(40) + dec!(30) * tightness, dec!(40), dec!(70));

        Some(PatternMatch::new(
            PatternKind::SpinningTop,
            Signal::Hold,
            bar,
            index,
            confidence,
        ))
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_body_ratio > self.max_body_ratio {
            return Err(TaError::InvalidConfig(
                "spinning top min_body_ratio exceeds max_body_ratio".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETERIZED DETECTOR IMPLEMENTATIONS
// ============================================================

const DOJI_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "max_body_ratio",
    0.05,
    (0.02, 0.15, 0.01),
    "Maximum body as a fraction of the range",
)];

const HAMMER_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "lower_shadow_factor",
        2.0,
        (1.5, 4.0, 0.5),
        "Minimum lower shadow as a multiple of the body",
    ),
    ParamMeta::ratio(
        "upper_shadow_factor",
        0.5,
        (0.1, 1.0, 0.1),
        "Maximum upper shadow as a multiple of the body",
    ),
];

const SHOOTING_STAR_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "upper_shadow_factor",
        2.0,
        (1.5, 4.0, 0.5),
        "Minimum upper shadow as a multiple of the body",
    ),
    ParamMeta::ratio(
        "lower_shadow_factor",
        0.5,
        (0.1, 1.0, 0.1),
        "Maximum lower shadow as a multiple of the body",
    ),
];

const SPINNING_TOP_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "min_body_ratio",
        0.05,
        (0.02, 0.1, 0.01),
        "Minimum body as a fraction of the range",
    ),
    ParamMeta::ratio(
        "max_body_ratio",
        0.3,
        (0.2, 0.4, 0.05),
        "Maximum body as a fraction of the range",
    ),
];

impl ParameterizedDetector for DojiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOJI_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_body_ratio: get_ratio(params, "max_body_ratio", 0.05)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::Doji
    }
}

impl ParameterizedDetector for HammerDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HAMMER_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            lower_shadow_factor: get_ratio(params, "lower_shadow_factor", 2.0)?,
            upper_shadow_factor: get_ratio(params, "upper_shadow_factor", 0.5)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::Hammer
    }
}

impl ParameterizedDetector for ShootingStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        SHOOTING_STAR_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            signal: Signal::Sell,
            upper_shadow_factor: get_ratio(params, "upper_shadow_factor", 2.0)?,
            lower_shadow_factor: get_ratio(params, "lower_shadow_factor", 0.5)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::ShootingStar
    }
}

impl ParameterizedDetector for SpinningTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        SPINNING_TOP_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_body_ratio: get_ratio(params, "min_body_ratio", 0.05)?,
            max_body_ratio: get_ratio(params, "max_body_ratio", 0.3)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::SpinningTop
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, Strength};

    fn bar(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar::new("000001.SZ", "20240102", o, h, l, c, dec!(1000))
    }

    fn ctx() -> MarketContext {
        MarketContext::default()
    }

    #[test]
    fn test_doji_hold_signal() {
        let bars = vec![bar(dec!(10), dec!(10.5), dec!(9.5), dec!(10.01))];
        let m = DojiDetector::default().detect(&bars, 0, &ctx()).unwrap();
        assert_eq!(m.signal, Signal::Hold);
        assert!(m.confidence >= dec!(60) && m.confidence <= dec!(90));
    }

    #[test]
    fn test_doji_perfect_body_scores_ninety() {
        let bars = vec![bar(dec!(10), dec!(10.5), dec!(9.5), dec!(10))];
        let m = DojiDetector::default().detect(&bars, 0, &ctx()).unwrap();
        assert_eq!(m.confidence, dec!(90));
        assert_eq!(m.strength, Strength::Strong);
    }

    #[test]
    fn test_doji_scores_body_fraction_of_range() {
        // body 4% of range: tightness 0.2 → 66
        let bars = vec![bar(dec!(10), dec!(10.5), dec!(9.5), dec!(10.04))];
        let m = DojiDetector::default().detect(&bars, 0, &ctx()).unwrap();
        assert_eq!(m.confidence, dec!(66));

        // exactly at the limit is not a doji
        let bars = vec![bar(dec!(10), dec!(10.5), dec!(9.5), dec!(10.05))];
        assert!(DojiDetector::default().detect(&bars, 0, &ctx()).is_none());
    }

    #[test]
    fn test_doji_rejects_zero_range() {
        let bars = vec![bar(dec!(10), dec!(10), dec!(10), dec!(10))];
        assert!(DojiDetector::default().detect(&bars, 0, &ctx()).is_none());
    }

    #[test]
    fn test_hammer() {
        // body 0.2, lower 1.0, upper 0.05
        let bars = vec![bar(dec!(10), dec!(10.25), dec!(9), dec!(10.2))];
        let m = HammerDetector::default().detect(&bars, 0, &ctx()).unwrap();
        assert_eq!(m.signal, Signal::Buy);
        assert_eq!(m.confidence, dec!(50));
    }

    #[test]
    fn test_hammer_requires_body() {
        let bars = vec![bar(dec!(10), dec!(10), dec!(9), dec!(10))];
        assert!(HammerDetector::default().detect(&bars, 0, &ctx()).is_none());
    }

    #[test]
    fn test_shooting_star_sell() {
        let bars = vec![bar(dec!(10), dec!(11), dec!(9.95), dec!(10.1))];
        let m = ShootingStarDetector::default()
            .detect(&bars, 0, &ctx())
            .unwrap();
        assert_eq!(m.pattern, PatternKind::ShootingStar);
        assert_eq!(m.signal, Signal::Sell);
        assert_eq!(m.confidence, dec!(90));
    }

    #[test]
    fn test_inverted_hammer_buy() {
        let bars = vec![bar(dec!(10), dec!(11), dec!(9.95), dec!(10.1))];
        let m = ShootingStarDetector::inverted_hammer()
            .detect(&bars, 0, &ctx())
            .unwrap();
        assert_eq!(m.pattern, PatternKind::InvertedHammer);
        assert_eq!(m.signal, Signal::Buy);
    }

    #[test]
    fn test_shooting_star_confidence_floor() {
        // upper exactly 2x body gives raw 20, floored to 50
        let bars = vec![bar(dec!(10), dec!(10.3), dec!(10), dec!(10.1))];
        let m = ShootingStarDetector::default()
            .detect(&bars, 0, &ctx())
            .unwrap();
        assert_eq!(m.confidence, dec!(50));
    }

    #[test]
    fn test_shooting_star_rejects_hold_signal() {
        let detector = ShootingStarDetector {
            signal: Signal::Hold,
            ..Default::default()
        };
        assert!(PatternDetector::validate_config(&detector).is_err());
    }

    #[test]
    fn test_spinning_top() {
        // range 2, body 0.2 (10%), shadows 0.9 each
        let bars = vec![bar(dec!(10), dec!(11), dec!(9), dec!(10.2))];
        let m = SpinningTopDetector::default()
            .detect(&bars, 0, &ctx())
            .unwrap();
        assert_eq!(m.signal, Signal::Hold);
        assert!(m.confidence >= dec!(40) && m.confidence <= dec!(70));
    }

    #[test]
    fn test_spinning_top_rejects_one_sided_shadow() {
        let bars = vec![bar(dec!(10), dec!(10.25), dec!(9), dec!(10.2))];
        assert!(SpinningTopDetector::default()
            .detect(&bars, 0, &ctx())
            .is_none());
    }

    #[test]
    fn test_with_params_overrides() {
        let mut params = HashMap::new();
        params.insert("lower_shadow_factor", 3.0);
        let hammer = HammerDetector::with_params(&params).unwrap();
        assert_eq!(hammer.lower_shadow_factor.get(), dec!(3));
        assert_eq!(hammer.upper_shadow_factor.get(), dec!(0.5));
    }
}
