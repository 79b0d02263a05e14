//! Shared decimal arithmetic for indicators and detectors
//!
//! Everything here is exact `Decimal` math except [`sqrt`], which round-trips
//! through `f64` because a square root has no finite decimal expansion.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::Strength;

/// Lower bound of every confidence score.
pub const CONFIDENCE_MIN: Decimal = Decimal::ZERO;
/// Upper bound of every confidence score.
pub const CONFIDENCE_MAX: Decimal = Decimal::ONE_HUNDRED;

/// `numerator / denominator`, or `fallback` when the denominator is zero.
///
/// Overflow also yields `fallback`, so callers never see a panic from degenerate
/// price data.
#[inline]
pub fn safe_divide(numerator: Decimal, denominator: Decimal, fallback: Decimal) -> Decimal {
    if denominator.is_zero() {
        return fallback;
    }
    numerator.checked_div(denominator).unwrap_or(fallback)
}

/// Percentage change from `base` to `value`; zero when `base` is zero.
#[inline]
pub fn pct_change(base: Decimal, value: Decimal) -> Decimal {
    safe_divide(value - base, base, Decimal::ZERO) * Decimal::ONE_HUNDRED
}

/// Arithmetic mean of a window. An empty window has mean zero.
pub fn window_mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum = values.iter().fold(Decimal::ZERO, |acc, v| acc + *v);
    sum / Decimal::from(values.len())
}

/// Population variance (divides by N).
pub fn window_variance(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let mean = window_mean(values);
    let sum_sq = values.iter().fold(Decimal::ZERO, |acc, v| {
        let diff = *v - mean;
        acc + diff * diff
    });
    sum_sq / Decimal::from(values.len())
}

/// Population standard deviation.
#[inline]
pub fn window_std_dev(values: &[Decimal]) -> Decimal {
    sqrt(window_variance(values))
}

/// Square root through `f64`. Negative or unrepresentable inputs give zero.
pub fn sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    value
        .to_f64()
        .map(f64::sqrt)
        .and_then(Decimal::from_f64)
        .unwrap_or(Decimal::ZERO)
}

/// Largest value of a window, `None` when empty.
#[inline]
pub fn highest<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
    values.into_iter().reduce(Decimal::max)
}

/// Smallest value of a window, `None` when empty.
#[inline]
pub fn lowest<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
    values.into_iter().reduce(Decimal::min)
}

/// Bound `value` into `[low, high]`.
#[inline]
pub fn clamp(value: Decimal, low: Decimal, high: Decimal) -> Decimal {
    value.max(low).min(high)
}

/// Bound a raw score into the confidence range `[0, 100]`.
#[inline]
pub fn clamp_confidence(value: Decimal) -> Decimal {
    clamp(value, CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Map a confidence score to its strength bucket.
pub fn classify_strength(confidence: Decimal) -> Strength {
    if confidence >= dec!(80) {
        Strength::Strong
    } else if confidence >= dec!(60) {
        Strength::Medium
    } else {
        Strength::Weak
    }
}

/// Weighted confidence shared by the momentum-style detectors.
///
/// Price change contributes up to 40 points (saturating at 10%), volume change up
/// to 30 (saturating at 50%) and volume ratio up to 30 (saturating at 5x). Zero
/// inputs contribute nothing.
pub fn weighted_confidence(
    price_change: Decimal,
    volume_change: Decimal,
    volume_ratio: Decimal,
) -> Decimal {
    let mut confidence = Decimal::ZERO;

    if !price_change.is_zero() {
        confidence += price_change.abs().min(dec!(10)) / dec!(10) * dec!(40);
    }
    if !volume_change.is_zero() {
        confidence += volume_change.abs().min(dec!(50)) / dec!(50) * dec!(30);
    }
    if !volume_ratio.is_zero() {
        confidence += volume_ratio.min(dec!(5)) / dec!(5) * dec!(30);
    }

    clamp_confidence(confidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_divide_zero_denominator() {
        assert_eq!(safe_divide(dec!(10), Decimal::ZERO, dec!(-50)), dec!(-50));
        assert_eq!(safe_divide(dec!(10), dec!(4), dec!(-50)), dec!(2.5));
    }

    #[test]
    fn test_pct_change() {
        assert_eq!(pct_change(dec!(10), dec!(11)), dec!(10));
        assert_eq!(pct_change(Decimal::ZERO, dec!(11)), Decimal::ZERO);
    }

    #[test]
    fn test_mean_and_population_variance() {
        let values = [dec!(2), dec!(4), dec!(4), dec!(4), dec!(5), dec!(5), dec!(7), dec!(9)];
        assert_eq!(window_mean(&values), dec!(5));
        assert_eq!(window_variance(&values), dec!(4));
        assert_eq!(window_std_dev(&values), dec!(2));
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(window_mean(&[]), Decimal::ZERO);
        assert_eq!(window_variance(&[]), Decimal::ZERO);
        assert_eq!(highest(Vec::<Decimal>::new()), None);
    }

    #[test]
    fn test_sqrt_non_positive() {
        assert_eq!(sqrt(Decimal::ZERO), Decimal::ZERO);
        assert_eq!(sqrt(dec!(-4)), Decimal::ZERO);
        assert_eq!(sqrt(dec!(9)), dec!(3));
    }

    #[test]
    fn test_highest_lowest() {
        let values = [dec!(3), dec!(1), dec!(7)];
        assert_eq!(highest(values), Some(dec!(7)));
        assert_eq!(lowest(values), Some(dec!(1)));
    }

    #[test]
    fn test_classify_strength() {
        assert_eq!(classify_strength(dec!(90)), Strength::Strong);
        assert_eq!(classify_strength(dec!(80)), Strength::Strong);
        assert_eq!(classify_strength(dec!(70)), Strength::Medium);
        assert_eq!(classify_strength(dec!(50)), Strength::Weak);
    }

    #[test]
    fn test_weighted_confidence_bounds() {
        let c = weighted_confidence(dec!(5), dec!(30), dec!(2));
        assert_eq!(c, dec!(20) + dec!(18) + dec!(12));

        let saturated = weighted_confidence(dec!(100), dec!(500), dec!(10));
        assert_eq!(saturated, dec!(100));

        assert_eq!(weighted_confidence(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(dec!(140)), dec!(100));
        assert_eq!(clamp_confidence(dec!(-3)), Decimal::ZERO);
    }
}
