//! Shared thresholds and window helpers for the detectors
//!
//! Default thresholds are kept as `Decimal` constants so every comparison in a
//! detector stays exact.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{numeric, OHLCVExt, OHLCV};

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Doji: body below this fraction of the range
pub const DOJI_BODY_RATIO: Decimal = dec!(0.05);
/// Spinning top: body between these fractions of the range
pub const SPINNING_MIN_BODY_RATIO: Decimal = dec!(0.05);
pub const SPINNING_MAX_BODY_RATIO: Decimal = dec!(0.3);
/// Long shadow: at least this multiple of the body
pub const LONG_SHADOW_FACTOR: Decimal = dec!(2);
/// Short shadow: at most this multiple of the body
pub const SHORT_SHADOW_FACTOR: Decimal = dec!(0.5);

/// Big candle: intraday move beyond this percentage
pub const BIG_CANDLE_PCT: Decimal = dec!(2);
/// Star body: below this percentage of the open
pub const STAR_BODY_PCT: Decimal = dec!(1);
/// Minimum average daily move of three-candle runs, in percent
pub const THREE_CANDLE_MIN_PCT: Decimal = dec!(1.5);

/// Trailing volume/close average window used by the volume-price detectors
pub const VOLUME_WINDOW: usize = 20;

// ============================================================
// HELPERS
// ============================================================

/// Body as a fraction of the range; zero for a zero-range bar
#[inline]
pub fn body_ratio<T: OHLCV>(bar: &T) -> Decimal {
    numeric::safe_divide(bar.body(), bar.range(), Decimal::ZERO)
}

/// Body as a percentage of the open
#[inline]
pub fn body_pct<T: OHLCV>(bar: &T) -> Decimal {
    numeric::safe_divide(bar.body(), bar.open(), Decimal::ZERO) * Decimal::ONE_HUNDRED
}

/// Close-to-close change in percent between two bars
#[inline]
pub fn close_change_pct<T: OHLCV>(prev: &T, curr: &T) -> Decimal {
    numeric::pct_change(prev.close(), curr.close())
}

/// Volume change in percent between two bars
#[inline]
pub fn volume_change_pct<T: OHLCV>(prev: &T, curr: &T) -> Decimal {
    numeric::pct_change(prev.volume(), curr.volume())
}

/// Whether `open` lies within the real body of `bar` (inclusive)
#[inline]
pub fn opens_within_body<T: OHLCV>(open: Decimal, bar: &T) -> bool {
    open >= bar.body_bottom() && open <= bar.body_top()
}

/// Checks that closes strictly fall (or rise) across `bars[from..=to]`.
///
/// Returns false when the range is out of bounds.
pub fn closes_trend<T: OHLCV>(bars: &[T], from: usize, to: usize, falling: bool) -> bool {
    if from >= to || to >= bars.len() {
        return false;
    }
    bars[from..=to].windows(2).all(|w| {
        if falling {
            w[1].close() < w[0].close()
        } else {
            w[1].close() > w[0].close()
        }
    })
}
