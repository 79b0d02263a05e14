//! Daily bar model
//!
//! Indicators and detectors read bars through the [`OHLCV`] trait, so any record
//! carrying a security code, a trade date and decimal prices can be analysed
//! without conversion. [`Bar`] is the owned form matching the market-data wire
//! format.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{numeric, Result, TaError};

/// Read access to one trading day of one security
pub trait OHLCV {
    /// Security identifier, e.g. `000001.SZ`
    fn ts_code(&self) -> &str;
    /// Trade date, `YYYYMMDD`
    fn trade_date(&self) -> &str;
    fn open(&self) -> Decimal;
    fn high(&self) -> Decimal;
    fn low(&self) -> Decimal;
    fn close(&self) -> Decimal;
    fn volume(&self) -> Decimal;

    /// Turnover; sources without it report zero
    fn amount(&self) -> Decimal {
        Decimal::ZERO
    }
}

// Lets detectors written against `&[T]` run on erased `&[&dyn OHLCV]` slices.
impl<B: OHLCV + ?Sized> OHLCV for &B {
    fn ts_code(&self) -> &str {
        (**self).ts_code()
    }

    fn trade_date(&self) -> &str {
        (**self).trade_date()
    }

    fn open(&self) -> Decimal {
        (**self).open()
    }

    fn high(&self) -> Decimal {
        (**self).high()
    }

    fn low(&self) -> Decimal {
        (**self).low()
    }

    fn close(&self) -> Decimal {
        (**self).close()
    }

    fn volume(&self) -> Decimal {
        (**self).volume()
    }

    fn amount(&self) -> Decimal {
        (**self).amount()
    }
}

/// One trading day for one security.
///
/// Field names follow the market-data wire format (`vol` is volume in lots,
/// `amount` is turnover).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub ts_code: String,
    pub trade_date: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub vol: Decimal,
    #[serde(default)]
    pub amount: Decimal,
}

impl Bar {
    pub fn new(
        ts_code: impl Into<String>,
        trade_date: impl Into<String>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        vol: Decimal,
    ) -> Self {
        Self {
            ts_code: ts_code.into(),
            trade_date: trade_date.into(),
            open,
            high,
            low,
            close,
            vol,
            amount: Decimal::ZERO,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }
}

impl OHLCV for Bar {
    fn ts_code(&self) -> &str {
        &self.ts_code
    }

    fn trade_date(&self) -> &str {
        &self.trade_date
    }

    fn open(&self) -> Decimal {
        self.open
    }

    fn high(&self) -> Decimal {
        self.high
    }

    fn low(&self) -> Decimal {
        self.low
    }

    fn close(&self) -> Decimal {
        self.close
    }

    fn volume(&self) -> Decimal {
        self.vol
    }

    fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Candle geometry derived from the four prices
pub trait OHLCVExt: OHLCV {
    /// Real body length `|close - open|`
    fn body(&self) -> Decimal {
        self.change().abs()
    }

    fn range(&self) -> Decimal {
        self.high() - self.low()
    }

    fn body_top(&self) -> Decimal {
        self.open().max(self.close())
    }

    fn body_bottom(&self) -> Decimal {
        self.open().min(self.close())
    }

    fn upper_shadow(&self) -> Decimal {
        self.high() - self.body_top()
    }

    fn lower_shadow(&self) -> Decimal {
        self.body_bottom() - self.low()
    }

    fn is_bullish(&self) -> bool {
        self.change() > Decimal::ZERO
    }

    fn is_bearish(&self) -> bool {
        self.change() < Decimal::ZERO
    }

    /// Candle colour: white when `close >= open` (a zero body counts as white)
    fn is_white(&self) -> bool {
        !self.is_bearish()
    }

    /// Signed intraday change `close - open`
    fn change(&self) -> Decimal {
        self.close() - self.open()
    }

    /// Intraday change as a percentage of the open
    fn change_pct(&self) -> Decimal {
        numeric::pct_change(self.open(), self.close())
    }

    fn midpoint(&self) -> Decimal {
        (self.high() + self.low()) / Decimal::TWO
    }

    /// `(high + low + close) / 3`
    fn typical_price(&self) -> Decimal {
        (self.high() + self.low() + self.close()) / dec!(3)
    }

    /// Reject inverted ranges and negative prices or volume.
    ///
    /// The reported index is always 0; [`validate_series`] fills in the position.
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        let reason = if self.high() < self.low() {
            "high < low"
        } else if prices.iter().any(|p| *p < Decimal::ZERO) {
            "negative price"
        } else if self.volume() < Decimal::ZERO {
            "negative volume"
        } else {
            return Ok(());
        };
        Err(TaError::InvalidBar { index: 0, reason })
    }
}

impl<B: OHLCV + ?Sized> OHLCVExt for B {}

/// Validate every bar, reporting the position of the first bad one
pub fn validate_series<T: OHLCV>(bars: &[T]) -> Result<()> {
    bars.iter().enumerate().try_for_each(|(index, bar)| {
        bar.validate().map_err(|err| match err {
            TaError::InvalidBar { reason, .. } => TaError::InvalidBar { index, reason },
            other => other,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar::new("000001.SZ", "20240101", o, h, l, c, dec!(1000))
    }

    #[test]
    fn test_candle_geometry() {
        let b = bar(dec!(100), dec!(110), dec!(90), dec!(105));
        assert_eq!(b.body(), dec!(5));
        assert_eq!(b.range(), dec!(20));
        assert_eq!(b.upper_shadow(), dec!(5));
        assert_eq!(b.lower_shadow(), dec!(10));
        assert_eq!(b.change_pct(), dec!(5));
        assert_eq!(b.typical_price(), dec!(305) / dec!(3));
        assert!(b.is_bullish());
        assert!(!b.is_bearish());

        let flat = bar(dec!(10), dec!(11), dec!(9), dec!(10));
        assert!(flat.is_white());
        assert!(!flat.is_bullish());
    }

    #[test]
    fn test_bar_validation() {
        assert!(bar(dec!(10), dec!(11), dec!(9), dec!(10)).validate().is_ok());
        assert_eq!(
            bar(dec!(10), dec!(9), dec!(11), dec!(10)).validate(),
            Err(TaError::InvalidBar {
                index: 0,
                reason: "high < low"
            })
        );
        let mut negative = bar(dec!(10), dec!(11), dec!(9), dec!(10));
        negative.vol = dec!(-1);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_validate_series_reports_position() {
        let mut bars = vec![bar(dec!(10), dec!(11), dec!(9), dec!(10)); 5];
        assert!(validate_series(&bars).is_ok());

        bars[3].low = dec!(-1);
        assert_eq!(
            validate_series(&bars),
            Err(TaError::InvalidBar {
                index: 3,
                reason: "negative price"
            })
        );
    }

    #[test]
    fn test_erased_bars_read_through() {
        let b = bar(dec!(10), dec!(12), dec!(9), dec!(11)).with_amount(dec!(11000));
        let erased: Vec<&dyn OHLCV> = vec![&b];
        assert_eq!(erased[0].ts_code(), "000001.SZ");
        assert_eq!(erased[0].amount(), dec!(11000));
        assert_eq!(erased[0].upper_shadow(), dec!(1));
    }
}
