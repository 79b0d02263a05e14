//! Volatility indicators

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::{rolling, trend::true_range, IndicatorPoint};
use crate::{
    numeric::{self, safe_divide},
    Signal, OHLCV,
};

const TRADING_DAYS: Decimal = dec!(252);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoricalVolatilityValue {
    pub hv20: Decimal,
    pub hv60: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BollingerValue {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// Average true range: the plain mean of `period` true ranges.
///
/// Flags HIGH_VOLATILITY when the ATR exceeds 1.2x the previous point and
/// LOW_VOLATILITY below 0.8x. The first point has nothing to compare against.
pub fn atr<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    if period == 0 {
        return Vec::new();
    }
    let raw = rolling(bars, period + 1, |_, window| {
        let ranges: Vec<Decimal> = window
            .windows(2)
            .map(|pair| true_range(&pair[1], &pair[0]))
            .collect();
        (numeric::window_mean(&ranges), Signal::Hold)
    });

    raw.into_iter()
        .scan(None::<Decimal>, |prev, point| {
            let signal = match *prev {
                Some(p) if point.value > p * dec!(1.2) => Signal::HighVolatility,
                Some(p) if point.value < p * dec!(0.8) => Signal::LowVolatility,
                _ => Signal::Hold,
            };
            *prev = Some(point.value);
            Some(IndicatorPoint::new(point.index, point.value, signal))
        })
        .collect()
}

/// Population standard deviation of closes, flagged against 5% / 2% of the mean
pub fn std_dev<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    rolling(bars, period, |_, window| {
        let closes: Vec<Decimal> = window.iter().map(|b| b.close()).collect();
        let mean = numeric::window_mean(&closes);
        let sd = numeric::window_std_dev(&closes);

        let signal = if sd > mean * dec!(0.05) {
            Signal::HighVolatility
        } else if sd < mean * dec!(0.02) {
            Signal::LowVolatility
        } else {
            Signal::Hold
        };
        (sd, signal)
    })
}

/// Annualized volatility of simple daily returns over the last 20 and 60 returns
pub fn historical_volatility<T: OHLCV>(
    bars: &[T],
) -> Vec<IndicatorPoint<HistoricalVolatilityValue>> {
    let annualize = numeric::sqrt(TRADING_DAYS);
    rolling(bars, 61, |_, window| {
        let returns: Vec<Decimal> = window
            .windows(2)
            .map(|pair| {
                safe_divide(pair[1].close() - pair[0].close(), pair[0].close(), Decimal::ZERO)
            })
            .collect();
        let value = HistoricalVolatilityValue {
            hv20: numeric::window_std_dev(&returns[returns.len() - 20..]) * annualize,
            hv60: numeric::window_std_dev(&returns) * annualize,
        };

        let signal = if value.hv20 > dec!(0.3) {
            Signal::HighVolatility
        } else if value.hv20 < dec!(0.15) {
            Signal::LowVolatility
        } else {
            Signal::Hold
        };
        (value, signal)
    })
}

/// Bollinger bands: SMA of closes +/- `multiplier` population standard deviations.
///
/// A close above the upper band reads overbought (SELL), below the lower band
/// oversold (BUY).
pub fn bollinger_bands<T: OHLCV>(
    bars: &[T],
    period: usize,
    multiplier: Decimal,
) -> Vec<IndicatorPoint<BollingerValue>> {
    rolling(bars, period, |_, window| {
        let closes: Vec<Decimal> = window.iter().map(|b| b.close()).collect();
        let middle = numeric::window_mean(&closes);
        let width = numeric::window_std_dev(&closes) * multiplier;
        let value = BollingerValue {
            upper: middle + width,
            middle,
            lower: middle - width,
        };

        let close = closes[closes.len() - 1];
        let signal = if close > value.upper {
            Signal::Sell
        } else if close < value.lower {
            Signal::Buy
        } else {
            Signal::Hold
        };
        (value, signal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn bar(c: Decimal) -> Bar {
        Bar::new("T", "20240101", c, c + dec!(1), c - dec!(1), c, dec!(100))
    }

    fn flat(n: usize) -> Vec<Bar> {
        (0..n).map(|_| bar(dec!(10))).collect()
    }

    #[test]
    fn test_atr_constant_range() {
        let series = atr(&flat(20), 14);
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|p| p.value == dec!(2)));
        assert!(series.iter().all(|p| p.signal == Signal::Hold));
    }

    #[test]
    fn test_atr_expansion_flagged() {
        let mut bars = flat(16);
        bars.push(Bar::new("T", "20240101", dec!(10), dec!(20), dec!(5), dec!(15), dec!(100)));
        let series = atr(&bars, 14);
        assert_eq!(series.len(), 3);
        assert_eq!(series[2].signal, Signal::HighVolatility);
    }

    #[test]
    fn test_std_dev_low_volatility() {
        let series = std_dev(&flat(20), 20);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, Decimal::ZERO);
        assert_eq!(series[0].signal, Signal::LowVolatility);
    }

    #[test]
    fn test_std_dev_high_volatility() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| bar(if i % 2 == 0 { dec!(9) } else { dec!(11) }))
            .collect();
        let series = std_dev(&bars, 20);
        assert_eq!(series[0].value, dec!(1));
        assert_eq!(series[0].signal, Signal::HighVolatility);
    }

    #[test]
    fn test_historical_volatility() {
        assert!(historical_volatility(&flat(60)).is_empty());
        let series = historical_volatility(&flat(61));
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value.hv20, Decimal::ZERO);
        assert_eq!(series[0].signal, Signal::LowVolatility);
    }

    #[test]
    fn test_bollinger_breakout_above_upper() {
        let mut bars = flat(19);
        bars.push(bar(dec!(20)));
        let series = bollinger_bands(&bars, 20, dec!(2));
        let point = series[0];
        assert_eq!(point.value.middle, dec!(10.5));
        assert!(point.value.upper < dec!(20));
        assert_eq!(point.signal, Signal::Sell);
    }

    #[test]
    fn test_bollinger_flat_bands_collapse() {
        let series = bollinger_bands(&flat(25), 20, dec!(2));
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|p| p.value.upper == p.value.lower));
        assert!(series.iter().all(|p| p.signal == Signal::Hold));
    }
}
