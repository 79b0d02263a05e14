//! Oscillators: Williams %R, momentum, rate of change, RSI, KDJ

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::{rolling, IndicatorPoint};
use crate::{
    numeric::{self, safe_divide},
    Signal, OHLCV,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MomentumValue {
    pub momentum10: Decimal,
    pub momentum20: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RocValue {
    pub roc10: Decimal,
    pub roc20: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KdjValue {
    pub k: Decimal,
    pub d: Decimal,
    pub j: Decimal,
}

/// Williams %R over `period` bars, in `[-100, 0]`.
///
/// A flat window (highest high equal to lowest low) reads -50. Above -20 is
/// overbought (SELL), below -80 oversold (BUY).
pub fn williams_r<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    rolling(bars, period, |_, window| {
        let hh = numeric::highest(window.iter().map(|b| b.high())).unwrap_or_default();
        let ll = numeric::lowest(window.iter().map(|b| b.low())).unwrap_or_default();
        let close = window[window.len() - 1].close();

        let wr = if hh == ll {
            dec!(-50)
        } else {
            numeric::clamp((hh - close) / (hh - ll) * dec!(-100), dec!(-100), Decimal::ZERO)
        };

        let signal = if wr > dec!(-20) {
            Signal::Sell
        } else if wr < dec!(-80) {
            Signal::Buy
        } else {
            Signal::Hold
        };
        (wr, signal)
    })
}

/// Price momentum over 10 and 20 bars.
///
/// `momentum10 = C[t] - C[t-9]`, `momentum20 = C[t] - C[t-19]`.
pub fn momentum<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<MomentumValue>> {
    rolling(bars, 20, |_, window| {
        let close = window[19].close();
        let value = MomentumValue {
            momentum10: close - window[10].close(),
            momentum20: close - window[0].close(),
        };
        let signal = if value.momentum10 > Decimal::ZERO && value.momentum20 > Decimal::ZERO {
            Signal::Buy
        } else if value.momentum10 < Decimal::ZERO && value.momentum20 < Decimal::ZERO {
            Signal::Sell
        } else {
            Signal::Hold
        };
        (value, signal)
    })
}

/// Percentage rate of change over 10 and 20 bars; a zero base reads 0
pub fn rate_of_change<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<RocValue>> {
    rolling(bars, 21, |_, window| {
        let close = window[20].close();
        let value = RocValue {
            roc10: numeric::pct_change(window[10].close(), close),
            roc20: numeric::pct_change(window[0].close(), close),
        };
        let signal = if value.roc10 > dec!(5) && value.roc20 > dec!(10) {
            Signal::Buy
        } else if value.roc10 < dec!(-5) && value.roc20 < dec!(-10) {
            Signal::Sell
        } else {
            Signal::Hold
        };
        (value, signal)
    })
}

/// Relative strength index with simple averages of gains and losses.
///
/// Uses `period` close-to-close changes, so the window spans `period + 1` bars.
/// No losses in the window reads 100.
pub fn rsi<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    if period == 0 {
        return Vec::new();
    }
    rolling(bars, period + 1, |_, window| {
        let (gains, losses) = window.windows(2).fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(gains, losses), pair| {
                let change = pair[1].close() - pair[0].close();
                if change > Decimal::ZERO {
                    (gains + change, losses)
                } else {
                    (gains, losses - change)
                }
            },
        );
        let n = Decimal::from(period);
        let avg_gain = gains / n;
        let avg_loss = losses / n;

        let rsi = if avg_loss.is_zero() {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + avg_gain / avg_loss)
        };

        let signal = if rsi > dec!(70) {
            Signal::Sell
        } else if rsi < dec!(30) {
            Signal::Buy
        } else {
            Signal::Hold
        };
        (rsi, signal)
    })
}

/// KDJ stochastic oscillator.
///
/// RSV over `period` bars (50 for a flat window), `K = 2/3 K' + 1/3 RSV`,
/// `D = 2/3 D' + 1/3 K`, `J = 3K - 2D`. The first point seeds K with the RSV and
/// D with K.
pub fn kdj<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<KdjValue>> {
    let rsv = rolling(bars, period, |_, window| {
        let hh = numeric::highest(window.iter().map(|b| b.high())).unwrap_or_default();
        let ll = numeric::lowest(window.iter().map(|b| b.low())).unwrap_or_default();
        let close = window[window.len() - 1].close();
        let rsv = safe_divide(close - ll, hh - ll, dec!(0.5)) * Decimal::ONE_HUNDRED;
        (rsv, Signal::Hold)
    });

    rsv.into_iter()
        .scan(None::<(Decimal, Decimal)>, |state, point| {
            let rsv = point.value;
            let (k, d) = match *state {
                None => (rsv, rsv),
                Some((prev_k, prev_d)) => {
                    let k = (Decimal::TWO * prev_k + rsv) / dec!(3);
                    (k, (Decimal::TWO * prev_d + k) / dec!(3))
                }
            };
            *state = Some((k, d));

            let signal = if k > dec!(80) && d > dec!(80) {
                Signal::Sell
            } else if k < dec!(20) && d < dec!(20) {
                Signal::Buy
            } else {
                Signal::Hold
            };
            let value = KdjValue {
                k,
                d,
                j: dec!(3) * k - Decimal::TWO * d,
            };
            Some(IndicatorPoint::new(point.index, value, signal))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn closes(values: &[Decimal]) -> Vec<Bar> {
        values
            .iter()
            .map(|&c| Bar::new("T", "20240101", c, c + dec!(1), c - dec!(1), c, dec!(100)))
            .collect()
    }

    fn ramp(n: usize, step: Decimal) -> Vec<Bar> {
        let values: Vec<Decimal> = (0..n)
            .map(|i| dec!(50) + step * Decimal::from(i))
            .collect();
        closes(&values)
    }

    #[test]
    fn test_williams_r_alignment_and_range() {
        let bars = ramp(20, dec!(0.5));
        let wr = williams_r(&bars, 14);
        assert_eq!(wr.len(), 7);
        assert_eq!(wr[0].index, 13);
        assert!(wr.iter().all(|p| p.value >= dec!(-100) && p.value <= Decimal::ZERO));
    }

    #[test]
    fn test_williams_r_flat_window() {
        let bars: Vec<Bar> = (0..14)
            .map(|_| Bar::new("T", "20240101", dec!(10), dec!(10), dec!(10), dec!(10), dec!(0)))
            .collect();
        let wr = williams_r(&bars, 14);
        assert_eq!(wr[0].value, dec!(-50));
        assert_eq!(wr[0].signal, Signal::Hold);
    }

    #[test]
    fn test_williams_r_overbought() {
        let bars = ramp(14, dec!(1));
        let wr = williams_r(&bars, 14);
        // close 63, high 64, low 49 → (64 - 63) / 15 * -100
        assert_eq!(wr[0].signal, Signal::Sell);
    }

    #[test]
    fn test_momentum() {
        let bars = ramp(25, dec!(1));
        let m = momentum(&bars);
        assert_eq!(m.len(), 6);
        assert_eq!(m[0].value.momentum10, dec!(9));
        assert_eq!(m[0].value.momentum20, dec!(19));
        assert_eq!(m[0].signal, Signal::Buy);
    }

    #[test]
    fn test_rate_of_change() {
        let bars = ramp(21, dec!(1));
        let roc = rate_of_change(&bars);
        assert_eq!(roc.len(), 1);
        // 70 vs 60 and 50
        assert_eq!(roc[0].value.roc20, dec!(40));
        assert_eq!(roc[0].signal, Signal::Buy);
    }

    #[test]
    fn test_rsi_all_gains() {
        let bars = ramp(20, dec!(1));
        let series = rsi(&bars, 14);
        assert_eq!(series.len(), 6);
        assert_eq!(series[0].index, 14);
        assert_eq!(series[0].value, dec!(100));
        assert_eq!(series[0].signal, Signal::Sell);
    }

    #[test]
    fn test_rsi_all_losses() {
        let bars = ramp(15, dec!(-1));
        let series = rsi(&bars, 14);
        assert_eq!(series[0].value, Decimal::ZERO);
        assert_eq!(series[0].signal, Signal::Buy);
    }

    #[test]
    fn test_kdj_seed_and_smoothing() {
        let bars = ramp(12, dec!(1));
        let series = kdj(&bars, 9);
        assert_eq!(series.len(), 4);
        let first = series[0].value;
        assert_eq!(first.k, first.d);
        assert_eq!(first.j, first.k);
        assert!(series.iter().all(|p| p.value.j == dec!(3) * p.value.k - dec!(2) * p.value.d));
    }

    #[test]
    fn test_kdj_flat_window() {
        let bars: Vec<Bar> = (0..9)
            .map(|_| Bar::new("T", "20240101", dec!(10), dec!(10), dec!(10), dec!(10), dec!(0)))
            .collect();
        assert_eq!(kdj(&bars, 9)[0].value.k, dec!(50));
    }
}
