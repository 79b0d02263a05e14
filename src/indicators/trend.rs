//! Trend indicators: moving averages, MACD, ADX, Parabolic SAR, Ichimoku

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::{rolling, IndicatorPoint};
use crate::{
    numeric::{self, safe_divide},
    Signal, OHLCV,
};

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

const SAR_AF_STEP: Decimal = dec!(0.02);
const SAR_AF_MAX: Decimal = dec!(0.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MacdValue {
    pub dif: Decimal,
    pub dea: Decimal,
    pub histogram: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdxValue {
    pub adx: Decimal,
    pub pdi: Decimal,
    pub mdi: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IchimokuValue {
    pub tenkan_sen: Decimal,
    pub kijun_sen: Decimal,
    pub senkou_span_a: Decimal,
    pub senkou_span_b: Decimal,
    pub chikou_span: Decimal,
}

// ============================================================
// MOVING AVERAGES
// ============================================================

/// Simple moving average of closes. Carries no signal.
pub fn moving_average<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    rolling(bars, period, |_, window| {
        let closes: Vec<Decimal> = window.iter().map(|b| b.close()).collect();
        (numeric::window_mean(&closes), Signal::Hold)
    })
}

/// Exponential moving average of `values`, seeded with the SMA of the first
/// `period` values. Element `k` belongs to input index `k + period - 1`.
pub(crate) fn ema_values(values: &[Decimal], period: usize) -> Vec<Decimal> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let alpha = Decimal::TWO / Decimal::from(period + 1);
    let seed = numeric::window_mean(&values[..period]);

    std::iter::once(seed)
        .chain(values[period..].iter().scan(seed, |prev, &v| {
            *prev = alpha * v + (Decimal::ONE - alpha) * *prev;
            Some(*prev)
        }))
        .collect()
}

/// Exponential moving average of closes. Carries no signal.
pub fn ema<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    let closes: Vec<Decimal> = bars.iter().map(|b| b.close()).collect();
    ema_values(&closes, period)
        .into_iter()
        .enumerate()
        .map(|(k, value)| IndicatorPoint::new(k + period - 1, value, Signal::Hold))
        .collect()
}

// ============================================================
// MACD
// ============================================================

/// MACD 12/26/9.
///
/// `DIF = EMA12 - EMA26`, `DEA = EMA9(DIF)`, `histogram = 2 (DIF - DEA)`. The first
/// point lands on bar 33. A histogram crossing above zero is BUY, below zero SELL.
pub fn macd<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<MacdValue>> {
    let closes: Vec<Decimal> = bars.iter().map(|b| b.close()).collect();
    let fast = ema_values(&closes, MACD_FAST);
    let slow = ema_values(&closes, MACD_SLOW);
    if slow.is_empty() {
        return Vec::new();
    }

    // Both series end on the last bar; align the fast one to the slow start
    let offset = MACD_SLOW - MACD_FAST;
    let dif: Vec<Decimal> = slow
        .iter()
        .zip(&fast[offset..])
        .map(|(s, f)| *f - *s)
        .collect();
    let dea = ema_values(&dif, MACD_SIGNAL);
    if dea.is_empty() {
        return Vec::new();
    }
    let first = MACD_SLOW + MACD_SIGNAL - 2;

    dea.iter()
        .zip(&dif[MACD_SIGNAL - 1..])
        .enumerate()
        .scan(None::<Decimal>, |prev, (k, (&dea, &dif))| {
            let histogram = Decimal::TWO * (dif - dea);
            let signal = match *prev {
                Some(p) if p <= Decimal::ZERO && histogram > Decimal::ZERO => Signal::Buy,
                Some(p) if p >= Decimal::ZERO && histogram < Decimal::ZERO => Signal::Sell,
                _ => Signal::Hold,
            };
            *prev = Some(histogram);
            Some(IndicatorPoint::new(
                first + k,
                MacdValue {
                    dif,
                    dea,
                    histogram,
                },
                signal,
            ))
        })
        .collect()
}

// ============================================================
// ADX
// ============================================================

/// Directional movement over `period` transitions.
///
/// `adx` is the single-window DX, not the Wilder-smoothed average.
pub fn adx<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<AdxValue>> {
    if period == 0 {
        return Vec::new();
    }
    rolling(bars, period + 1, |_, window| {
        let (plus_dm, minus_dm, tr) = window.windows(2).fold(
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            |(plus, minus, tr), pair| {
                let (prev, curr) = (&pair[0], &pair[1]);
                let up = curr.high() - prev.high();
                let down = prev.low() - curr.low();
                let plus_dm = if up > down && up > Decimal::ZERO { up } else { Decimal::ZERO };
                let minus_dm = if down > up && down > Decimal::ZERO { down } else { Decimal::ZERO };
                (plus + plus_dm, minus + minus_dm, tr + true_range(curr, prev))
            },
        );

        // Averages share the divisor, so the ratios use the sums directly
        let pdi = safe_divide(plus_dm, tr, Decimal::ZERO) * Decimal::ONE_HUNDRED;
        let mdi = safe_divide(minus_dm, tr, Decimal::ZERO) * Decimal::ONE_HUNDRED;
        let dx = safe_divide((pdi - mdi).abs(), pdi + mdi, Decimal::ZERO) * Decimal::ONE_HUNDRED;

        let signal = if dx > dec!(25) && pdi > mdi {
            Signal::Buy
        } else if dx > dec!(25) && mdi > pdi {
            Signal::Sell
        } else {
            Signal::Hold
        };
        (AdxValue { adx: dx, pdi, mdi }, signal)
    })
}

/// `max(H - L, |H - C'|, |L - C'|)`
pub(crate) fn true_range<T: OHLCV>(curr: &T, prev: &T) -> Decimal {
    let prev_close = prev.close();
    (curr.high() - curr.low())
        .max((curr.high() - prev_close).abs())
        .max((curr.low() - prev_close).abs())
}

// ============================================================
// PARABOLIC SAR
// ============================================================

#[derive(Debug, Clone, Copy)]
struct SarState {
    rising: bool,
    sar: Decimal,
    extreme: Decimal,
    af: Decimal,
}

/// Parabolic stop-and-reverse, one point per bar from bar 1.
///
/// The trend starts up when `C[1] >= C[0]`. A flip into an uptrend is BUY, into a
/// downtrend SELL.
pub fn parabolic_sar<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<Decimal>> {
    if bars.len() < 2 {
        return Vec::new();
    }
    let rising = bars[1].close() >= bars[0].close();
    let seed = SarState {
        rising,
        sar: if rising { bars[0].low() } else { bars[0].high() },
        extreme: if rising { bars[0].high() } else { bars[0].low() },
        af: SAR_AF_STEP,
    };

    (1..bars.len())
        .scan(seed, |state, t| {
            let curr = &bars[t];
            let mut sar = state.sar + state.af * (state.extreme - state.sar);

            // Never inside the range of the two preceding bars
            let prior = &bars[t.saturating_sub(2)..t];
            let signal = if state.rising {
                sar = sar.min(numeric::lowest(prior.iter().map(|b| b.low())).unwrap_or(sar));
                if curr.low() < sar {
                    *state = SarState {
                        rising: false,
                        sar: state.extreme,
                        extreme: curr.low(),
                        af: SAR_AF_STEP,
                    };
                    Signal::Sell
                } else {
                    if curr.high() > state.extreme {
                        state.extreme = curr.high();
                        state.af = (state.af + SAR_AF_STEP).min(SAR_AF_MAX);
                    }
                    state.sar = sar;
                    Signal::Hold
                }
            } else {
                sar = sar.max(numeric::highest(prior.iter().map(|b| b.high())).unwrap_or(sar));
                if curr.high() > sar {
                    *state = SarState {
                        rising: true,
                        sar: state.extreme,
                        extreme: curr.high(),
                        af: SAR_AF_STEP,
                    };
                    Signal::Buy
                } else {
                    if curr.low() < state.extreme {
                        state.extreme = curr.low();
                        state.af = (state.af + SAR_AF_STEP).min(SAR_AF_MAX);
                    }
                    state.sar = sar;
                    Signal::Hold
                }
            };
            Some(IndicatorPoint::new(t, state.sar, signal))
        })
        .collect()
}

// ============================================================
// ICHIMOKU
// ============================================================

fn channel_mid<T: OHLCV>(window: &[T]) -> Decimal {
    let hh = numeric::highest(window.iter().map(|b| b.high())).unwrap_or_default();
    let ll = numeric::lowest(window.iter().map(|b| b.low())).unwrap_or_default();
    (hh + ll) / Decimal::TWO
}

/// Ichimoku cloud over 9/26/52 bars, values as of the current bar (no forward shift)
pub fn ichimoku<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<IchimokuValue>> {
    rolling(bars, 52, |_, window| {
        let tenkan_sen = channel_mid(&window[52 - 9..]);
        let kijun_sen = channel_mid(&window[52 - 26..]);
        let senkou_span_a = (tenkan_sen + kijun_sen) / Decimal::TWO;
        let senkou_span_b = channel_mid(window);
        let close = window[51].close();

        let cloud_top = senkou_span_a.max(senkou_span_b);
        let cloud_bottom = senkou_span_a.min(senkou_span_b);
        let signal = if tenkan_sen > kijun_sen && close > cloud_top {
            Signal::Buy
        } else if tenkan_sen < kijun_sen && close < cloud_bottom {
            Signal::Sell
        } else {
            Signal::Hold
        };

        let value = IchimokuValue {
            tenkan_sen,
            kijun_sen,
            senkou_span_a,
            senkou_span_b,
            chikou_span: close,
        };
        (value, signal)
    })
}
