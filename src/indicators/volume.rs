//! Volume-weighted indicators

use rust_decimal::Decimal;

use super::{band_signal, IndicatorPoint};
use crate::{
    numeric::{self, safe_divide},
    OHLCVExt, Signal, OHLCV,
};

/// VWAP accumulators restart every this many bars
pub const VWAP_SESSION: usize = 20;

/// Signal from the direction of an accumulated line and of the close
fn confirm_direction(line_change: Decimal, close_change: Decimal) -> Signal {
    if line_change > Decimal::ZERO && close_change > Decimal::ZERO {
        Signal::Buy
    } else if line_change < Decimal::ZERO && close_change < Decimal::ZERO {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Volume-weighted average of the typical price, one point per bar.
///
/// The accumulators reset on every bar whose index is a positive multiple of
/// [`VWAP_SESSION`]. With no volume accumulated the VWAP is the bar's typical price.
pub fn vwap<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<Decimal>> {
    bars.iter()
        .enumerate()
        .scan((Decimal::ZERO, Decimal::ZERO), |(sum_pv, sum_v), (i, bar)| {
            if i > 0 && i % VWAP_SESSION == 0 {
                *sum_pv = Decimal::ZERO;
                *sum_v = Decimal::ZERO;
            }
            let tp = bar.typical_price();
            *sum_pv += tp * bar.volume();
            *sum_v += bar.volume();

            let value = safe_divide(*sum_pv, *sum_v, tp);
            Some(IndicatorPoint::new(i, value, band_signal(bar.close(), value, value)))
        })
        .collect()
}

/// Accumulation/distribution line.
pub fn ad_line<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<Decimal>> {
    bars.iter()
        .enumerate()
        .scan(None::<(Decimal, Decimal)>, |prev, (i, bar)| {
            let mfm = safe_divide(
                (bar.close() - bar.low()) - (bar.high() - bar.close()),
                bar.range(),
                Decimal::ZERO,
            );
            let flow = mfm * bar.volume();

            let (ad, signal) = match *prev {
                None => (flow, Signal::Hold),
                Some((prev_ad, prev_close)) => {
                    let ad = prev_ad + flow;
                    (ad, confirm_direction(ad - prev_ad, bar.close() - prev_close))
                }
            };
            *prev = Some((ad, bar.close()));
            Some(IndicatorPoint::new(i, ad, signal))
        })
        .collect()
}

/// Ease of movement, smoothed by a `period`-bar SMA.
///
/// Each bar from 1 contributes the midpoint move divided by its box ratio
/// `V / (H - L)`; a bar without range or volume contributes zero.
pub fn emv<T: OHLCV>(bars: &[T], period: usize) -> Vec<IndicatorPoint<Decimal>> {
    if period == 0 || bars.len() < period + 1 {
        return Vec::new();
    }
    let raw: Vec<Decimal> = bars
        .windows(2)
        .map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let range = curr.range();
            if range.is_zero() || curr.volume().is_zero() {
                return Decimal::ZERO;
            }
            let moved = curr.midpoint() - prev.midpoint();
            safe_divide(moved * range, curr.volume(), Decimal::ZERO)
        })
        .collect();

    raw.windows(period)
        .enumerate()
        .map(|(k, window)| {
            let ma = numeric::window_mean(window);
            IndicatorPoint::new(k + period, ma, band_signal(ma, Decimal::ZERO, Decimal::ZERO))
        })
        .collect()
}

/// Volume-price trend from bar 1.
pub fn vpt<T: OHLCV>(bars: &[T]) -> Vec<IndicatorPoint<Decimal>> {
    bars.windows(2)
        .enumerate()
        .scan(Decimal::ZERO, |total, (k, pair)| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let change = curr.close() - prev.close();
            let step = curr.volume() * safe_divide(change, prev.close(), Decimal::ZERO);
            *total += step;

            let signal = if k == 0 {
                Signal::Hold
            } else {
                confirm_direction(step, change)
            };
            Some(IndicatorPoint::new(k + 1, *total, signal))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;
    use rust_decimal_macros::dec;

    fn bar(c: Decimal, vol: Decimal) -> Bar {
        Bar::new("T", "20240101", c, c + dec!(1), c - dec!(1), c, vol)
    }

    #[test]
    fn test_vwap_resets_each_session() {
        let bars: Vec<Bar> = (0..41)
            .map(|i| bar(dec!(10) + Decimal::from(i), dec!(100)))
            .collect();
        let series = vwap(&bars);
        assert_eq!(series.len(), 41);
        assert_eq!(series[0].value, dec!(10));
        // Fresh accumulators: VWAP equals the bar's own typical price
        assert_eq!(series[20].value, dec!(30));
        assert_eq!(series[40].value, dec!(50));
        assert!(series[21].value < bars[21].close);
        assert_eq!(series[21].signal, Signal::Buy);
    }

    #[test]
    fn test_vwap_without_volume() {
        let bars = vec![bar(dec!(10), Decimal::ZERO), bar(dec!(12), Decimal::ZERO)];
        let series = vwap(&bars);
        assert_eq!(series[1].value, dec!(12));
        assert_eq!(series[1].signal, Signal::Hold);
    }

    #[test]
    fn test_ad_line_accumulates() {
        let bars = vec![
            Bar::new("T", "d0", dec!(10), dec!(11), dec!(9), dec!(11), dec!(100)),
            Bar::new("T", "d1", dec!(11), dec!(12), dec!(10), dec!(12), dec!(50)),
            Bar::new("T", "d2", dec!(12), dec!(12), dec!(12), dec!(12), dec!(50)),
        ];
        let series = ad_line(&bars);
        assert_eq!(series[0].value, dec!(100));
        assert_eq!(series[0].signal, Signal::Hold);
        assert_eq!(series[1].value, dec!(150));
        assert_eq!(series[1].signal, Signal::Buy);
        // zero range contributes nothing
        assert_eq!(series[2].value, dec!(150));
        assert_eq!(series[2].signal, Signal::Hold);
    }

    #[test]
    fn test_emv_rising_midpoints() {
        let bars: Vec<Bar> = (0..16)
            .map(|i| bar(dec!(10) + Decimal::from(i), dec!(200)))
            .collect();
        let series = emv(&bars, 14);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].index, 14);
        // move 1, box ratio 200 / 2
        assert_eq!(series[0].value, dec!(0.01));
        assert_eq!(series[0].signal, Signal::Buy);
    }

    #[test]
    fn test_vpt() {
        let bars = vec![
            bar(dec!(10), dec!(100)),
            bar(dec!(11), dec!(100)),
            bar(dec!(12.1), dec!(100)),
            bar(dec!(11), dec!(100)),
        ];
        let series = vpt(&bars);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].index, 1);
        assert_eq!(series[0].value, dec!(10));
        assert_eq!(series[0].signal, Signal::Hold);
        assert_eq!(series[1].value, dec!(20));
        assert_eq!(series[1].signal, Signal::Buy);
        assert_eq!(series[2].signal, Signal::Sell);
    }
}
