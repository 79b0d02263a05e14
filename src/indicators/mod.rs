//! Indicator calculators
//!
//! Every calculator is a free function over `&[T: OHLCV]` returning one aligned
//! series. A calculator with window `W` emits `max(0, N - W + 1)` points; point
//! `k` sits at bar index `k + W - 1`, the last bar of its window. Short input
//! yields an empty series, never an error.
//!
//! | Module | Indicators |
//! |---|---|
//! | [`momentum`] | Williams %R, momentum, rate of change, RSI, KDJ |
//! | [`trend`] | moving average, EMA, MACD, ADX, Parabolic SAR, Ichimoku |
//! | [`volatility`] | ATR, standard deviation, historical volatility, Bollinger bands |
//! | [`volume`] | VWAP, accumulation/distribution line, EMV, VPT |

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Period, Ratio, Result, Signal, TaError, OHLCV};

pub mod momentum;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use momentum::*;
pub use trend::*;
pub use volatility::*;
pub use volume::*;

// ============================================================
// INDICATOR POINT
// ============================================================

/// One output point, aligned to the last bar of its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndicatorPoint<V> {
    pub index: usize,
    pub value: V,
    pub signal: Signal,
}

impl<V> IndicatorPoint<V> {
    #[inline]
    pub fn new(index: usize, value: V, signal: Signal) -> Self {
        Self {
            index,
            value,
            signal,
        }
    }
}

/// Run `f` over every full window of `width` bars.
///
/// `f` receives the absolute index of the window's last bar and the window itself.
pub(crate) fn rolling<T, V, F>(bars: &[T], width: usize, mut f: F) -> Vec<IndicatorPoint<V>>
where
    T: OHLCV,
    F: FnMut(usize, &[T]) -> (V, Signal),
{
    if width == 0 || bars.len() < width {
        return Vec::new();
    }
    bars.windows(width)
        .enumerate()
        .map(|(i, window)| {
            let index = i + width - 1;
            let (value, signal) = f(index, window);
            IndicatorPoint::new(index, value, signal)
        })
        .collect()
}

/// BUY above `upper`, SELL below `lower`, HOLD otherwise
#[inline]
pub(crate) fn band_signal(value: Decimal, lower: Decimal, upper: Decimal) -> Signal {
    if value > upper {
        Signal::Buy
    } else if value < lower {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Periods and multipliers for [`snapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub williams_r_period: Period,
    pub adx_period: Period,
    pub atr_period: Period,
    pub std_dev_period: Period,
    pub emv_period: Period,
    pub rsi_period: Period,
    pub bollinger_period: Period,
    pub bollinger_multiplier: Ratio,
    pub kdj_period: Period,
    pub ma_periods: Vec<Period>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            williams_r_period: Period::new_const(14),
            adx_period: Period::new_const(14),
            atr_period: Period::new_const(14),
            std_dev_period: Period::new_const(20),
            emv_period: Period::new_const(14),
            rsi_period: Period::new_const(14),
            bollinger_period: Period::new_const(20),
            bollinger_multiplier: Ratio::new_const(dec!(2)),
            kdj_period: Period::new_const(9),
            ma_periods: [5, 10, 20, 60, 120]
                .into_iter()
                .map(Period::new_const)
                .collect(),
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bollinger_multiplier.get().is_zero() {
            return Err(TaError::InvalidConfig(
                "bollinger_multiplier must be positive".to_string(),
            ));
        }
        if self.ma_periods.is_empty() {
            return Err(TaError::InvalidConfig(
                "ma_periods must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// SNAPSHOT
// ============================================================

/// Latest point of every indicator for one series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub ts_code: String,
    pub trade_date: String,
    /// Latest moving average keyed by period
    pub moving_averages: BTreeMap<usize, Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<IndicatorPoint<MacdValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<IndicatorPoint<BollingerValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdj: Option<IndicatorPoint<KdjValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub williams_r: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentum: Option<IndicatorPoint<MomentumValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roc: Option<IndicatorPoint<RocValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adx: Option<IndicatorPoint<AdxValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sar: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ichimoku: Option<IndicatorPoint<IchimokuValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_volatility: Option<IndicatorPoint<HistoricalVolatilityValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vwap: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_line: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emv: Option<IndicatorPoint<Decimal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpt: Option<IndicatorPoint<Decimal>>,
}

/// Compute every indicator and keep its latest point.
///
/// Indicators whose window exceeds the series are left as `None`; a moving average
/// is omitted from the map under the same condition.
pub fn snapshot<T: OHLCV>(bars: &[T], config: &IndicatorConfig) -> IndicatorSnapshot {
    let Some(last) = bars.last() else {
        return IndicatorSnapshot::default();
    };

    let moving_averages = config
        .ma_periods
        .iter()
        .filter_map(|p| {
            moving_average(bars, p.get())
                .pop()
                .map(|point| (p.get(), point.value))
        })
        .collect();

    let snap = IndicatorSnapshot {
        ts_code: last.ts_code().to_string(),
        trade_date: last.trade_date().to_string(),
        moving_averages,
        macd: macd(bars).pop(),
        rsi: rsi(bars, config.rsi_period.get()).pop(),
        bollinger: bollinger_bands(
            bars,
            config.bollinger_period.get(),
            config.bollinger_multiplier.get(),
        )
        .pop(),
        kdj: kdj(bars, config.kdj_period.get()).pop(),
        williams_r: williams_r(bars, config.williams_r_period.get()).pop(),
        momentum: momentum(bars).pop(),
        roc: rate_of_change(bars).pop(),
        adx: adx(bars, config.adx_period.get()).pop(),
        sar: parabolic_sar(bars).pop(),
        ichimoku: ichimoku(bars).pop(),
        atr: atr(bars, config.atr_period.get()).pop(),
        std_dev: std_dev(bars, config.std_dev_period.get()).pop(),
        historical_volatility: historical_volatility(bars).pop(),
        vwap: vwap(bars).pop(),
        ad_line: ad_line(bars).pop(),
        emv: emv(bars, config.emv_period.get()).pop(),
        vpt: vpt(bars).pop(),
    };

    debug!(
        ts_code = %snap.ts_code,
        trade_date = %snap.trade_date,
        bars = bars.len(),
        moving_averages = snap.moving_averages.len(),
        "indicator snapshot computed"
    );
    snap
}
