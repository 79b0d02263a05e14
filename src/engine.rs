//! Pattern scanning over one or many securities
//!
//! A [`PatternEngine`] owns a list of detectors and a [`ContextProvider`]. A scan
//! precomputes the trailing context of every bar once, then asks each detector
//! whether a formation completes on that bar. Shipped detectors are dispatched
//! through the [`BuiltinDetector`] enum; caller-supplied ones go through
//! [`DynPatternDetector`] trait objects over an erased view of the bars.

use std::ops::Range;

use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    bar::validate_series, combine_signals, detectors::*, numeric, CombinedSignal,
    PatternFamily, PatternKind, PatternMatch, Period, Result, Signal, TaError, OHLCV,
};

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Averages and extremes of the bars before the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeWindow {
    pub avg_volume: Decimal,
    pub avg_close: Decimal,
    pub highest_high: Decimal,
    pub lowest_low: Decimal,
}

impl VolumeWindow {
    /// Summarise `window`; `None` when it is empty
    pub fn over<T: OHLCV>(window: &[T]) -> Option<Self> {
        let highest_high = numeric::highest(window.iter().map(|b| b.high()))?;
        let lowest_low = numeric::lowest(window.iter().map(|b| b.low()))?;
        let (volume, close) = window
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(v, c), b| {
                (v + b.volume(), c + b.close())
            });
        let n = Decimal::from(window.len());
        Some(Self {
            avg_volume: volume / n,
            avg_close: close / n,
            highest_high,
            lowest_low,
        })
    }
}

/// What a detector knows about the bars leading up to `index`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarketContext {
    /// Number of bars before this one
    pub lookback: usize,
    /// Trailing window excluding the current bar; `None` until the window is full
    pub volume_window: Option<VolumeWindow>,
}

pub trait ContextProvider: Send + Sync {
    fn compute_at<T: OHLCV>(&self, bars: &[T], index: usize) -> MarketContext;

    /// One context per bar, in bar order
    fn compute_all<T: OHLCV>(&self, bars: &[T]) -> Vec<MarketContext> {
        (0..bars.len()).map(|index| self.compute_at(bars, index)).collect()
    }
}

/// Volume window over the `volume_period` bars before the current one
#[derive(Debug, Clone)]
pub struct DefaultContextProvider {
    pub volume_period: Period,
}

impl Default for DefaultContextProvider {
    fn default() -> Self {
        Self {
            volume_period: Period::new_const(20),
        }
    }
}

impl ContextProvider for DefaultContextProvider {
    fn compute_at<T: OHLCV>(&self, bars: &[T], index: usize) -> MarketContext {
        let volume_window = match index.checked_sub(self.volume_period.get()) {
            Some(start) if index < bars.len() => VolumeWindow::over(&bars[start..index]),
            _ => None,
        };
        MarketContext {
            lookback: index,
            volume_window,
        }
    }
}

// ============================================================
// DETECTOR TRAITS
// ============================================================

/// Static facts about a registered detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMetadata {
    pub kind: PatternKind,
    pub family: PatternFamily,
    /// Bars the formation needs, current bar included
    pub min_bars: usize,
    /// `None` for patterns that can fire either way
    pub signal: Option<Signal>,
}

/// A pattern rule evaluated on the bar at `index`
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn metadata(&self) -> PatternMetadata {
        let kind = PatternDetector::kind(self);
        PatternMetadata {
            kind,
            family: kind.family(),
            min_bars: PatternDetector::min_bars(self),
            signal: kind.typical_signal(),
        }
    }
}

/// Object-safe detector registered with [`EngineBuilder::add_custom`].
///
/// Every [`PatternDetector`] is one; implement it directly only for rules that
/// cannot be generic over the bar type.
pub trait DynPatternDetector: Send + Sync {
    fn metadata(&self) -> PatternMetadata;
    fn detect(
        &self,
        bars: &[&dyn OHLCV],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch>;
    fn validate_config(&self) -> Result<()>;
}

impl<D: PatternDetector> DynPatternDetector for D {
    fn metadata(&self) -> PatternMetadata {
        PatternDetector::metadata(self)
    }

    fn detect(
        &self,
        bars: &[&dyn OHLCV],
        index: usize,
        ctx: &MarketContext,
    ) -> Option<PatternMatch> {
        PatternDetector::detect(self, bars, index, ctx)
    }

    fn validate_config(&self) -> Result<()> {
        PatternDetector::validate_config(self)
    }
}

// ============================================================
// BUILTIN DETECTORS
// ============================================================

macro_rules! builtin_detectors {
    ($($family:ident { $($variant:ident($detector:ty)),* $(,)? })*) => {
        /// Every shipped detector, dispatched without a vtable
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($($variant($detector),)*)*
        }

        impl BuiltinDetector {
            /// Default-configured detectors of one family, in registration order
            pub fn defaults_for(family: PatternFamily) -> Vec<BuiltinDetector> {
                match family {
                    $(PatternFamily::$family => {
                        vec![$(BuiltinDetector::$variant(<$detector>::default())),*]
                    })*
                }
            }
        }

        impl PatternDetector for BuiltinDetector {
            #[inline]
            fn kind(&self) -> PatternKind {
                match self {
                    $($(Self::$variant(d) => PatternDetector::kind(d),)*)*
                }
            }

            #[inline]
            fn min_bars(&self) -> usize {
                match self {
                    $($(Self::$variant(d) => PatternDetector::min_bars(d),)*)*
                }
            }

            #[inline]
            fn detect<T: OHLCV>(
                &self,
                bars: &[T],
                index: usize,
                ctx: &MarketContext,
            ) -> Option<PatternMatch> {
                match self {
                    $($(Self::$variant(d) => PatternDetector::detect(d, bars, index, ctx),)*)*
                }
            }

            fn validate_config(&self) -> Result<()> {
                match self {
                    $($(Self::$variant(d) => PatternDetector::validate_config(d),)*)*
                }
            }
        }
    };
}

builtin_detectors! {
    Candlestick {
        Doji(DojiDetector),
        Hammer(HammerDetector),
        ShootingStar(ShootingStarDetector),
        SpinningTop(SpinningTopDetector),
        Engulfing(EngulfingDetector),
        Harami(HaramiDetector),
        DarkCloudCover(DarkCloudCoverDetector),
        DoubleCannon(DoubleCannonDetector),
        ThreeBlackCrows(ThreeBlackCrowsDetector),
        RedThreeSoldiers(RedThreeSoldiersDetector),
        MorningStar(MorningStarDetector),
        EveningStar(EveningStarDetector),
    }
    Chart {
        TriangleBreakout(TriangleBreakoutDetector),
        HeadAndShoulders(HeadAndShouldersDetector),
    }
    VolumePrice {
        LowVolumePrice(LowVolumePriceDetector),
        HighVolumePrice(HighVolumePriceDetector),
        VolumeDecreasePriceIncrease(VolumeDecreasePriceIncreaseDetector),
        VolumeIncreasePriceDecrease(VolumeIncreasePriceDecreaseDetector),
        VolumePriceRise(VolumePriceRiseDetector),
        VolumePriceDivergence(VolumePriceDivergenceDetector),
        VolumeBreakout(VolumeBreakoutDetector),
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Filters applied to every scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drop matches whose confidence is below this score
    pub min_confidence: Option<Decimal>,
    /// Reject inconsistent bars before scanning
    pub validate_data: bool,
    /// Keep only these patterns
    pub pattern_filter: Option<Vec<PatternKind>>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        match (&self.min_confidence, &self.pattern_filter) {
            (Some(min), _) if *min < numeric::CONFIDENCE_MIN || *min > numeric::CONFIDENCE_MAX => {
                Err(TaError::InvalidConfig(format!("min_confidence {min} outside [0, 100]")))
            }
            (_, Some(kinds)) if kinds.is_empty() => Err(TaError::InvalidConfig(
                "pattern_filter lists no patterns".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether a match passes the confidence floor and the pattern filter
    pub fn accepts(&self, m: &PatternMatch) -> bool {
        self.min_confidence.map_or(true, |min| m.confidence >= min)
            && self
                .pattern_filter
                .as_ref()
                .map_or(true, |kinds| kinds.contains(&m.pattern))
    }
}

/// Detectors plus the context they read, applied bar by bar
pub struct PatternEngine<C: ContextProvider = DefaultContextProvider> {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    provider: C,
    config: EngineConfig,
}

/// Engine over the 20-bar volume window
pub type DefaultEngine = PatternEngine<DefaultContextProvider>;

impl<C: ContextProvider> PatternEngine<C> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of registered detectors (builtin and custom)
    pub fn detector_count(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    /// Metadata of every registered detector, builtin first
    pub fn detectors(&self) -> Vec<PatternMetadata> {
        let builtin = self.builtin.iter().map(PatternDetector::metadata);
        let custom = self.custom.iter().map(|d| d.metadata());
        builtin.chain(custom).collect()
    }

    pub fn compute_contexts<T: OHLCV>(&self, bars: &[T]) -> Vec<MarketContext> {
        self.provider.compute_all(bars)
    }

    pub fn compute_context_at<T: OHLCV>(&self, bars: &[T], index: usize) -> MarketContext {
        self.provider.compute_at(bars, index)
    }

    /// Patterns completed on bar `index`; empty past the end of the series
    pub fn scan_at<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: &MarketContext,
    ) -> Vec<PatternMatch> {
        if index >= bars.len() {
            return Vec::new();
        }
        self.detect_on(bars, &self.erase(bars), index, ctx)
    }

    /// Patterns completed on the bars of `range`, with precomputed `contexts`.
    ///
    /// The range is cut to the bars that have both data and a context.
    pub fn scan_range<T: OHLCV>(
        &self,
        bars: &[T],
        range: Range<usize>,
        contexts: &[MarketContext],
    ) -> Vec<PatternMatch> {
        let end = range.end.min(bars.len()).min(contexts.len());
        let erased = self.erase(bars);
        (range.start..end)
            .flat_map(|index| self.detect_on(bars, &erased, index, &contexts[index]))
            .collect()
    }

    /// Every pattern in the series, ordered by completing bar
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternMatch>> {
        self.check_bars(bars)?;
        let contexts = self.compute_contexts(bars);
        let matches = self.scan_range(bars, 0..bars.len(), &contexts);
        debug!(
            ts_code = bars.first().map(|b| b.ts_code()).unwrap_or_default(),
            bars = bars.len(),
            detectors = self.detector_count(),
            matches = matches.len(),
            "pattern scan complete"
        );
        Ok(matches)
    }

    /// One entry per trading day, with that day's patterns and combined signal
    pub fn scan_grouped<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<BarPatterns>> {
        self.check_bars(bars)?;
        Ok(self.iter(bars).collect())
    }

    /// Lazily walk the series day by day. Bars are not validated.
    pub fn iter<'a, T: OHLCV>(&'a self, bars: &'a [T]) -> PatternIterator<'a, T, C> {
        PatternIterator {
            engine: self,
            bars,
            erased: self.erase(bars),
            contexts: self.compute_contexts(bars).into_iter().enumerate(),
        }
    }

    /// Erased view for custom detectors; skipped when none are registered
    fn erase<'a, T: OHLCV>(&self, bars: &'a [T]) -> Vec<&'a dyn OHLCV> {
        if self.custom.is_empty() {
            return Vec::new();
        }
        bars.iter().map(|bar| bar as &dyn OHLCV).collect()
    }

    fn detect_on<T: OHLCV>(
        &self,
        bars: &[T],
        erased: &[&dyn OHLCV],
        index: usize,
        ctx: &MarketContext,
    ) -> Vec<PatternMatch> {
        let available = index + 1;
        let builtin = self
            .builtin
            .iter()
            .filter(|d| PatternDetector::min_bars(*d) <= available)
            .filter_map(|d| PatternDetector::detect(d, bars, index, ctx));
        let custom = self
            .custom
            .iter()
            .filter(|d| !erased.is_empty() && d.metadata().min_bars <= available)
            .filter_map(|d| d.detect(erased, index, ctx));

        builtin
            .chain(custom)
            .filter(|m| self.config.accepts(m))
            .inspect(|m| {
                trace!(
                    index,
                    trade_date = %m.trade_date,
                    pattern = %m.pattern,
                    signal = %m.signal,
                    confidence = %m.confidence,
                    "pattern detected"
                )
            })
            .collect()
    }

    fn check_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        if self.config.validate_data {
            validate_series(bars)?;
        }
        Ok(())
    }
}

// ============================================================
// DAY-BY-DAY ITERATION
// ============================================================

/// Patterns completed on one trading day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarPatterns {
    #[serde(skip)]
    pub index: usize,
    pub trade_date: String,
    pub patterns: Vec<PatternMatch>,
    pub combined: CombinedSignal,
}

impl BarPatterns {
    fn new<T: OHLCV>(bar: &T, index: usize, patterns: Vec<PatternMatch>) -> Self {
        Self {
            index,
            trade_date: bar.trade_date().to_string(),
            combined: combine_signals(&patterns),
            patterns,
        }
    }
}

/// Iterator returned by [`PatternEngine::iter`]
pub struct PatternIterator<'a, T: OHLCV, C: ContextProvider> {
    engine: &'a PatternEngine<C>,
    bars: &'a [T],
    erased: Vec<&'a dyn OHLCV>,
    contexts: std::iter::Enumerate<std::vec::IntoIter<MarketContext>>,
}

impl<T: OHLCV, C: ContextProvider> Iterator for PatternIterator<'_, T, C> {
    type Item = BarPatterns;

    fn next(&mut self) -> Option<BarPatterns> {
        let (index, ctx) = self.contexts.next()?;
        let bar = self.bars.get(index)?;
        let patterns = self.engine.detect_on(self.bars, &self.erased, index, &ctx);
        Some(BarPatterns::new(bar, index, patterns))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.contexts.size_hint()
    }
}

impl<T: OHLCV, C: ContextProvider> ExactSizeIterator for PatternIterator<'_, T, C> {}

// ============================================================
// BUILDER
// ============================================================

/// Assembles a [`PatternEngine`]; `build` validates every detector and the config
pub struct EngineBuilder<C: ContextProvider = DefaultContextProvider> {
    engine: PatternEngine<C>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::with_context(DefaultContextProvider::default())
    }
}

impl<C: ContextProvider> EngineBuilder<C> {
    /// Start from a custom context provider
    pub fn with_context(provider: C) -> Self {
        Self {
            engine: PatternEngine {
                builtin: Vec::new(),
                custom: Vec::new(),
                provider,
                config: EngineConfig::default(),
            },
        }
    }

    /// Register every builtin detector of `family` with default thresholds
    pub fn with_family(mut self, family: PatternFamily) -> Self {
        self.engine
            .builtin
            .extend(BuiltinDetector::defaults_for(family));
        self
    }

    /// Register all 21 builtin detectors with default thresholds
    pub fn with_all_defaults(self) -> Self {
        PatternFamily::ALL.into_iter().fold(self, Self::with_family)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.engine.builtin.push(detector);
        self
    }

    pub fn add_custom<D: DynPatternDetector + 'static>(mut self, detector: D) -> Self {
        self.engine.custom.push(Box::new(detector));
        self
    }

    /// Replace the whole engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.engine.config = config;
        self
    }

    pub fn min_confidence(mut self, confidence: Decimal) -> Self {
        self.engine.config.min_confidence = Some(confidence);
        self
    }

    pub fn validate_data(mut self, enable: bool) -> Self {
        self.engine.config.validate_data = enable;
        self
    }

    /// Keep only matches of these patterns
    pub fn only_patterns(mut self, kinds: impl IntoIterator<Item = PatternKind>) -> Self {
        self.engine.config.pattern_filter = Some(kinds.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<PatternEngine<C>> {
        let engine = self.engine;
        engine.config.validate()?;
        engine
            .builtin
            .iter()
            .try_for_each(PatternDetector::validate_config)?;
        engine
            .custom
            .iter()
            .try_for_each(|d| d.validate_config())?;
        debug!(
            builtin = engine.builtin.len(),
            custom = engine.custom.len(),
            "pattern engine built"
        );
        Ok(engine)
    }
}

// ============================================================
// MANY SECURITIES
// ============================================================

/// Matches for one security
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub ts_code: String,
    pub patterns: Vec<PatternMatch>,
}

/// A security whose bars failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ScanError {
    pub ts_code: String,
    pub error: TaError,
}

/// Scan each series on the rayon pool.
///
/// A series is labelled by the `ts_code` of its first bar (empty for an empty
/// series). Results keep no particular order.
pub fn scan_parallel<T, C>(
    engine: &PatternEngine<C>,
    securities: &[&[T]],
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync,
    C: ContextProvider,
{
    let (results, errors): (Vec<ScanResult>, Vec<ScanError>) =
        securities.par_iter().partition_map(|bars| {
            let ts_code = bars.first().map(|b| b.ts_code().to_string()).unwrap_or_default();
            match engine.scan(*bars) {
                Ok(patterns) => rayon::iter::Either::Left(ScanResult { ts_code, patterns }),
                Err(error) => rayon::iter::Either::Right(ScanError { ts_code, error }),
            }
        });
    debug!(
        securities = securities.len(),
        failed = errors.len(),
        "parallel scan complete"
    );
    (results, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, OHLCVExt};
    use rust_decimal_macros::dec;

    fn bar(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar::new("000001.SZ", "20240101", o, h, l, c, dec!(1000))
    }

    fn trend(ts_code: &str, step: Decimal) -> Vec<Bar> {
        (0..20)
            .map(|i| {
                let base = dec!(100) + Decimal::from(i) * step;
                Bar::new(
                    ts_code,
                    format!("2024{:04}", i + 101),
                    base,
                    base + dec!(1),
                    base - dec!(1),
                    base + step / dec!(4),
                    dec!(1000),
                )
            })
            .collect()
    }

    fn doji_engine() -> DefaultEngine {
        EngineBuilder::new()
            .add(BuiltinDetector::Doji(DojiDetector::with_defaults()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_volume_window_excludes_current_bar() {
        let mut bars = trend("600000.SH", dec!(2));
        bars.push(bar(dec!(1), dec!(500), dec!(1), dec!(1)));
        let ctx = DefaultContextProvider::default().compute_at(&bars, 20);
        let window = ctx.volume_window.unwrap();
        assert_eq!(window.avg_volume, dec!(1000));
        assert_eq!(window.highest_high, dec!(139));
        assert_eq!(ctx.lookback, 20);

        let early = DefaultContextProvider::default().compute_at(&bars, 19);
        assert!(early.volume_window.is_none());
        assert!(VolumeWindow::over::<Bar>(&[]).is_none());
    }

    #[test]
    fn test_builder_registers_families() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        assert_eq!(engine.detector_count(), 21);

        let chart = EngineBuilder::new()
            .with_family(PatternFamily::Chart)
            .build()
            .unwrap();
        let kinds: Vec<PatternKind> = chart.detectors().iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![PatternKind::TriangleBreakout, PatternKind::HeadAndShoulders]
        );
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let engine = EngineBuilder::new().min_confidence(dec!(120)).build();
        assert!(matches!(engine, Err(TaError::InvalidConfig(_))));

        let engine = EngineBuilder::new().only_patterns([]).build();
        assert!(matches!(engine, Err(TaError::InvalidConfig(_))));

        let engine = EngineBuilder::new()
            .add(BuiltinDetector::ShootingStar(ShootingStarDetector {
                signal: Signal::Hold,
                ..Default::default()
            }))
            .build();
        assert!(matches!(engine, Err(TaError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_filters() {
        let bars = vec![bar(dec!(10), dec!(10.5), dec!(9.5), dec!(10.02))];
        let strict = EngineBuilder::new()
            .add(BuiltinDetector::Doji(DojiDetector::with_defaults()))
            .min_confidence(dec!(99))
            .build()
            .unwrap();
        assert!(strict.scan(&bars).unwrap().is_empty());

        let hammers_only = EngineBuilder::new()
            .with_family(PatternFamily::Candlestick)
            .only_patterns([PatternKind::Hammer])
            .build()
            .unwrap();
        assert!(hammers_only.scan(&bars).unwrap().is_empty());
        assert_eq!(doji_engine().scan(&bars).unwrap().len(), 1);
    }

    #[test]
    fn test_validate_data_reports_bar_index() {
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .validate_data(true)
            .build()
            .unwrap();

        let mut bars = trend("600000.SH", dec!(2));
        bars[4].high = dec!(1);
        let err = engine.scan(&bars).unwrap_err();
        assert!(matches!(err, TaError::InvalidBar { index: 4, .. }));
        assert!(engine.scan_grouped(&bars).is_err());
        // Lazy iteration does not validate
        assert_eq!(engine.iter(&bars).len(), bars.len());
    }

    #[test]
    fn test_scan_range_and_scan_at() {
        let engine = doji_engine();
        let bars: Vec<Bar> = (0..10)
            .map(|_| bar(dec!(10), dec!(11), dec!(9), dec!(10.05)))
            .collect();
        let contexts = engine.compute_contexts(&bars);
        assert_eq!(contexts.len(), bars.len());

        assert_eq!(engine.scan_range(&bars, 2..8, &contexts).len(), 6);
        // Cut to the series
        assert_eq!(engine.scan_range(&bars, 8..50, &contexts).len(), 2);
        assert_eq!(engine.scan_at(&bars, 3, &contexts[3]).len(), 1);
        assert!(engine.scan_at(&bars, 10, &MarketContext::default()).is_empty());
    }

    #[test]
    fn test_grouped_scan_carries_trade_date_and_combined_signal() {
        let engine = doji_engine();
        let bars = trend("000001.SZ", dec!(0));
        let grouped = engine.scan_grouped(&bars).unwrap();
        assert_eq!(grouped.len(), bars.len());
        assert_eq!(grouped[3].index, 3);
        assert_eq!(grouped[3].trade_date, bars[3].trade_date);
        assert!(grouped.iter().all(|day| day.patterns.len() == 1));
        assert_eq!(grouped[0].combined.signal, Signal::Hold);
        assert_eq!(grouped[0].combined.confidence, dec!(90));
    }

    #[test]
    fn test_iterator_is_exact_size() {
        let engine = doji_engine();
        let bars = trend("600000.SH", dec!(2));
        let mut iter = engine.iter(&bars);
        assert_eq!(iter.len(), bars.len());
        iter.next();
        assert_eq!(iter.len(), bars.len() - 1);
        assert_eq!(iter.count(), bars.len() - 1);
    }

    #[test]
    fn test_custom_detector_through_erased_bars() {
        let engine = EngineBuilder::new()
            .add_custom(DojiDetector::with_defaults())
            .build()
            .unwrap();
        assert_eq!(engine.detector_count(), 1);
        assert_eq!(engine.detectors()[0].kind, PatternKind::Doji);

        let bars: Vec<Bar> = (0..4)
            .map(|_| bar(dec!(10), dec!(11), dec!(9), dec!(10.05)))
            .collect();
        let patterns = engine.scan(&bars).unwrap();
        assert_eq!(patterns.len(), 4);
        assert!(patterns.iter().all(|m| m.pattern == PatternKind::Doji));
    }

    /// Flags a close above the previous high; written against erased bars only
    struct GapUp;

    impl DynPatternDetector for GapUp {
        fn metadata(&self) -> PatternMetadata {
            PatternMetadata {
                kind: PatternKind::VolumePriceRise,
                family: PatternFamily::VolumePrice,
                min_bars: 2,
                signal: Some(Signal::Buy),
            }
        }

        fn detect(
            &self,
            bars: &[&dyn OHLCV],
            index: usize,
            _ctx: &MarketContext,
        ) -> Option<PatternMatch> {
            let (prev, curr) = (bars.get(index.checked_sub(1)?)?, bars.get(index)?);
            (curr.close() > prev.high()).then(|| {
                PatternMatch::new(PatternKind::VolumePriceRise, Signal::Buy, curr, index, dec!(70))
                    .starting_at(index - 1)
            })
        }

        fn validate_config(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_hand_written_dyn_detector() {
        let bars = vec![
            bar(dec!(10), dec!(10.5), dec!(9.5), dec!(10)),
            bar(dec!(10.4), dec!(11), dec!(10.3), dec!(10.9)),
        ];
        let engine = EngineBuilder::new().add_custom(GapUp).build().unwrap();
        let patterns = engine.scan(&bars).unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].start_index, 0);
        assert_eq!(patterns[0].price_change, bars[1].change());
    }

    #[test]
    fn test_detector_metadata() {
        let meta = PatternDetector::metadata(&EngulfingDetector);
        assert_eq!(meta.kind, PatternKind::Engulfing);
        assert_eq!(meta.min_bars, 2);
        assert_eq!(meta.signal, None);

        let meta = PatternDetector::metadata(&HeadAndShouldersDetector::default());
        assert_eq!(meta.family, PatternFamily::Chart);
        assert_eq!(meta.signal, Some(Signal::Sell));
    }

    /// Five-bar volume window instead of twenty
    struct ShortWindow;

    impl ContextProvider for ShortWindow {
        fn compute_at<T: OHLCV>(&self, bars: &[T], index: usize) -> MarketContext {
            DefaultContextProvider {
                volume_period: Period::new_const(5),
            }
            .compute_at(bars, index)
        }
    }

    #[test]
    fn test_custom_context_provider() {
        let mut bars: Vec<Bar> = (0..5)
            .map(|_| bar(dec!(10), dec!(10.2), dec!(9.8), dec!(10)))
            .collect();
        bars.push(
            Bar::new(
                "000001.SZ",
                "20240108",
                dec!(9.2),
                dec!(9.3),
                dec!(8.9),
                dec!(9),
                dec!(400),
            ),
        );

        let short = EngineBuilder::with_context(ShortWindow)
            .with_family(PatternFamily::VolumePrice)
            .only_patterns([PatternKind::LowVolumePrice])
            .build()
            .unwrap();
        assert_eq!(short.compute_context_at(&bars, 5).lookback, 5);
        assert_eq!(short.scan(&bars).unwrap().len(), 1);

        let default = EngineBuilder::new()
            .with_family(PatternFamily::VolumePrice)
            .only_patterns([PatternKind::LowVolumePrice])
            .build()
            .unwrap();
        assert!(default.scan(&bars).unwrap().is_empty());
    }

    #[test]
    fn test_parallel_scan_labels_by_first_bar() {
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .validate_data(true)
            .build()
            .unwrap();
        let up = trend("600000.SH", dec!(2));
        let down = trend("000001.SZ", dec!(-2));
        let mut broken = trend("000002.SZ", dec!(1));
        broken[2].low = dec!(500);

        let (results, errors) = scan_parallel(&engine, &[up.as_slice(), down.as_slice(), broken.as_slice()]);
        let mut codes: Vec<&str> = results.iter().map(|r| r.ts_code.as_str()).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec!["000001.SZ", "600000.SH"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].ts_code, "000002.SZ");
        assert!(matches!(errors[0].error, TaError::InvalidBar { index: 2, .. }));
    }
}
