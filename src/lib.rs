//! # stockta - technical analysis engine for daily stock bars
//!
//! Decimal-exact indicator series and chart pattern recognition over an ordered
//! sequence of daily OHLCV bars for one security.
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use stockta::prelude::*;
//!
//! let bars: Vec<Bar> = (0..30)
//!     .map(|i| {
//!         let base = dec!(10) + rust_decimal::Decimal::from(i) / dec!(10);
//!         Bar::new("000001.SZ", format!("202401{:02}", i + 1), base, base + dec!(0.3), base - dec!(0.2), base + dec!(0.1), dec!(1000))
//!     })
//!     .collect();
//!
//! // Indicator series, aligned to the last bar of each window
//! let wr = indicators::williams_r(&bars, 14);
//! assert_eq!(wr.len(), bars.len() - 13);
//!
//! // Pattern scan with every builtin detector
//! let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
//! let patterns = engine.scan(&bars).unwrap();
//! assert!(patterns.iter().all(|p| p.confidence <= dec!(100)));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod bar;
pub mod detectors;
pub mod engine;
pub mod indicators;
pub mod numeric;
pub mod params;
pub mod pattern;

pub use bar::{validate_series, Bar, OHLCVExt, OHLCV};
pub use engine::{
    scan_parallel, BarPatterns, BuiltinDetector, ContextProvider, DefaultContextProvider,
    DefaultEngine, DynPatternDetector, EngineBuilder, EngineConfig, MarketContext,
    PatternDetector, PatternEngine, PatternIterator, PatternMetadata, ScanError, ScanResult,
    VolumeWindow,
};
pub use pattern::{
    combine_signals, summarize, CombinedSignal, PatternFamily, PatternKind, PatternMatch,
    PatternSummary, RiskLevel, Signal, Strength,
};

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Indicators
        indicators,
        indicators::{IndicatorConfig, IndicatorPoint, IndicatorSnapshot},
        // Parameters
        params::{get_period, get_ratio, ParamKind, ParamMeta, ParameterizedDetector},
        // Aggregation
        combine_signals,
        summarize,
        BarPatterns,
        CombinedSignal,
        PatternSummary,
        RiskLevel,
        // Engine
        scan_parallel,
        BuiltinDetector,
        DefaultEngine,
        EngineBuilder,
        EngineConfig,
        PatternEngine,
        ScanError,
        ScanResult,
        // Types
        Bar,
        ContextProvider,
        DefaultContextProvider,
        MarketContext,
        PatternFamily,
        PatternKind,
        PatternMatch,
        Period,
        Ratio,
        Signal,
        Strength,
        VolumeWindow,
        // Core traits
        DynPatternDetector,
        OHLCVExt,
        PatternDetector,
        OHLCV,
        // Errors
        Result,
        TaError,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, TaError>;

/// Errors raised by configuration and input validation.
///
/// Indicator and detector computations never fail: short input yields an empty
/// result and degenerate arithmetic resolves to documented fallbacks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaError {
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("parameter {field} = {value} outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("bar {index} rejected: {reason}")]
    InvalidBar { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Non-negative decimal factor: threshold multiplier, fraction of range or percent.
///
/// Deserializing a negative number fails, so detector and indicator configs read
/// from JSON can never carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Ratio(Decimal);

impl Ratio {
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(TaError::InvalidValue("ratio must not be negative"));
        }
        Ok(Self(value))
    }

    /// Unchecked constructor for library constants
    #[doc(hidden)]
    pub const fn new_const(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Ratio {
    type Error = TaError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Ratio> for Decimal {
    fn from(ratio: Ratio) -> Self {
        ratio.0
    }
}

/// Window length in bars, at least one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Period(usize);

impl Period {
    pub fn new(bars: usize) -> Result<Self> {
        match bars {
            0 => Err(TaError::InvalidValue("period must cover at least one bar")),
            n => Ok(Self(n)),
        }
    }

    #[doc(hidden)]
    pub const fn new_const(bars: usize) -> Self {
        Self(bars)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for Period {
    type Error = TaError;

    fn try_from(bars: usize) -> Result<Self> {
        Self::new(bars)
    }
}

impl From<Period> for usize {
    fn from(period: Period) -> Self {
        period.0
    }
}
