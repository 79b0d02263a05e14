//! Tunable detector thresholds
//!
//! Every detector threshold is a `Ratio` or `Period` field. Detectors publish a
//! `ParamMeta` per field so an optimizer can walk a search space and rebuild the
//! detector from a `name -> value` map.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use stockta::params::{self, ParameterizedDetector};
//! use stockta::prelude::*;
//!
//! for param in DojiDetector::param_meta() {
//!   println!("{} ({:?}): default {}", param.name, param.kind, param.default);
//! }
//!
//! let doji = DojiDetector::with_params(&HashMap::from([("max_body_ratio", 0.08)])).unwrap();
//! assert_eq!(doji.max_body_ratio.get().to_string(), "0.08");
//!
//! // One detector per point of the search space
//! assert_eq!(params::grid::<DojiDetector>().unwrap().len(), 14);
//! ```

use std::collections::HashMap;

use rust_decimal::{prelude::FromPrimitive, Decimal};

use crate::{PatternDetector, PatternKind, Period, Ratio, Result, TaError};

/// Parameter values keyed by field name
pub type ParamValues = HashMap<&'static str, f64>;

/// What a threshold value stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
  /// Non-negative multiplier, fraction or percent
  Ratio,
  /// Whole number of bars
  Period,
}

/// One tunable threshold and the interval searched for it
#[derive(Debug, Clone, PartialEq)]
pub struct ParamMeta {
  /// Detector field name, e.g. `max_body_ratio`
  pub name: &'static str,
  pub kind: ParamKind,
  pub default: f64,
  pub lo: f64,
  pub hi: f64,
  pub step: f64,
  pub description: &'static str,
}

impl ParamMeta {
  /// A `Ratio` field searched over `lo..=hi` in `step` increments
  pub const fn ratio(
    name: &'static str,
    default: f64,
    search: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    let (lo, hi, step) = search;
    Self { name, kind: ParamKind::Ratio, default, lo, hi, step, description }
  }

  /// A `Period` field searched over `lo..=hi` in `step` increments
  pub const fn period(
    name: &'static str,
    default: f64,
    search: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    let (lo, hi, step) = search;
    Self { name, kind: ParamKind::Period, default, lo, hi, step, description }
  }

  /// Points of the search interval, `lo` first and never past `hi`.
  ///
  /// A non-positive step collapses the interval to `lo`.
  pub fn values(&self) -> Vec<f64> {
    if self.step <= 0.0 || self.hi < self.lo {
      return vec![self.lo];
    }
    // Points are derived from the index so rounding never accumulates
    let count = ((self.hi - self.lo) / self.step + 1e-9).floor() as usize + 1;
    (0..count).map(|i| self.lo + self.step * i as f64).collect()
  }

  /// Reject a value outside the interval or not representable as the field type
  pub fn check(&self, value: f64) -> Result<()> {
    if !(self.lo..=self.hi).contains(&value) {
      return Err(TaError::OutOfRange { field: self.name, value, min: self.lo, max: self.hi });
    }
    if self.kind == ParamKind::Period && (value < 1.0 || value.fract() != 0.0) {
      return Err(TaError::InvalidValue("Period must be a positive integer"));
    }
    Ok(())
  }
}

/// Detectors whose thresholds can be listed and overridden by name
pub trait ParameterizedDetector: Sized {
  fn param_meta() -> &'static [ParamMeta];

  /// Build the detector; names absent from `params` keep their defaults
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  fn pattern_kind() -> PatternKind;
}

/// Default value of every parameter of `D`
pub fn defaults<D: ParameterizedDetector>() -> ParamValues {
  D::param_meta().iter().map(|meta| (meta.name, meta.default)).collect()
}

/// Every combination of the parameter intervals of `D`, as parameter maps.
///
/// Combinations a detector rejects (e.g. a minimum above its maximum) are kept
/// here; `grid` drops them.
pub fn combinations<D: ParameterizedDetector>() -> Vec<ParamValues> {
  D::param_meta().iter().fold(vec![ParamValues::new()], |partial, meta| {
    partial
      .iter()
      .flat_map(|base| {
        meta.values().into_iter().map(move |value| {
          let mut next = base.clone();
          next.insert(meta.name, value);
          next
        })
      })
      .collect()
  })
}

/// One configured detector per valid point of the search space
pub fn grid<D: ParameterizedDetector + PatternDetector>() -> Result<Vec<D>> {
  let mut detectors = Vec::new();
  for values in combinations::<D>() {
    let detector = D::with_params(&values)?;
    if PatternDetector::validate_config(&detector).is_ok() {
      detectors.push(detector);
    }
  }
  Ok(detectors)
}

/// `Ratio` named `key`, or `default` when absent
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let raw = params.get(key).copied().unwrap_or(default);
  let value = Decimal::from_f64(raw).ok_or(TaError::InvalidValue("Ratio must be finite"))?;
  Ratio::new(value.normalize())
}

/// `Period` named `key`, or `default` when absent
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  match params.get(key) {
    None => Period::new(default),
    Some(&raw) if raw >= 1.0 && raw.fract() == 0.0 => Period::new(raw as usize),
    Some(_) => Err(TaError::InvalidValue("Period must be a positive integer")),
  }
}
