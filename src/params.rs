//! Parameter metadata for pattern thresholds
//!
//! Lists every tunable of [`PatternConfig`] with its kind, default and a
//! search range, so callers can:
//! - grid-search thresholds against labelled data
//! - build a config from a flat name→value map (CLI flags, JSON forms)
//! - render a settings UI
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use candlescan::params::Parameterized;
//! use candlescan::PatternConfig;
//!
//! let mut params = HashMap::new();
//! params.insert("trend_period", 14.0);
//! let config = PatternConfig::with_params(&params).unwrap();
//! assert_eq!(config.trend_period, 14);
//!
//! for meta in PatternConfig::param_meta() {
//!     println!("{}: {:?} (default: {})", meta.name, meta.param_type, meta.default);
//! }
//! ```

use std::collections::HashMap;

use crate::{PatternConfig, PatternError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Kind of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fraction in (0, 1]
  Ratio,
  /// Positive, finite factor
  Multiple,
  /// Positive bar count
  Period,
}

/// Metadata for a single parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Search range: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn multiple(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Multiple, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Every value of the search range, endpoints included.
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    if step <= 0.0 || max < min {
      return vec![min];
    }
    let steps = ((max - min) / step + 1e-9).floor() as usize;
    (0..=steps).map(|i| min + step * i as f64).collect()
  }

  /// Check a value against the search range and the parameter kind.
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if !value.is_finite() {
      return Err(PatternError::InvalidValue("parameter must be finite"));
    }
    if value < min - 1e-12 || value > max + 1e-12 {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Multiple => {
        if value <= 0.0 {
          return Err(PatternError::InvalidValue("Multiple must be > 0"));
        }
        Ok(())
      },
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED TRAIT
// ============================================================

/// Types buildable from a flat name→value map
pub trait Parameterized: Sized {
  fn param_meta() -> &'static [ParamMeta];

  /// Missing keys take their defaults; unknown keys are rejected.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;
}

static PATTERN_CONFIG_PARAMS: [ParamMeta; 16] = [
  ParamMeta::ratio("doji_body_ratio", 0.1, (0.05, 0.2, 0.05), "Body share of range below which a bar is a doji"),
  ParamMeta::ratio("small_body_ratio", 0.3, (0.2, 0.4, 0.05), "Body share of range below which a body is small"),
  ParamMeta::ratio("large_body_ratio", 0.5, (0.4, 0.7, 0.1), "Body share of range from which a body is big"),
  ParamMeta::period("trend_period", 10.0, (5.0, 20.0, 5.0), "Bars used for trend and extreme-zone analysis"),
  ParamMeta::multiple("long_shadow_body_multiple", 2.0, (1.5, 3.0, 0.5), "Long shadow vs body"),
  ParamMeta::ratio("long_shadow_range_ratio", 0.5, (0.4, 0.7, 0.1), "Long shadow share of range"),
  ParamMeta::ratio("short_shadow_range_ratio", 0.1, (0.05, 0.2, 0.05), "Short shadow share of range"),
  ParamMeta::ratio("extreme_zone_tolerance", 0.03, (0.01, 0.05, 0.01), "Distance from the trailing high/low still in the zone"),
  ParamMeta::ratio("trend_slope_threshold", 0.002, (0.001, 0.005, 0.001), "Relative per-bar slope separating trend from sideways"),
  ParamMeta::ratio("consolidation_threshold", 0.09, (0.05, 0.15, 0.02), "Mid-price compression counting as consolidation"),
  ParamMeta::multiple("volume_expansion_ratio", 1.1, (1.0, 2.0, 0.1), "Current over trailing volume counting as expansion"),
  ParamMeta::ratio("breakout_margin", 0.005, (0.0025, 0.02, 0.0025), "Neckline clearance for double and head-and-shoulders patterns"),
  ParamMeta::ratio("wedge_breakout_margin", 0.015, (0.005, 0.03, 0.005), "Boundary clearance for wedges"),
  ParamMeta::ratio("double_tolerance", 0.025, (0.01, 0.05, 0.005), "Max relative gap between the two extremes of a double top/bottom"),
  ParamMeta::ratio("shoulder_tolerance", 0.05, (0.02, 0.1, 0.02), "Max relative gap between two shoulders"),
  ParamMeta::period("extrema_radius", 2.0, (1.0, 5.0, 1.0), "Look-around radius for local extrema"),
];

impl Parameterized for PatternConfig {
  fn param_meta() -> &'static [ParamMeta] {
    &PATTERN_CONFIG_PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    if let Some(unknown) = params.keys().find(|k| !PATTERN_CONFIG_PARAMS.iter().any(|m| m.name == **k)) {
      return Err(PatternError::InvalidConfig(format!("unknown parameter {unknown}")));
    }

    let d = PatternConfig::default();
    PatternConfig {
      doji_body_ratio: get_ratio(params, "doji_body_ratio", d.doji_body_ratio)?.get(),
      small_body_ratio: get_ratio(params, "small_body_ratio", d.small_body_ratio)?.get(),
      large_body_ratio: get_ratio(params, "large_body_ratio", d.large_body_ratio)?.get(),
      trend_period: get_period(params, "trend_period", d.trend_period)?.get(),
      long_shadow_body_multiple: get_multiple(params, "long_shadow_body_multiple", d.long_shadow_body_multiple)?,
      long_shadow_range_ratio: get_ratio(params, "long_shadow_range_ratio", d.long_shadow_range_ratio)?.get(),
      short_shadow_range_ratio: get_ratio(params, "short_shadow_range_ratio", d.short_shadow_range_ratio)?.get(),
      extreme_zone_tolerance: get_ratio(params, "extreme_zone_tolerance", d.extreme_zone_tolerance)?.get(),
      trend_slope_threshold: get_ratio(params, "trend_slope_threshold", d.trend_slope_threshold)?.get(),
      consolidation_threshold: get_ratio(params, "consolidation_threshold", d.consolidation_threshold)?.get(),
      volume_expansion_ratio: get_multiple(params, "volume_expansion_ratio", d.volume_expansion_ratio)?,
      breakout_margin: get_ratio(params, "breakout_margin", d.breakout_margin)?.get(),
      wedge_breakout_margin: get_ratio(params, "wedge_breakout_margin", d.wedge_breakout_margin)?.get(),
      double_tolerance: get_ratio(params, "double_tolerance", d.double_tolerance)?.get(),
      shoulder_tolerance: get_ratio(params, "shoulder_tolerance", d.shoulder_tolerance)?.get(),
      extrema_radius: get_period(params, "extrema_radius", d.extrema_radius)?.get(),
    }
    .validated()
  }
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  match params.get(key).copied() {
    None => Period::new(default),
    Some(value) if value >= 1.0 && value.fract() == 0.0 => Period::new(value as usize),
    Some(_) => Err(PatternError::InvalidValue("Period must be a positive integer")),
  }
}

/// Positive finite factor from params with default fallback
pub fn get_multiple(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() || value <= 0.0 {
    return Err(PatternError::InvalidValue("Multiple must be positive and finite"));
  }
  Ok(value)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_meta_kinds() {
    let ratio = ParamMeta::ratio("r", 0.5, (0.3, 0.7, 0.1), "r");
    let multiple = ParamMeta::multiple("m", 2.0, (1.0, 3.0, 0.5), "m");
    let period = ParamMeta::period("p", 14.0, (10.0, 20.0, 2.0), "p");

    assert_eq!(ratio.param_type, ParamType::Ratio);
    assert_eq!(multiple.param_type, ParamType::Multiple);
    assert_eq!(period.param_type, ParamType::Period);
    assert_eq!(period.default, 14.0);
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.2), "Test");

    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 0.3).abs() < 1e-12);
    assert!((grid[1] - 0.5).abs() < 1e-12);
    assert!((grid[2] - 0.7).abs() < 1e-12);

    let fine = ParamMeta::ratio("fine", 0.03, (0.01, 0.05, 0.01), "");
    assert_eq!(fine.generate_grid().len(), 5);
  }

  #[test]
  fn test_validate() {
    let ratio = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.1), "Test");
    assert!(ratio.validate(0.3).is_ok());
    assert!(ratio.validate(0.7).is_ok());
    assert!(ratio.validate(0.8).is_err());
    assert!(ratio.validate(f64::NAN).is_err());

    let period = ParamMeta::period("test", 14.0, (10.0, 20.0, 2.0), "Test");
    assert!(period.validate(14.0).is_ok());
    assert!(period.validate(14.5).is_err());
    assert!(period.validate(22.0).is_err());
  }

  #[test]
  fn test_defaults_describe_default_config() {
    let config = PatternConfig::with_params(&HashMap::new()).unwrap();
    assert_eq!(config, PatternConfig::default());

    let defaults = PatternConfig::param_meta();
    assert_eq!(defaults.len(), 16);
    for meta in defaults {
      assert!(meta.validate(meta.default).is_ok(), "{} default outside its range", meta.name);
    }
  }

  #[test]
  fn test_with_params() {
    let mut params = HashMap::new();
    params.insert("doji_body_ratio", 0.05);
    params.insert("extrema_radius", 3.0);

    let config = PatternConfig::with_params(&params).unwrap();
    assert_eq!(config.doji_body_ratio, 0.05);
    assert_eq!(config.extrema_radius, 3);
    assert_eq!(config.trend_period, 10);
  }

  #[test]
  fn test_with_params_rejections() {
    let reject = |key: &'static str, value: f64| {
      let params = HashMap::from([(key, value)]);
      PatternConfig::with_params(&params).is_err()
    };

    assert!(reject("no_such_threshold", 1.0));
    assert!(reject("doji_body_ratio", 1.5));
    assert!(reject("trend_period", 2.5));
    assert!(reject("trend_period", 2.0));
    assert!(reject("volume_expansion_ratio", -1.0));
    assert!(reject("small_body_ratio", 0.9));
  }

  #[test]
  fn test_helpers_fall_back_to_defaults() {
    let params = HashMap::from([("key1", 0.8), ("len", 20.0)]);

    assert!((get_ratio(&params, "key1", 0.5).unwrap().get() - 0.8).abs() < f64::EPSILON);
    assert!((get_ratio(&params, "key2", 0.5).unwrap().get() - 0.5).abs() < f64::EPSILON);
    assert_eq!(get_period(&params, "len", 14).unwrap().get(), 20);
    assert_eq!(get_period(&params, "other", 14).unwrap().get(), 14);
    assert_eq!(get_multiple(&params, "other", 2.0).unwrap(), 2.0);
  }
}
