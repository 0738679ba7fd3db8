//! Threshold configuration shared by every pattern check
//!
//! [`PatternConfig`] collects the tunable ratios used by the bar-shape predicates,
//! the trend/extreme-zone analysis and the breakout confirmations of the macro
//! patterns. Defaults reproduce the stock dashboard behaviour; anything out of
//! range is rejected by [`PatternConfig::validate`] before a scan starts.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{OHLCVExt, PatternError, Result};

// ============================================================
// PATTERN CONFIG
// ============================================================

/// Thresholds consulted by pattern checks and confidence scorers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Body below this share of the range is a doji
    pub doji_body_ratio: f64,
    /// Body below this share of the range is small
    pub small_body_ratio: f64,
    /// Body at or above this share of the range is big
    pub large_body_ratio: f64,
    /// Window length for trend and extreme-zone analysis
    pub trend_period: usize,
    /// Long shadow must be at least this multiple of the body
    pub long_shadow_body_multiple: f64,
    /// Long shadow must also cover at least this share of the range
    pub long_shadow_range_ratio: f64,
    /// Short shadow covers at most this share of the range
    pub short_shadow_range_ratio: f64,
    /// Relative distance from the trailing high/low that still counts as the extreme zone
    pub extreme_zone_tolerance: f64,
    /// Per-bar regression slope (relative to mean price) separating trend from sideways
    pub trend_slope_threshold: f64,
    /// Mid-price compression below which a flag counts as consolidating
    pub consolidation_threshold: f64,
    /// Current volume over its 5-bar mean must exceed this to count as expansion
    pub volume_expansion_ratio: f64,
    /// Close must clear the neckline/intervening extreme by this fraction
    pub breakout_margin: f64,
    /// Close must clear the projected wedge boundary by this fraction
    pub wedge_breakout_margin: f64,
    /// Max relative difference between the two extremes of a double top/bottom
    pub double_tolerance: f64,
    /// Max relative difference between the shoulders of a head-and-shoulders
    pub shoulder_tolerance: f64,
    /// Look-around radius for local extrema
    pub extrema_radius: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            doji_body_ratio: 0.1,
            small_body_ratio: 0.3,
            large_body_ratio: 0.5,
            trend_period: 10,
            long_shadow_body_multiple: 2.0,
            long_shadow_range_ratio: 0.5,
            short_shadow_range_ratio: 0.1,
            extreme_zone_tolerance: 0.03,
            trend_slope_threshold: 0.002,
            consolidation_threshold: 0.09,
            volume_expansion_ratio: 1.1,
            breakout_margin: 0.005,
            wedge_breakout_margin: 0.015,
            double_tolerance: 0.025,
            shoulder_tolerance: 0.05,
            extrema_radius: 2,
        }
    }
}

impl PatternConfig {
    /// Check every field, reporting the first violation.
    pub fn validate(&self) -> Result<()> {
        check_ratio("doji_body_ratio", self.doji_body_ratio)?;
        check_ratio("small_body_ratio", self.small_body_ratio)?;
        check_ratio("large_body_ratio", self.large_body_ratio)?;
        check_ratio("long_shadow_range_ratio", self.long_shadow_range_ratio)?;
        check_ratio("short_shadow_range_ratio", self.short_shadow_range_ratio)?;
        check_ratio("extreme_zone_tolerance", self.extreme_zone_tolerance)?;
        check_ratio("trend_slope_threshold", self.trend_slope_threshold)?;
        check_ratio("consolidation_threshold", self.consolidation_threshold)?;
        check_ratio("breakout_margin", self.breakout_margin)?;
        check_ratio("wedge_breakout_margin", self.wedge_breakout_margin)?;
        check_ratio("double_tolerance", self.double_tolerance)?;
        check_ratio("shoulder_tolerance", self.shoulder_tolerance)?;
        check_positive("long_shadow_body_multiple", self.long_shadow_body_multiple)?;
        check_positive("volume_expansion_ratio", self.volume_expansion_ratio)?;

        if self.trend_period < 3 {
            return Err(PatternError::OutOfRange {
                field: "trend_period",
                value: self.trend_period as f64,
                min: 3.0,
                max: f64::INFINITY,
            });
        }
        if self.extrema_radius < 1 {
            return Err(PatternError::OutOfRange {
                field: "extrema_radius",
                value: self.extrema_radius as f64,
                min: 1.0,
                max: f64::INFINITY,
            });
        }
        if self.small_body_ratio > self.large_body_ratio {
            return Err(PatternError::InvalidConfig(format!(
                "small_body_ratio ({}) must not exceed large_body_ratio ({})",
                self.small_body_ratio, self.large_body_ratio
            )));
        }
        Ok(())
    }

    /// Validate and return `self`.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Deterministic hash of every threshold.
    ///
    /// Two configs with the same fingerprint produce identical check results,
    /// so the fingerprint is folded into every cache key.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for value in [
            self.doji_body_ratio,
            self.small_body_ratio,
            self.large_body_ratio,
            self.long_shadow_body_multiple,
            self.long_shadow_range_ratio,
            self.short_shadow_range_ratio,
            self.extreme_zone_tolerance,
            self.trend_slope_threshold,
            self.consolidation_threshold,
            self.volume_expansion_ratio,
            self.breakout_margin,
            self.wedge_breakout_margin,
            self.double_tolerance,
            self.shoulder_tolerance,
        ] {
            value.to_bits().hash(&mut hasher);
        }
        self.trend_period.hash(&mut hasher);
        self.extrema_radius.hash(&mut hasher);
        hasher.finish()
    }
}

fn check_ratio(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PatternError::InvalidConfig(format!("{field} must be a finite number")));
    }
    if value <= 0.0 || value > 1.0 {
        return Err(PatternError::OutOfRange { field, value, min: 0.0, max: 1.0 });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PatternError::InvalidConfig(format!("{field} must be a finite number")));
    }
    if value <= 0.0 {
        return Err(PatternError::OutOfRange { field, value, min: 0.0, max: f64::INFINITY });
    }
    Ok(())
}

// ============================================================
// CONFIG-AWARE SHAPE PREDICATES
// ============================================================

/// Bar shape predicates measured against a [`PatternConfig`].
///
/// Every predicate is false for a zero-range bar.
pub trait CandleShape: OHLCVExt {
    #[inline]
    fn is_doji(&self, config: &PatternConfig) -> bool {
        let range = self.range();
        range > f64::EPSILON && self.body() < range * config.doji_body_ratio
    }

    #[inline]
    fn is_big(&self, config: &PatternConfig) -> bool {
        self.body_ratio()
            .is_some_and(|ratio| ratio >= config.large_body_ratio)
    }

    #[inline]
    fn is_small(&self, config: &PatternConfig) -> bool {
        self.body_ratio()
            .is_some_and(|ratio| ratio < config.small_body_ratio)
    }

    #[inline]
    fn has_long_upper_shadow(&self, config: &PatternConfig) -> bool {
        is_long_shadow(self.upper_shadow(), self.body(), self.range(), config)
    }

    #[inline]
    fn has_long_lower_shadow(&self, config: &PatternConfig) -> bool {
        is_long_shadow(self.lower_shadow(), self.body(), self.range(), config)
    }

    #[inline]
    fn has_short_upper_shadow(&self, config: &PatternConfig) -> bool {
        let range = self.range();
        range > f64::EPSILON && self.upper_shadow() <= range * config.short_shadow_range_ratio
    }

    #[inline]
    fn has_short_lower_shadow(&self, config: &PatternConfig) -> bool {
        let range = self.range();
        range > f64::EPSILON && self.lower_shadow() <= range * config.short_shadow_range_ratio
    }
}

impl<T: OHLCVExt> CandleShape for T {}

#[inline]
fn is_long_shadow(shadow: f64, body: f64, range: f64, config: &PatternConfig) -> bool {
    range > f64::EPSILON
        && shadow >= body * config.long_shadow_body_multiple
        && shadow >= range * config.long_shadow_range_ratio
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PatternConfig::default().validate().is_ok());
    }

    #[test]
    fn test_ratio_out_of_range() {
        let config = PatternConfig { doji_body_ratio: 0.0, ..Default::default() };
        match config.validate() {
            Err(PatternError::OutOfRange { field, .. }) => assert_eq!(field, "doji_body_ratio"),
            other => panic!("unexpected: {other:?}"),
        }

        let config = PatternConfig { breakout_margin: 1.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = PatternConfig { double_tolerance: f64::NAN, ..Default::default() };
        assert!(matches!(config.validate(), Err(PatternError::InvalidConfig(_))));
    }

    #[test]
    fn test_trend_period_minimum() {
        let config = PatternConfig { trend_period: 2, ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(PatternError::OutOfRange { field: "trend_period", .. })
        ));
        assert!(PatternConfig { trend_period: 3, ..Default::default() }.validated().is_ok());
    }

    #[test]
    fn test_small_must_not_exceed_large() {
        let config = PatternConfig {
            small_body_ratio: 0.6,
            large_body_ratio: 0.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PatternError::InvalidConfig(_))));
    }

    #[test]
    fn test_fingerprint_tracks_fields() {
        let a = PatternConfig::default();
        let b = PatternConfig { trend_period: 12, ..Default::default() };
        assert_eq!(a.fingerprint(), PatternConfig::default().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PatternConfig =
            serde_json::from_str(r#"{ "doji_body_ratio": 0.05, "trend_period": 14 }"#).unwrap();
        assert_eq!(config.doji_body_ratio, 0.05);
        assert_eq!(config.trend_period, 14);
        assert_eq!(config.small_body_ratio, 0.3);
    }

    #[test]
    fn test_shape_predicates() {
        let config = PatternConfig::default();

        let doji = Bar::new(100.0, 105.0, 95.0, 100.2);
        assert!(doji.is_doji(&config));
        assert!(doji.is_small(&config));
        assert!(!doji.is_big(&config));

        let hammer = Bar::new(100.0, 100.5, 80.0, 99.0);
        assert!(hammer.has_long_lower_shadow(&config));
        assert!(hammer.has_short_upper_shadow(&config));
        assert!(!hammer.has_long_upper_shadow(&config));

        let flat = Bar::new(100.0, 100.0, 100.0, 100.0);
        assert!(!flat.is_doji(&config));
        assert!(!flat.is_big(&config));
        assert!(!flat.is_small(&config));
        assert!(!flat.has_short_upper_shadow(&config));
        assert!(!flat.has_long_lower_shadow(&config));
    }
}
