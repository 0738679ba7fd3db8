//! Summary counts over a match list, for chart legends and screener tables

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Direction, PatternMatch, PatternType, SignalStrength};

/// Counts of a scan's matches by classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStatistics {
    pub total: usize,
    pub by_type: BTreeMap<PatternType, usize>,
    pub by_strength: BTreeMap<SignalStrength, usize>,
    pub by_direction: BTreeMap<Direction, usize>,
    /// Keyed by pattern id
    pub by_pattern: BTreeMap<String, usize>,
    /// `0.0` for an empty list
    pub mean_confidence: f64,
}

impl PatternStatistics {
    pub fn from_matches(matches: &[PatternMatch]) -> Self {
        let mut stats = Self { total: matches.len(), ..Default::default() };
        if matches.is_empty() {
            return stats;
        }

        let mut confidence_sum = 0.0;
        for m in matches {
            *stats.by_type.entry(m.pattern.pattern_type).or_default() += 1;
            *stats.by_strength.entry(m.pattern.strength).or_default() += 1;
            *stats.by_direction.entry(m.direction()).or_default() += 1;
            *stats.by_pattern.entry(m.id().as_str().to_string()).or_default() += 1;
            confidence_sum += m.confidence;
        }
        stats.mean_confidence = confidence_sum / matches.len() as f64;
        stats
    }

    /// Bullish minus bearish matches.
    pub fn net_bias(&self) -> i64 {
        let count = |d| self.by_direction.get(&d).copied().unwrap_or(0) as i64;
        count(Direction::Bullish) - count(Direction::Bearish)
    }
}
