//! Two-bar patterns
//!
//! Engulfing, piercing/dark cloud, harami family and tweezers. Each detector
//! needs `prev`; without it nothing matches, whatever the waivers say.

use super::helpers::{
    coloured, gated_lookback, preceding_trend, relative_diff, reversal_side, reversal_trend,
    trend_is_directional, trend_permits, volume_expands, zone_permits, Score, WEAK_CONFIDENCE_CAP,
};
use crate::{
    CandleShape, OHLCVExt, PatternCategory, PatternConfig, PatternDefinition, PatternDetector,
    PatternId, PatternInput, PatternType, SignalStrength, OHLCV,
};

impl_with_defaults!(
    BullishEngulfingDetector,
    BearishEngulfingDetector,
    PiercingLineDetector,
    DarkCloudCoverDetector,
    HaramiDetector,
    HaramiCrossDetector,
    TweezersTopDetector,
    TweezersBottomDetector,
);

const ENGULF_BODY_MULTIPLE: f64 = 1.05;
const HARAMI_MAX_BODY_RATIO: f64 = 0.5;
const TWEEZERS_TOLERANCE: f64 = 0.01;
const TWEEZERS_MIN_BODY_RATIO: f64 = 0.5;
const TWEEZERS_MAX_BODY_RATIO: f64 = 2.0;
const TWEEZERS_SHADOW_MULTIPLE: f64 = 1.2;

// ============================================================
// DEFINITIONS
// ============================================================

pub static BULLISH_ENGULFING: PatternDefinition = PatternDefinition {
    id: PatternId("BULLISH_ENGULFING"),
    name: "看漲吞噬",
    en_name: "Bullish Engulfing",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::TwoBar,
    description: "A green body swallows the previous red body at the bottom of the range.",
    detail: "Buyers open below the prior close and finish above the prior open, overturning the session before.",
};

pub static BEARISH_ENGULFING: PatternDefinition = PatternDefinition {
    id: PatternId("BEARISH_ENGULFING"),
    name: "看跌吞噬",
    en_name: "Bearish Engulfing",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::TwoBar,
    description: "A red body swallows the previous green body at the top of the range.",
    detail: "Sellers open above the prior close and finish below the prior open, overturning the session before.",
};

pub static PIERCING_LINE: PatternDefinition = PatternDefinition {
    id: PatternId("PIERCING_LINE"),
    name: "刺透型態",
    en_name: "Piercing Pattern",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(true),
    category: PatternCategory::TwoBar,
    description: "Gap below a red bar, then a green close past its midpoint.",
    detail: "The gap down finds no follow-through and buyers reclaim more than half of the prior loss.",
};

pub static DARK_CLOUD_COVER: PatternDefinition = PatternDefinition {
    id: PatternId("DARK_CLOUD_COVER"),
    name: "烏雲蓋頂",
    en_name: "Dark Cloud Cover",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::TwoBar,
    description: "Gap above a green bar, then a red close below its midpoint.",
    detail: "The gap up fails and sellers erase more than half of the prior gain.",
};

pub static HARAMI: PatternDefinition = PatternDefinition {
    id: PatternId("HARAMI"),
    name: "孕育線",
    en_name: "Harami",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Weak,
    bullish: None,
    category: PatternCategory::TwoBar,
    description: "A small opposite-coloured body inside the previous long body.",
    detail: "Momentum stalls after a long bar; wait for the next bar to choose a side.",
};

pub static HARAMI_CROSS: PatternDefinition = PatternDefinition {
    id: PatternId("HARAMI_CROSS"),
    name: "十字孕育線",
    en_name: "Harami Cross",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: None,
    category: PatternCategory::TwoBar,
    description: "A doji whose whole range sits inside the previous long body.",
    detail: "A stronger harami: the second session could not even leave the prior body.",
};

pub static TWEEZERS_TOP: PatternDefinition = PatternDefinition {
    id: PatternId("TWEEZERS_TOP"),
    name: "鑷子頂部",
    en_name: "Tweezers Top",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Weak,
    bullish: Some(false),
    category: PatternCategory::TwoBar,
    description: "Two bars topping out at the same high.",
    detail: "A green bar followed by a rejection at the same level marks short-term resistance.",
};

pub static TWEEZERS_BOTTOM: PatternDefinition = PatternDefinition {
    id: PatternId("TWEEZERS_BOTTOM"),
    name: "鑷子底部",
    en_name: "Tweezers Bottom",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Weak,
    bullish: Some(true),
    category: PatternCategory::TwoBar,
    description: "Two bars bottoming out at the same low.",
    detail: "A red bar followed by a defence of the same level marks short-term support.",
};

// ============================================================
// SHARED
// ============================================================

fn engulfing<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> bool {
    let Some(prev) = input.prev else {
        return false;
    };
    let bar = input.current;

    let wraps = if bullish {
        bar.open() < prev.close() && bar.close() > prev.open()
    } else {
        bar.open() > prev.close() && bar.close() < prev.open()
    };

    coloured(prev, !bullish)
        && coloured(bar, bullish)
        && wraps
        && bar.body() > prev.body() * ENGULF_BODY_MULTIPLE
        && zone_permits(input, reversal_side(bullish), config)
}

fn engulfing_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> f64 {
    let Some(prev) = input.prev else {
        return 0.0;
    };
    let bar = input.current;
    let dominance = if prev.body() > f64::EPSILON {
        bar.body() / prev.body()
    } else {
        3.0
    };

    Score::base(0.6)
        .scaled((dominance - ENGULF_BODY_MULTIPLE) / 2.0, 0.15)
        .bonus(preceding_trend(input, 2, config) == reversal_trend(bullish), 0.1)
        .bonus(volume_expands(input, config), 0.1)
        .finish()
}

fn penetration<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> bool {
    let Some(prev) = input.prev else {
        return false;
    };
    let bar = input.current;
    if !coloured(prev, !bullish) || prev.is_small(config) {
        return false;
    }
    if !coloured(bar, bullish) || bar.is_small(config) {
        return false;
    }

    let mid = prev.body_mid();
    let pierces = if bullish {
        bar.open() < prev.low() && bar.close() > mid && bar.close() < prev.open()
    } else {
        bar.open() > prev.high() && bar.close() < mid && bar.close() > prev.open()
    };

    pierces
        && trend_permits(preceding_trend(input, 2, config), reversal_trend(bullish))
        && zone_permits(input, reversal_side(bullish), config)
}

fn penetration_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> f64 {
    let Some(prev) = input.prev else {
        return 0.0;
    };
    let body = prev.body();
    let depth = if body > f64::EPSILON {
        (input.current.close() - prev.close()).abs() / body
    } else {
        0.0
    };

    Score::base(0.5)
        .scaled((depth - 0.5) / 0.5, 0.2)
        .bonus(preceding_trend(input, 2, config) == reversal_trend(bullish), 0.1)
        .bonus(volume_expands(input, config), 0.05)
        .finish()
}

fn tweezers<T: OHLCV>(input: &PatternInput<'_, T>, top: bool) -> bool {
    let Some(prev) = input.prev else {
        return false;
    };
    let bar = input.current;

    let (a, b) = if top { (prev.high(), bar.high()) } else { (prev.low(), bar.low()) };
    if !relative_diff(a, b, a).is_some_and(|d| d < TWEEZERS_TOLERANCE) {
        return false;
    }

    if prev.body() <= f64::EPSILON {
        return false;
    }
    let body_ratio = bar.body() / prev.body();
    if body_ratio <= TWEEZERS_MIN_BODY_RATIO || body_ratio >= TWEEZERS_MAX_BODY_RATIO {
        return false;
    }

    let rejection = if top { bar.upper_shadow() } else { bar.lower_shadow() };
    let turns = coloured(bar, !top) || rejection > bar.body() * TWEEZERS_SHADOW_MULTIPLE;
    coloured(prev, top) && turns
}

fn tweezers_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, top: bool) -> f64 {
    let Some(prev) = input.prev else {
        return 0.0;
    };
    let bar = input.current;
    let (a, b) = if top { (prev.high(), bar.high()) } else { (prev.low(), bar.low()) };
    let closeness = relative_diff(a, b, a).map_or(0.0, |d| 1.0 - d / TWEEZERS_TOLERANCE);
    let wanted = reversal_trend(!top);

    Score::base(0.4)
        .capped(WEAK_CONFIDENCE_CAP)
        .scaled(closeness, 0.2)
        .bonus(coloured(bar, !top), 0.1)
        .bonus(preceding_trend(input, 2, config) == wanted, 0.1)
        .finish()
}

// ============================================================
// ENGULFING
// ============================================================

/// Green body wrapping the prior red body, at the trailing low
#[derive(Debug, Clone, Copy, Default)]
pub struct BullishEngulfingDetector;

impl PatternDetector for BullishEngulfingDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BULLISH_ENGULFING
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        engulfing(input, config, true)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        engulfing_score(input, config, true)
    }
}

/// Red body wrapping the prior green body, at the trailing high
#[derive(Debug, Clone, Copy, Default)]
pub struct BearishEngulfingDetector;

impl PatternDetector for BearishEngulfingDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BEARISH_ENGULFING
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        engulfing(input, config, false)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        engulfing_score(input, config, false)
    }
}

// ============================================================
// PIERCING / DARK CLOUD
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PiercingLineDetector;

impl PatternDetector for PiercingLineDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &PIERCING_LINE
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        penetration(input, config, true)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        penetration_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DarkCloudCoverDetector;

impl PatternDetector for DarkCloudCoverDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &DARK_CLOUD_COVER
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        penetration(input, config, false)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        penetration_score(input, config, false)
    }
}

// ============================================================
// HARAMI
// ============================================================

/// Small opposite body strictly inside a big prior body
#[derive(Debug, Clone, Copy, Default)]
pub struct HaramiDetector;

impl PatternDetector for HaramiDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &HARAMI
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        let Some(prev) = input.prev else {
            return false;
        };
        let bar = input.current;

        let opposite = (prev.is_bullish() && bar.is_bearish()) || (prev.is_bearish() && bar.is_bullish());
        let inside = bar.body_top() < prev.body_top() && bar.body_bottom() > prev.body_bottom();
        let shrunk = prev.body() > f64::EPSILON && bar.body() / prev.body() < HARAMI_MAX_BODY_RATIO;

        prev.is_big(config)
            && bar.is_small(config)
            && opposite
            && inside
            && shrunk
            && trend_is_directional(preceding_trend(input, 2, config))
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        let Some(prev) = input.prev else {
            return 0.0;
        };
        let shrink = if prev.body() > f64::EPSILON {
            1.0 - input.current.body() / prev.body() / HARAMI_MAX_BODY_RATIO
        } else {
            0.0
        };
        let trend = preceding_trend(input, 2, config);
        let against_trend = (prev.is_bearish() && trend.is_down()) || (prev.is_bullish() && trend.is_up());

        Score::base(0.45)
            .capped(WEAK_CONFIDENCE_CAP)
            .scaled(shrink, 0.25)
            .bonus(against_trend, 0.1)
            .bonus(volume_expands(input, config), 0.05)
            .finish()
    }
}

/// Doji whose whole range sits inside a big prior body
#[derive(Debug, Clone, Copy, Default)]
pub struct HaramiCrossDetector;

impl PatternDetector for HaramiCrossDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &HARAMI_CROSS
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        let Some(prev) = input.prev else {
            return false;
        };
        let bar = input.current;

        prev.is_big(config)
            && bar.is_doji(config)
            && bar.high() < prev.body_top()
            && bar.low() > prev.body_bottom()
            && trend_is_directional(preceding_trend(input, 2, config))
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        let Some(prev) = input.prev else {
            return 0.0;
        };
        let containment = if prev.body() > f64::EPSILON {
            1.0 - input.current.range() / prev.body()
        } else {
            0.0
        };
        let trend = preceding_trend(input, 2, config);
        let against_trend = (prev.is_bearish() && trend.is_down()) || (prev.is_bullish() && trend.is_up());

        Score::base(0.55)
            .scaled(containment, 0.2)
            .bonus(against_trend, 0.1)
            .finish()
    }
}

// ============================================================
// TWEEZERS
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TweezersTopDetector;

impl PatternDetector for TweezersTopDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &TWEEZERS_TOP
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> bool {
        tweezers(input, true)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        tweezers_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TweezersBottomDetector;

impl PatternDetector for TweezersBottomDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &TWEEZERS_BOTTOM
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 2)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> bool {
        tweezers(input, false)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        tweezers_score(input, config, false)
    }
}
