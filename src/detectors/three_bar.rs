//! Three-bar patterns: stars, soldiers/crows and the three-methods continuations

use super::helpers::{
    coloured, gated_lookback, preceding_trend, reversal_side, reversal_trend, trend_permits,
    volume_expands, zone_permits, Score,
};
use crate::{
    CandleShape, OHLCVExt, PatternCategory, PatternConfig, PatternDefinition, PatternDetector,
    PatternId, PatternInput, PatternType, SignalStrength, TrendDirection, OHLCV,
};

impl_with_defaults!(
    MorningStarDetector,
    EveningStarDetector,
    ThreeWhiteSoldiersDetector,
    ThreeBlackCrowsDetector,
    RisingThreeMethodsDetector,
    FallingThreeMethodsDetector,
);

const STAR_THIRD_BODY_MULTIPLE: f64 = 0.5;
const METHODS_THIRD_BODY_MULTIPLE: f64 = 0.7;

// ============================================================
// DEFINITIONS
// ============================================================

pub static MORNING_STAR: PatternDefinition = PatternDefinition {
    id: PatternId("MORNING_STAR"),
    name: "早晨之星",
    en_name: "Morning Star",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::ThreeBar,
    description: "Long red bar, small star, then a green bar closing past the first midpoint.",
    detail: "Selling exhausts in the star session and the third bar recovers at least half of the first bar's loss.",
};

pub static EVENING_STAR: PatternDefinition = PatternDefinition {
    id: PatternId("EVENING_STAR"),
    name: "黃昏之星",
    en_name: "Evening Star",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::ThreeBar,
    description: "Long green bar, small star, then a red bar closing below the first midpoint.",
    detail: "Buying exhausts in the star session and the third bar gives back at least half of the first bar's gain.",
};

pub static THREE_WHITE_SOLDIERS: PatternDefinition = PatternDefinition {
    id: PatternId("THREE_WHITE_SOLDIERS"),
    name: "白色三兵",
    en_name: "Three White Soldiers",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::ThreeBar,
    description: "Three solid green bars with rising closes after a decline.",
    detail: "Steady buying on three consecutive sessions turns a downtrend.",
};

pub static THREE_BLACK_CROWS: PatternDefinition = PatternDefinition {
    id: PatternId("THREE_BLACK_CROWS"),
    name: "黑三鴉",
    en_name: "Three Black Crows",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::ThreeBar,
    description: "Three solid red bars with falling closes after an advance.",
    detail: "Steady selling on three consecutive sessions turns an uptrend.",
};

pub static RISING_THREE_METHODS: PatternDefinition = PatternDefinition {
    id: PatternId("RISING_THREE_METHODS"),
    name: "上升三法",
    en_name: "Rising Three Methods",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Moderate,
    bullish: Some(true),
    category: PatternCategory::ThreeBar,
    description: "Long green bar, a small red pause inside it, then a green breakout.",
    detail: "The pause stays within the first bar's range and the third bar closes above its high, resuming the advance.",
};

pub static FALLING_THREE_METHODS: PatternDefinition = PatternDefinition {
    id: PatternId("FALLING_THREE_METHODS"),
    name: "下降三法",
    en_name: "Falling Three Methods",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::ThreeBar,
    description: "Long red bar, a small green pause inside it, then a red breakdown.",
    detail: "The pause stays within the first bar's range and the third bar closes below its low, resuming the decline.",
};

// ============================================================
// SHARED
// ============================================================

fn star<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> bool {
    let (Some(prev), Some(prev2)) = (input.prev, input.prev2) else {
        return false;
    };
    let bar = input.current;

    let mid = prev2.body_mid();
    let penetrates = if bullish { bar.close() > mid } else { bar.close() < mid };

    coloured(prev2, !bullish)
        && prev2.is_big(config)
        && prev.is_small(config)
        && coloured(bar, bullish)
        && bar.body() > prev2.body() * STAR_THIRD_BODY_MULTIPLE
        && penetrates
        && trend_permits(preceding_trend(input, 3, config), reversal_trend(bullish))
        && zone_permits(input, reversal_side(bullish), config)
}

fn star_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> f64 {
    let (Some(prev), Some(prev2)) = (input.prev, input.prev2) else {
        return 0.0;
    };
    let bar = input.current;
    let full_recovery = if bullish {
        bar.close() > prev2.open()
    } else {
        bar.close() < prev2.open()
    };

    Score::base(0.65)
        .bonus(full_recovery, 0.15)
        .bonus(prev.is_doji(config), 0.05)
        .bonus(preceding_trend(input, 3, config) == reversal_trend(bullish), 0.1)
        .bonus(volume_expands(input, config), 0.05)
        .finish()
}

fn marching<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> bool {
    let (Some(prev), Some(prev2)) = (input.prev, input.prev2) else {
        return false;
    };
    let bar = input.current;

    let ordered = if bullish {
        prev2.close() < prev.close() && prev.close() < bar.close()
    } else {
        prev2.close() > prev.close() && prev.close() > bar.close()
    };

    [prev2, prev, bar]
        .iter()
        .all(|b| coloured(*b, bullish) && !b.is_small(config))
        && ordered
        && trend_permits(preceding_trend(input, 3, config), reversal_trend(bullish))
        && zone_permits(input, reversal_side(bullish), config)
}

fn marching_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> f64 {
    let (Some(prev), Some(prev2)) = (input.prev, input.prev2) else {
        return 0.0;
    };
    let bar = input.current;
    let solidity = [prev2, prev, bar]
        .iter()
        .map(|b| b.body_ratio().unwrap_or(0.0))
        .sum::<f64>()
        / 3.0;
    // each open inside the prior body
    let stepped = prev.open() > prev2.body_bottom()
        && prev.open() < prev2.body_top()
        && bar.open() > prev.body_bottom()
        && bar.open() < prev.body_top();

    Score::base(0.6)
        .scaled((solidity - config.small_body_ratio) / (1.0 - config.small_body_ratio), 0.15)
        .bonus(stepped, 0.1)
        .bonus(preceding_trend(input, 3, config) == reversal_trend(bullish), 0.1)
        .finish()
}

fn three_methods<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> bool {
    let (Some(prev), Some(prev2)) = (input.prev, input.prev2) else {
        return false;
    };
    let bar = input.current;

    let contained = prev.high() < prev2.high() && prev.low() > prev2.low();
    let breaks = if bullish { bar.close() > prev2.high() } else { bar.close() < prev2.low() };
    let with_trend = if bullish { TrendDirection::Uptrend } else { TrendDirection::Downtrend };

    coloured(prev2, bullish)
        && prev2.is_big(config)
        && coloured(prev, !bullish)
        && prev.is_small(config)
        && coloured(bar, bullish)
        && bar.body() > prev2.body() * METHODS_THIRD_BODY_MULTIPLE
        && contained
        && breaks
        && trend_permits(preceding_trend(input, 3, config), with_trend)
}

fn three_methods_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> f64 {
    let Some(prev2) = input.prev2 else {
        return 0.0;
    };
    let bar = input.current;
    let range = prev2.range();
    let clearance = if range > f64::EPSILON {
        if bullish {
            (bar.close() - prev2.high()) / range
        } else {
            (prev2.low() - bar.close()) / range
        }
    } else {
        0.0
    };
    let with_trend = if bullish { TrendDirection::Uptrend } else { TrendDirection::Downtrend };

    Score::base(0.55)
        .scaled(clearance / 0.5, 0.15)
        .bonus(preceding_trend(input, 3, config) == with_trend, 0.1)
        .bonus(volume_expands(input, config), 0.1)
        .finish()
}

// ============================================================
// STARS
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MorningStarDetector;

impl PatternDetector for MorningStarDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &MORNING_STAR
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 3)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        star(input, config, true)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        star_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EveningStarDetector;

impl PatternDetector for EveningStarDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &EVENING_STAR
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 3)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        star(input, config, false)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        star_score(input, config, false)
    }
}

// ============================================================
// SOLDIERS / CROWS
// ============================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeWhiteSoldiersDetector;

impl PatternDetector for ThreeWhiteSoldiersDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &THREE_WHITE_SOLDIERS
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 3)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        marching(input, config, true)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        marching_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeBlackCrowsDetector;

impl PatternDetector for ThreeBlackCrowsDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &THREE_BLACK_CROWS
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 3)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        marching(input, config, false)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        marching_score(input, config, false)
    }
}

// ============================================================
// THREE METHODS
// ============================================================

/// Compressed three-bar form: big green, contained small red, green breakout
#[derive(Debug, Clone, Copy, Default)]
pub struct RisingThreeMethodsDetector;

impl PatternDetector for RisingThreeMethodsDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &RISING_THREE_METHODS
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 3)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        three_methods(input, config, true)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        three_methods_score(input, config, true)
    }
}

/// Compressed three-bar form: big red, contained small green, red breakdown
#[derive(Debug, Clone, Copy, Default)]
pub struct FallingThreeMethodsDetector;

impl PatternDetector for FallingThreeMethodsDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &FALLING_THREE_METHODS
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 3)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        three_methods(input, config, false)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        three_methods_score(input, config, false)
    }
}
