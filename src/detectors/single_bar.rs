//! Single-bar patterns
//!
//! Doji family, hammer family, long candles, marubozu, belt hold and spinning top.
//! Shape comes from the current bar alone; reversal variants additionally gate on
//! the preceding trend and on the bar sitting in the trailing extreme zone.

use super::helpers::{
    coloured, gated_lookback, preceding_trend, trend_permits, volume_expands, volume_permits,
    zone_permits, Score, LONG_CANDLE_BODY_RATIO, LONG_CANDLE_SHADOW_RATIO,
    MARUBOZU_BODY_RATIO, MARUBOZU_SHADOW_RATIO, WEAK_CONFIDENCE_CAP,
};
use crate::context::is_in_extreme_zone;
use crate::{
    CandleShape, OHLCVExt, PatternCategory, PatternConfig, PatternDefinition, PatternDetector,
    PatternId, PatternInput, PatternType, SignalStrength, TrendDirection, ZoneSide, OHLCV,
};

impl_with_defaults!(
    DojiDetector,
    HammerDetector,
    HangingManDetector,
    ShootingStarDetector,
    InvertedHammerDetector,
    BigGreenCandleDetector,
    BigRedCandleDetector,
    SpinningTopDetector,
    BeltHoldDetector,
    GravestoneDojiDetector,
    DragonflyDojiDetector,
    BullishMarubozuDetector,
    BearishMarubozuDetector,
);

const SPINNING_TOP_BODY_RATIO: f64 = 0.25;
const SPINNING_TOP_SHADOW_MULTIPLE: f64 = 1.1;
const BELT_HOLD_BODY_RATIO: f64 = 0.72;
const BELT_HOLD_SHADOW_RATIO: f64 = 0.01;
const DOJI_LONG_SHADOW_RATIO: f64 = 0.75;
const DOJI_SHORT_SHADOW_RATIO: f64 = 0.07;
/// Extra confidence a marubozu earns over a plain long candle
const MARUBOZU_PREMIUM: f64 = 0.05;

// ============================================================
// DEFINITIONS
// ============================================================

pub static DOJI: PatternDefinition = PatternDefinition {
    id: PatternId("DOJI"),
    name: "十字星",
    en_name: "Doji",
    pattern_type: PatternType::Indecision,
    strength: SignalStrength::Moderate,
    bullish: None,
    category: PatternCategory::SingleBar,
    description: "Open and close almost equal: buyers and sellers in balance.",
    detail: "Most telling at the edge of the recent range, where indecision after a run often precedes a turn.",
};

pub static HAMMER: PatternDefinition = PatternDefinition {
    id: PatternId("HAMMER"),
    name: "錘子線",
    en_name: "Hammer",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::SingleBar,
    description: "Small body with a long lower shadow at the end of a decline.",
    detail: "Sellers pushed price down hard but buyers closed it near the open; the rejection of lower prices hints at a bottom.",
};

pub static HANGING_MAN: PatternDefinition = PatternDefinition {
    id: PatternId("HANGING_MAN"),
    name: "上吊線",
    en_name: "Hanging Man",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::SingleBar,
    description: "Hammer-shaped bar appearing after an advance.",
    detail: "The long lower shadow shows selling pressure entering an uptrend; a weak next bar confirms the warning.",
};

pub static SHOOTING_STAR: PatternDefinition = PatternDefinition {
    id: PatternId("SHOOTING_STAR"),
    name: "射擊之星",
    en_name: "Shooting Star",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::SingleBar,
    description: "Small body with a long upper shadow at the top of an advance.",
    detail: "Buyers drove price up but could not hold it; the rejected high often marks a short-term top.",
};

pub static INVERTED_HAMMER: PatternDefinition = PatternDefinition {
    id: PatternId("INVERTED_HAMMER"),
    name: "倒錘子線",
    en_name: "Inverted Hammer",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(true),
    category: PatternCategory::SingleBar,
    description: "Small body with a long upper shadow at the bottom of a decline.",
    detail: "The first probe higher after a selloff; it needs a strong follow-through bar to confirm the turn.",
};

pub static BIG_GREEN_CANDLE: PatternDefinition = PatternDefinition {
    id: PatternId("BIG_GREEN_CANDLE"),
    name: "大陽線",
    en_name: "Big Green Candle",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::SingleBar,
    description: "Rising bar whose body fills most of its range.",
    detail: "Strong buying from open to close, ideally on expanding volume.",
};

pub static BIG_RED_CANDLE: PatternDefinition = PatternDefinition {
    id: PatternId("BIG_RED_CANDLE"),
    name: "大陰線",
    en_name: "Big Red Candle",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::SingleBar,
    description: "Falling bar whose body fills most of its range.",
    detail: "Strong selling from open to close, ideally on expanding volume.",
};

pub static SPINNING_TOP: PatternDefinition = PatternDefinition {
    id: PatternId("SPINNING_TOP"),
    name: "紡錘線",
    en_name: "Spinning Top",
    pattern_type: PatternType::Indecision,
    strength: SignalStrength::Weak,
    bullish: None,
    category: PatternCategory::SingleBar,
    description: "Small body with shadows on both sides.",
    detail: "Neither side controlled the session; the signal only means something once the next bar picks a direction.",
};

pub static BELT_HOLD: PatternDefinition = PatternDefinition {
    id: PatternId("BELT_HOLD"),
    name: "捉腰帶線",
    en_name: "Belt Hold",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: None,
    category: PatternCategory::SingleBar,
    description: "Long body that opens at its low (bullish) or its high (bearish).",
    detail: "Price never looked back after the open; against the prevailing trend it flags a possible reversal.",
};

pub static GRAVESTONE_DOJI: PatternDefinition = PatternDefinition {
    id: PatternId("GRAVESTONE_DOJI"),
    name: "墓碑線",
    en_name: "Gravestone Doji",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::SingleBar,
    description: "Doji with a long upper shadow and no lower shadow.",
    detail: "A rally fully rejected by the close, printed at the top of the recent range.",
};

pub static DRAGONFLY_DOJI: PatternDefinition = PatternDefinition {
    id: PatternId("DRAGONFLY_DOJI"),
    name: "蜻蜓線",
    en_name: "Dragonfly Doji",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::SingleBar,
    description: "Doji with a long lower shadow and no upper shadow.",
    detail: "A selloff fully recovered by the close, printed at the bottom of the recent range.",
};

pub static BULLISH_MARUBOZU: PatternDefinition = PatternDefinition {
    id: PatternId("BULLISH_MARUBOZU"),
    name: "長陽線",
    en_name: "Bullish Marubozu",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::SingleBar,
    description: "Rising bar with almost no shadows.",
    detail: "Opened at the low and closed at the high; buyers held control for the entire session.",
};

pub static BEARISH_MARUBOZU: PatternDefinition = PatternDefinition {
    id: PatternId("BEARISH_MARUBOZU"),
    name: "長陰線",
    en_name: "Bearish Marubozu",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::SingleBar,
    description: "Falling bar with almost no shadows.",
    detail: "Opened at the high and closed at the low; sellers held control for the entire session.",
};

// ============================================================
// SHARED SHAPES
// ============================================================

#[inline]
fn hammer_shape<T: OHLCV>(bar: &T, config: &PatternConfig) -> bool {
    bar.is_small(config) && bar.has_long_lower_shadow(config) && bar.has_short_upper_shadow(config)
}

#[inline]
fn inverted_shape<T: OHLCV>(bar: &T, config: &PatternConfig) -> bool {
    bar.is_small(config) && bar.has_long_upper_shadow(config) && bar.has_short_lower_shadow(config)
}

/// Shared scorer for the four small-body, long-shadow reversals
fn shadow_reversal_score<T: OHLCV>(
    input: &PatternInput<'_, T>,
    config: &PatternConfig,
    base: f64,
    lower_shadow: bool,
    wanted: TrendDirection,
) -> f64 {
    let bar = input.current;
    let dominance = if lower_shadow {
        bar.lower_shadow_ratio()
    } else {
        bar.upper_shadow_ratio()
    }
    .unwrap_or(0.0);
    let closes_with_signal = coloured(bar, wanted.is_down());

    Score::base(base)
        .scaled((dominance - 0.5) / 0.5, 0.15)
        .bonus(preceding_trend(input, 1, config) == wanted, 0.1)
        .bonus(closes_with_signal, 0.05)
        .bonus(volume_expands(input, config), 0.05)
        .finish()
}

/// Long-body candle in the given direction with both shadows under `shadow_max` of the range.
fn full_body<T: OHLCV>(bar: &T, bullish: bool, body_min: f64, shadow_max: f64) -> bool {
    let Some(body_ratio) = bar.body_ratio() else {
        return false;
    };
    coloured(bar, bullish)
        && body_ratio > body_min
        && bar.upper_shadow_ratio().is_some_and(|r| r < shadow_max)
        && bar.lower_shadow_ratio().is_some_and(|r| r < shadow_max)
}

fn full_body_score<T: OHLCV>(
    input: &PatternInput<'_, T>,
    config: &PatternConfig,
    bullish: bool,
    body_min: f64,
) -> Score {
    let body_ratio = input.current.body_ratio().unwrap_or(0.0);
    let wanted = if bullish { TrendDirection::Uptrend } else { TrendDirection::Downtrend };

    Score::base(0.6)
        .scaled((body_ratio - body_min) / (1.0 - body_min), 0.2)
        .bonus(volume_expands(input, config), 0.1)
        .bonus(preceding_trend(input, 1, config) == wanted, 0.05)
}

// ============================================================
// DOJI FAMILY
// ============================================================

/// Doji at either edge of the recent range
#[derive(Debug, Clone, Copy, Default)]
pub struct DojiDetector;

impl PatternDetector for DojiDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &DOJI
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        config.trend_period
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        if !input.current.is_doji(config) {
            return false;
        }
        zone_permits(input, ZoneSide::High, config) || zone_permits(input, ZoneSide::Low, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        let bar = input.current;
        let history = input.history();
        let tightness = bar
            .body_ratio()
            .map_or(0.0, |r| 1.0 - r / config.doji_body_ratio);
        let at_extreme = history.len() >= config.trend_period
            && (is_in_extreme_zone(bar, history, config, ZoneSide::High)
                || is_in_extreme_zone(bar, history, config, ZoneSide::Low));
        let balanced = bar.upper_shadow_ratio().is_some_and(|r| r > 0.3)
            && bar.lower_shadow_ratio().is_some_and(|r| r > 0.3);

        Score::base(0.5)
            .scaled(tightness, 0.2)
            .bonus(at_extreme, 0.1)
            .bonus(balanced, 0.05)
            .finish()
    }
}

/// Doji with a long upper shadow at the trailing high
#[derive(Debug, Clone, Copy, Default)]
pub struct GravestoneDojiDetector;

impl PatternDetector for GravestoneDojiDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &GRAVESTONE_DOJI
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        let bar = input.current;
        bar.is_doji(config)
            && bar.upper_shadow_ratio().is_some_and(|r| r > DOJI_LONG_SHADOW_RATIO)
            && bar.lower_shadow_ratio().is_some_and(|r| r < DOJI_SHORT_SHADOW_RATIO)
            && zone_permits(input, ZoneSide::High, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        let upper = input.current.upper_shadow_ratio().unwrap_or(0.0);
        Score::base(0.65)
            .scaled((upper - DOJI_LONG_SHADOW_RATIO) / (1.0 - DOJI_LONG_SHADOW_RATIO), 0.15)
            .bonus(preceding_trend(input, 1, config).is_up(), 0.1)
            .finish()
    }
}

/// Doji with a long lower shadow at the trailing low
#[derive(Debug, Clone, Copy, Default)]
pub struct DragonflyDojiDetector;

impl PatternDetector for DragonflyDojiDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &DRAGONFLY_DOJI
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        let bar = input.current;
        bar.is_doji(config)
            && bar.lower_shadow_ratio().is_some_and(|r| r > DOJI_LONG_SHADOW_RATIO)
            && bar.upper_shadow_ratio().is_some_and(|r| r < DOJI_SHORT_SHADOW_RATIO)
            && zone_permits(input, ZoneSide::Low, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        let lower = input.current.lower_shadow_ratio().unwrap_or(0.0);
        Score::base(0.65)
            .scaled((lower - DOJI_LONG_SHADOW_RATIO) / (1.0 - DOJI_LONG_SHADOW_RATIO), 0.15)
            .bonus(preceding_trend(input, 1, config).is_down(), 0.1)
            .finish()
    }
}

// ============================================================
// HAMMER FAMILY
// ============================================================

/// Hammer after a decline, at the trailing low
#[derive(Debug, Clone, Copy, Default)]
pub struct HammerDetector;

impl PatternDetector for HammerDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &HAMMER
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        hammer_shape(input.current, config)
            && trend_permits(preceding_trend(input, 1, config), TrendDirection::Downtrend)
            && zone_permits(input, ZoneSide::Low, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        shadow_reversal_score(input, config, 0.6, true, TrendDirection::Downtrend)
    }
}

/// Hammer shape closing above the prior close after an advance, at the trailing high
#[derive(Debug, Clone, Copy, Default)]
pub struct HangingManDetector;

impl PatternDetector for HangingManDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &HANGING_MAN
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn pattern_len(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        let Some(prev) = input.prev else {
            return false;
        };
        let bar = input.current;
        hammer_shape(bar, config)
            && prev.close() < bar.close()
            && trend_permits(preceding_trend(input, 1, config), TrendDirection::Uptrend)
            && zone_permits(input, ZoneSide::High, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        shadow_reversal_score(input, config, 0.5, true, TrendDirection::Uptrend)
    }
}

/// Long upper shadow after an advance, at the trailing high
#[derive(Debug, Clone, Copy, Default)]
pub struct ShootingStarDetector;

impl PatternDetector for ShootingStarDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &SHOOTING_STAR
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        inverted_shape(input.current, config)
            && trend_permits(preceding_trend(input, 1, config), TrendDirection::Uptrend)
            && zone_permits(input, ZoneSide::High, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        shadow_reversal_score(input, config, 0.5, false, TrendDirection::Uptrend)
    }
}

/// Long upper shadow closing below the prior close after a decline, at the trailing low
#[derive(Debug, Clone, Copy, Default)]
pub struct InvertedHammerDetector;

impl PatternDetector for InvertedHammerDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &INVERTED_HAMMER
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn pattern_len(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        let Some(prev) = input.prev else {
            return false;
        };
        let bar = input.current;
        inverted_shape(bar, config)
            && prev.close() > bar.close()
            && trend_permits(preceding_trend(input, 1, config), TrendDirection::Downtrend)
            && zone_permits(input, ZoneSide::Low, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        shadow_reversal_score(input, config, 0.5, false, TrendDirection::Downtrend)
    }
}

// ============================================================
// LONG CANDLES
// ============================================================

/// Long rising body with short shadows on expanding volume
#[derive(Debug, Clone, Copy, Default)]
pub struct BigGreenCandleDetector;

impl PatternDetector for BigGreenCandleDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BIG_GREEN_CANDLE
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        full_body(input.current, true, LONG_CANDLE_BODY_RATIO, LONG_CANDLE_SHADOW_RATIO)
            && volume_permits(input, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        full_body_score(input, config, true, LONG_CANDLE_BODY_RATIO).finish()
    }
}

/// Long falling body with short shadows on expanding volume
#[derive(Debug, Clone, Copy, Default)]
pub struct BigRedCandleDetector;

impl PatternDetector for BigRedCandleDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BIG_RED_CANDLE
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        full_body(input.current, false, LONG_CANDLE_BODY_RATIO, LONG_CANDLE_SHADOW_RATIO)
            && volume_permits(input, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        full_body_score(input, config, false, LONG_CANDLE_BODY_RATIO).finish()
    }
}

/// Shadow-free rising bar
#[derive(Debug, Clone, Copy, Default)]
pub struct BullishMarubozuDetector;

impl PatternDetector for BullishMarubozuDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BULLISH_MARUBOZU
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        full_body(input.current, true, MARUBOZU_BODY_RATIO, MARUBOZU_SHADOW_RATIO)
            && volume_permits(input, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        full_body_score(input, config, true, MARUBOZU_BODY_RATIO)
            .bonus(true, MARUBOZU_PREMIUM)
            .finish()
    }
}

/// Shadow-free falling bar
#[derive(Debug, Clone, Copy, Default)]
pub struct BearishMarubozuDetector;

impl PatternDetector for BearishMarubozuDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BEARISH_MARUBOZU
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        full_body(input.current, false, MARUBOZU_BODY_RATIO, MARUBOZU_SHADOW_RATIO)
            && volume_permits(input, config)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        full_body_score(input, config, false, MARUBOZU_BODY_RATIO)
            .bonus(true, MARUBOZU_PREMIUM)
            .finish()
    }
}

// ============================================================
// BELT HOLD / SPINNING TOP
// ============================================================

/// Long body opening at its extreme, either direction
#[derive(Debug, Clone, Copy, Default)]
pub struct BeltHoldDetector;

impl PatternDetector for BeltHoldDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BELT_HOLD
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        gated_lookback(config, 1)
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> bool {
        let bar = input.current;
        let Some(body_ratio) = bar.body_ratio() else {
            return false;
        };
        if body_ratio <= BELT_HOLD_BODY_RATIO {
            return false;
        }

        let limit = bar.range() * BELT_HOLD_SHADOW_RATIO;
        (bar.is_bullish() && bar.lower_shadow() < limit)
            || (bar.is_bearish() && bar.upper_shadow() < limit)
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        let bar = input.current;
        let body_ratio = bar.body_ratio().unwrap_or(0.0);
        let trend = preceding_trend(input, 1, config);
        let against_trend =
            (bar.is_bullish() && trend.is_down()) || (bar.is_bearish() && trend.is_up());

        Score::base(0.55)
            .scaled((body_ratio - BELT_HOLD_BODY_RATIO) / (1.0 - BELT_HOLD_BODY_RATIO), 0.2)
            .bonus(against_trend, 0.1)
            .finish()
    }
}

/// Small body between two shadows longer than it
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinningTopDetector;

impl PatternDetector for SpinningTopDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &SPINNING_TOP
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> bool {
        let bar = input.current;
        let range = bar.range();
        if range <= f64::EPSILON {
            return false;
        }
        let body = bar.body();
        body < range * SPINNING_TOP_BODY_RATIO
            && bar.upper_shadow() > body * SPINNING_TOP_SHADOW_MULTIPLE
            && bar.lower_shadow() > body * SPINNING_TOP_SHADOW_MULTIPLE
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> f64 {
        let bar = input.current;
        let range = bar.range();
        if range <= f64::EPSILON {
            return 0.0;
        }
        let symmetry = 1.0 - (bar.upper_shadow() - bar.lower_shadow()).abs() / range;
        let compactness = 1.0 - bar.body() / range / SPINNING_TOP_BODY_RATIO;

        Score::base(0.4)
            .capped(WEAK_CONFIDENCE_CAP)
            .scaled(symmetry, 0.2)
            .scaled(compactness, 0.15)
            .finish()
    }
}
