//! Multi-bar chart shapes
//!
//! Flags, pennants and wedges read a fixed trailing window (10 or 8 bars).
//! Double tops/bottoms and head-and-shoulders locate local extrema over a
//! longer window and then require a breakout through the level between them.
//!
//! Every shape finishes on the current bar: the breakout close is what turns
//! a silhouette into a match.

use super::helpers::{coloured, volume_expands, Score};
use crate::context::{calculate_trend, has_volume_decrease, is_consolidating, trailing, PriceField};
use crate::extrema::{
    find_local_maxima, find_local_minima, is_double_pattern, is_head_and_shoulders,
    is_inverse_head_and_shoulders, Extremum,
};
use crate::{
    OHLCVExt, PatternCategory, PatternConfig, PatternDefinition, PatternDetector, PatternId,
    PatternInput, PatternType, SignalStrength, OHLCV,
};

impl_with_defaults!(
    BullFlagDetector,
    BearFlagDetector,
    AscendingPennantDetector,
    DescendingPennantDetector,
    RisingWedgeDetector,
    FallingWedgeDetector,
    DoubleBottomDetector,
    DoubleTopDetector,
    HeadAndShouldersTopDetector,
    HeadAndShouldersBottomDetector,
);

const FLAG_BARS: usize = 10;
const FLAG_POLE_MOVE: f64 = 0.045;
const FLAG_RANGE_RATIO: f64 = 0.7;
const PENNANT_BARS: usize = 8;
const PENNANT_FLAT_SLOPE: f64 = 0.0015;
const PENNANT_CONVERGENCE: f64 = 0.7;
const WEDGE_BARS: usize = 10;
const WEDGE_CONVERGENCE: f64 = 1.2;

const DOUBLE_WINDOW: usize = 40;
const DOUBLE_MIN_BARS: usize = 20;
const DOUBLE_VOLUME_RATIO: f64 = 1.15;
const DOUBLE_MIN_HEIGHT: f64 = 0.045;

const SHOULDERS_WINDOW: usize = 45;
const SHOULDERS_MIN_BARS: usize = 30;
const SHOULDERS_MIN_SPACING: usize = 4;
const SHOULDERS_MAX_SPAN: usize = 30;
const SHOULDERS_NECK_EXTENSION: usize = 5;
const SHOULDERS_VOLUME_RATIO: f64 = 0.95;
const SHOULDERS_BREAKOUT_VOLUME: f64 = 1.2;
const SHOULDERS_MIN_HEIGHT: f64 = 0.07;

/// Bars before the first extreme used to confirm the prior move
const PRE_PATTERN_BARS: usize = 8;
/// Close-to-close move those bars must show
const PRE_PATTERN_MOVE: f64 = 0.03;

// ============================================================
// DEFINITIONS
// ============================================================

pub static BULL_FLAG: PatternDefinition = PatternDefinition {
    id: PatternId("BULL_FLAG"),
    name: "上升旗型",
    en_name: "Bull Flag",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Moderate,
    bullish: Some(true),
    category: PatternCategory::MultiBar,
    description: "Sharp rally, a tight downward-sloping pause, then a breakout above it.",
    detail: "Three green bars form the pole; five bars of drifting, quieter trade form the flag. A close above the flag's high resumes the advance.",
};

pub static BEAR_FLAG: PatternDefinition = PatternDefinition {
    id: PatternId("BEAR_FLAG"),
    name: "下降旗型",
    en_name: "Bear Flag",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::MultiBar,
    description: "Sharp drop, a tight upward-sloping pause, then a breakdown below it.",
    detail: "Three red bars form the pole; five bars of drifting, quieter trade form the flag. A close below the flag's low resumes the decline.",
};

pub static ASCENDING_PENNANT: PatternDefinition = PatternDefinition {
    id: PatternId("ASCENDING_PENNANT"),
    name: "上升三角旗",
    en_name: "Ascending Pennant",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Moderate,
    bullish: Some(true),
    category: PatternCategory::MultiBar,
    description: "Flat highs over rising lows, closed by a breakout.",
    detail: "Buyers keep lifting the lows against a fixed ceiling until price clears it.",
};

pub static DESCENDING_PENNANT: PatternDefinition = PatternDefinition {
    id: PatternId("DESCENDING_PENNANT"),
    name: "下降三角旗",
    en_name: "Descending Pennant",
    pattern_type: PatternType::Continuation,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::MultiBar,
    description: "Flat lows under falling highs, closed by a breakdown.",
    detail: "Sellers keep pressing the highs against a fixed floor until price falls through it.",
};

pub static RISING_WEDGE: PatternDefinition = PatternDefinition {
    id: PatternId("RISING_WEDGE"),
    name: "上升楔型",
    en_name: "Rising Wedge",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(false),
    category: PatternCategory::MultiBar,
    description: "Highs and lows both rising but converging, then a break below support.",
    detail: "Each push higher gains less on fading volume; losing the rising support line confirms the exhaustion.",
};

pub static FALLING_WEDGE: PatternDefinition = PatternDefinition {
    id: PatternId("FALLING_WEDGE"),
    name: "下降楔型",
    en_name: "Falling Wedge",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Moderate,
    bullish: Some(true),
    category: PatternCategory::MultiBar,
    description: "Highs and lows both falling but converging, then a break above resistance.",
    detail: "Each leg lower loses less on fading volume; clearing the falling resistance line confirms the exhaustion.",
};

pub static DOUBLE_BOTTOM: PatternDefinition = PatternDefinition {
    id: PatternId("DOUBLE_BOTTOM"),
    name: "W底（雙重底）",
    en_name: "Double Bottom",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::MultiBar,
    description: "Two matching lows forming a W, confirmed by a close above the middle high.",
    detail: "The second low holds the first on lighter volume; breaking the rebound high between them completes the reversal.",
};

pub static DOUBLE_TOP: PatternDefinition = PatternDefinition {
    id: PatternId("DOUBLE_TOP"),
    name: "M頭（雙重頂）",
    en_name: "Double Top",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::MultiBar,
    description: "Two matching highs forming an M, confirmed by a close below the middle low.",
    detail: "The second high stalls at the first on lighter volume; breaking the pullback low between them completes the reversal.",
};

pub static HEAD_AND_SHOULDERS_TOP: PatternDefinition = PatternDefinition {
    id: PatternId("HEAD_AND_SHOULDERS_TOP"),
    name: "頭肩頂",
    en_name: "Head and Shoulders Top",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(false),
    category: PatternCategory::MultiBar,
    description: "Three peaks with the middle one highest, confirmed by a break of the neckline.",
    detail: "The right shoulder fails to reach the head on lighter volume; closing under the neckline marks the top.",
};

pub static HEAD_AND_SHOULDERS_BOTTOM: PatternDefinition = PatternDefinition {
    id: PatternId("HEAD_AND_SHOULDERS_BOTTOM"),
    name: "頭肩底",
    en_name: "Head and Shoulders Bottom",
    pattern_type: PatternType::Reversal,
    strength: SignalStrength::Strong,
    bullish: Some(true),
    category: PatternCategory::MultiBar,
    description: "Three troughs with the middle one lowest, confirmed by a break of the neckline.",
    detail: "The right shoulder holds above the head; a close over the neckline on expanding volume marks the bottom.",
};

// ============================================================
// WINDOW HELPERS
// ============================================================

#[inline]
fn max_high<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max)
}

#[inline]
fn min_low<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min)
}

/// Trailing `len` bars, or `None` when the window is shorter or `prev`/`prev2` are missing.
fn fixed_window<'a, T: OHLCV>(input: &PatternInput<'a, T>, len: usize) -> Option<&'a [T]> {
    if input.prev.is_none() || input.prev2.is_none() {
        return None;
    }
    let window = trailing(input.history(), len);
    (window.len() >= len).then_some(window)
}

/// Both volumes known
#[inline]
fn known_volumes<T: OHLCV>(a: &T, b: &T) -> Option<(f64, f64)> {
    let (va, vb) = (a.volume(), b.volume());
    (va > 0.0 && vb > 0.0).then_some((va, vb))
}

/// Whether the closes over the `PRE_PATTERN_BARS` before `start` moved by more than `threshold`.
///
/// `falling` asks for a decline into the pattern.
fn pre_pattern_move<T: OHLCV>(window: &[T], start: usize, threshold: f64, falling: bool) -> bool {
    let pre = &window[start.saturating_sub(PRE_PATTERN_BARS)..start];
    let (Some(first), Some(last)) = (pre.first(), pre.last()) else {
        return false;
    };
    if pre.len() <= 3 {
        return false;
    }
    if falling {
        first.close() > last.close() * (1.0 + threshold)
    } else {
        first.close() < last.close() * (1.0 - threshold)
    }
}

// ============================================================
// FLAGS
// ============================================================

/// Measured parts of a flag, computed once for check and confidence
struct FlagSetup {
    pole_move: f64,
    /// Flag high (bull) or low (bear) the close must clear
    level: f64,
}

fn flag_setup<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> Option<FlagSetup> {
    let window = fixed_window(input, FLAG_BARS)?;
    let pole = &window[..3];
    let flag = &window[3..8];

    let start = pole[0].close();
    if start <= f64::EPSILON {
        return None;
    }
    let pole_move = if bullish {
        pole[2].close() / start - 1.0
    } else {
        1.0 - pole[2].close() / start
    };
    if pole_move <= FLAG_POLE_MOVE || !pole.iter().all(|b| coloured(b, bullish)) {
        return None;
    }

    let slope = (calculate_trend(flag, PriceField::High) + calculate_trend(flag, PriceField::Low)) / 2.0;
    let counter_slope = if bullish { slope < 0.0 } else { slope > 0.0 };
    if !counter_slope || !is_consolidating(flag, config.consolidation_threshold) {
        return None;
    }

    let pole_range = max_high(pole) - min_low(pole);
    let flag_range = max_high(flag) - min_low(flag);
    if flag_range > pole_range * FLAG_RANGE_RATIO || !has_volume_decrease(flag) {
        return None;
    }

    let close = input.current.close();
    let level = if bullish { max_high(flag) } else { min_low(flag) };
    let breaks = if bullish { close > level } else { close < level };
    breaks.then_some(FlagSetup { pole_move, level })
}

fn flag_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bullish: bool) -> f64 {
    let Some(setup) = flag_setup(input, config, bullish) else {
        return 0.0;
    };
    let depth = (input.current.close() - setup.level).abs() / setup.level;

    Score::base(0.5)
        .scaled((setup.pole_move - FLAG_POLE_MOVE) / 0.1, 0.15)
        .scaled(depth / 0.02, 0.15)
        .bonus(volume_expands(input, config), 0.1)
        .finish()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BullFlagDetector;

impl PatternDetector for BullFlagDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BULL_FLAG
    }

    fn min_bars(&self) -> usize {
        FLAG_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        FLAG_BARS
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        flag_setup(input, config, true).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        flag_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BearFlagDetector;

impl PatternDetector for BearFlagDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &BEAR_FLAG
    }

    fn min_bars(&self) -> usize {
        FLAG_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        FLAG_BARS
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        flag_setup(input, config, false).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        flag_score(input, config, false)
    }
}

// ============================================================
// PENNANTS
// ============================================================

/// Returns the level cleared by the current close.
fn pennant_level<T: OHLCV>(input: &PatternInput<'_, T>, ascending: bool) -> Option<f64> {
    let window = fixed_window(input, PENNANT_BARS)?;
    let high_slope = calculate_trend(window, PriceField::High);
    let low_slope = calculate_trend(window, PriceField::Low);
    // slopes are judged against the highest high and the highest low
    let top = max_high(window);
    let top_low = window.iter().map(|b| b.low()).fold(f64::NEG_INFINITY, f64::max);

    let shaped = if ascending {
        high_slope.abs() < top * PENNANT_FLAT_SLOPE && low_slope > top_low * PENNANT_FLAT_SLOPE
    } else {
        low_slope.abs() < top_low * PENNANT_FLAT_SLOPE && high_slope < -top * PENNANT_FLAT_SLOPE
    };
    if !shaped {
        return None;
    }

    let (first, last) = (&window[0], &window[window.len() - 1]);
    if last.range() >= first.range() * PENNANT_CONVERGENCE {
        return None;
    }

    let earlier = &window[..window.len() - 1];
    let close = input.current.close();
    if ascending {
        let resistance = max_high(earlier);
        (close > resistance).then_some(resistance)
    } else {
        let support = min_low(earlier);
        (close < support).then_some(support)
    }
}

fn pennant_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, ascending: bool) -> f64 {
    let Some(level) = pennant_level(input, ascending) else {
        return 0.0;
    };
    let depth = if level > f64::EPSILON {
        (input.current.close() - level).abs() / level
    } else {
        0.0
    };

    Score::base(0.55)
        .scaled(depth / 0.02, 0.2)
        .bonus(volume_expands(input, config), 0.1)
        .finish()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AscendingPennantDetector;

impl PatternDetector for AscendingPennantDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &ASCENDING_PENNANT
    }

    fn min_bars(&self) -> usize {
        PENNANT_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        PENNANT_BARS
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> bool {
        pennant_level(input, true).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        pennant_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DescendingPennantDetector;

impl PatternDetector for DescendingPennantDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &DESCENDING_PENNANT
    }

    fn min_bars(&self) -> usize {
        PENNANT_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        PENNANT_BARS
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, _config: &PatternConfig) -> bool {
        pennant_level(input, false).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        pennant_score(input, config, false)
    }
}

// ============================================================
// WEDGES
// ============================================================

/// Returns the projected boundary the current close broke.
fn wedge_boundary<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, rising: bool) -> Option<f64> {
    let window = fixed_window(input, WEDGE_BARS)?;
    let high_slope = calculate_trend(window, PriceField::High);
    let low_slope = calculate_trend(window, PriceField::Low);

    let converging = if rising {
        high_slope > 0.0 && low_slope > 0.0 && low_slope > high_slope * WEDGE_CONVERGENCE
    } else {
        high_slope < 0.0 && low_slope < 0.0 && high_slope.abs() > low_slope.abs() * WEDGE_CONVERGENCE
    };
    if !converging || !has_volume_decrease(window) {
        return None;
    }

    let steps = (window.len() - 1) as f64;
    let close = input.current.close();
    let margin = config.wedge_breakout_margin;
    if rising {
        let support = window[0].low() + low_slope * steps;
        (close < support * (1.0 - margin)).then_some(support)
    } else {
        let resistance = window[0].high() + high_slope * steps;
        (close > resistance * (1.0 + margin)).then_some(resistance)
    }
}

fn wedge_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, rising: bool) -> f64 {
    let Some(boundary) = wedge_boundary(input, config, rising) else {
        return 0.0;
    };
    let depth = if boundary.abs() > f64::EPSILON {
        (input.current.close() - boundary).abs() / boundary.abs() - config.wedge_breakout_margin
    } else {
        0.0
    };

    Score::base(0.55)
        .scaled(depth / 0.03, 0.2)
        .bonus(volume_expands(input, config), 0.1)
        .finish()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RisingWedgeDetector;

impl PatternDetector for RisingWedgeDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &RISING_WEDGE
    }

    fn min_bars(&self) -> usize {
        WEDGE_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        WEDGE_BARS
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        wedge_boundary(input, config, true).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        wedge_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallingWedgeDetector;

impl PatternDetector for FallingWedgeDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &FALLING_WEDGE
    }

    fn min_bars(&self) -> usize {
        WEDGE_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        WEDGE_BARS
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        wedge_boundary(input, config, false).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        wedge_score(input, config, false)
    }
}

// ============================================================
// DOUBLE TOP / BOTTOM
// ============================================================

struct DoubleSetup {
    /// Intervening high (bottom) or low (top)
    middle: f64,
    height: f64,
    lighter_second: bool,
}

fn double_setup<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bottom: bool) -> Option<DoubleSetup> {
    let window = trailing(input.history(), DOUBLE_WINDOW);
    if window.len() < DOUBLE_MIN_BARS {
        return None;
    }

    let points = if bottom {
        find_local_minima(window, config.extrema_radius)
    } else {
        find_local_maxima(window, config.extrema_radius)
    };
    if !is_double_pattern(&points, config.double_tolerance) {
        return None;
    }
    let [.., first, second] = points.as_slice() else {
        return None;
    };

    let between = &window[first.index..=second.index];
    let close = input.current.close();
    let (middle, height, breaks) = if bottom {
        let middle = max_high(between);
        let height = middle - first.value.min(second.value);
        (middle, height, close > middle * (1.0 + config.breakout_margin))
    } else {
        let middle = min_low(between);
        let height = first.value.max(second.value) - middle;
        (middle, height, close < middle * (1.0 - config.breakout_margin))
    };
    if !breaks {
        return None;
    }

    let volumes = known_volumes(&window[first.index], &window[second.index]);
    if volumes.is_some_and(|(v1, v2)| v2 >= v1 * DOUBLE_VOLUME_RATIO) {
        return None;
    }

    let height_base = if bottom { first.value } else { middle };
    if height <= height_base * DOUBLE_MIN_HEIGHT {
        return None;
    }
    if !pre_pattern_move(window, first.index, PRE_PATTERN_MOVE, bottom) {
        return None;
    }

    Some(DoubleSetup {
        middle,
        height,
        lighter_second: volumes.is_some_and(|(v1, v2)| v2 < v1),
    })
}

fn double_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, bottom: bool) -> f64 {
    let Some(setup) = double_setup(input, config, bottom) else {
        return 0.0;
    };
    let clearance = (input.current.close() - setup.middle).abs() / setup.middle;
    let relative_height = setup.height / setup.middle;

    Score::base(0.65)
        .scaled(clearance / 0.03, 0.1)
        .scaled((relative_height - DOUBLE_MIN_HEIGHT) / 0.1, 0.1)
        .bonus(setup.lighter_second, 0.05)
        .bonus(volume_expands(input, config), 0.05)
        .finish()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleBottomDetector;

impl PatternDetector for DoubleBottomDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &DOUBLE_BOTTOM
    }

    fn min_bars(&self) -> usize {
        DOUBLE_MIN_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        DOUBLE_WINDOW
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        double_setup(input, config, true).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        double_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleTopDetector;

impl PatternDetector for DoubleTopDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &DOUBLE_TOP
    }

    fn min_bars(&self) -> usize {
        DOUBLE_MIN_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        DOUBLE_WINDOW
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        double_setup(input, config, false).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        double_score(input, config, false)
    }
}

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

struct ShouldersSetup {
    neckline: f64,
    height: f64,
}

fn shoulders_spaced(left: &Extremum, head: &Extremum, right: &Extremum) -> bool {
    head.index - left.index >= SHOULDERS_MIN_SPACING
        && right.index - head.index >= SHOULDERS_MIN_SPACING
        && right.index - left.index <= SHOULDERS_MAX_SPAN
}

fn shoulders_setup<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, top: bool) -> Option<ShouldersSetup> {
    let window = trailing(input.history(), SHOULDERS_WINDOW);
    if window.len() < SHOULDERS_MIN_BARS {
        return None;
    }

    let points = if top {
        find_local_maxima(window, config.extrema_radius)
    } else {
        find_local_minima(window, config.extrema_radius)
    };
    let shaped = if top {
        is_head_and_shoulders(&points, config.shoulder_tolerance)
    } else {
        is_inverse_head_and_shoulders(&points, config.shoulder_tolerance)
    };
    if !shaped {
        return None;
    }
    let [.., left, head, right] = points.as_slice() else {
        return None;
    };
    if !shoulders_spaced(left, head, right) {
        return None;
    }

    let left_side = &window[left.index..head.index];
    let right_end = (right.index + SHOULDERS_NECK_EXTENSION).min(window.len());
    let right_side = &window[head.index..right_end];
    let close = input.current.close();

    let (neckline, height, breaks) = if top {
        let neckline = min_low(left_side).max(min_low(right_side));
        (neckline, head.value - neckline, close < neckline * (1.0 - config.breakout_margin))
    } else {
        let neckline = max_high(left_side).min(max_high(right_side));
        (neckline, neckline - head.value, close > neckline * (1.0 + config.breakout_margin))
    };
    if !breaks {
        return None;
    }

    let head_bar = &window[head.index];
    let right_bar = &window[right.index];
    if known_volumes(head_bar, right_bar)
        .is_some_and(|(head_vol, right_vol)| right_vol >= head_vol * SHOULDERS_VOLUME_RATIO)
    {
        return None;
    }
    if !top
        && known_volumes(right_bar, input.current)
            .is_some_and(|(right_vol, now)| now <= right_vol * SHOULDERS_BREAKOUT_VOLUME)
    {
        return None;
    }

    let height_base = if top { neckline } else { head.value };
    if height <= height_base * SHOULDERS_MIN_HEIGHT {
        return None;
    }
    // a top needs a rally into the left shoulder, a bottom a decline
    if !pre_pattern_move(window, left.index, PRE_PATTERN_MOVE, !top) {
        return None;
    }

    Some(ShouldersSetup { neckline, height })
}

fn shoulders_score<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig, top: bool) -> f64 {
    let Some(setup) = shoulders_setup(input, config, top) else {
        return 0.0;
    };
    let clearance = (input.current.close() - setup.neckline).abs() / setup.neckline;
    let relative_height = setup.height / setup.neckline;

    Score::base(0.65)
        .scaled(clearance / 0.03, 0.1)
        .scaled((relative_height - SHOULDERS_MIN_HEIGHT) / 0.1, 0.1)
        .bonus(volume_expands(input, config), 0.1)
        .finish()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadAndShouldersTopDetector;

impl PatternDetector for HeadAndShouldersTopDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &HEAD_AND_SHOULDERS_TOP
    }

    fn min_bars(&self) -> usize {
        SHOULDERS_MIN_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        SHOULDERS_WINDOW
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        shoulders_setup(input, config, true).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        shoulders_score(input, config, true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeadAndShouldersBottomDetector;

impl PatternDetector for HeadAndShouldersBottomDetector {
    fn definition(&self) -> &'static PatternDefinition {
        &HEAD_AND_SHOULDERS_BOTTOM
    }

    fn min_bars(&self) -> usize {
        SHOULDERS_MIN_BARS
    }

    fn lookback(&self, _config: &PatternConfig) -> usize {
        SHOULDERS_WINDOW
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
        shoulders_setup(input, config, false).is_some()
    }

    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
        shoulders_score(input, config, false)
    }
}
