//! Shared gates, thresholds and scoring for the pattern catalog
//!
//! Trend and extreme-zone gates are waived when the window is too short to
//! judge (no context and fewer than three prior bars, or fewer than
//! `trend_period` bars for a zone). Bars a pattern structurally needs are never
//! waived: a missing `prev`/`prev2` always means no match.

use crate::context::{analyze_trend, average_volume, is_in_extreme_zone, trailing};
use crate::{OHLCVExt, PatternConfig, PatternInput, TrendDirection, ZoneSide, OHLCV};

// ============================================================
// THRESHOLDS
// ============================================================

/// Trailing bars averaged for the volume-expansion ratio
pub const VOLUME_PERIOD: usize = 5;
/// Long candle: body share of range
pub const LONG_CANDLE_BODY_RATIO: f64 = 0.7;
/// Long candle: max share of range per shadow
pub const LONG_CANDLE_SHADOW_RATIO: f64 = 0.15;
/// Marubozu: body share of range
pub const MARUBOZU_BODY_RATIO: f64 = 0.88;
/// Marubozu: max share of range per shadow
pub const MARUBOZU_SHADOW_RATIO: f64 = 0.06;
/// Confidence ceiling for patterns that need a confirming bar
pub const WEAK_CONFIDENCE_CAP: f64 = 0.8;

// ============================================================
// GATES
// ============================================================

/// Window a pattern of `pattern_len` bars needs for its trend, zone and volume gates.
#[inline]
pub fn gated_lookback(config: &PatternConfig, pattern_len: usize) -> usize {
    (config.trend_period + pattern_len).max(VOLUME_PERIOD)
}

/// Trend before a pattern spanning the last `pattern_len` bars of the window.
///
/// A supplied context wins; otherwise the `trend_period` bars preceding the
/// pattern are classified.
pub fn preceding_trend<T: OHLCV>(
    input: &PatternInput<'_, T>,
    pattern_len: usize,
    config: &PatternConfig,
) -> TrendDirection {
    if let Some(ctx) = input.context {
        return ctx.trend;
    }
    let history = input.history();
    let prior = &history[..history.len().saturating_sub(pattern_len)];
    analyze_trend(prior, config.trend_period, config)
}

/// An unknown trend does not block; a known one must match.
#[inline]
pub fn trend_permits(trend: TrendDirection, wanted: TrendDirection) -> bool {
    !trend.is_known() || trend == wanted
}

/// An unknown trend does not block; a known one must not be sideways.
#[inline]
pub fn trend_is_directional(trend: TrendDirection) -> bool {
    trend != TrendDirection::Sideways
}

/// Green for `bullish`, red otherwise. Flat bars are neither.
#[inline]
pub fn coloured<T: OHLCV>(bar: &T, bullish: bool) -> bool {
    if bullish {
        bar.is_bullish()
    } else {
        bar.is_bearish()
    }
}

/// Trend a bullish (`true`) or bearish reversal must follow
#[inline]
pub fn reversal_trend(bullish: bool) -> TrendDirection {
    if bullish {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Uptrend
    }
}

/// Extreme zone a bullish (`true`) or bearish reversal must form in
#[inline]
pub fn reversal_side(bullish: bool) -> ZoneSide {
    if bullish {
        ZoneSide::Low
    } else {
        ZoneSide::High
    }
}

/// Extreme-zone gate, waived until the window holds `trend_period` bars.
pub fn zone_permits<T: OHLCV>(
    input: &PatternInput<'_, T>,
    side: ZoneSide,
    config: &PatternConfig,
) -> bool {
    let history = input.history();
    history.len() < config.trend_period || is_in_extreme_zone(input.current, history, config, side)
}

/// Current volume over the mean of the last [`VOLUME_PERIOD`] known volumes.
///
/// `None` when the current bar has no volume or the window is shorter than the period.
pub fn volume_ratio<T: OHLCV>(history: &[T]) -> Option<f64> {
    let current = history.last()?.volume();
    if current <= 0.0 {
        return None;
    }
    let recent = trailing(history, VOLUME_PERIOD);
    if recent.len() < VOLUME_PERIOD {
        return None;
    }
    let avg = average_volume(recent)?;
    Some(current / avg)
}

/// Volume-expansion gate, waived when volume is unknown.
pub fn volume_permits<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
    volume_ratio(input.history()).map_or(true, |ratio| ratio > config.volume_expansion_ratio)
}

/// Whether the current volume expands on its trailing mean.
pub fn volume_expands<T: OHLCV>(input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
    volume_ratio(input.history()).is_some_and(|ratio| ratio > config.volume_expansion_ratio)
}

/// `|a - b| / base`, or `None` when the base is not positive.
#[inline]
pub fn relative_diff(a: f64, b: f64, base: f64) -> Option<f64> {
    (base > f64::EPSILON).then(|| (a - b).abs() / base)
}

// ============================================================
// SCORING
// ============================================================

/// Clamp to `[0, 1]`, mapping NaN to zero.
#[inline]
pub fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Additive confidence accumulator
#[derive(Debug, Clone, Copy)]
pub struct Score {
    value: f64,
    cap: f64,
}

impl Score {
    #[inline]
    pub fn base(value: f64) -> Self {
        Self { value, cap: 1.0 }
    }

    #[inline]
    pub fn capped(mut self, cap: f64) -> Self {
        self.cap = cap;
        self
    }

    /// Add `amount` when `condition` holds.
    #[inline]
    pub fn bonus(mut self, condition: bool, amount: f64) -> Self {
        if condition {
            self.value += amount;
        }
        self
    }

    /// Add `amount` scaled by `fraction` clamped to `[0, 1]`.
    #[inline]
    pub fn scaled(mut self, fraction: f64, amount: f64) -> Self {
        self.value += unit(fraction) * amount;
        self
    }

    #[inline]
    pub fn finish(self) -> f64 {
        unit(self.value).min(self.cap)
    }
}
