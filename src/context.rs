//! Trend context over a trailing window of bars
//!
//! Least-squares slopes, scale-invariant trend classification, extreme-zone
//! tests and cheap range-compression checks. Every function degrades to a
//! neutral answer (`0.0`, `false`, [`TrendDirection::Unknown`]) when the window
//! is too short instead of failing.

use serde::{Deserialize, Serialize};

use crate::{OHLCVExt, PatternConfig, Period, OHLCV};

/// Share of the first-half volume the second half must fall below
const VOLUME_DECAY: f64 = 0.8;

// ============================================================
// TREND TYPES
// ============================================================

/// Direction of the market over a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
    /// Fewer than three bars were available
    #[default]
    Unknown,
}

impl TrendDirection {
    #[inline]
    pub fn is_up(self) -> bool {
        matches!(self, TrendDirection::Uptrend)
    }

    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, TrendDirection::Downtrend)
    }

    #[inline]
    pub fn is_known(self) -> bool {
        !matches!(self, TrendDirection::Unknown)
    }
}

/// Price series a slope is fitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
}

impl PriceField {
    #[inline]
    pub fn of<T: OHLCV>(self, bar: &T) -> f64 {
        match self {
            PriceField::Open => bar.open(),
            PriceField::High => bar.high(),
            PriceField::Low => bar.low(),
            PriceField::Close => bar.close(),
        }
    }
}

/// Side of the trailing range an extreme-zone test looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSide {
    High,
    Low,
}

// ============================================================
// SLOPES AND TREND
// ============================================================

/// Ordinary least squares slope of `field` against bar index.
///
/// Returns `0.0` for fewer than three bars.
pub fn calculate_trend<T: OHLCV>(window: &[T], field: PriceField) -> f64 {
    if window.len() < 3 {
        return 0.0;
    }

    let n = window.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = window.iter().map(|b| field.of(b)).sum::<f64>() / n;

    let (num, den) = window
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, bar)| {
            let dx = i as f64 - mean_x;
            (num + dx * (field.of(bar) - mean_y), den + dx * dx)
        });

    if den <= f64::EPSILON {
        return 0.0;
    }
    let slope = num / den;
    if slope.is_finite() {
        slope
    } else {
        0.0
    }
}

/// Classify the trend of the last `lookback` closes.
///
/// The slope is divided by the mean close so the same threshold works for
/// a penny stock and an index.
pub fn analyze_trend<T: OHLCV>(
    window: &[T],
    lookback: usize,
    config: &PatternConfig,
) -> TrendDirection {
    let recent = trailing(window, lookback);
    if recent.len() < 3 {
        return TrendDirection::Unknown;
    }

    let mean = recent.iter().map(|b| b.close()).sum::<f64>() / recent.len() as f64;
    if !mean.is_finite() || mean <= f64::EPSILON {
        return TrendDirection::Unknown;
    }

    let normalized = calculate_trend(recent, PriceField::Close) / mean;
    if normalized > config.trend_slope_threshold {
        TrendDirection::Uptrend
    } else if normalized < -config.trend_slope_threshold {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Sideways
    }
}

// ============================================================
// ZONES, CONSOLIDATION, VOLUME
// ============================================================

/// Whether `bar` sits at the trailing high (or low) of the last `trend_period` bars.
pub fn is_in_extreme_zone<T: OHLCV, B: OHLCV>(
    bar: &B,
    window: &[T],
    config: &PatternConfig,
    side: ZoneSide,
) -> bool {
    let recent = trailing(window, config.trend_period);
    if recent.is_empty() {
        return false;
    }

    let tolerance = config.extreme_zone_tolerance;
    match side {
        ZoneSide::High => {
            let max_high = recent.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
            bar.high() >= max_high * (1.0 - tolerance)
        },
        ZoneSide::Low => {
            let min_low = recent.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
            bar.low() <= min_low * (1.0 + tolerance)
        },
    }
}

/// Whether the mid prices of `window` stay within `threshold` of their minimum.
pub fn is_consolidating<T: OHLCV>(window: &[T], threshold: f64) -> bool {
    if window.len() < 3 {
        return false;
    }

    let (min, max) = window
        .iter()
        .map(|b| b.mid_price())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| (lo.min(m), hi.max(m)));

    if min <= f64::EPSILON {
        return false;
    }
    (max - min) / min < threshold
}

/// Whether the known volumes of the second half of `window` average well below the first half.
///
/// Bars without volume are ignored; fewer than two known volumes is never a decrease.
pub fn has_volume_decrease<T: OHLCV>(window: &[T]) -> bool {
    let volumes: Vec<f64> = window
        .iter()
        .map(|b| b.volume())
        .filter(|v| *v > 0.0)
        .collect();
    if volumes.len() < 2 {
        return false;
    }

    let (first, second) = volumes.split_at(volumes.len() / 2);
    mean(second) < mean(first) * VOLUME_DECAY
}

/// Mean of the positive volumes in `window`.
pub fn average_volume<T: OHLCV>(window: &[T]) -> Option<f64> {
    let (sum, count) = window
        .iter()
        .map(|b| b.volume())
        .filter(|v| *v > 0.0)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[inline]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[inline]
pub(crate) fn trailing<T>(window: &[T], len: usize) -> &[T] {
    &window[window.len().saturating_sub(len)..]
}

// ============================================================
// MARKET CONTEXT
// ============================================================

/// Precomputed context a caller can share across every check of a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub trend: TrendDirection,
    /// Mean range over mean close
    pub volatility: f64,
    pub consolidating: bool,
    pub avg_volume: Option<f64>,
    /// Lowest low of the window
    pub support: Option<f64>,
    /// Highest high of the window
    pub resistance: Option<f64>,
}

impl MarketContext {
    /// Context carrying only a trend verdict.
    pub fn with_trend(trend: TrendDirection) -> Self {
        Self { trend, ..Default::default() }
    }

    /// Summarize the whole of `window`.
    pub fn from_window<T: OHLCV>(window: &[T], config: &PatternConfig) -> Self {
        if window.is_empty() {
            return Self::default();
        }

        let n = window.len() as f64;
        let mean_close = window.iter().map(|b| b.close()).sum::<f64>() / n;
        let mean_range = window.iter().map(|b| b.range()).sum::<f64>() / n;
        let volatility = if mean_close > f64::EPSILON { mean_range / mean_close } else { 0.0 };

        Self {
            trend: analyze_trend(window, window.len(), config),
            volatility,
            consolidating: is_consolidating(window, config.consolidation_threshold),
            avg_volume: average_volume(window),
            support: Some(window.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min)),
            resistance: Some(window.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max)),
        }
    }
}

/// Source of a series-wide [`MarketContext`]
pub trait ContextProvider: Send + Sync {
    fn compute<T: OHLCV>(&self, bars: &[T], config: &PatternConfig) -> MarketContext;
}

/// Summarizes the trailing `lookback` bars (the config's `trend_period` when unset)
#[derive(Debug, Clone, Default)]
pub struct DefaultContextProvider {
    pub lookback: Option<Period>,
}

impl ContextProvider for DefaultContextProvider {
    fn compute<T: OHLCV>(&self, bars: &[T], config: &PatternConfig) -> MarketContext {
        let lookback = self.lookback.map_or(config.trend_period, Period::get);
        MarketContext::from_window(trailing(bars, lookback), config)
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    fn closes(values: &[f64]) -> Vec<Bar> {
        values
            .iter()
            .map(|&c| Bar::new(c, c + 1.0, c - 1.0, c))
            .collect()
    }

    #[test]
    fn test_slope_of_linear_series() {
        let bars = closes(&[10.0, 12.0, 14.0, 16.0, 18.0]);
        assert!((calculate_trend(&bars, PriceField::Close) - 2.0).abs() < 1e-12);
        assert!((calculate_trend(&bars, PriceField::High) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_slope_needs_three_bars() {
        let bars = closes(&[10.0, 20.0]);
        assert_eq!(calculate_trend(&bars, PriceField::Close), 0.0);
    }

    #[test]
    fn test_analyze_trend_directions() {
        let config = PatternConfig::default();
        let up = closes(&[100.0, 102.0, 104.0, 106.0, 108.0]);
        let down = closes(&[108.0, 106.0, 104.0, 102.0, 100.0]);
        let flat = closes(&[100.0, 100.1, 99.9, 100.0, 100.05]);

        assert_eq!(analyze_trend(&up, 10, &config), TrendDirection::Uptrend);
        assert_eq!(analyze_trend(&down, 10, &config), TrendDirection::Downtrend);
        assert_eq!(analyze_trend(&flat, 10, &config), TrendDirection::Sideways);
        assert_eq!(analyze_trend(&up[..2], 10, &config), TrendDirection::Unknown);
    }

    #[test]
    fn test_analyze_trend_is_scale_invariant() {
        let config = PatternConfig::default();
        let base = [100.0, 100.5, 101.0, 101.5, 102.0];
        let scaled: Vec<f64> = base.iter().map(|c| c * 1000.0).collect();
        let small: Vec<f64> = base.iter().map(|c| c / 100.0).collect();

        let expected = analyze_trend(&closes(&base), 10, &config);
        assert_eq!(analyze_trend(&closes(&scaled), 10, &config), expected);
        assert_eq!(analyze_trend(&closes(&small), 10, &config), expected);
    }

    #[test]
    fn test_analyze_trend_uses_lookback_only() {
        let config = PatternConfig::default();
        let mut values = vec![200.0, 180.0, 160.0, 140.0, 120.0];
        values.extend([100.0, 102.0, 104.0, 106.0]);
        let bars = closes(&values);
        assert_eq!(analyze_trend(&bars, 4, &config), TrendDirection::Uptrend);
        assert_eq!(analyze_trend(&bars, 9, &config), TrendDirection::Downtrend);
    }

    #[test]
    fn test_extreme_zone() {
        let config = PatternConfig::default();
        let bars = closes(&[110.0, 108.0, 106.0, 104.0, 102.0, 100.0]);
        let last = bars[bars.len() - 1].clone();

        assert!(is_in_extreme_zone(&last, &bars, &config, ZoneSide::Low));
        assert!(!is_in_extreme_zone(&last, &bars, &config, ZoneSide::High));
        assert!(is_in_extreme_zone(&bars[0], &bars, &config, ZoneSide::High));

        let empty: Vec<Bar> = Vec::new();
        assert!(!is_in_extreme_zone(&last, &empty, &config, ZoneSide::Low));
    }

    #[test]
    fn test_consolidation() {
        let tight = closes(&[100.0, 100.5, 99.8, 100.2]);
        let wide = closes(&[100.0, 110.0, 95.0, 105.0]);
        assert!(is_consolidating(&tight, 0.05));
        assert!(!is_consolidating(&wide, 0.05));
        assert!(!is_consolidating(&tight[..2], 0.05));
    }

    #[test]
    fn test_volume_decrease() {
        let bars: Vec<Bar> = [1000.0, 900.0, 500.0, 400.0]
            .iter()
            .map(|&v| Bar::new(100.0, 101.0, 99.0, 100.0).with_volume(v))
            .collect();
        assert!(has_volume_decrease(&bars));

        let steady: Vec<Bar> = (0..4)
            .map(|_| Bar::new(100.0, 101.0, 99.0, 100.0).with_volume(1000.0))
            .collect();
        assert!(!has_volume_decrease(&steady));

        let none = closes(&[100.0, 101.0, 102.0, 103.0]);
        assert!(!has_volume_decrease(&none));
        assert_eq!(average_volume(&none), None);
        assert_eq!(average_volume(&steady), Some(1000.0));
    }

    #[test]
    fn test_market_context_from_window() {
        let config = PatternConfig::default();
        let bars = closes(&[100.0, 98.0, 96.0, 94.0, 92.0]);
        let ctx = MarketContext::from_window(&bars, &config);

        assert_eq!(ctx.trend, TrendDirection::Downtrend);
        assert_eq!(ctx.support, Some(91.0));
        assert_eq!(ctx.resistance, Some(101.0));
        assert!(ctx.volatility > 0.0);

        let provider = DefaultContextProvider { lookback: Some(Period::new_const(3)) };
        let ctx = provider.compute(&bars, &config);
        assert_eq!(ctx.support, Some(91.0));
        assert_eq!(ctx.resistance, Some(97.0));

        let empty: Vec<Bar> = Vec::new();
        assert_eq!(MarketContext::from_window(&empty, &config), MarketContext::default());
    }
}
