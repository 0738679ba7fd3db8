//! # candlescan
//!
//! Candlestick pattern classification over OHLC(V) series.
//!
//! Thirty-seven built-in patterns (single-bar shapes up to head-and-shoulders)
//! are checked at every bar of a series; matches carry a `'static` pattern
//! definition, the bar index and a heuristic confidence in `[0, 1]`.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlescan::prelude::*;
//!
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! let bars = vec![
//!     Bar::new(100.0, 100.0, 90.0, 95.0),
//!     Bar::new(95.5, 96.5, 94.5, 95.6),
//!     Bar::new(96.0, 130.0, 95.0, 128.0),
//! ];
//! for m in engine.scan(&bars).unwrap() {
//!     println!("{} at {} ({:.2})", m.pattern.en_name, m.matched_at, m.confidence);
//! }
//! ```
//!
//! Own bar types work too: implement [`OHLCV`] for them.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod config;
pub mod context;
pub mod detectors;
pub mod extrema;
pub mod params;
pub mod stats;

pub use cache::{CacheKey, CacheStats, PatternCache, SharedPatternCache, DEFAULT_CACHE_SIZE};
pub use config::{CandleShape, PatternConfig};
pub use context::{
    ContextProvider, DefaultContextProvider, MarketContext, PriceField, TrendDirection, ZoneSide,
};
pub use stats::PatternStatistics;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Parameters
        params::{ParamMeta, ParamType, Parameterized},
        // Parallel
        scan_parallel,
        // Types
        Bar,
        BarPatterns,
        // Engine
        BuiltinPattern,
        CacheStats,
        CandleShape,
        ContextProvider,
        DefaultContextProvider,
        DefaultEngine,
        Direction,
        // Core traits
        DynPatternDetector,
        EngineBuilder,
        EngineConfig,
        MarketContext,
        MatchInfo,
        OHLCVExt,
        PatternCategory,
        PatternConfig,
        PatternDefinition,
        PatternDetector,
        PatternEngine,
        // Errors
        PatternError,
        PatternId,
        PatternInput,
        PatternIterator,
        PatternMatch,
        PatternStatistics,
        PatternType,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        SignalStrength,
        TrendDirection,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors raised by configuration, validation and engine construction.
///
/// A pattern that does not match, or lacks history, is never an error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Value in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(PatternError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// One price bar. A non-positive volume means "unknown".
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

impl OHLCV for &dyn OHLCV {
    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (*self).timestamp()
    }
}

/// Bar geometry. Total over any input; malformed bars give meaningless but finite-in, finite-out values.
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn body_top(&self) -> f64 {
        self.open().max(self.close())
    }

    #[inline]
    fn body_bottom(&self) -> f64 {
        self.open().min(self.close())
    }

    #[inline]
    fn body_mid(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    #[inline]
    fn mid_price(&self) -> f64 {
        (self.high() + self.low()) / 2.0
    }

    /// Green bar
    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    /// Red bar
    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. `None` if range ≈ 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    #[inline]
    fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_shadow() / range)
    }

    #[inline]
    fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_shadow() / range)
    }

    /// Check the bar is well formed. The reported index is always 0; the engine remaps it.
    fn validate(&self) -> Result<()> {
        let (open, high, low, close) = (self.open(), self.high(), self.low(), self.close());
        if [open, high, low, close].iter().any(|v| v.is_nan()) {
            return Err(PatternError::InvalidOHLCV { index: 0, reason: "NaN in OHLCV" });
        }
        if [open, high, low, close].iter().any(|v| v.is_infinite()) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if high < low {
            return Err(PatternError::InvalidOHLCV { index: 0, reason: "high < low" });
        }
        if high < open.max(close) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "high < max(open, close)",
            });
        }
        if low > open.min(close) {
            return Err(PatternError::InvalidOHLCV {
                index: 0,
                reason: "low > min(open, close)",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// BAR
// ============================================================

/// Owned bar for JSON interchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { date: None, open, high, low, close, volume: None }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

impl OHLCV for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume.unwrap_or(0.0)
    }
}

// ============================================================
// PATTERN METADATA
// ============================================================

/// Unique identifier for a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for PatternId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatternType {
    Reversal,
    Continuation,
    Indecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

/// Category of pattern by number of bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PatternCategory {
    SingleBar,
    TwoBar,
    ThreeBar,
    MultiBar,
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

/// Immutable identity and classification of a pattern
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDefinition {
    pub id: PatternId,
    /// Localized display name
    pub name: &'static str,
    pub en_name: &'static str,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub strength: SignalStrength,
    /// `None` for direction-agnostic patterns
    pub bullish: Option<bool>,
    pub category: PatternCategory,
    pub description: &'static str,
    pub detail: &'static str,
}

impl PatternDefinition {
    pub fn direction(&self) -> Direction {
        match self.bullish {
            Some(true) => Direction::Bullish,
            Some(false) => Direction::Bearish,
            None => Direction::Neutral,
        }
    }
}

// ============================================================
// PATTERN INPUT
// ============================================================

/// Positional arguments of every check: the current bar, up to two
/// predecessors, the trailing window ending at `current` and an optional context.
#[derive(Debug)]
pub struct PatternInput<'a, T> {
    pub current: &'a T,
    pub prev: Option<&'a T>,
    pub prev2: Option<&'a T>,
    pub series: &'a [T],
    pub context: Option<&'a MarketContext>,
}

impl<T> Clone for PatternInput<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PatternInput<'_, T> {}

impl<'a, T> PatternInput<'a, T> {
    /// Lone bar with no history.
    pub fn new(current: &'a T) -> Self {
        Self {
            current,
            prev: None,
            prev2: None,
            series: std::slice::from_ref(current),
            context: None,
        }
    }

    pub fn with_prev(mut self, prev: &'a T) -> Self {
        self.prev = Some(prev);
        self
    }

    pub fn with_prev2(mut self, prev2: &'a T) -> Self {
        self.prev2 = Some(prev2);
        self
    }

    /// Trailing window; its last element should be `current`. Empty windows are ignored.
    pub fn with_series(mut self, series: &'a [T]) -> Self {
        if !series.is_empty() {
            self.series = series;
        }
        self
    }

    pub fn with_context(mut self, context: &'a MarketContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Input for `bars[index]` with a trailing window of at most `lookback` bars.
    pub fn at(bars: &'a [T], index: usize, lookback: usize) -> Option<Self> {
        let current = bars.get(index)?;
        let start = (index + 1).saturating_sub(lookback.max(1));
        Some(Self {
            current,
            prev: index.checked_sub(1).and_then(|i| bars.get(i)),
            prev2: index.checked_sub(2).and_then(|i| bars.get(i)),
            series: &bars[start..=index],
            context: None,
        })
    }

    /// Trailing window, `current` included.
    #[inline]
    pub fn history(&self) -> &'a [T] {
        self.series
    }
}

// ============================================================
// PATTERN MATCH
// ============================================================

/// Typed corroborating facts attached to a match
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    /// Current volume over its 5-bar trailing mean
    pub volume_ratio: Option<f64>,
    pub trend_context: Option<TrendDirection>,
}

impl MatchInfo {
    /// Facts about a match spanning the last `pattern_len` bars of `input`.
    pub fn from_input<T: OHLCV>(
        input: &PatternInput<'_, T>,
        pattern_len: usize,
        config: &PatternConfig,
    ) -> Self {
        let trend_context = match input.context {
            Some(ctx) => Some(ctx.trend),
            None => {
                let trend = detectors::helpers::preceding_trend(input, pattern_len, config);
                trend.is_known().then_some(trend)
            }
        };
        Self {
            volume_ratio: detectors::helpers::volume_ratio(input.history()),
            trend_context,
        }
    }
}

/// One matched pattern at one bar
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternMatch {
    pub pattern: &'static PatternDefinition,
    pub matched_at: usize,
    /// Heuristic score in `0.0..=1.0`
    pub confidence: f64,
    pub info: MatchInfo,
}

impl PatternMatch {
    #[inline]
    pub fn id(&self) -> PatternId {
        self.pattern.id
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.pattern.direction()
    }
}

// ============================================================
// PATTERN DETECTOR TRAITS
// ============================================================

/// Generic pattern detector trait - for concrete types
pub trait PatternDetector: Send + Sync {
    fn definition(&self) -> &'static PatternDefinition;

    /// Bars needed up to and including the current one.
    fn min_bars(&self) -> usize;

    /// Trailing window length the detector consults.
    fn lookback(&self, _config: &PatternConfig) -> usize {
        self.min_bars()
    }

    /// Bars the pattern itself spans. The prevailing trend is read from the bars before them.
    fn pattern_len(&self) -> usize {
        self.min_bars()
    }

    fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool;

    /// Only meaningful after `check` returned true.
    fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64;

    fn id(&self) -> PatternId {
        self.definition().id
    }
}

/// Object-safe pattern detector trait - for custom detectors
pub trait DynPatternDetector: Send + Sync {
    fn definition(&self) -> &'static PatternDefinition;
    fn min_bars(&self) -> usize;
    fn lookback(&self, config: &PatternConfig) -> usize;

    fn pattern_len(&self) -> usize {
        self.min_bars()
    }

    fn check(&self, input: &PatternInput<'_, &dyn OHLCV>, config: &PatternConfig) -> bool;
    fn confidence(&self, input: &PatternInput<'_, &dyn OHLCV>, config: &PatternConfig) -> f64;

    fn id(&self) -> PatternId {
        self.definition().id
    }
}

impl<D: PatternDetector> DynPatternDetector for D {
    fn definition(&self) -> &'static PatternDefinition {
        PatternDetector::definition(self)
    }

    fn min_bars(&self) -> usize {
        PatternDetector::min_bars(self)
    }

    fn lookback(&self, config: &PatternConfig) -> usize {
        PatternDetector::lookback(self, config)
    }

    fn pattern_len(&self) -> usize {
        PatternDetector::pattern_len(self)
    }

    fn check(&self, input: &PatternInput<'_, &dyn OHLCV>, config: &PatternConfig) -> bool {
        PatternDetector::check(self, input, config)
    }

    fn confidence(&self, input: &PatternInput<'_, &dyn OHLCV>, config: &PatternConfig) -> f64 {
        PatternDetector::confidence(self, input, config)
    }
}

// ============================================================
// BUILTIN PATTERNS - generated via macro
// ============================================================

use detectors::*;

/// Generate the `BuiltinPattern` enum and its static dispatch.
macro_rules! define_builtin_patterns {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinPattern {
            $($variant($detector)),*
        }

        impl BuiltinPattern {
            /// Every builtin pattern, in catalog order.
            pub fn all() -> Vec<BuiltinPattern> {
                vec![$(BuiltinPattern::$variant(Default::default())),*]
            }

            #[inline]
            pub fn definition(&self) -> &'static PatternDefinition {
                match self {
                    $(Self::$variant(d) => PatternDetector::definition(d)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                self.definition().id
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            #[inline]
            pub fn lookback(&self, config: &PatternConfig) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::lookback(d, config)),*
                }
            }

            #[inline]
            pub fn pattern_len(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::pattern_len(d)),*
                }
            }

            #[inline]
            pub fn check<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> bool {
                match self {
                    $(Self::$variant(d) => PatternDetector::check(d, input, config)),*
                }
            }

            #[inline]
            pub fn confidence<T: OHLCV>(&self, input: &PatternInput<'_, T>, config: &PatternConfig) -> f64 {
                match self {
                    $(Self::$variant(d) => PatternDetector::confidence(d, input, config)),*
                }
            }
        }
    };
}

define_builtin_patterns! {
    // Single bar (13)
    Doji(DojiDetector),
    Hammer(HammerDetector),
    HangingMan(HangingManDetector),
    ShootingStar(ShootingStarDetector),
    InvertedHammer(InvertedHammerDetector),
    BigGreenCandle(BigGreenCandleDetector),
    BigRedCandle(BigRedCandleDetector),
    SpinningTop(SpinningTopDetector),
    BeltHold(BeltHoldDetector),
    GravestoneDoji(GravestoneDojiDetector),
    DragonflyDoji(DragonflyDojiDetector),
    BullishMarubozu(BullishMarubozuDetector),
    BearishMarubozu(BearishMarubozuDetector),

    // Two bar (8)
    BullishEngulfing(BullishEngulfingDetector),
    BearishEngulfing(BearishEngulfingDetector),
    PiercingLine(PiercingLineDetector),
    DarkCloudCover(DarkCloudCoverDetector),
    Harami(HaramiDetector),
    HaramiCross(HaramiCrossDetector),
    TweezersTop(TweezersTopDetector),
    TweezersBottom(TweezersBottomDetector),

    // Three bar (6)
    MorningStar(MorningStarDetector),
    EveningStar(EveningStarDetector),
    ThreeWhiteSoldiers(ThreeWhiteSoldiersDetector),
    ThreeBlackCrows(ThreeBlackCrowsDetector),
    RisingThreeMethods(RisingThreeMethodsDetector),
    FallingThreeMethods(FallingThreeMethodsDetector),

    // Multi-bar (10)
    BullFlag(BullFlagDetector),
    BearFlag(BearFlagDetector),
    AscendingPennant(AscendingPennantDetector),
    DescendingPennant(DescendingPennantDetector),
    RisingWedge(RisingWedgeDetector),
    FallingWedge(FallingWedgeDetector),
    DoubleBottom(DoubleBottomDetector),
    DoubleTop(DoubleTopDetector),
    HeadAndShouldersTop(HeadAndShouldersTopDetector),
    HeadAndShouldersBottom(HeadAndShouldersBottomDetector),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub patterns: PatternConfig,
    pub enable_cache: bool,
    pub cache_size: usize,
    /// Minimum number of indices per rayon task in [`PatternEngine::scan_par`]
    pub batch_size: usize,
    pub include_weak_signals: bool,
    pub min_confidence: Option<f64>,
    pub pattern_filter: Option<Vec<PatternId>>,
    pub type_filter: Option<Vec<PatternType>>,
    pub validate_data: bool,
    /// Compute one [`MarketContext`] per series and hand it to every check
    pub shared_context: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            patterns: PatternConfig::default(),
            enable_cache: true,
            cache_size: DEFAULT_CACHE_SIZE,
            batch_size: 64,
            include_weak_signals: true,
            min_confidence: None,
            pattern_filter: None,
            type_filter: None,
            validate_data: false,
            shared_context: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        self.patterns.validate()?;
        if self.cache_size == 0 {
            return Err(PatternError::InvalidConfig("cache_size must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(PatternError::InvalidConfig("batch_size must be > 0".into()));
        }
        if let Some(min) = self.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(PatternError::OutOfRange {
                    field: "min_confidence",
                    value: min,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        Ok(())
    }
}

/// Scan driver: runs every registered detector at every admissible bar
pub struct PatternEngine<C: ContextProvider = DefaultContextProvider> {
    builtin: Vec<BuiltinPattern>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    context_provider: C,
    config: EngineConfig,
    fingerprint: u64,
    cache: Option<SharedPatternCache>,
}

impl<C: ContextProvider> PatternEngine<C> {
    // ===========================================
    // LOW-LEVEL: Primitives
    // ===========================================

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Definitions of every registered pattern, in evaluation order.
    pub fn patterns(&self) -> Vec<&'static PatternDefinition> {
        self.builtin
            .iter()
            .map(BuiltinPattern::definition)
            .chain(self.custom.iter().map(|d| d.definition()))
            .collect()
    }

    /// Series-wide context from the engine's provider.
    #[inline]
    pub fn compute_context<T: OHLCV>(&self, bars: &[T]) -> MarketContext {
        self.context_provider.compute(bars, &self.config.patterns)
    }

    /// Drop memoized results, e.g. between unrelated series.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(SharedPatternCache::stats)
    }

    // ===========================================
    // MID-LEVEL: Single-bar / Range
    // ===========================================

    /// Detect patterns at a single bar index.
    pub fn scan_at<T: OHLCV>(
        &self,
        bars: &[T],
        index: usize,
        ctx: Option<&MarketContext>,
    ) -> Vec<PatternMatch> {
        if self.custom.is_empty() {
            self.scan_at_internal(bars, &[], index, ctx)
        } else {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            self.scan_at_internal(bars, &bar_refs, index, ctx)
        }
    }

    /// Detect patterns in a range of bars.
    pub fn scan_range<T: OHLCV>(
        &self,
        bars: &[T],
        range: std::ops::Range<usize>,
        ctx: Option<&MarketContext>,
    ) -> Vec<PatternMatch> {
        let range = range.start.min(bars.len())..range.end.min(bars.len());
        let mut results = Vec::new();

        if self.custom.is_empty() {
            for i in range {
                results.extend(self.scan_at_internal(bars, &[], i, ctx));
            }
        } else {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            for i in range {
                results.extend(self.scan_at_internal(bars, &bar_refs, i, ctx));
            }
        }

        results
    }

    // ===========================================
    // HIGH-LEVEL: Batch processing
    // ===========================================

    /// Scan all bars and return flat list of patterns.
    pub fn scan<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<PatternMatch>> {
        self.validate_bars(bars)?;

        let ctx = self.shared_context(bars);
        let matches = self.scan_range(bars, 0..bars.len(), ctx.as_ref());
        debug!("scanned {} bars, {} matches", bars.len(), matches.len());
        Ok(matches)
    }

    /// Scan all bars with a caller-supplied context.
    pub fn scan_with_context<T: OHLCV>(
        &self,
        bars: &[T],
        ctx: &MarketContext,
    ) -> Result<Vec<PatternMatch>> {
        self.validate_bars(bars)?;

        let matches = self.scan_range(bars, 0..bars.len(), Some(ctx));
        debug!(
            "scanned {} bars with {:?} context, {} matches",
            bars.len(),
            ctx.trend,
            matches.len()
        );
        Ok(matches)
    }

    /// Scan and return patterns grouped by bar index.
    pub fn scan_grouped<T: OHLCV>(&self, bars: &[T]) -> Result<Vec<Vec<PatternMatch>>> {
        self.validate_bars(bars)?;

        let ctx = self.shared_context(bars);
        let grouped = if self.custom.is_empty() {
            (0..bars.len())
                .map(|i| self.scan_at_internal(bars, &[], i, ctx.as_ref()))
                .collect()
        } else {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            (0..bars.len())
                .map(|i| self.scan_at_internal(bars, &bar_refs, i, ctx.as_ref()))
                .collect()
        };

        Ok(grouped)
    }

    /// Index-parallel scan. Same output, same order as [`scan`](Self::scan).
    pub fn scan_par<T>(&self, bars: &[T]) -> Result<Vec<PatternMatch>>
    where
        T: OHLCV + Sync,
        C: Sync,
    {
        self.validate_bars(bars)?;

        let ctx = self.shared_context(bars);
        let ctx = ctx.as_ref();
        let batch = self.config.batch_size;

        let grouped: Vec<Vec<PatternMatch>> = if self.custom.is_empty() {
            (0..bars.len())
                .into_par_iter()
                .with_min_len(batch)
                .map(|i| self.scan_at_internal(bars, &[], i, ctx))
                .collect()
        } else {
            (0..bars.len())
                .into_par_iter()
                .with_min_len(batch)
                .map_init(
                    || bars.iter().map(|b| b as &dyn OHLCV).collect::<Vec<_>>(),
                    |bar_refs, i| self.scan_at_internal(bars, bar_refs, i, ctx),
                )
                .collect()
        };

        let matches: Vec<PatternMatch> = grouped.into_iter().flatten().collect();
        debug!("scanned {} bars in parallel, {} matches", bars.len(), matches.len());
        Ok(matches)
    }

    /// Create an iterator over bars with their patterns.
    pub fn iter<'a, T: OHLCV>(&'a self, bars: &'a [T]) -> PatternIterator<'a, T, C> {
        PatternIterator::new(self, bars)
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn shared_context<T: OHLCV>(&self, bars: &[T]) -> Option<MarketContext> {
        self.config.shared_context.then(|| self.compute_context(bars))
    }

    fn scan_at_internal<T: OHLCV>(
        &self,
        bars: &[T],
        bar_refs: &[&dyn OHLCV],
        index: usize,
        ctx: Option<&MarketContext>,
    ) -> Vec<PatternMatch> {
        let config = &self.config.patterns;
        let mut results = Vec::new();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if index + 1 < detector.min_bars() {
                continue;
            }
            let Some(input) = PatternInput::at(bars, index, detector.lookback(config)) else {
                continue;
            };
            let input = PatternInput { context: ctx, ..input };
            if !self.memoized(detector.id(), &input, || detector.check(&input, config)) {
                continue;
            }
            let confidence = detector.confidence(&input, config);
            self.push_if_included(
                &mut results,
                detector.definition(),
                detector.pattern_len(),
                index,
                confidence,
                &input,
            );
        }

        // Slow path: custom detectors (vtable)
        if !self.custom.is_empty() && !bar_refs.is_empty() {
            for detector in &self.custom {
                if index + 1 < detector.min_bars() {
                    continue;
                }
                let Some(input) = PatternInput::at(bar_refs, index, detector.lookback(config)) else {
                    continue;
                };
                let input = PatternInput { context: ctx, ..input };
                if !self.memoized(detector.id(), &input, || detector.check(&input, config)) {
                    continue;
                }
                let confidence = detector.confidence(&input, config);
                self.push_if_included(
                    &mut results,
                    detector.definition(),
                    detector.pattern_len(),
                    index,
                    confidence,
                    &input,
                );
            }
        }

        results
    }

    fn memoized<T: OHLCV>(
        &self,
        id: PatternId,
        input: &PatternInput<'_, T>,
        check: impl FnOnce() -> bool,
    ) -> bool {
        match &self.cache {
            Some(cache) => cache.evaluate(CacheKey::new(id, input, self.fingerprint), check),
            None => check(),
        }
    }

    fn push_if_included<T: OHLCV>(
        &self,
        results: &mut Vec<PatternMatch>,
        pattern: &'static PatternDefinition,
        pattern_len: usize,
        index: usize,
        confidence: f64,
        input: &PatternInput<'_, T>,
    ) {
        let m = PatternMatch {
            pattern,
            matched_at: index,
            confidence: detectors::helpers::unit(confidence),
            info: MatchInfo::from_input(input, pattern_len, &self.config.patterns),
        };
        if self.should_include(&m) {
            results.push(m);
        }
    }

    fn should_include(&self, m: &PatternMatch) -> bool {
        if !self.config.include_weak_signals && m.pattern.strength == SignalStrength::Weak {
            return false;
        }
        if let Some(min) = self.config.min_confidence {
            if m.confidence < min {
                return false;
            }
        }
        if let Some(ref filter) = self.config.pattern_filter {
            if !filter.contains(&m.pattern.id) {
                return false;
            }
        }
        if let Some(ref types) = self.config.type_filter {
            if !types.contains(&m.pattern.pattern_type) {
                return false;
            }
        }
        true
    }

    fn validate_bars<T: OHLCV>(&self, bars: &[T]) -> Result<()> {
        if !self.config.validate_data {
            return Ok(());
        }
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidOHLCV { reason, .. } => {
                    warn!("rejecting series: bar {} is malformed ({})", i, reason);
                    PatternError::InvalidOHLCV { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

// ============================================================
// PATTERN ITERATOR
// ============================================================

/// Patterns found at a specific bar
#[derive(Debug, Clone)]
pub struct BarPatterns {
    pub index: usize,
    pub patterns: Vec<PatternMatch>,
}

/// Iterator over bars with their patterns
pub struct PatternIterator<'a, T: OHLCV, C: ContextProvider> {
    engine: &'a PatternEngine<C>,
    bars: &'a [T],
    bar_refs: Vec<&'a dyn OHLCV>,
    context: Option<MarketContext>,
    current: usize,
}

impl<'a, T: OHLCV, C: ContextProvider> PatternIterator<'a, T, C> {
    fn new(engine: &'a PatternEngine<C>, bars: &'a [T]) -> Self {
        let bar_refs = if engine.custom.is_empty() {
            Vec::new()
        } else {
            bars.iter().map(|b| b as &dyn OHLCV).collect()
        };

        Self {
            engine,
            bars,
            bar_refs,
            context: engine.shared_context(bars),
            current: 0,
        }
    }
}

impl<'a, T: OHLCV, C: ContextProvider> Iterator for PatternIterator<'a, T, C> {
    type Item = BarPatterns;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.bars.len() {
            return None;
        }

        let index = self.current;
        let patterns = self.engine.scan_at_internal(
            self.bars,
            &self.bar_refs,
            index,
            self.context.as_ref(),
        );

        self.current += 1;

        Some(BarPatterns { index, patterns })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bars.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl<'a, T: OHLCV, C: ContextProvider> ExactSizeIterator for PatternIterator<'a, T, C> {}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder<C: ContextProvider = DefaultContextProvider> {
    context_provider: C,
    builtin: Vec<BuiltinPattern>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    config: EngineConfig,
}

impl Default for EngineBuilder<DefaultContextProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder<DefaultContextProvider> {
    pub fn new() -> Self {
        Self {
            context_provider: DefaultContextProvider::default(),
            builtin: Vec::new(),
            custom: Vec::new(),
            config: EngineConfig::default(),
        }
    }
}

/// Generate an array of `BuiltinPattern` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinPattern::$variant(Default::default())),*]
  };
}

impl<C: ContextProvider> EngineBuilder<C> {
    /// Change context provider
    pub fn context_provider<C2: ContextProvider>(self, provider: C2) -> EngineBuilder<C2> {
        EngineBuilder {
            context_provider: provider,
            builtin: self.builtin,
            custom: self.custom,
            config: self.config,
        }
    }

    /// Add the whole catalog, in catalog order
    pub fn with_all_defaults(self) -> Self {
        self.with_single_bar_defaults()
            .with_two_bar_defaults()
            .with_three_bar_defaults()
            .with_multi_bar_defaults()
    }

    /// Add single-bar patterns (13)
    pub fn with_single_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            Doji,
            Hammer,
            HangingMan,
            ShootingStar,
            InvertedHammer,
            BigGreenCandle,
            BigRedCandle,
            SpinningTop,
            BeltHold,
            GravestoneDoji,
            DragonflyDoji,
            BullishMarubozu,
            BearishMarubozu,
        ]);
        self
    }

    /// Add two-bar patterns (8)
    pub fn with_two_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            BullishEngulfing,
            BearishEngulfing,
            PiercingLine,
            DarkCloudCover,
            Harami,
            HaramiCross,
            TweezersTop,
            TweezersBottom,
        ]);
        self
    }

    /// Add three-bar patterns (6)
    pub fn with_three_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            MorningStar,
            EveningStar,
            ThreeWhiteSoldiers,
            ThreeBlackCrows,
            RisingThreeMethods,
            FallingThreeMethods,
        ]);
        self
    }

    /// Add flags, pennants, wedges, double tops/bottoms and head-and-shoulders (10)
    pub fn with_multi_bar_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            BullFlag,
            BearFlag,
            AscendingPennant,
            DescendingPennant,
            RisingWedge,
            FallingWedge,
            DoubleBottom,
            DoubleTop,
            HeadAndShouldersTop,
            HeadAndShouldersBottom,
        ]);
        self
    }

    /// Add a builtin pattern
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, pattern: BuiltinPattern) -> Self {
        self.builtin.push(pattern);
        self
    }

    /// Add a custom detector (slow path, evaluated after every builtin)
    pub fn add_custom<D: DynPatternDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    pub fn pattern_config(mut self, config: PatternConfig) -> Self {
        self.config.patterns = config;
        self
    }

    pub fn enable_cache(mut self, enable: bool) -> Self {
        self.config.enable_cache = enable;
        self
    }

    pub fn cache_size(mut self, size: usize) -> Self {
        self.config.cache_size = size;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Drop matches scoring below `confidence`
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.config.min_confidence = Some(confidence);
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, ids: impl IntoIterator<Item = PatternId>) -> Self {
        self.config.pattern_filter = Some(ids.into_iter().collect());
        self
    }

    /// Filter to specific pattern types only
    pub fn only_types(mut self, types: impl IntoIterator<Item = PatternType>) -> Self {
        self.config.type_filter = Some(types.into_iter().collect());
        self
    }

    pub fn include_weak_signals(mut self, include: bool) -> Self {
        self.config.include_weak_signals = include;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    pub fn shared_context(mut self, enable: bool) -> Self {
        self.config.shared_context = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine<C>> {
        self.config.validate()?;

        let mut seen = std::collections::HashSet::new();
        let ids = self
            .builtin
            .iter()
            .map(BuiltinPattern::id)
            .chain(self.custom.iter().map(|d| d.id()));
        for id in ids {
            if !seen.insert(id) {
                return Err(PatternError::InvalidConfig(format!("duplicate pattern id {id}")));
            }
        }

        let cache = if self.config.enable_cache {
            Some(SharedPatternCache::new(self.config.cache_size)?)
        } else {
            None
        };

        debug!(
            "pattern engine built: {} patterns, cache {}",
            seen.len(),
            cache.as_ref().map_or("disabled".to_string(), |_| self.config.cache_size.to_string())
        );

        Ok(PatternEngine {
            builtin: self.builtin,
            custom: self.custom,
            context_provider: self.context_provider,
            fingerprint: self.config.patterns.fingerprint(),
            config: self.config,
            cache,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<PatternMatch>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Screener: scan many instruments in parallel, one scan per `(symbol, bars)` pair
pub fn scan_parallel<'a, T, I, C>(
    engine: &PatternEngine<C>,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
    C: ContextProvider + Sync,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .scan(bars)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TYPE ALIASES
// ============================================================

/// Default engine with DefaultContextProvider
pub type DefaultEngine = PatternEngine<DefaultContextProvider>;

// ============================================================
// TESTS
// ============================================================
