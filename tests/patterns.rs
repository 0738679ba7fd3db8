//! Integration tests for the candlescan pattern catalog and scan driver.

use candlescan::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c, v: 1000.0 }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        self.v
    }
}

/// Generate downtrend bars
fn make_downtrend(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let base = 100.0 - (i as f64) * 2.0;
            TestBar::new(base + 1.0, base + 2.0, base - 1.0, base - 0.5)
        })
        .collect()
}

/// Generate uptrend bars
fn make_uptrend(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let base = 100.0 + (i as f64) * 2.0;
            TestBar::new(base - 0.5, base + 1.5, base - 1.5, base + 1.0)
        })
        .collect()
}

fn engine() -> DefaultEngine {
    EngineBuilder::new().with_all_defaults().build().unwrap()
}

fn ids_at(matches: &[PatternMatch], index: usize) -> Vec<&'static str> {
    matches
        .iter()
        .filter(|m| m.matched_at == index)
        .map(|m| m.id().as_str())
        .collect()
}

fn find<'a>(matches: &'a [PatternMatch], id: &str, index: usize) -> Option<&'a PatternMatch> {
    matches
        .iter()
        .find(|m| m.id().as_str() == id && m.matched_at == index)
}

// ============================================================
// CATALOG
// ============================================================

#[test]
fn test_catalog_shape() {
    let patterns = engine().patterns();
    assert_eq!(patterns.len(), 37);

    let count = |category| patterns.iter().filter(|p| p.category == category).count();
    assert_eq!(count(PatternCategory::SingleBar), 13);
    assert_eq!(count(PatternCategory::TwoBar), 8);
    assert_eq!(count(PatternCategory::ThreeBar), 6);
    assert_eq!(count(PatternCategory::MultiBar), 10);

    let mut ids: Vec<&str> = patterns.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 37);

    for p in &patterns {
        assert!(!p.name.is_empty() && !p.en_name.is_empty(), "{} unnamed", p.id);
        assert!(!p.description.is_empty(), "{} undescribed", p.id);
    }
}

#[test]
fn test_catalog_directions() {
    let patterns = engine().patterns();
    let direction = |id: &str| {
        patterns
            .iter()
            .find(|p| p.id.as_str() == id)
            .map(|p| p.direction())
            .unwrap()
    };

    assert_eq!(direction("HAMMER"), Direction::Bullish);
    assert_eq!(direction("EVENING_STAR"), Direction::Bearish);
    assert_eq!(direction("DOJI"), Direction::Neutral);
    assert_eq!(direction("DOUBLE_BOTTOM"), Direction::Bullish);
    assert_eq!(direction("HEAD_AND_SHOULDERS_TOP"), Direction::Bearish);
}

// ============================================================
// SCENARIOS
// ============================================================

#[test]
fn test_morning_star() {
    let bars = vec![
        TestBar::new(100.0, 100.0, 90.0, 95.0),
        TestBar::new(95.5, 96.5, 94.5, 95.6),
        TestBar::new(96.0, 130.0, 95.0, 128.0),
    ];
    let matches = engine().scan(&bars).unwrap();

    let star = find(&matches, "MORNING_STAR", 2).expect("morning star at bar 2");
    assert!((star.confidence - 0.85).abs() < 1e-9);
    assert_eq!(star.pattern.en_name, "Morning Star");
    assert!(find(&matches, "EVENING_STAR", 2).is_none());
}

#[test]
fn test_hammer_needs_no_prev_but_hanging_man_does() {
    let bars = vec![TestBar::new(100.0, 100.5, 80.0, 99.0)];
    let ctx = MarketContext::with_trend(TrendDirection::Downtrend);
    let matches = engine().scan_with_context(&bars, &ctx).unwrap();

    let ids = ids_at(&matches, 0);
    assert!(ids.contains(&"HAMMER"));
    assert!(!ids.contains(&"HANGING_MAN"));
}

#[test]
fn test_hammer_in_uptrend_context_is_rejected() {
    let bars = vec![TestBar::new(100.0, 100.5, 80.0, 99.0)];
    let ctx = MarketContext::with_trend(TrendDirection::Uptrend);
    let matches = engine().scan_with_context(&bars, &ctx).unwrap();

    assert!(!ids_at(&matches, 0).contains(&"HAMMER"));
}

#[test]
fn test_hammer_after_downtrend() {
    let mut bars = make_downtrend(20);
    bars.push(TestBar::new(59.5, 59.6, 55.0, 59.3));

    let matches = engine().scan(&bars).unwrap();
    let hammer = find(&matches, "HAMMER", 20).expect("hammer at the end of the decline");
    assert_eq!(hammer.info.trend_context, Some(TrendDirection::Downtrend));
    assert!(hammer.confidence > 0.0 && hammer.confidence <= 1.0);
}

#[test]
fn test_harami_is_capped() {
    let bars = vec![
        TestBar::new(110.0, 112.0, 98.0, 100.0),
        TestBar::new(102.0, 107.0, 100.5, 103.5),
    ];
    let matches = engine().scan(&bars).unwrap();

    let harami = find(&matches, "HARAMI", 1).expect("harami at bar 1");
    assert_eq!(harami.pattern.strength, SignalStrength::Weak);
    assert!((harami.confidence - 0.625).abs() < 1e-9);
    assert!(harami.confidence <= 0.8);
}

#[test]
fn test_flat_series_matches_nothing() {
    let bars = vec![TestBar::new(100.0, 100.0, 100.0, 100.0); 50];
    assert!(engine().scan(&bars).unwrap().is_empty());
}

#[test]
fn test_short_series_is_not_an_error() {
    let bars = vec![TestBar::new(100.0, 101.0, 99.0, 100.5)];
    let engine = EngineBuilder::new()
        .with_three_bar_defaults()
        .with_multi_bar_defaults()
        .build()
        .unwrap();
    assert!(engine.scan(&bars).unwrap().is_empty());
}

#[test]
fn test_bullish_engulfing_after_decline() {
    let mut bars = make_downtrend(12);
    bars.push(TestBar::new(77.5, 78.0, 76.0, 76.5));
    bars.push(TestBar::new(76.0, 79.5, 75.5, 79.0));

    let matches = engine().scan(&bars).unwrap();
    assert!(find(&matches, "BULLISH_ENGULFING", 13).is_some());
    assert!(find(&matches, "BEARISH_ENGULFING", 13).is_none());
}

#[test]
fn test_grouped_scan_matches_flat_scan() {
    let mut bars = make_uptrend(15);
    bars.extend(make_downtrend(15));
    let matches = engine().scan(&bars).unwrap();

    let grouped = engine().scan_grouped(&bars).unwrap();
    let flattened: usize = grouped.iter().map(Vec::len).sum();
    assert_eq!(flattened, matches.len());
}

#[test]
fn test_indecision_and_directional_match_together() {
    // a dragonfly doji at the trailing low is both a doji and a dragonfly doji
    let mut bars = make_downtrend(12);
    bars.push(TestBar::new(75.0, 75.02, 70.0, 75.0));

    let matches = engine().scan(&bars).unwrap();
    let ids = ids_at(&matches, 12);
    assert!(ids.contains(&"DOJI"));
    assert!(ids.contains(&"DRAGONFLY_DOJI"));
}

// ============================================================
// DOUBLE BOTTOM
// ============================================================

fn double_bottom_series(final_close: f64) -> Vec<TestBar> {
    let mut bars: Vec<TestBar> = (0..8)
        .map(|k| {
            let o = 121.0 - 2.0 * k as f64;
            let c = 119.0 - 2.0 * k as f64;
            TestBar::new(o, o + 0.5, c - 0.5, c)
        })
        .collect();

    bars.extend([
        TestBar::new(104.0, 104.5, 100.0, 101.0),
        TestBar::new(101.0, 104.5, 100.8, 104.0),
        TestBar::new(104.0, 107.5, 103.5, 107.0),
        TestBar::new(107.0, 109.5, 106.5, 109.0),
        TestBar::new(109.0, 110.5, 108.0, 108.5),
        TestBar::new(108.0, 108.5, 104.5, 105.0),
        TestBar::new(105.0, 105.5, 102.5, 103.0),
        TestBar::new(103.0, 103.5, 101.2, 102.0),
        TestBar::new(102.0, 102.5, 101.0, 101.5),
        TestBar::new(101.5, 102.0, 100.8, 101.0),
        TestBar::new(101.0, 102.0, 100.5, 101.5),
        TestBar::new(101.5, 104.5, 101.2, 104.0),
        TestBar::new(104.0, 107.5, 103.5, 107.0),
        TestBar::new(107.0, 110.0, 106.5, 109.5),
        TestBar::new(109.5, 112.0, 109.0, final_close),
    ]);
    bars
}

#[test]
fn test_double_bottom_breakout() {
    let bars = double_bottom_series(111.5);
    assert_eq!(bars.len(), 23);

    let matches = engine().scan(&bars).unwrap();
    let found = find(&matches, "DOUBLE_BOTTOM", 22).expect("double bottom at the breakout");
    assert!(found.confidence >= 0.65);
    assert!(found.confidence <= 1.0);
}

#[test]
fn test_double_bottom_without_breakout() {
    let bars = double_bottom_series(110.0);
    let matches = engine().scan(&bars).unwrap();
    assert!(find(&matches, "DOUBLE_BOTTOM", 22).is_none());
}

// ============================================================
// ENGINE SURFACE
// ============================================================

#[test]
fn test_filters_do_not_suppress_other_patterns() {
    let bars = vec![
        TestBar::new(100.0, 100.0, 90.0, 95.0),
        TestBar::new(95.5, 96.5, 94.5, 95.6),
        TestBar::new(96.0, 130.0, 95.0, 128.0),
    ];
    let all = engine().scan(&bars).unwrap();
    let only_star = EngineBuilder::new()
        .with_all_defaults()
        .only_patterns([PatternId("MORNING_STAR")])
        .build()
        .unwrap()
        .scan(&bars)
        .unwrap();

    assert_eq!(only_star.len(), 1);
    let star = find(&all, "MORNING_STAR", 2).unwrap();
    assert_eq!(star.confidence, only_star[0].confidence);
}

#[test]
fn test_statistics_summarize_scan() {
    let mut bars = make_downtrend(20);
    bars.push(TestBar::new(59.5, 59.6, 55.0, 59.3));
    let matches = engine().scan(&bars).unwrap();

    let stats = PatternStatistics::from_matches(&matches);
    assert_eq!(stats.total, matches.len());
    assert_eq!(stats.by_type.values().sum::<usize>(), matches.len());
    assert!(stats.by_pattern.contains_key("HAMMER"));
    assert!(stats.mean_confidence > 0.0 && stats.mean_confidence <= 1.0);
}

#[test]
fn test_screener_over_instruments() {
    let down = make_downtrend(30);
    let up = make_uptrend(30);
    let engine = EngineBuilder::new()
        .with_all_defaults()
        .min_confidence(0.5)
        .only_types([PatternType::Reversal])
        .build()
        .unwrap();

    let instruments: Vec<(&str, &[TestBar])> = vec![("AAA", &down[..]), ("BBB", &up[..])];
    let (results, errors) = scan_parallel(&engine, instruments);

    assert!(errors.is_empty());
    assert_eq!(results.len(), 2);
    for r in &results {
        assert!(r
            .patterns
            .iter()
            .all(|m| m.confidence >= 0.5 && m.pattern.pattern_type == PatternType::Reversal));
    }
}

#[test]
fn test_marubozu_scores_above_long_candle() {
    let config = PatternConfig::default();
    let bar = Bar::new(100.0, 110.0, 100.0, 110.0);
    let input = PatternInput::new(&bar);

    assert!(PatternDetector::check(&BullishMarubozuDetector, &input, &config));
    assert!(PatternDetector::check(&BigGreenCandleDetector, &input, &config));

    let marubozu = PatternDetector::confidence(&BullishMarubozuDetector, &input, &config);
    let long = PatternDetector::confidence(&BigGreenCandleDetector, &input, &config);
    assert!((marubozu - long - 0.05).abs() < 1e-12, "{marubozu} vs {long}");

    let red = Bar::new(110.0, 110.0, 100.0, 100.0);
    let input = PatternInput::new(&red);
    let marubozu = PatternDetector::confidence(&BearishMarubozuDetector, &input, &config);
    let long = PatternDetector::confidence(&BigRedCandleDetector, &input, &config);
    assert!((marubozu - long - 0.05).abs() < 1e-12, "{marubozu} vs {long}");
    assert!(marubozu <= 1.0);
}

// ============================================================
// SERDE
// ============================================================

#[test]
fn test_bar_json() {
    let bar: Bar = serde_json::from_str(r#"{"open":1.0,"high":2.0,"low":0.5,"close":1.5}"#).unwrap();
    assert_eq!(bar.volume, None);
    assert_eq!(bar.volume(), 0.0);

    let dated = Bar::new(1.0, 2.0, 0.5, 1.5).with_date("2024-03-01").with_volume(10.0);
    let json = serde_json::to_string(&dated).unwrap();
    let back: Bar = serde_json::from_str(&json).unwrap();
    assert_eq!(back, dated);
}

#[test]
fn test_config_json_defaults_missing_fields() {
    let config: PatternConfig = serde_json::from_str(r#"{"trend_period": 14}"#).unwrap();
    assert_eq!(config.trend_period, 14);
    assert_eq!(config.doji_body_ratio, PatternConfig::default().doji_body_ratio);

    let json = serde_json::to_string(&config).unwrap();
    let back: PatternConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
    assert_eq!(back.fingerprint(), config.fingerprint());
}
