//! Multi-bar shapes: flags, head-and-shoulders, and how they react to volume.

use candlescan::prelude::*;

#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        Self { o, h, l, c, v }
    }

    /// Reflect the bar through `axis`, turning rallies into declines.
    fn mirrored(self, axis: f64) -> Self {
        Self {
            o: axis - self.o,
            h: axis - self.l,
            l: axis - self.h,
            c: axis - self.c,
            v: self.v,
        }
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

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn multi_bar_engine() -> DefaultEngine {
    init_logger();
    EngineBuilder::new()
        .with_multi_bar_defaults()
        .build()
        .unwrap()
}

fn matched(bars: &[TestBar], id: &str) -> Vec<usize> {
    multi_bar_engine()
        .scan(bars)
        .unwrap()
        .iter()
        .filter(|m| m.id().as_str() == id)
        .map(|m| m.matched_at)
        .collect()
}

/// Bars walking through `closes`, each opening at the previous close.
/// Bars listed in `peaks` get a taller upper wick.
fn walk(closes: &[f64], peaks: &[usize]) -> Vec<TestBar> {
    let mut open = closes[0] - 1.0;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let wick = if peaks.contains(&i) { 2.0 } else { 0.5 };
            let bar = TestBar::new(open, open.max(close) + wick, open.min(close) - 0.5, close, 0.0);
            open = close;
            bar
        })
        .collect()
}

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

fn head_and_shoulders_top() -> Vec<TestBar> {
    let closes = [
        90.0, 92.0, 94.0, 96.0, 98.0, 100.0, 102.0, 104.0, 106.0, 108.0, // rally
        110.0, 107.0, 104.0, 102.0, // left shoulder
        106.0, 110.0, 114.0, 118.0, 114.0, 110.0, 106.0, 102.0, // head
        105.0, 108.0, 110.0, 107.0, 104.0, 101.0, // right shoulder
        98.0, 95.0, // break of the neckline
    ];
    walk(&closes, &[10, 17, 24])
}

#[test]
fn test_head_and_shoulders_top() {
    let bars = head_and_shoulders_top();
    assert_eq!(bars.len(), 30);

    assert_eq!(matched(&bars, "HEAD_AND_SHOULDERS_TOP"), vec![29]);
    assert!(matched(&bars, "HEAD_AND_SHOULDERS_BOTTOM").is_empty());
}

#[test]
fn test_head_and_shoulders_needs_full_window() {
    let bars = head_and_shoulders_top();
    assert!(matched(&bars[..29], "HEAD_AND_SHOULDERS_TOP").is_empty());
}

#[test]
fn test_inverse_head_and_shoulders() {
    let bars: Vec<TestBar> = head_and_shoulders_top()
        .into_iter()
        .map(|b| b.mirrored(200.0))
        .collect();

    assert_eq!(matched(&bars, "HEAD_AND_SHOULDERS_BOTTOM"), vec![29]);
    assert!(matched(&bars, "HEAD_AND_SHOULDERS_TOP").is_empty());
}

#[test]
fn test_head_and_shoulders_confidence_bounds() {
    let bars = head_and_shoulders_top();
    let matches = multi_bar_engine().scan(&bars).unwrap();
    let top = matches
        .iter()
        .find(|m| m.id().as_str() == "HEAD_AND_SHOULDERS_TOP")
        .unwrap();

    assert!(top.confidence >= 0.65 && top.confidence <= 1.0);
    assert_eq!(top.info.volume_ratio, None);
}

// ============================================================
// FLAGS
// ============================================================

fn bull_flag(with_volume: bool) -> Vec<TestBar> {
    let bars = [
        // pole
        (100.0, 103.5, 99.5, 103.0, 1200.0),
        (103.0, 106.5, 102.5, 106.0, 1300.0),
        (106.0, 110.5, 105.5, 110.0, 1500.0),
        // flag drifting lower on fading volume
        (110.0, 110.5, 108.0, 108.5, 1500.0),
        (108.5, 109.5, 107.0, 107.5, 1400.0),
        (107.5, 108.5, 106.0, 106.5, 900.0),
        (106.5, 107.5, 105.0, 105.5, 800.0),
        (105.5, 106.5, 104.5, 105.0, 700.0),
        // breakout
        (105.0, 107.0, 104.8, 106.5, 1200.0),
        (106.5, 112.0, 106.3, 111.5, 2000.0),
    ];
    bars.iter()
        .map(|&(o, h, l, c, v)| TestBar::new(o, h, l, c, if with_volume { v } else { 0.0 }))
        .collect()
}

#[test]
fn test_bull_flag_breakout() {
    let bars = bull_flag(true);
    assert_eq!(matched(&bars, "BULL_FLAG"), vec![9]);
    assert!(matched(&bars, "BEAR_FLAG").is_empty());
}

#[test]
fn test_flag_requires_volume() {
    assert!(matched(&bull_flag(false), "BULL_FLAG").is_empty());
}

#[test]
fn test_bear_flag_breakdown() {
    let bars: Vec<TestBar> = bull_flag(true).into_iter().map(|b| b.mirrored(200.0)).collect();
    assert_eq!(matched(&bars, "BEAR_FLAG"), vec![9]);
    assert!(matched(&bars, "BULL_FLAG").is_empty());
}

#[test]
fn test_flag_without_breakout() {
    let mut bars = bull_flag(true);
    let last = bars.len() - 1;
    bars[last] = TestBar::new(106.5, 109.0, 106.3, 108.5, 2000.0);
    assert!(matched(&bars, "BULL_FLAG").is_empty());
}

// ============================================================
// DIRECT DETECTOR USE
// ============================================================

#[test]
fn test_detector_on_hand_built_input() {
    let bars = head_and_shoulders_top();
    let config = PatternConfig::default();
    let detector = HeadAndShouldersTopDetector::with_defaults();

    let input = PatternInput::at(&bars, 29, PatternDetector::lookback(&detector, &config)).unwrap();
    assert!(PatternDetector::check(&detector, &input, &config));

    let early = PatternInput::at(&bars, 27, PatternDetector::lookback(&detector, &config)).unwrap();
    assert!(!PatternDetector::check(&detector, &early, &config));
}
