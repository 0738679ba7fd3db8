//! Property tests over randomly generated series.

use candlescan::cache::{CacheKey, PatternCache};
use candlescan::prelude::*;
use proptest::prelude::*;

prop_compose! {
    /// A well-formed bar: open and close inside `[low, high]`.
    fn arb_bar()(
        low in 1.0f64..1_000.0,
        span in 0.0f64..50.0,
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
        volume in prop_oneof![Just(0.0), 1.0f64..10_000.0],
    ) -> Bar {
        let high = low + span;
        Bar::new(low + span * a, high, low, low + span * b).with_volume(volume)
    }
}

prop_compose! {
    /// A random walk of well-formed bars.
    fn arb_series(max_len: usize)(
        steps in prop::collection::vec(
            (-3.0f64..3.0, -2.0f64..2.0, 0.0f64..1.5, 0.0f64..1.5, 100.0f64..5_000.0),
            0..max_len,
        )
    ) -> Vec<Bar> {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|(drift, body, up, down, volume)| {
                let open = price + drift;
                let close = (open + body).max(1.0);
                price = close;
                Bar::new(open, open.max(close) + up, open.min(close) - down, close).with_volume(volume)
            })
            .collect()
    }
}

fn summary(matches: &[PatternMatch]) -> Vec<(usize, &'static str, u64)> {
    matches
        .iter()
        .map(|m| (m.matched_at, m.id().as_str(), m.confidence.to_bits()))
        .collect()
}

proptest! {
    #[test]
    fn body_and_shadows_partition_the_range(bar in arb_bar()) {
        let total = bar.body() + bar.upper_shadow() + bar.lower_shadow();
        prop_assert!((total - bar.range()).abs() < 1e-9);
        prop_assert!(bar.upper_shadow() >= 0.0);
        prop_assert!(bar.lower_shadow() >= 0.0);
        prop_assert!(bar.validate().is_ok());
    }

    #[test]
    fn big_and_small_are_exclusive(
        bar in arb_bar(),
        small in 0.01f64..=1.0,
        extra in 0.0f64..=1.0,
    ) {
        let config = PatternConfig {
            small_body_ratio: small,
            large_body_ratio: small + (1.0 - small) * extra,
            ..PatternConfig::default()
        };
        prop_assert!(!(bar.is_big(&config) && bar.is_small(&config)));
    }

    #[test]
    fn confidence_stays_in_unit_interval(bars in arb_series(80)) {
        let engine = EngineBuilder::new().with_all_defaults().enable_cache(false).build().unwrap();
        for m in engine.scan(&bars).unwrap() {
            prop_assert!((0.0..=1.0).contains(&m.confidence), "{} at {}: {}", m.id(), m.matched_at, m.confidence);
            prop_assert!(m.matched_at < bars.len());
        }
    }

    #[test]
    fn cache_does_not_change_results(bars in arb_series(60)) {
        let uncached = EngineBuilder::new().with_all_defaults().enable_cache(false).build().unwrap();
        let cached = EngineBuilder::new().with_all_defaults().cache_size(64).build().unwrap();

        let expected = uncached.scan(&bars).unwrap();
        let first = cached.scan(&bars).unwrap();
        let second = cached.scan(&bars).unwrap();

        prop_assert_eq!(summary(&first), summary(&expected));
        prop_assert_eq!(summary(&second), summary(&expected));
        let stats = cached.cache_stats().unwrap();
        prop_assert!(stats.len <= stats.capacity);
    }

    #[test]
    fn parallel_scan_matches_sequential(bars in arb_series(60)) {
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .enable_cache(false)
            .batch_size(4)
            .build()
            .unwrap();
        prop_assert_eq!(
            summary(&engine.scan_par(&bars).unwrap()),
            summary(&engine.scan(&bars).unwrap())
        );
    }

    #[test]
    fn cache_never_exceeds_capacity(capacity in 1usize..32, inserts in 0usize..100) {
        let mut cache = PatternCache::new(capacity).unwrap();
        let bars: Vec<Bar> = (0..inserts)
            .map(|i| {
                let p = 10.0 + i as f64;
                Bar::new(p, p + 1.0, p - 1.0, p + 0.5)
            })
            .collect();

        for bar in &bars {
            let input = PatternInput::new(bar);
            cache.insert(CacheKey::new(DOJI.id, &input, 0), false);
            prop_assert!(cache.len() <= capacity);
        }
        prop_assert_eq!(cache.len(), inserts.min(capacity));

        // oldest entries leave first
        if inserts > capacity {
            let oldest = CacheKey::new(DOJI.id, &PatternInput::new(&bars[0]), 0);
            let newest = CacheKey::new(DOJI.id, &PatternInput::new(&bars[inserts - 1]), 0);
            prop_assert!(!cache.contains(&oldest));
            prop_assert!(cache.contains(&newest));
        }
    }

    #[test]
    fn detectors_agree_with_their_catalog_entry(bars in arb_series(40)) {
        let config = PatternConfig::default();
        for pattern in BuiltinPattern::all() {
            let lookback = pattern.lookback(&config);
            for index in 0..bars.len() {
                let input = PatternInput::at(&bars, index, lookback).unwrap();
                if pattern.check(&input, &config) {
                    let score = pattern.confidence(&input, &config);
                    prop_assert!(score.is_finite() && score >= 0.0, "{}: {}", pattern.id(), score);
                }
            }
        }
    }
}
