//! Bounded memoization of pattern checks
//!
//! Keys combine the pattern id, the exact OHLC bits of `current`/`prev`/`prev2`
//! and a hash of everything else a check can observe (the trailing window, the
//! whole market context and the config fingerprint). A hit therefore always returns
//! what the uncached check would have returned.
//!
//! Eviction is FIFO by first insertion: re-inserting a present key neither
//! refreshes nor reorders it.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use log::trace;
use parking_lot::Mutex;
use serde::Serialize;

use crate::context::{MarketContext, TrendDirection};
use crate::{PatternConfig, PatternDetector, PatternError, PatternId, PatternInput, Result, OHLCV};

/// Capacity used by the engine unless configured otherwise
pub const DEFAULT_CACHE_SIZE: usize = 1000;

// ============================================================
// KEY
// ============================================================

#[inline]
fn ohlc_bits<T: OHLCV>(bar: &T) -> [u64; 4] {
    [bar.open().to_bits(), bar.high().to_bits(), bar.low().to_bits(), bar.close().to_bits()]
}

/// Every field of a context, floats by bit pattern
#[inline]
fn context_bits(ctx: &MarketContext) -> (TrendDirection, u64, bool, [Option<u64>; 3]) {
    (
        ctx.trend,
        ctx.volatility.to_bits(),
        ctx.consolidating,
        [ctx.avg_volume, ctx.support, ctx.resistance].map(|v| v.map(f64::to_bits)),
    )
}

/// Identity of one pattern evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pattern: PatternId,
    current: [u64; 4],
    prev: Option<[u64; 4]>,
    prev2: Option<[u64; 4]>,
    window: u64,
}

impl CacheKey {
    pub fn new<T: OHLCV>(pattern: PatternId, input: &PatternInput<'_, T>, config_fingerprint: u64) -> Self {
        let mut hasher = DefaultHasher::new();
        let history = input.history();
        history.len().hash(&mut hasher);
        for bar in history {
            ohlc_bits(bar).hash(&mut hasher);
            bar.volume().to_bits().hash(&mut hasher);
        }
        input.context.map(context_bits).hash(&mut hasher);
        config_fingerprint.hash(&mut hasher);

        Self {
            pattern,
            current: ohlc_bits(input.current),
            prev: input.prev.map(ohlc_bits),
            prev2: input.prev2.map(ohlc_bits),
            window: hasher.finish(),
        }
    }

    #[inline]
    pub fn pattern(&self) -> PatternId {
        self.pattern
    }
}

// ============================================================
// FIFO CACHE
// ============================================================

/// Counters for a cache's lifetime (reset by [`PatternCache::clear`])
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Hits over lookups, `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Bounded check-result cache with oldest-first eviction
#[derive(Debug)]
pub struct PatternCache {
    entries: HashMap<CacheKey, bool>,
    order: VecDeque<CacheKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PatternError::InvalidConfig("cache capacity must be > 0".into()));
        }
        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        })
    }

    /// Look up a result, counting the hit or miss.
    pub fn get(&mut self, key: &CacheKey) -> Option<bool> {
        let found = self.entries.get(key).copied();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Store a result, evicting the oldest entry when full.
    pub fn insert(&mut self, key: CacheKey, value: bool) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.evictions += 1;
                trace!(
                    "pattern cache full (capacity {}), evicted {}",
                    self.capacity,
                    oldest.pattern().as_str()
                );
            }
        }

        self.entries.insert(key, value);
        self.order.push_back(key);
    }

    /// Cached result for `key`, computing and storing it with `check` on a miss.
    pub fn evaluate(&mut self, key: CacheKey, check: impl FnOnce() -> bool) -> bool {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = check();
        self.insert(key, value);
        value
    }

    #[inline]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            len: self.entries.len(),
            capacity: self.capacity,
        }
    }
}

/// Memoized [`PatternDetector::check`].
pub fn evaluate_with_cache<D, T>(
    detector: &D,
    input: &PatternInput<'_, T>,
    config: &PatternConfig,
    cache: &mut PatternCache,
) -> bool
where
    D: PatternDetector,
    T: OHLCV,
{
    let key = CacheKey::new(detector.id(), input, config.fingerprint());
    cache.evaluate(key, || detector.check(input, config))
}

// ============================================================
// SHARED CACHE
// ============================================================

/// [`PatternCache`] behind a lock, usable from many scan threads.
///
/// The check itself runs outside the lock; two threads missing on the same key
/// both compute it and the second insert is a no-op.
#[derive(Debug)]
pub struct SharedPatternCache {
    inner: Mutex<PatternCache>,
}

impl SharedPatternCache {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self { inner: Mutex::new(PatternCache::new(capacity)?) })
    }

    pub fn get(&self, key: &CacheKey) -> Option<bool> {
        self.inner.lock().get(key)
    }

    pub fn insert(&self, key: CacheKey, value: bool) {
        self.inner.lock().insert(key, value);
    }

    pub fn evaluate(&self, key: CacheKey, check: impl FnOnce() -> bool) -> bool {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = check();
        self.insert(key, value);
        value
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{DojiDetector, HammerDetector};
    use crate::Bar;

    fn key_for(id: &'static str, close: f64) -> CacheKey {
        let bar = Bar::new(100.0, 110.0, 90.0, close);
        CacheKey::new(PatternId(id), &PatternInput::new(&bar), 0)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(PatternCache::new(0), Err(PatternError::InvalidConfig(_))));
        assert!(SharedPatternCache::new(0).is_err());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = PatternCache::new(3).unwrap();
        let keys: Vec<CacheKey> = (0..4).map(|i| key_for("DOJI", 100.0 + i as f64)).collect();

        for key in &keys {
            cache.insert(*key, true);
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&keys[0]));
        assert!(keys[1..].iter().all(|k| cache.contains(k)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinsert_does_not_refresh() {
        let mut cache = PatternCache::new(2).unwrap();
        let (a, b, c) = (key_for("A", 1.0), key_for("A", 2.0), key_for("A", 3.0));

        cache.insert(a, true);
        cache.insert(b, false);
        cache.insert(a, false);
        cache.insert(c, true);

        assert!(!cache.contains(&a));
        assert_eq!(cache.get(&b), Some(false));
        assert_eq!(cache.get(&c), Some(true));
    }

    #[test]
    fn test_evaluate_counts_hits() {
        let mut cache = PatternCache::new(8).unwrap();
        let key = key_for("DOJI", 100.5);
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache.evaluate(key, || {
                calls += 1;
                true
            });
            assert!(value);
        }

        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (2, 1));
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-12);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { capacity: 8, ..Default::default() });
    }

    #[test]
    fn test_key_separates_patterns_windows_and_configs() {
        let bar = Bar::new(100.0, 110.0, 90.0, 100.5);
        let other = Bar::new(95.0, 101.0, 94.0, 100.0);
        let series = [other.clone(), bar.clone()];
        let alone = PatternInput::new(&bar);
        let with_history = PatternInput::new(&series[1]).with_prev(&series[0]).with_series(&series);

        let doji = CacheKey::new(PatternId("DOJI"), &alone, 1);
        assert_eq!(doji, CacheKey::new(PatternId("DOJI"), &alone, 1));
        assert_ne!(doji, CacheKey::new(PatternId("HAMMER"), &alone, 1));
        assert_ne!(doji, CacheKey::new(PatternId("DOJI"), &alone, 2));
        assert_ne!(doji, CacheKey::new(PatternId("DOJI"), &with_history, 1));
        assert_eq!(doji.pattern(), PatternId("DOJI"));
    }

    #[test]
    fn test_evaluate_with_cache_matches_check() {
        let config = PatternConfig::default();
        let mut cache = PatternCache::new(16).unwrap();
        let bars = [
            Bar::new(100.0, 110.0, 90.0, 100.5),
            Bar::new(100.0, 100.5, 80.0, 99.0),
            Bar::new(100.0, 100.0, 100.0, 100.0),
        ];

        for bar in &bars {
            let input = PatternInput::new(bar);
            for _ in 0..2 {
                assert_eq!(
                    evaluate_with_cache(&DojiDetector, &input, &config, &mut cache),
                    DojiDetector.check(&input, &config)
                );
                assert_eq!(
                    evaluate_with_cache(&HammerDetector, &input, &config, &mut cache),
                    HammerDetector.check(&input, &config)
                );
            }
        }
        assert_eq!(cache.len(), 6);
        assert_eq!(cache.stats().hits, 6);
    }

    #[test]
    fn test_shared_cache_across_threads() {
        let cache = SharedPatternCache::new(64).unwrap();
        let keys: Vec<CacheKey> = (0..32).map(|i| key_for("DOJI", i as f64)).collect();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for key in &keys {
                        assert!(cache.evaluate(*key, || true));
                    }
                });
            }
        });

        assert_eq!(cache.len(), 32);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 128);
    }
}
