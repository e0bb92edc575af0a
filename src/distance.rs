//! Bounded memoization of pairwise edit distance.
//!
//! Purely a performance device for token-coverage scoring: a hit must be
//! value-identical to a fresh computation, so eviction and staleness can
//! never affect correctness. Callers clear the cache between batches to
//! bound memory.

use indexmap::IndexMap;

/// Memoized Levenshtein distance keyed by the unordered string pair,
/// with least-recently-used eviction past a fixed capacity.
#[derive(Debug)]
pub struct DistanceCache {
    entries: IndexMap<(String, String), usize>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl DistanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Edit distance between `a` and `b`. Symmetric: the cache key is the
    /// unordered pair. A hit refreshes recency; an insertion past
    /// capacity evicts the least-recently-used entry.
    pub fn distance(&mut self, a: &str, b: &str) -> usize {
        if a == b {
            return 0;
        }
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };

        // Refresh recency by re-inserting at the back.
        if let Some(d) = self.entries.shift_remove(&key) {
            self.hits += 1;
            self.entries.insert(key, d);
            return d;
        }

        self.misses += 1;
        let d = strsim::levenshtein(a, b);
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, d);
        d
    }

    /// Drop all entries and reset the counters. Called between batches,
    /// so `stats` reads per-batch.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` counters for batch-summary logging.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_zero() {
        let mut cache = DistanceCache::new(16);
        assert_eq!(cache.distance("salsa", "salsa"), 0);
        assert_eq!(cache.distance("", ""), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let mut cache = DistanceCache::new(16);
        let forward = cache.distance("bachata", "bachta");
        let backward = cache.distance("bachta", "bachata");
        assert_eq!(forward, backward);
        assert_eq!(forward, 1);
    }

    #[test]
    fn triangle_inequality_on_sampled_triples() {
        let mut cache = DistanceCache::new(64);
        let samples = ["salsa", "salas", "bachata", "nivel", "niveles", "", "trio"];
        for a in samples {
            for b in samples {
                for c in samples {
                    let ab = cache.distance(a, b);
                    let bc = cache.distance(b, c);
                    let ac = cache.distance(a, c);
                    assert!(ac <= ab + bc, "triangle violated for {a:?} {b:?} {c:?}");
                }
            }
        }
    }

    #[test]
    fn hit_is_value_identical_and_counted() {
        let mut cache = DistanceCache::new(16);
        let first = cache.distance("kizomba", "kizumba");
        let second = cache.distance("kizumba", "kizomba");
        assert_eq!(first, second);
        let (hits, misses) = cache.stats();
        assert_eq!((hits, misses), (1, 1));
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let mut cache = DistanceCache::new(2);
        cache.distance("a", "b");
        cache.distance("c", "d");
        // Touch ("a","b") so ("c","d") becomes the LRU entry.
        cache.distance("a", "b");
        cache.distance("e", "f");
        assert_eq!(cache.len(), 2);
        let (hits_before, _) = cache.stats();
        cache.distance("c", "d"); // evicted, so this is a miss
        let (hits_after, _) = cache.stats();
        assert_eq!(hits_after, hits_before);
    }

    #[test]
    fn clear_empties_the_cache_and_resets_stats() {
        let mut cache = DistanceCache::new(16);
        cache.distance("a", "bb");
        cache.distance("a", "bb");
        assert!(!cache.is_empty());
        assert_eq!(cache.stats(), (1, 1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (0, 0));
    }
}
