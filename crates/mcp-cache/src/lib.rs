//! Striped LRU-K resource cache fronting `read_resource` (spec component I).
//!
//! The table is partitioned into `L` independent stripes, each an
//! open-addressed, linear-probing sub-table with its own mutex. A key's
//! stripe is `hash_a(uri) mod L`; its home slot within that stripe is
//! `hash_b(uri) mod (capacity / L)`. Using two independent hashes — rather
//! than reducing one `hash(uri) mod C` down to a stripe index, as the
//! upstream C implementation does — means a single-key operation only ever
//! needs its own stripe's lock, with no risk of a probe run crossing into a
//! slot another stripe owns. See `DESIGN.md` for why this departs from the
//! literal "one global table, L locks over it" reading of the spec.
//!
//! `get`/`put`/`invalidate` take only their key's stripe lock.
//! `prune_expired` is the only operation that takes every stripe, always in
//! ascending index order, and releases them in the reverse order it
//! acquired them.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

use mcp_protocol::ContentItem;

/// Number of most-recent accesses the eviction policy considers.
pub const LRU_K: usize = 2;

/// Default number of lock stripes.
pub const DEFAULT_STRIPES: usize = 16;

fn hash_a(s: &str) -> u64 {
    // djb2
    let mut hash: u64 = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(b));
    }
    hash
}

fn hash_b(s: &str) -> u64 {
    // FNV-1a — independent of `hash_a` so stripe and in-stripe slot
    // assignment don't correlate.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

/// How long a `put` entry should live.
#[derive(Debug, Clone, Copy)]
pub enum Ttl {
    /// Use the cache's configured default TTL.
    Default,
    /// Use an explicit TTL.
    Millis(u64),
    /// Never expire (excluded from LRU-K eviction candidacy).
    Never,
}

#[derive(Debug, Clone)]
enum Expiry {
    At(Instant),
    Never,
}

impl Expiry {
    fn is_past(&self, now: Instant) -> bool {
        match self {
            Self::At(t) => now >= *t,
            Self::Never => false,
        }
    }

    fn is_permanent(&self) -> bool {
        matches!(self, Self::Never)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    uri: String,
    content: Vec<ContentItem>,
    expiry: Expiry,
    /// `[0]` most recent access, `[1]` second-most recent (`LRU_K` = 2).
    access_history: [Option<Instant>; LRU_K],
    access_count: u8,
}

impl CacheEntry {
    fn record_access(&mut self, now: Instant) {
        self.access_history[1] = self.access_history[0];
        self.access_history[0] = Some(now);
        self.access_count = self.access_count.saturating_add(1).min(LRU_K as u8);
    }
}

struct Stripe {
    slots: Vec<Option<CacheEntry>>,
}

impl Stripe {
    fn probe_find(&self, uri: &str, home: usize) -> Option<usize> {
        let len = self.slots.len();
        for step in 0..len {
            let idx = (home + step) % len;
            match &self.slots[idx] {
                Some(entry) if entry.uri == uri => return Some(idx),
                None => return None,
                Some(_) => continue,
            }
        }
        None
    }

    /// Find `uri`'s existing slot, or the first empty slot on its probe
    /// run, or `None` if the stripe is full and `uri` isn't present.
    fn probe_slot_for_insert(&self, uri: &str, home: usize) -> Option<usize> {
        let len = self.slots.len();
        let mut first_empty = None;
        for step in 0..len {
            let idx = (home + step) % len;
            match &self.slots[idx] {
                Some(entry) if entry.uri == uri => return Some(idx),
                None if first_empty.is_none() => first_empty = Some(idx),
                _ => {}
            }
        }
        first_empty
    }

    /// Pick an eviction victim per the LRU-K policy (spec §4.6). Ties break
    /// by the lower slot index.
    fn pick_eviction_victim(&self) -> Option<usize> {
        let mut under_k: Option<(usize, Instant)> = None;
        let mut at_k: Option<(usize, Instant)> = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(entry) = slot else { continue };
            if entry.expiry.is_permanent() {
                continue;
            }
            if (entry.access_count as usize) < LRU_K {
                if let Some(first_seen) = entry.access_history[0] {
                    if under_k.is_none_or(|(_, best)| first_seen < best) {
                        under_k = Some((idx, first_seen));
                    }
                }
            } else if let Some(kth) = entry.access_history[LRU_K - 1] {
                if at_k.is_none_or(|(_, best)| kth < best) {
                    at_k = Some((idx, kth));
                }
            }
        }
        under_k.or(at_k).map(|(idx, _)| idx)
    }
}

/// A striped, LRU-K-evicting cache of deep-copied resource content.
///
/// `get` always returns an independent copy of the content it stored —
/// callers never alias into the cache, so the striped lock never has to
/// outlive the call.
pub struct ResourceCache {
    stripes: Vec<Mutex<Stripe>>,
    default_ttl: Duration,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("stripe_count", &self.stripes.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl ResourceCache {
    /// Create a cache with total capacity `capacity`, spread across
    /// `stripe_count` stripes (rounded up so every stripe gets at least one
    /// slot).
    #[must_use]
    pub fn new(capacity: usize, stripe_count: usize, default_ttl: Duration) -> Self {
        let stripe_count = stripe_count.max(1);
        let per_stripe = capacity.div_ceil(stripe_count).max(1);
        let stripes = (0..stripe_count)
            .map(|_| {
                Mutex::new(Stripe {
                    slots: vec![None; per_stripe],
                })
            })
            .collect();
        Self {
            stripes,
            default_ttl,
        }
    }

    /// Create a cache with [`DEFAULT_STRIPES`] stripes and a 60s default TTL.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, DEFAULT_STRIPES, Duration::from_secs(60))
    }

    fn stripe_for(&self, uri: &str) -> &Mutex<Stripe> {
        let idx = (hash_a(uri) % self.stripes.len() as u64) as usize;
        &self.stripes[idx]
    }

    fn home_slot(&self, uri: &str, stripe_len: usize) -> usize {
        (hash_b(uri) % stripe_len as u64) as usize
    }

    /// Look up `uri`. Returns a deep copy of its content, updating LRU-K
    /// history, or `None` on a miss — including a miss caused by the entry
    /// having expired, which invalidates it in place.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<Vec<ContentItem>> {
        let mut stripe = self.stripe_for(uri).lock();
        let home = self.home_slot(uri, stripe.slots.len());
        let idx = stripe.probe_find(uri, home)?;
        let now = Instant::now();
        if stripe.slots[idx].as_ref().unwrap().expiry.is_past(now) {
            stripe.slots[idx] = None;
            return None;
        }
        let entry = stripe.slots[idx].as_mut().unwrap();
        entry.record_access(now);
        Some(entry.content.clone())
    }

    /// Store a deep copy of `content` under `uri`, evicting per LRU-K if the
    /// stripe is full.
    pub fn put(&self, uri: &str, content: Vec<ContentItem>, ttl: Ttl) {
        let expiry = match ttl {
            Ttl::Never => Expiry::Never,
            Ttl::Default => Expiry::At(Instant::now() + self.default_ttl),
            Ttl::Millis(0) => Expiry::At(Instant::now() + self.default_ttl),
            Ttl::Millis(ms) => Expiry::At(Instant::now() + Duration::from_millis(ms)),
        };
        let mut stripe = self.stripe_for(uri).lock();
        let home = self.home_slot(uri, stripe.slots.len());
        let idx = match stripe.probe_slot_for_insert(uri, home) {
            Some(idx) => idx,
            None => match stripe.pick_eviction_victim() {
                Some(idx) => idx,
                None => {
                    warn!(uri, "cache stripe full of permanent entries, evicting slot 0");
                    0
                }
            },
        };
        stripe.slots[idx] = Some(CacheEntry {
            uri: uri.to_string(),
            content,
            expiry,
            access_history: [Some(Instant::now()), None],
            access_count: 1,
        });
    }

    /// Invalidate `uri`, if present. No-op on a miss.
    pub fn invalidate(&self, uri: &str) {
        let mut stripe = self.stripe_for(uri).lock();
        let home = self.home_slot(uri, stripe.slots.len());
        if let Some(idx) = stripe.probe_find(uri, home) {
            stripe.slots[idx] = None;
        }
    }

    /// Sweep every stripe for expired entries, invalidating them. Takes
    /// every stripe lock in ascending index order and releases them in
    /// reverse, so this is the only operation that can contend with every
    /// `get`/`put`/`invalidate` at once — callers should not run it on a hot
    /// path.
    pub fn prune_expired(&self) -> usize {
        let mut guards: Vec<_> = self.stripes.iter().map(parking_lot::Mutex::lock).collect();
        let now = Instant::now();
        let mut pruned = 0;
        for stripe in &mut guards {
            for slot in &mut stripe.slots {
                if slot.as_ref().is_some_and(|e| e.expiry.is_past(now)) {
                    *slot = None;
                    pruned += 1;
                }
            }
        }
        while guards.pop().is_some() {}
        pruned
    }

    /// Advisory count of valid (non-empty) entries across every stripe.
    /// Exact immediately after `prune_expired`; may include not-yet-expired
    /// stale entries at other times, consistent with spec §4.6's "advisory"
    /// framing of the `count` field.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stripes
            .iter()
            .map(|s| s.lock().slots.iter().filter(|e| e.is_some()).count())
            .sum()
    }

    /// `true` if no stripe currently holds a valid entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Vec<ContentItem> {
        vec![ContentItem::text(s)]
    }

    #[test]
    fn put_then_get_round_trips_a_deep_copy() {
        let cache = ResourceCache::with_capacity(4);
        cache.put("x://a", text("v1"), Ttl::Default);
        let got = cache.get("x://a").unwrap();
        assert_eq!(got, text("v1"));
    }

    #[test]
    fn miss_on_unknown_uri() {
        let cache = ResourceCache::with_capacity(4);
        assert!(cache.get("x://nope").is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ResourceCache::with_capacity(4);
        cache.put("x://a", text("v1"), Ttl::Default);
        cache.invalidate("x://a");
        assert!(cache.get("x://a").is_none());
    }

    #[test]
    fn expired_entry_misses_and_is_invalidated() {
        let cache = ResourceCache::new(4, 1, Duration::from_millis(1));
        cache.put("x://a", text("v1"), Ttl::Millis(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("x://a").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn never_ttl_entry_is_never_evicted_as_a_candidate() {
        // Single stripe, capacity 1: putting a second key must evict the
        // permanent entry via the "no candidate" fallback (slot 0), since
        // it is the only slot and the only entry.
        let cache = ResourceCache::new(1, 1, Duration::from_secs(60));
        cache.put("x://permanent", text("v1"), Ttl::Never);
        cache.put("x://other", text("v2"), Ttl::Default);
        assert!(cache.get("x://other").is_some());
    }

    #[test]
    fn lru_k_evicts_the_entry_with_fewer_accesses_first() {
        // One stripe so eviction order is deterministic across the whole
        // capacity.
        let cache = ResourceCache::new(3, 1, Duration::from_secs(60));
        cache.put("x://a", text("a"), Ttl::Default);
        cache.put("x://b", text("b"), Ttl::Default);
        cache.put("x://c", text("c"), Ttl::Default);
        // Access A twice, reaching access_count == K; B and C stay at 1.
        cache.get("x://a");
        cache.get("x://a");
        // B and C are both under-K candidates; B was inserted (and thus
        // last accessed) before C, so B is the older under-K candidate.
        cache.put("x://d", text("d"), Ttl::Default);
        assert!(cache.get("x://b").is_none(), "B should have been evicted");
        assert!(cache.get("x://a").is_some());
        assert!(cache.get("x://c").is_some());
        assert!(cache.get("x://d").is_some());
    }

    #[test]
    fn prune_expired_reports_count_and_clears_entries() {
        let cache = ResourceCache::new(4, 2, Duration::from_secs(60));
        cache.put("x://a", text("a"), Ttl::Millis(1));
        cache.put("x://b", text("b"), Ttl::Never);
        std::thread::sleep(Duration::from_millis(20));
        let pruned = cache.prune_expired();
        assert_eq!(pruned, 1);
        assert_eq!(cache.len(), 1);
    }
}
