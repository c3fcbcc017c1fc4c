//! Approximate cache of recently invalidated transaction ids.
//!
//! Two tiers: an exact bounded front map with time-based expiry, and a pair
//! of rotating bloom filters behind it. Membership answers may be false
//! positives at the configured rate; false negatives cannot occur for ids
//! inserted within the front TTL.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use ember_core::types::{now_millis, TxId};

/// Configuration of the invalidated-id cache.
#[derive(Debug, Clone)]
pub struct InvalidatedCacheConfig {
    /// Bloom filter capacity (expected insertions per filter generation).
    pub filter_capacity: usize,
    /// Target false-positive rate of each bloom filter.
    pub filter_fpr: f64,
    /// Exact front cache capacity.
    pub front_size: usize,
    /// Front entries older than this are treated as absent.
    pub front_ttl: Duration,
    /// Fraction of `filter_capacity` after which the filters rotate, so
    /// old entries fade out after roughly two rotations.
    pub filter_expiration_rate: f64,
}

impl Default for InvalidatedCacheConfig {
    fn default() -> Self {
        Self {
            filter_capacity: 10_000,
            filter_fpr: 0.01,
            front_size: 1_000,
            front_ttl: Duration::from_secs(20 * 60),
            filter_expiration_rate: 0.5,
        }
    }
}

/// A fixed-size bloom filter over transaction ids.
///
/// Bit positions derive from a BLAKE3 hash of the id by double hashing:
/// position `i` is `(h1 + i * h2) mod m`.
#[derive(Debug, Clone)]
struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    hashes: u32,
}

impl BloomFilter {
    /// Size a filter for `capacity` insertions at false-positive rate `fpr`.
    fn with_rate(capacity: usize, fpr: f64) -> Self {
        let n = capacity.max(1) as f64;
        let p = fpr.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let m = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let k = ((m as f64 / n) * ln2).round().max(1.0) as u32;
        Self {
            bits: vec![0u64; m.div_ceil(64) as usize],
            num_bits: m,
            hashes: k,
        }
    }

    fn positions(&self, id: &TxId) -> impl Iterator<Item = u64> + '_ {
        let digest: [u8; 32] = blake3::hash(id.as_bytes()).into();
        let h1 = u64::from_le_bytes(digest[0..8].try_into().expect("8 bytes"));
        // Odd step so the probe sequence cycles through all positions.
        let h2 = u64::from_le_bytes(digest[8..16].try_into().expect("8 bytes")) | 1;
        (0..self.hashes as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    fn insert(&mut self, id: &TxId) {
        for pos in self.positions(id).collect::<Vec<_>>() {
            self.bits[(pos / 64) as usize] |= 1 << (pos % 64);
        }
    }

    fn contains(&self, id: &TxId) -> bool {
        self.positions(id)
            .all(|pos| self.bits[(pos / 64) as usize] & (1 << (pos % 64)) != 0)
    }
}

/// Bounded probabilistic set of recently invalidated transaction ids.
#[derive(Debug, Clone)]
pub struct InvalidatedCache {
    /// Exact front tier: id → insertion time in unix millis.
    front: HashMap<TxId, u64>,
    /// Insertion order of the front tier, with lazy deletion of stale
    /// entries superseded by a re-insert.
    front_order: VecDeque<(TxId, u64)>,
    front_size: usize,
    front_ttl_millis: u64,
    /// Filter taking new insertions.
    current: BloomFilter,
    /// Previous generation, still consulted until the next rotation.
    previous: BloomFilter,
    inserted: usize,
    rotation_threshold: usize,
    filter_capacity: usize,
    filter_fpr: f64,
}

impl InvalidatedCache {
    pub fn new(config: &InvalidatedCacheConfig) -> Self {
        let rotation_threshold =
            ((config.filter_capacity as f64 * config.filter_expiration_rate).ceil() as usize).max(1);
        Self {
            front: HashMap::new(),
            front_order: VecDeque::new(),
            front_size: config.front_size.max(1),
            front_ttl_millis: config.front_ttl.as_millis() as u64,
            current: BloomFilter::with_rate(config.filter_capacity, config.filter_fpr),
            previous: BloomFilter::with_rate(config.filter_capacity, config.filter_fpr),
            inserted: 0,
            rotation_threshold,
            filter_capacity: config.filter_capacity,
            filter_fpr: config.filter_fpr,
        }
    }

    /// Record an invalidated id.
    pub fn put(&mut self, id: TxId) {
        self.put_at(id, now_millis());
    }

    /// Record an invalidated id at an explicit time.
    pub fn put_at(&mut self, id: TxId, now: u64) {
        // Evict least-recently-inserted front entries while at capacity,
        // skipping order entries superseded by a later re-insert.
        while self.front.len() >= self.front_size && !self.front.contains_key(&id) {
            match self.front_order.pop_front() {
                Some((old, inserted_at)) => {
                    if self.front.get(&old) == Some(&inserted_at) {
                        self.front.remove(&old);
                    }
                }
                None => break,
            }
        }
        self.front.insert(id, now);
        self.front_order.push_back((id, now));

        self.current.insert(&id);
        self.inserted += 1;
        if self.inserted >= self.rotation_threshold {
            self.previous = std::mem::replace(
                &mut self.current,
                BloomFilter::with_rate(self.filter_capacity, self.filter_fpr),
            );
            self.inserted = 0;
        }
    }

    /// Whether `id` was plausibly invalidated recently.
    ///
    /// May answer true for ids never inserted, at the configured
    /// false-positive rate; never answers false for an id inserted within
    /// the front TTL.
    pub fn might_contain(&self, id: &TxId) -> bool {
        self.might_contain_at(id, now_millis())
    }

    /// [`might_contain`](Self::might_contain) at an explicit time.
    pub fn might_contain_at(&self, id: &TxId, now: u64) -> bool {
        if let Some(&inserted_at) = self.front.get(id) {
            if now.saturating_sub(inserted_at) <= self.front_ttl_millis {
                return true;
            }
        }
        self.current.contains(id) || self.previous.contains(id)
    }
}
