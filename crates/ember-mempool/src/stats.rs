//! Rolling wait-time statistics over transactions leaving the pool.
//!
//! A 60-bin histogram keyed by whole minutes waited, each bin aggregating
//! a removal count and the total fee-per-kb of the removed transactions.
//! Fee recommendation and wait-time estimation read these bins.

use crate::weighted::WeightedTxId;
use ember_core::types::now_millis;

/// Number of one-minute histogram bins; longer waits clamp into the last.
pub const WAIT_HISTOGRAM_BINS: usize = 60;

const MILLIS_PER_MINUTE: u64 = 60_000;

/// One histogram bin: removals observed at a given wait in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeBin {
    /// Number of transactions that waited this many minutes.
    pub count: u64,
    /// Sum of their fee-per-kb values.
    pub total_fee: u64,
}

impl FeeBin {
    /// Whether any removal landed in this bin.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Average fee-per-kb of the bin, zero when empty.
    pub fn avg_fee_per_kb(&self) -> u64 {
        if self.count == 0 { 0 } else { self.total_fee / self.count }
    }
}

/// Append-only pool statistics.
///
/// The measurement start is fixed at construction; bins only grow.
#[derive(Debug, Clone)]
pub struct PoolStats {
    start_measurement: u64,
    taken_txns: u64,
    histogram: [FeeBin; WAIT_HISTOGRAM_BINS],
}

impl PoolStats {
    /// Start measuring now.
    pub fn new() -> Self {
        Self::new_at(now_millis())
    }

    /// Start measuring at an explicit time.
    pub fn new_at(start: u64) -> Self {
        Self {
            start_measurement: start,
            taken_txns: 0,
            histogram: [FeeBin::default(); WAIT_HISTOGRAM_BINS],
        }
    }

    /// Record a transaction leaving the pool at `now`.
    pub fn add(&mut self, now: u64, wtx: &WeightedTxId) {
        let waited = now.saturating_sub(wtx.created_at) / MILLIS_PER_MINUTE;
        let bin = waited.min(WAIT_HISTOGRAM_BINS as u64 - 1) as usize;
        self.histogram[bin].count += 1;
        self.histogram[bin].total_fee = self.histogram[bin]
            .total_fee
            .saturating_add(wtx.fee_per_kb.max(0) as u64);
        self.taken_txns += 1;
    }

    /// The bin for transactions that waited `minute` whole minutes.
    /// Out-of-range minutes read as empty.
    pub fn bin(&self, minute: usize) -> FeeBin {
        self.histogram.get(minute).copied().unwrap_or_default()
    }

    /// When measurement started, unix millis.
    pub fn start_measurement(&self) -> u64 {
        self.start_measurement
    }

    /// Total transactions recorded as leaving the pool.
    pub fn taken_txns(&self) -> u64 {
        self.taken_txns
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}
