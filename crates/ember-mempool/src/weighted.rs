//! Weighted transaction identifiers: the ordering keys of the pool.
//!
//! Weight starts as fee-per-kilobyte and is raised when descendants arrive
//! that spend this transaction's outputs, so parents never sort after their
//! children.

use std::cmp::Ordering;

use ember_core::types::{now_millis, TxId, UnconfirmedTransaction};

/// Ordering key for a pooled transaction.
///
/// Equality and hashing use only the id; two `WeightedTxId`s for the same
/// transaction collide even when their weights differ, so the pool removes
/// the old key before installing an updated one. Ordering is
/// `(-weight, id)`: the first key in an ordered map has the highest weight
/// and the last key is the eviction candidate.
#[derive(Debug, Clone)]
pub struct WeightedTxId {
    /// Transaction id.
    pub id: TxId,
    /// Priority weight: fee-per-kb plus accumulated descendant weights.
    pub weight: i64,
    /// Fee per kilobyte, `fee * 1024 / size`.
    pub fee_per_kb: i64,
    /// Creation time of this key in unix millis.
    pub created_at: u64,
}

impl WeightedTxId {
    /// Create a key with weight equal to the fee rate.
    ///
    /// The 1024 multiplier keeps integer precision for sub-kilobyte
    /// transactions; u64-range fees are clamped rather than wrapped.
    pub fn new(id: TxId, fee: u64, size: usize, created_at: u64) -> Self {
        let fee_per_kb = if size == 0 {
            0
        } else {
            ((fee as i128 * 1024) / size as i128).min(i64::MAX as i128) as i64
        };
        Self { id, weight: fee_per_kb, fee_per_kb, created_at }
    }

    /// Build the key for an arriving transaction, stamping the current
    /// clock. A transaction removed and re-put receives a fresh
    /// `created_at`, so wait-time stats measure the latest residency.
    pub fn weighted(utx: &UnconfirmedTransaction, fee_proposition: &[u8]) -> Self {
        Self::new(
            utx.id,
            utx.transaction.fee(fee_proposition),
            utx.size,
            now_millis(),
        )
    }

    /// Copy of this key with an adjusted weight.
    pub fn with_weight(&self, weight: i64) -> Self {
        Self { weight, ..self.clone() }
    }
}

impl PartialEq for WeightedTxId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WeightedTxId {}

impl std::hash::Hash for WeightedTxId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for WeightedTxId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeightedTxId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher weight sorts first; ties break on id for determinism.
        match other.weight.cmp(&self.weight) {
            Ordering::Equal => self.id.cmp(&other.id),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn id(seed: u8) -> TxId {
        TxId([seed; 32])
    }

    #[test]
    fn fee_per_kb_precision() {
        // 1000 nanos over 100 bytes: 1000 * 1024 / 100 = 10240.
        let w = WeightedTxId::new(id(1), 1000, 100, 0);
        assert_eq!(w.fee_per_kb, 10240);
        assert_eq!(w.weight, w.fee_per_kb);
    }

    #[test]
    fn zero_size_yields_zero_weight() {
        let w = WeightedTxId::new(id(1), 1000, 0, 0);
        assert_eq!(w.weight, 0);
    }

    #[test]
    fn huge_fee_clamps_instead_of_wrapping() {
        let w = WeightedTxId::new(id(1), u64::MAX, 1, 0);
        assert_eq!(w.weight, i64::MAX);
    }

    #[test]
    fn ordering_puts_highest_weight_first() {
        let low = WeightedTxId::new(id(3), 500, 100, 0);
        let mid = WeightedTxId::new(id(1), 1000, 100, 0);
        let high = WeightedTxId::new(id(2), 2000, 100, 0);

        let set: BTreeSet<_> = [low, mid, high].into_iter().collect();
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(ordered[0].id, id(2));
        assert_eq!(ordered[1].id, id(1));
        assert_eq!(ordered[2].id, id(3));
    }

    #[test]
    fn equal_weight_breaks_ties_on_id() {
        let a = WeightedTxId::new(id(1), 1000, 100, 0);
        let b = WeightedTxId::new(id(2), 1000, 100, 5);
        assert!(a < b);
    }

    #[test]
    fn raised_parent_overtakes_medium_sibling() {
        let parent = WeightedTxId::new(id(1), 100, 100, 0);
        let child = WeightedTxId::new(id(2), 5000, 100, 1);
        let medium = WeightedTxId::new(id(3), 2000, 100, 2);

        let raised = parent.with_weight(parent.weight + child.weight);
        let set: BTreeSet<_> = [raised, child, medium].into_iter().collect();
        let ordered: Vec<_> = set.into_iter().collect();
        assert_eq!(ordered[0].id, id(1));
        assert_eq!(ordered[1].id, id(2));
        assert_eq!(ordered[2].id, id(3));
    }

    #[test]
    fn equality_ignores_weight() {
        let a = WeightedTxId::new(id(1), 1000, 100, 0);
        let b = a.with_weight(99_999);
        assert_eq!(a, b);
    }
}
