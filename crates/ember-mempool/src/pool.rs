//! The ordered transaction pool: five interlocking indices.
//!
//! - `ordered` — weight-ordered map from [`WeightedTxId`] to transaction,
//!   highest weight first; the last entry is the eviction candidate
//! - `registry` — txid → current weighted id
//! - `inputs` — spent box id → weighted id of the spending transaction
//! - `outputs` — created box id → weighted id of the creating transaction
//! - `invalidated` — approximate cache of recently invalidated ids
//!
//! Every public operation leaves the indices mutually consistent and the
//! pool within capacity. Weight propagation keeps the family invariant:
//! a pooled parent never weighs less than any pooled child spending it.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, error};

use ember_core::types::{BoxId, EmberBox, TxId, UnconfirmedTransaction};

use crate::cache::{InvalidatedCache, InvalidatedCacheConfig};
use crate::weighted::WeightedTxId;

/// Weight-ordered pool of unconfirmed transactions.
///
/// Mutation happens in place under the mempool's single-writer contract;
/// each public method commits an atomic post-state, so observers never see
/// a half-updated generation.
#[derive(Debug, Clone)]
pub struct OrderedTxPool {
    ordered: BTreeMap<WeightedTxId, UnconfirmedTransaction>,
    registry: HashMap<TxId, WeightedTxId>,
    inputs: HashMap<BoxId, WeightedTxId>,
    outputs: HashMap<BoxId, WeightedTxId>,
    invalidated: InvalidatedCache,
    capacity: usize,
    fee_proposition: Vec<u8>,
}

impl OrderedTxPool {
    /// Create an empty pool.
    pub fn new(
        capacity: usize,
        fee_proposition: Vec<u8>,
        cache_config: &InvalidatedCacheConfig,
    ) -> Self {
        Self {
            ordered: BTreeMap::new(),
            registry: HashMap::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            invalidated: InvalidatedCache::new(cache_config),
            capacity,
            fee_proposition,
        }
    }

    /// Build the ordering key for `utx` against the current clock.
    pub fn weighted(&self, utx: &UnconfirmedTransaction) -> WeightedTxId {
        WeightedTxId::weighted(utx, &self.fee_proposition)
    }

    /// Install a transaction, propagate its weight to pooled ancestors,
    /// and evict the lowest-weight entry if capacity is exceeded.
    ///
    /// Insertion happens before the eviction check: the arriving
    /// transaction may raise an ancestor's weight and thereby shift the
    /// eviction victim, so the victim can only be chosen after
    /// propagation. Re-putting a pooled id replaces the old entry.
    pub fn put(&mut self, utx: UnconfirmedTransaction) {
        if self.registry.contains_key(&utx.id) {
            self.remove(&utx);
        }

        let wtx = self.weighted(&utx);
        let spent: Vec<BoxId> = utx.transaction.inputs.iter().map(|i| i.box_id).collect();
        for box_id in &spent {
            self.inputs.insert(*box_id, wtx.clone());
        }
        for box_id in &utx.output_ids {
            self.outputs.insert(*box_id, wtx.clone());
        }
        self.registry.insert(utx.id, wtx.clone());
        let weight = wtx.weight;
        self.ordered.insert(wtx, utx);

        self.update_family(&spent, weight);

        if self.ordered.len() > self.capacity {
            if let Some(victim) = self.ordered.iter().next_back().map(|(_, v)| v.clone()) {
                debug!(txid = %victim.id, "pool over capacity, evicting lowest-weight entry");
                self.remove(&victim);
            }
        }
    }

    /// Drop a transaction from all indices and lower its ancestors'
    /// weights accordingly. No-op when the id is not pooled.
    pub fn remove(&mut self, utx: &UnconfirmedTransaction) {
        let Some(wtx) = self.registry.remove(&utx.id) else {
            return;
        };
        let Some(stored) = self.ordered.remove(&wtx) else {
            error!(txid = %utx.id, "registry entry without ordered entry");
            return;
        };
        let spent: Vec<BoxId> = stored.transaction.inputs.iter().map(|i| i.box_id).collect();
        for box_id in &spent {
            self.inputs.remove(box_id);
        }
        for box_id in &stored.output_ids {
            self.outputs.remove(box_id);
        }
        self.update_family(&spent, -wtx.weight);
    }

    /// Like [`remove`](Self::remove), but also record the id in the
    /// invalidated cache. The id is recorded even when not pooled.
    pub fn invalidate(&mut self, utx: &UnconfirmedTransaction) {
        self.remove(utx);
        self.invalidated.put(utx.id);
    }

    /// Whether the pool would admit `utx`: not invalidated, not a
    /// duplicate, and either below capacity or weighty enough to displace
    /// the current tail. Never mutates state.
    ///
    /// Family propagation only ever raises ancestors, so the candidate's
    /// own fee rate is its post-propagation weight and the comparison can
    /// be made analytically.
    pub fn can_accept(&self, utx: &UnconfirmedTransaction) -> bool {
        !self.is_invalidated(&utx.id)
            && !self.contains(&utx.id)
            && (self.ordered.len() < self.capacity
                || self
                    .min_weight()
                    .is_some_and(|tail| self.weighted(utx).weight > tail))
    }

    /// Walk pooled ancestors of `tx` through the output index, adjusting
    /// each ancestor's weight by `delta` exactly once.
    ///
    /// Acyclicity of the spend DAG bounds the walk; a visited set keeps it
    /// linear in the ancestor count. An output reference whose weighted id
    /// is missing from the ordered map is an invariant breach: it is
    /// logged and the walk aborted rather than silently repaired.
    fn update_family(&mut self, spent: &[BoxId], delta: i64) {
        let mut work: Vec<BoxId> = spent.to_vec();
        let mut visited: HashSet<TxId> = HashSet::new();

        while let Some(box_id) = work.pop() {
            let Some(parent) = self.outputs.get(&box_id).cloned() else {
                continue;
            };
            if !visited.insert(parent.id) {
                continue;
            }
            let Some(parent_utx) = self.ordered.remove(&parent) else {
                error!(
                    txid = %parent.id,
                    weight = parent.weight,
                    "output index references a weight missing from the ordered map"
                );
                return;
            };

            let updated = parent.with_weight(parent.weight.saturating_add(delta));
            self.registry.insert(updated.id, updated.clone());
            for input in &parent_utx.transaction.inputs {
                self.inputs.insert(input.box_id, updated.clone());
                work.push(input.box_id);
            }
            for out_id in &parent_utx.output_ids {
                self.outputs.insert(*out_id, updated.clone());
            }
            self.ordered.insert(updated, parent_utx);
        }
    }

    // --- Queries ---

    /// Number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a transaction with the given id is pooled.
    pub fn contains(&self, id: &TxId) -> bool {
        self.registry.contains_key(id)
    }

    /// Whether the invalidated cache remembers this id.
    pub fn is_invalidated(&self, id: &TxId) -> bool {
        self.invalidated.might_contain(id)
    }

    /// Get a pooled transaction by id.
    pub fn get(&self, id: &TxId) -> Option<&UnconfirmedTransaction> {
        self.ordered.get(self.registry.get(id)?)
    }

    /// Current weighted id of a pooled transaction.
    pub fn weighted_id(&self, id: &TxId) -> Option<&WeightedTxId> {
        self.registry.get(id)
    }

    /// Iterate transactions in priority order, highest weight first.
    pub fn iter(&self) -> impl Iterator<Item = &UnconfirmedTransaction> {
        self.ordered.values()
    }

    /// Iterate weighted ids in priority order.
    pub fn weighted_ids(&self) -> impl Iterator<Item = &WeightedTxId> {
        self.ordered.keys()
    }

    /// Weighted id of the pooled transaction spending `box_id`, if any.
    pub fn spender_of(&self, box_id: &BoxId) -> Option<&WeightedTxId> {
        self.inputs.get(box_id)
    }

    /// Weighted id of the pooled transaction that created `box_id`, if any.
    pub fn creator_of(&self, box_id: &BoxId) -> Option<&WeightedTxId> {
        self.outputs.get(box_id)
    }

    /// The box created under `box_id` by a pooled transaction, if any.
    pub fn output_box(&self, box_id: &BoxId) -> Option<&EmberBox> {
        let wtx = self.outputs.get(box_id)?;
        let utx = self.ordered.get(wtx)?;
        let position = utx.output_ids.iter().position(|id| id == box_id)?;
        utx.transaction.outputs.get(position)
    }

    /// Iterate all box ids currently spent by pooled transactions.
    pub fn spent_inputs(&self) -> impl Iterator<Item = &BoxId> {
        self.inputs.keys()
    }

    /// Weight of the pool's lowest-priority entry.
    pub fn min_weight(&self) -> Option<i64> {
        self.ordered.keys().next_back().map(|wtx| wtx.weight)
    }

    /// How many pooled entries outweigh the given weight.
    pub fn rank_by_weight(&self, weight: i64) -> usize {
        self.ordered
            .keys()
            .take_while(|wtx| wtx.weight > weight)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::constants::{COIN, FEE_PROPOSITION};
    use ember_core::types::{EmberBox, Input, Transaction};

    fn pool(capacity: usize) -> OrderedTxPool {
        OrderedTxPool::new(
            capacity,
            FEE_PROPOSITION.to_vec(),
            &InvalidatedCacheConfig::default(),
        )
    }

    /// Transaction spending a synthetic box, paying `fee` to the fee
    /// proposition. Fees in tests stay within one varint bucket so equal
    /// structures serialize to equal sizes.
    fn make_tx(seed: u8, fee: u64) -> Transaction {
        Transaction {
            inputs: vec![Input {
                box_id: BoxId([seed; 32]),
                spending_proof: vec![0u8; 64],
            }],
            outputs: vec![
                EmberBox { value: COIN, proposition: vec![0x01, seed] },
                EmberBox { value: fee, proposition: FEE_PROPOSITION.to_vec() },
            ],
        }
    }

    fn make_utx(seed: u8, fee: u64) -> UnconfirmedTransaction {
        UnconfirmedTransaction::new(make_tx(seed, fee)).unwrap()
    }

    /// Transaction spending output `index` of `parent`.
    fn child_of(parent: &UnconfirmedTransaction, index: usize, fee: u64) -> UnconfirmedTransaction {
        let tx = Transaction {
            inputs: vec![Input {
                box_id: parent.output_ids[index],
                spending_proof: vec![0u8; 64],
            }],
            outputs: vec![
                EmberBox { value: COIN / 2, proposition: vec![0x01, 0xFF] },
                EmberBox { value: fee, proposition: FEE_PROPOSITION.to_vec() },
            ],
        };
        UnconfirmedTransaction::new(tx).unwrap()
    }

    // --- put / remove ---

    #[test]
    fn put_indexes_all_boxes() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.put(utx.clone());

        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&utx.id));
        assert_eq!(pool.get(&utx.id).unwrap().id, utx.id);
        assert!(pool.spender_of(&utx.transaction.inputs[0].box_id).is_some());
        for box_id in &utx.output_ids {
            assert_eq!(pool.creator_of(box_id).unwrap().id, utx.id);
        }
    }

    #[test]
    fn remove_restores_empty_indices() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.put(utx.clone());
        pool.remove(&utx);

        assert!(pool.is_empty());
        assert!(!pool.contains(&utx.id));
        assert!(pool.spender_of(&utx.transaction.inputs[0].box_id).is_none());
        assert!(pool.creator_of(&utx.output_ids[0]).is_none());
        assert_eq!(pool.spent_inputs().count(), 0);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut pool = pool(10);
        pool.put(make_utx(1, 2_000_000));
        pool.remove(&make_utx(2, 2_000_000));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn reput_replaces_old_entry() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.put(utx.clone());
        pool.put(utx.clone());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.iter().count(), 1);
    }

    // --- Ordering and eviction ---

    #[test]
    fn iteration_is_highest_weight_first() {
        let mut pool = pool(10);
        let low = make_utx(1, 2_000_000);
        let high = make_utx(2, 20_000_000);
        let mid = make_utx(3, 5_000_000);
        pool.put(low.clone());
        pool.put(high.clone());
        pool.put(mid.clone());

        let order: Vec<TxId> = pool.iter().map(|utx| utx.id).collect();
        assert_eq!(order, vec![high.id, mid.id, low.id]);
    }

    #[test]
    fn capacity_eviction_drops_lowest_weight() {
        let mut pool = pool(2);
        let low = make_utx(1, 2_000_000);
        let high = make_utx(2, 20_000_000);
        pool.put(low.clone());
        pool.put(high.clone());

        let mid = make_utx(3, 5_000_000);
        pool.put(mid.clone());

        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&low.id));
        assert!(pool.contains(&high.id));
        assert!(pool.contains(&mid.id));
    }

    #[test]
    fn eviction_cleans_victim_indices() {
        let mut pool = pool(1);
        let low = make_utx(1, 2_000_000);
        pool.put(low.clone());
        pool.put(make_utx(2, 20_000_000));

        assert!(pool.spender_of(&low.transaction.inputs[0].box_id).is_none());
        assert!(pool.creator_of(&low.output_ids[0]).is_none());
    }

    // --- Family weights ---

    #[test]
    fn child_raises_parent_weight() {
        let mut pool = pool(10);
        let parent = make_utx(1, 2_000_000);
        pool.put(parent.clone());
        let parent_fee_rate = pool.weighted_id(&parent.id).unwrap().fee_per_kb;

        let child = child_of(&parent, 0, 10_000_000);
        pool.put(child.clone());

        let child_weight = pool.weighted_id(&child.id).unwrap().weight;
        let parent_weight = pool.weighted_id(&parent.id).unwrap().weight;
        assert_eq!(parent_weight, parent_fee_rate + child_weight);
        assert!(parent_weight > child_weight);
    }

    #[test]
    fn grandparent_receives_grandchild_weight() {
        let mut pool = pool(10);
        let a = make_utx(1, 2_000_000);
        pool.put(a.clone());
        let b = child_of(&a, 0, 2_000_000);
        pool.put(b.clone());
        let c = child_of(&b, 0, 8_000_000);
        pool.put(c.clone());

        let wa = pool.weighted_id(&a.id).unwrap().weight;
        let wb = pool.weighted_id(&b.id).unwrap().weight;
        let wc = pool.weighted_id(&c.id).unwrap().weight;
        assert!(wa >= wb, "parent below child: {wa} < {wb}");
        assert!(wb >= wc, "parent below child: {wb} < {wc}");

        // Ancestors sort before descendants.
        let order: Vec<TxId> = pool.iter().map(|utx| utx.id).collect();
        assert_eq!(order, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn removing_child_restores_parent_weight() {
        let mut pool = pool(10);
        let parent = make_utx(1, 2_000_000);
        pool.put(parent.clone());
        let original = pool.weighted_id(&parent.id).unwrap().weight;

        let child = child_of(&parent, 0, 10_000_000);
        pool.put(child.clone());
        pool.remove(&child);

        assert_eq!(pool.weighted_id(&parent.id).unwrap().weight, original);
    }

    #[test]
    fn family_keeps_parent_ahead_of_cheap_tail() {
        // A cheap parent with an expensive child must outrank a mid-fee
        // standalone transaction, so eviction hits the standalone first.
        let mut pool = pool(10);
        let parent = make_utx(1, 1_000_000);
        pool.put(parent.clone());
        let child = child_of(&parent, 0, 10_000_000);
        pool.put(child.clone());
        let standalone = make_utx(3, 3_000_000);
        pool.put(standalone.clone());

        let order: Vec<TxId> = pool.iter().map(|utx| utx.id).collect();
        assert_eq!(order.last(), Some(&standalone.id));
    }

    // --- invalidate / can_accept ---

    #[test]
    fn invalidate_removes_and_remembers() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.put(utx.clone());
        pool.invalidate(&utx);

        assert!(!pool.contains(&utx.id));
        assert!(pool.is_invalidated(&utx.id));
        assert!(!pool.can_accept(&utx));
    }

    #[test]
    fn invalidate_absent_still_remembers() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.invalidate(&utx);
        assert!(pool.is_invalidated(&utx.id));
    }

    #[test]
    fn can_accept_fresh_tx() {
        let pool = pool(10);
        assert!(pool.can_accept(&make_utx(1, 2_000_000)));
    }

    #[test]
    fn cannot_accept_duplicate() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.put(utx.clone());
        assert!(!pool.can_accept(&utx));
    }

    #[test]
    fn at_capacity_needs_strictly_higher_weight() {
        let mut pool = pool(1);
        let pooled = make_utx(1, 2_000_000);
        pool.put(pooled.clone());

        // Identical fee and size gives an equal weight: rejected.
        let equal = make_utx(2, 2_000_000);
        assert_eq!(
            pool.weighted(&equal).weight,
            pool.min_weight().unwrap(),
            "test setup requires equal weights"
        );
        assert!(!pool.can_accept(&equal));

        let heavier = make_utx(3, 4_000_000);
        assert!(pool.can_accept(&heavier));
    }

    // --- rank / min weight ---

    #[test]
    fn rank_counts_strictly_heavier_entries() {
        let mut pool = pool(10);
        pool.put(make_utx(1, 2_000_000));
        pool.put(make_utx(2, 20_000_000));
        let mid_weight = {
            let weights: Vec<i64> = pool.weighted_ids().map(|w| w.weight).collect();
            (weights[0] + weights[1]) / 2
        };

        assert_eq!(pool.rank_by_weight(mid_weight), 1);
        assert_eq!(pool.rank_by_weight(i64::MAX), 0);
        assert_eq!(pool.rank_by_weight(i64::MIN), 2);
    }

    #[test]
    fn output_box_resolves_pooled_outputs() {
        let mut pool = pool(10);
        let utx = make_utx(1, 2_000_000);
        pool.put(utx.clone());

        let resolved = pool.output_box(&utx.output_ids[1]).unwrap();
        assert_eq!(resolved, &utx.transaction.outputs[1]);
        assert!(pool.output_box(&BoxId([0xEE; 32])).is_none());
    }
}
