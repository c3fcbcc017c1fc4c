//! The mempool orchestrator: acceptance pipeline, double-spend
//! arbitration, and read queries over one [`OrderedTxPool`] and one
//! [`PoolStats`].
//!
//! [`Mempool::process`] never returns an error across the boundary; every
//! call reports exactly one [`ProcessingOutcome`].

use std::collections::HashSet;

use rand::Rng;
use tracing::debug;

use ember_core::traits::{NodeState, StateValidator, UtxoStateReader, UtxoView};
use ember_core::types::{now_millis, BoxId, EmberBox, TxId, UnconfirmedTransaction};

use crate::config::MempoolConfig;
use crate::pool::OrderedTxPool;
use crate::stats::{PoolStats, WAIT_HISTOGRAM_BINS};
use crate::weighted::WeightedTxId;

/// Result reported for every [`Mempool::process`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Installed, possibly after evicting conflicts or the pool tail.
    Accepted,
    /// A conflicting pool transaction set outweighed the candidate;
    /// carries the winners' ids.
    DoubleSpendingLoser(Vec<TxId>),
    /// Rejected without prejudice: the transaction may be re-offered.
    Declined(String),
    /// Rejected and recorded in the invalidated cache.
    Invalidated(String),
}

impl ProcessingOutcome {
    /// Whether the transaction was installed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Whether the transaction was declined (re-offerable).
    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined(_))
    }
}

/// A box-resolution view layering the pool's created outputs over a base
/// state view, so descendants of pooled transactions can resolve their
/// parents' boxes before those parents confirm.
pub struct PooledUtxoView<'a, V: UtxoView + ?Sized> {
    base: &'a V,
    pool: &'a OrderedTxPool,
}

impl<'a, V: UtxoView + ?Sized> PooledUtxoView<'a, V> {
    pub fn new(base: &'a V, pool: &'a OrderedTxPool) -> Self {
        Self { base, pool }
    }
}

impl<V: UtxoView + ?Sized> UtxoView for PooledUtxoView<'_, V> {
    fn box_by_id(&self, box_id: &BoxId) -> Option<EmberBox> {
        self.pool
            .output_box(box_id)
            .cloned()
            .or_else(|| self.base.box_by_id(box_id))
    }
}

/// The transaction memory pool.
///
/// Single-writer: all mutating calls run on one logical owner. Readers go
/// through [`reader`](Self::reader) or the query methods, which observe
/// only committed generations.
#[derive(Debug, Clone)]
pub struct Mempool {
    pool: OrderedTxPool,
    stats: PoolStats,
    config: MempoolConfig,
}

impl Mempool {
    /// Create an empty mempool under the given configuration.
    pub fn new(config: MempoolConfig) -> Self {
        let pool = OrderedTxPool::new(
            config.capacity,
            config.fee_proposition.clone(),
            &config.cache,
        );
        Self { pool, stats: PoolStats::new(), config }
    }

    /// Run the acceptance state machine for an arriving transaction.
    ///
    /// Blacklist → fee floor → acceptance gate → validation (dispatched on
    /// the state capability) → double-spend arbitration.
    pub fn process(
        &mut self,
        mut utx: UnconfirmedTransaction,
        state: NodeState<'_>,
    ) -> ProcessingOutcome {
        if self.config.blacklisted.contains(&utx.id) {
            self.pool.invalidate(&utx);
            return ProcessingOutcome::Invalidated("blacklisted".into());
        }

        let fee = utx.transaction.fee(&self.config.fee_proposition);
        if fee < self.config.minimal_fee {
            return ProcessingOutcome::Declined(format!(
                "min fee not met: {fee} < {}",
                self.config.minimal_fee
            ));
        }

        if !self.pool.can_accept(&utx) {
            return ProcessingOutcome::Declined("pool full or transaction invalidated".into());
        }

        match state {
            NodeState::Utxo(reader) => {
                let view = PooledUtxoView::new(reader, &self.pool);
                if let Some(missing) = utx
                    .transaction
                    .inputs
                    .iter()
                    .find(|input| !view.contains_box(&input.box_id))
                {
                    // Possibly a descendant of a parent we have not seen
                    // yet: declined, not invalidated.
                    return ProcessingOutcome::Declined(format!(
                        "not all utxos in place yet: missing box {}",
                        missing.box_id
                    ));
                }
                match reader.validate_with_cost(
                    &utx.transaction,
                    &view,
                    self.config.max_transaction_cost,
                ) {
                    Ok(cost) => utx.cost = Some(cost),
                    Err(e) => {
                        self.pool.invalidate(&utx);
                        return ProcessingOutcome::Invalidated(e.to_string());
                    }
                }
            }
            NodeState::Validator(validator) => {
                match validator.validate_with_cost(&utx, self.config.max_transaction_cost) {
                    Ok(cost) => utx.cost = Some(cost),
                    Err(e) => {
                        self.pool.invalidate(&utx);
                        return ProcessingOutcome::Invalidated(e.to_string());
                    }
                }
            }
            // Digest-only state: trust the caller (typically the wallet).
            NodeState::Digest => {}
        }

        self.accept_if_no_double_spend(utx)
    }

    /// Install `utx` unless pooled conflicts collectively outweigh it.
    ///
    /// A conflict set wins when its mean weight is at least the
    /// candidate's weight; otherwise every conflicting transaction is
    /// evicted (observed by stats) and the candidate takes their place.
    fn accept_if_no_double_spend(&mut self, utx: UnconfirmedTransaction) -> ProcessingOutcome {
        let mut conflicts: Vec<WeightedTxId> = Vec::new();
        for input in &utx.transaction.inputs {
            if let Some(wtx) = self.pool.spender_of(&input.box_id) {
                if !conflicts.iter().any(|seen| seen.id == wtx.id) {
                    conflicts.push(wtx.clone());
                }
            }
        }

        if conflicts.is_empty() {
            debug!(txid = %utx.id, "accepted transaction");
            self.pool.put(utx);
            return ProcessingOutcome::Accepted;
        }

        let candidate = self.pool.weighted(&utx);
        let total: i128 = conflicts.iter().map(|wtx| wtx.weight as i128).sum();
        let mean = (total / conflicts.len() as i128) as i64;

        if candidate.weight > mean {
            let now = now_millis();
            for wtx in &conflicts {
                if let Some(victim) = self.pool.get(&wtx.id).cloned() {
                    debug!(txid = %victim.id, by = %utx.id, "replaced double-spent transaction");
                    self.pool.remove(&victim);
                    self.stats.add(now, wtx);
                }
            }
            self.pool.put(utx);
            ProcessingOutcome::Accepted
        } else {
            ProcessingOutcome::DoubleSpendingLoser(
                conflicts.into_iter().map(|wtx| wtx.id).collect(),
            )
        }
    }

    // --- Mutators outside the process pipeline ---

    /// Install a transaction if the pool would accept it. Returns whether
    /// it was installed.
    pub fn put(&mut self, utx: UnconfirmedTransaction) -> bool {
        if self.pool.can_accept(&utx) {
            self.pool.put(utx);
            true
        } else {
            false
        }
    }

    /// [`put`](Self::put) for every transaction in the iterator.
    pub fn put_all<I>(&mut self, transactions: I)
    where
        I: IntoIterator<Item = UnconfirmedTransaction>,
    {
        for utx in transactions {
            self.put(utx);
        }
    }

    /// Install transactions bypassing the acceptance gate: duplicates are
    /// replaced and invalidated ids are readmitted. For trusted callers
    /// re-seeding the pool, e.g. after a chain rollback.
    pub fn put_without_check<I>(&mut self, transactions: I)
    where
        I: IntoIterator<Item = UnconfirmedTransaction>,
    {
        for utx in transactions {
            self.pool.put(utx);
        }
    }

    /// Remove a transaction taken into a block, recording its pool
    /// residency in the wait-time stats.
    pub fn remove(&mut self, utx: &UnconfirmedTransaction) {
        if let Some(wtx) = self.pool.weighted_id(&utx.id).cloned() {
            self.stats.add(now_millis(), &wtx);
            self.pool.remove(utx);
            debug!(txid = %utx.id, "removed transaction from pool");
        }
    }

    /// Keep only transactions satisfying the predicate. Used for reorg
    /// cleanup; removals are not recorded in stats.
    pub fn filter<F>(&mut self, predicate: F)
    where
        F: Fn(&UnconfirmedTransaction) -> bool,
    {
        let discarded: Vec<UnconfirmedTransaction> = self
            .pool
            .iter()
            .filter(|&utx| !predicate(utx))
            .cloned()
            .collect();
        for utx in &discarded {
            self.pool.remove(utx);
        }
    }

    /// Remove every transaction whose id is in `ids`.
    pub fn filter_out(&mut self, ids: &HashSet<TxId>) {
        self.filter(|utx| !ids.contains(&utx.id));
    }

    /// Remove a transaction and remember its id as invalidated.
    pub fn invalidate(&mut self, utx: &UnconfirmedTransaction) {
        debug!(txid = %utx.id, "invalidated transaction");
        self.pool.invalidate(utx);
    }

    // --- Queries ---

    /// Number of pooled transactions.
    pub fn size(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Whether the pool holds a transaction with this id.
    pub fn contains(&self, id: &TxId) -> bool {
        self.pool.contains(id)
    }

    /// Get a pooled transaction by id.
    pub fn get(&self, id: &TxId) -> Option<&UnconfirmedTransaction> {
        self.pool.get(id)
    }

    /// Pooled transactions for the given ids, skipping unknown ones.
    pub fn get_all(&self, ids: &[TxId]) -> Vec<&UnconfirmedTransaction> {
        ids.iter().filter_map(|id| self.pool.get(id)).collect()
    }

    /// The first `n` transactions by priority, highest weight first.
    pub fn take(&self, n: usize) -> impl Iterator<Item = &UnconfirmedTransaction> {
        self.pool.iter().take(n)
    }

    /// All pooled transactions, highest weight first.
    pub fn get_all_prioritized(&self) -> Vec<&UnconfirmedTransaction> {
        self.pool.iter().collect()
    }

    /// Weighted ids of the first `limit` transactions by priority, for
    /// miners assembling a block.
    pub fn weighted_transaction_ids(&self, limit: usize) -> Vec<WeightedTxId> {
        self.pool.weighted_ids().take(limit).cloned().collect()
    }

    /// A contiguous priority-ordered slice of `min(n, size)` transactions
    /// starting at a uniformly random index in `[0, size − n]`.
    ///
    /// Sampling a contiguous run is cheap but biased away from the pool
    /// tail: the tail can only appear in one starting position.
    pub fn random(&self, n: usize) -> Vec<&UnconfirmedTransaction> {
        let total = self.size();
        let n = n.min(total);
        if n == 0 {
            return Vec::new();
        }
        let start = rand::thread_rng().gen_range(0..=total - n);
        self.pool.iter().skip(start).take(n).collect()
    }

    /// All box ids currently spent by pooled transactions.
    pub fn spent_inputs(&self) -> impl Iterator<Item = &BoxId> {
        self.pool.spent_inputs()
    }

    /// Total fee carried by all pooled transactions.
    pub fn total_fee(&self) -> u64 {
        self.pool
            .iter()
            .fold(0u64, |acc, utx| {
                acc.saturating_add(utx.transaction.fee(&self.config.fee_proposition))
            })
    }

    /// Fee for a `tx_size`-byte transaction to leave the pool within
    /// `max_wait_minutes`, from the cheapest non-empty histogram bin at or
    /// below that wait; the configured minimal fee when no bin qualifies.
    pub fn get_recommended_fee(&self, max_wait_minutes: usize, tx_size: usize) -> u64 {
        let last = max_wait_minutes.min(WAIT_HISTOGRAM_BINS - 1);
        for minute in 0..=last {
            let bin = self.stats.bin(minute);
            if !bin.is_empty() {
                return ((bin.avg_fee_per_kb() as u128 * tx_size as u128) / 1024)
                    .min(u64::MAX as u128) as u64;
            }
        }
        self.config.minimal_fee
    }

    /// Estimated wait in millis for a transaction of the given fee and
    /// size, scaling elapsed measurement time by the candidate's rank
    /// among pooled weights. Zero before any removal has been observed.
    pub fn get_expected_wait_time(&self, fee: u64, tx_size: usize) -> u64 {
        let taken = self.stats.taken_txns();
        if taken == 0 {
            return 0;
        }
        let now = now_millis();
        let candidate = WeightedTxId::new(TxId::ZERO, fee, tx_size, now);
        let position = self.pool.rank_by_weight(candidate.weight) as u128;
        let elapsed = now.saturating_sub(self.stats.start_measurement()) as u128;
        ((elapsed * position) / taken as u128).min(u64::MAX as u128) as u64
    }

    /// Wait-time statistics accumulated so far.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// A read-only facade for API layers.
    pub fn reader(&self) -> MempoolReader<'_> {
        MempoolReader { mempool: self }
    }
}

/// Read-only view of a [`Mempool`].
#[derive(Clone, Copy)]
pub struct MempoolReader<'a> {
    mempool: &'a Mempool,
}

impl<'a> MempoolReader<'a> {
    pub fn size(&self) -> usize {
        self.mempool.size()
    }

    pub fn contains(&self, id: &TxId) -> bool {
        self.mempool.contains(id)
    }

    pub fn get(&self, id: &TxId) -> Option<&'a UnconfirmedTransaction> {
        self.mempool.get(id)
    }

    pub fn get_all_prioritized(&self) -> Vec<&'a UnconfirmedTransaction> {
        self.mempool.get_all_prioritized()
    }

    pub fn weighted_transaction_ids(&self, limit: usize) -> Vec<WeightedTxId> {
        self.mempool.weighted_transaction_ids(limit)
    }

    pub fn random(&self, n: usize) -> Vec<&'a UnconfirmedTransaction> {
        let total = self.mempool.size();
        let n = n.min(total);
        if n == 0 {
            return Vec::new();
        }
        let start = rand::thread_rng().gen_range(0..=total - n);
        self.mempool.pool.iter().skip(start).take(n).collect()
    }

    pub fn spent_inputs(&self) -> impl Iterator<Item = &'a BoxId> {
        self.mempool.spent_inputs()
    }

    pub fn get_recommended_fee(&self, max_wait_minutes: usize, tx_size: usize) -> u64 {
        self.mempool.get_recommended_fee(max_wait_minutes, tx_size)
    }

    pub fn get_expected_wait_time(&self, fee: u64, tx_size: usize) -> u64 {
        self.mempool.get_expected_wait_time(fee, tx_size)
    }
}
