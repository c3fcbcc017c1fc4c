//! Trait interfaces for the Ember protocol.
//!
//! These traits define the contracts between crates:
//! - [`UtxoView`] — read-only box availability (state layers implement)
//! - [`UtxoStateReader`] — UTXO-backed state with cost-bounded validation
//! - [`StateValidator`] — context-free cost-bounded validation
//! - [`NodeState`] — the state capability handed to the mempool

use crate::error::ValidationError;
use crate::types::{BoxId, EmberBox, Transaction, UnconfirmedTransaction};

/// Read-only view of box (UTXO) availability.
///
/// The mempool layers its own unspent outputs over a base view so that a
/// chained transaction can resolve the boxes of a still-pooled parent.
pub trait UtxoView: Send + Sync {
    /// Look up a box by id. Returns `None` if spent or unknown.
    fn box_by_id(&self, box_id: &BoxId) -> Option<EmberBox>;

    /// Check whether a box exists and is unspent.
    ///
    /// Default implementation delegates to [`box_by_id`](Self::box_by_id).
    fn contains_box(&self, box_id: &BoxId) -> bool {
        self.box_by_id(box_id).is_some()
    }
}

/// A UTXO-backed state capable of fully validating a transaction.
///
/// `view` is the box-resolution context — typically the state itself with
/// the mempool's outputs layered on top, so descendants of pooled
/// transactions validate against their parents' outputs.
pub trait UtxoStateReader: UtxoView {
    /// Validate `tx` against `view`, accruing cost as checks run.
    ///
    /// Returns the accumulated cost, or an error the moment a check fails
    /// or the accumulator exceeds `max_cost`.
    fn validate_with_cost(
        &self,
        tx: &Transaction,
        view: &dyn UtxoView,
        max_cost: u64,
    ) -> Result<u64, ValidationError>;
}

/// Context-free cost-bounded validation capability.
///
/// Used when the node runs without a full UTXO set but can still check a
/// transaction on its own terms.
pub trait StateValidator: Send + Sync {
    /// Validate `utx`, accruing cost as checks run.
    fn validate_with_cost(
        &self,
        utx: &UnconfirmedTransaction,
        max_cost: u64,
    ) -> Result<u64, ValidationError>;
}

/// The state capability a caller hands to `Mempool::process`.
///
/// `Digest` carries no validation capability at all: the mempool admits
/// the transaction on the caller's word (typically the local wallet).
#[derive(Clone, Copy)]
pub enum NodeState<'a> {
    /// Full UTXO set: resolve input boxes and validate with cost.
    Utxo(&'a dyn UtxoStateReader),
    /// No UTXO set, but a validator is available.
    Validator(&'a dyn StateValidator),
    /// Digest-only state: skip validation, trust the caller.
    Digest,
}
