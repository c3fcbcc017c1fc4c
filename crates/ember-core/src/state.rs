//! In-memory UTXO state implementations.
//!
//! [`MemoryUtxoState`] is a `HashMap`-backed state suitable for tests and
//! tools; a production node backs [`UtxoStateReader`] with its persistent
//! store. [`StatelessValidator`] covers the validator-only capability used
//! when no UTXO set is available.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::traits::{StateValidator, UtxoStateReader, UtxoView};
use crate::types::{BoxId, EmberBox, Transaction, UnconfirmedTransaction};
use crate::validation;

/// A `HashMap`-backed UTXO state.
#[derive(Debug, Clone, Default)]
pub struct MemoryUtxoState {
    boxes: HashMap<BoxId, EmberBox>,
}

impl MemoryUtxoState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unspent box to the state.
    pub fn insert_box(&mut self, box_id: BoxId, ember_box: EmberBox) {
        self.boxes.insert(box_id, ember_box);
    }

    /// Remove a box from the state (spend it). Returns the box if present.
    pub fn remove_box(&mut self, box_id: &BoxId) -> Option<EmberBox> {
        self.boxes.remove(box_id)
    }

    /// Number of unspent boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether the state holds no boxes.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

impl UtxoView for MemoryUtxoState {
    fn box_by_id(&self, box_id: &BoxId) -> Option<EmberBox> {
        self.boxes.get(box_id).cloned()
    }
}

impl UtxoStateReader for MemoryUtxoState {
    fn validate_with_cost(
        &self,
        tx: &Transaction,
        view: &dyn UtxoView,
        max_cost: u64,
    ) -> Result<u64, ValidationError> {
        validation::validate_with_cost(tx, view, max_cost)
    }
}

/// Context-free validator: structural checks plus cost accrual, without
/// resolving input boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatelessValidator;

impl StateValidator for StatelessValidator {
    fn validate_with_cost(
        &self,
        utx: &UnconfirmedTransaction,
        max_cost: u64,
    ) -> Result<u64, ValidationError> {
        validation::validate_structure(&utx.transaction)?;

        // Same cost model as contextual validation, minus box resolution.
        let mut cost = crate::constants::TX_BASE_COST;
        for input in &utx.transaction.inputs {
            cost = cost
                .saturating_add(crate::constants::COST_PER_INPUT)
                .saturating_add(
                    crate::constants::COST_PER_PROOF_BYTE
                        .saturating_mul(input.spending_proof.len() as u64),
                );
        }
        cost = cost.saturating_add(
            crate::constants::COST_PER_OUTPUT.saturating_mul(utx.transaction.outputs.len() as u64),
        );
        if cost > max_cost {
            return Err(ValidationError::CostLimitExceeded { accumulated: cost, max: max_cost });
        }
        Ok(cost)
    }
}
