//! Transaction validation with cost accounting.
//!
//! Two levels of validation:
//!
//! - **Structural** ([`validate_structure`]): context-free checks on
//!   transaction format and internal consistency. No external state required.
//! - **Contextual** ([`validate_with_cost`]): box-aware checks including
//!   input resolution and value conservation, metered by a cost accumulator
//!   that aborts the moment it passes the caller's budget.

use std::collections::HashSet;

use crate::constants::{
    COST_PER_INPUT, COST_PER_OUTPUT, COST_PER_PROOF_BYTE, MAX_TX_SIZE, TX_BASE_COST,
};
use crate::error::{TransactionError, ValidationError};
use crate::traits::UtxoView;
use crate::types::Transaction;

/// Validate transaction structure (context-free).
///
/// - Non-empty inputs and outputs
/// - All output values are non-zero
/// - Total output value does not overflow
/// - No duplicate input box ids
/// - Serialized size is within [`MAX_TX_SIZE`]
pub fn validate_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 {
            return Err(TransactionError::ZeroValueOutput(i));
        }
    }

    if tx.total_output_value().is_none() {
        return Err(TransactionError::ValueOverflow);
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.box_id) {
            return Err(TransactionError::DuplicateInput(input.box_id.to_string()));
        }
    }

    let size = tx.serialized_size()?;
    if size > MAX_TX_SIZE {
        return Err(TransactionError::OversizedTransaction { size, max: MAX_TX_SIZE });
    }

    Ok(())
}

/// Validate `tx` against the boxes visible through `view`.
///
/// Runs structural validation, then resolves and charges for every input
/// and output. The accumulator starts at [`TX_BASE_COST`] and the function
/// returns [`ValidationError::CostLimitExceeded`] as soon as it passes
/// `max_cost`, without finishing the remaining checks.
///
/// Value conservation requires `Σ inputs ≥ Σ outputs`; the difference is
/// the fee, collected by whichever output carries the fee proposition.
pub fn validate_with_cost(
    tx: &Transaction,
    view: &dyn UtxoView,
    max_cost: u64,
) -> Result<u64, ValidationError> {
    validate_structure(tx)?;

    let mut cost = 0u64;
    charge(&mut cost, TX_BASE_COST, max_cost)?;

    let mut input_total = 0u64;
    for (index, input) in tx.inputs.iter().enumerate() {
        let proof_cost = COST_PER_PROOF_BYTE
            .saturating_mul(input.spending_proof.len() as u64);
        charge(&mut cost, COST_PER_INPUT.saturating_add(proof_cost), max_cost)?;

        if input.spending_proof.is_empty() {
            return Err(ValidationError::MissingProof { index });
        }

        let spent = view
            .box_by_id(&input.box_id)
            .ok_or_else(|| ValidationError::UnknownBox(input.box_id.to_string()))?;
        input_total = input_total
            .checked_add(spent.value)
            .ok_or(TransactionError::ValueOverflow)?;
    }

    for _ in &tx.outputs {
        charge(&mut cost, COST_PER_OUTPUT, max_cost)?;
    }

    // Structure validation guarantees the output sum does not overflow.
    let output_total = tx.total_output_value().unwrap_or(u64::MAX);
    if input_total < output_total {
        return Err(ValidationError::InsufficientValue {
            inputs: input_total,
            outputs: output_total,
        });
    }

    Ok(cost)
}

fn charge(cost: &mut u64, amount: u64, max_cost: u64) -> Result<(), ValidationError> {
    *cost = cost.saturating_add(amount);
    if *cost > max_cost {
        return Err(ValidationError::CostLimitExceeded { accumulated: *cost, max: max_cost });
    }
    Ok(())
}
