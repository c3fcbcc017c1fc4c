//! Error types for the Ember protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("serialization: {0}")] Serialization(String),
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("zero-value output at index {0}")] ZeroValueOutput(usize),
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("oversized: {size} > {max}")] OversizedTransaction { size: usize, max: usize },
    #[error("value overflow")] ValueOverflow,
    #[error("output index out of bounds: {index} >= {len}")] OutputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown box: {0}")] UnknownBox(String),
    #[error("cost limit exceeded: {accumulated} > {max}")] CostLimitExceeded { accumulated: u64, max: u64 },
    #[error("insufficient value: inputs {inputs} < outputs {outputs}")] InsufficientValue { inputs: u64, outputs: u64 },
    #[error("missing spending proof on input {index}")] MissingProof { index: usize },
    #[error(transparent)] Transaction(#[from] TransactionError),
}
