//! Protocol constants. All monetary values in nanos (1 EMBER = 10^9 nanos).

pub const COIN: u64 = 1_000_000_000;

/// Script under which transaction fees are paid.
///
/// An output whose proposition equals these bytes is collectable by the
/// miner of the including block; the mempool sums such outputs to obtain
/// the transaction fee.
pub const FEE_PROPOSITION: &[u8] = &[0x02];

/// Script tag for pay-to-pubkey-hash outputs: `0x01 || 32-byte hash`.
pub const P2PKH_TAG: u8 = 0x01;

/// Minimal fee for a transaction to be relayed or pooled.
pub const MIN_TX_FEE: u64 = 1_000_000;

/// Maximum serialized transaction size in bytes.
pub const MAX_TX_SIZE: usize = 100_000;

/// Upper bound on the validation cost of a single transaction.
///
/// Validation accrues cost per input, output, and proof byte; once the
/// accumulator passes this bound the transaction is rejected without
/// finishing the remaining checks.
pub const MAX_TRANSACTION_COST: u64 = 4_900_000;

/// Fixed validation cost charged to every transaction.
pub const TX_BASE_COST: u64 = 10_000;
/// Validation cost per input box resolved and checked.
pub const COST_PER_INPUT: u64 = 2_000;
/// Validation cost per created output box.
pub const COST_PER_OUTPUT: u64 = 500;
/// Validation cost per byte of spending proof.
pub const COST_PER_PROOF_BYTE: u64 = 2;

/// Default maximum number of transactions held by the mempool.
pub const DEFAULT_MEMPOOL_CAPACITY: usize = 1_000;
