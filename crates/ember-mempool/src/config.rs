//! Mempool configuration.
//!
//! Provides [`MempoolConfig`] with defaults drawn from the protocol
//! constants. The configuration can be customized programmatically or
//! assembled from a node-level config file by the embedding binary.

use std::collections::HashSet;

use ember_core::constants::{
    DEFAULT_MEMPOOL_CAPACITY, FEE_PROPOSITION, MAX_TRANSACTION_COST, MIN_TX_FEE,
};
use ember_core::types::TxId;

use crate::cache::InvalidatedCacheConfig;

/// Configuration for a mempool instance.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions held in the pool.
    pub capacity: usize,
    /// Transactions paying less than this total fee are declined.
    pub minimal_fee: u64,
    /// Validation cost budget per transaction.
    pub max_transaction_cost: u64,
    /// Ids rejected outright and recorded as invalidated.
    pub blacklisted: HashSet<TxId>,
    /// Script bytes identifying fee outputs.
    pub fee_proposition: Vec<u8>,
    /// Invalidated-id cache tuning.
    pub cache: InvalidatedCacheConfig,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMPOOL_CAPACITY,
            minimal_fee: MIN_TX_FEE,
            max_transaction_cost: MAX_TRANSACTION_COST,
            blacklisted: HashSet::new(),
            fee_proposition: FEE_PROPOSITION.to_vec(),
            cache: InvalidatedCacheConfig::default(),
        }
    }
}
