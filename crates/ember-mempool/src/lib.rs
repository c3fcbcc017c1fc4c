//! # ember-mempool
//!
//! The in-memory staging area for unconfirmed Ember transactions: the
//! ordered priority pool with family-weight propagation, double-spend
//! replace-by-fee arbitration, and an approximate invalidated-id cache.
//!
//! ## Transaction ordering
//!
//! Transactions are ordered by weight, not just fee. A transaction's weight
//! starts at its fee per kilobyte; when a transaction spends outputs of
//! another pooled transaction, the parent's weight is increased by the
//! child's weight. This ensures:
//!
//! 1. Parents always sort before their children, so block assembly takes
//!    chains in a spendable order.
//! 2. Capacity eviction removes the cheapest *family tail*, never a parent
//!    that a valuable child still depends on.
//!
//! ## Acceptance pipeline
//!
//! [`Mempool::process`] runs blacklist → fee floor → acceptance gate →
//! state validation → double-spend arbitration, reporting one
//! [`ProcessingOutcome`] per call and never returning an error across the
//! boundary.

pub mod cache;
pub mod config;
pub mod mempool;
pub mod pool;
pub mod stats;
pub mod weighted;

pub use cache::{InvalidatedCache, InvalidatedCacheConfig};
pub use config::MempoolConfig;
pub use mempool::{Mempool, MempoolReader, PooledUtxoView, ProcessingOutcome};
pub use pool::OrderedTxPool;
pub use stats::{FeeBin, PoolStats};
pub use weighted::WeightedTxId;
