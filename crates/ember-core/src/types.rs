//! Core protocol types: boxes, transactions, and the unconfirmed wrapper.
//!
//! All monetary values are in nanos (1 EMBER = 10^9 nanos).
//! Transaction and box identifiers are 32-byte BLAKE3 hashes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::TransactionError;

/// A 32-byte transaction identifier (BLAKE3 of the canonical encoding).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct TxId(pub [u8; 32]);

/// A 32-byte box identifier.
///
/// Derived as BLAKE3 over `txid || output_index` of the creating
/// transaction. The derived `Ord` compares bytes, which coincides with
/// lexicographic order of the canonical hex encoding.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct BoxId(pub [u8; 32]);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// The zero id (32 zero bytes).
            pub const ZERO: Self = Self([0u8; 32]);

            /// Create an id from a byte array.
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Return the underlying bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Check if this is the zero id.
            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

impl_id!(TxId);
impl_id!(BoxId);

/// A transaction output: a box holding value guarded by a proposition script.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct EmberBox {
    /// Value in nanos (1 EMBER = 10^9 nanos).
    pub value: u64,
    /// Guarding script; outputs equal to the fee proposition pay the miner.
    pub proposition: Vec<u8>,
}

impl EmberBox {
    /// Whether this output pays a fee under the given fee proposition.
    pub fn is_fee_output(&self, fee_proposition: &[u8]) -> bool {
        self.proposition == fee_proposition
    }
}

/// A transaction input, consuming a previously created box.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Input {
    /// Identifier of the box being spent.
    pub box_id: BoxId,
    /// Proof satisfying the spent box's proposition.
    pub spending_proof: Vec<u8>,
}

/// A transaction consuming boxes and creating new ones.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Inputs consuming previously created boxes.
    pub inputs: Vec<Input>,
    /// New boxes created by this transaction.
    pub outputs: Vec<EmberBox>,
}

impl Transaction {
    /// Compute the transaction id (BLAKE3 hash of the canonical encoding).
    ///
    /// Uses bincode with standard config for deterministic serialization.
    pub fn id(&self) -> Result<TxId, TransactionError> {
        let encoded = self.encode()?;
        Ok(TxId(blake3::hash(&encoded).into()))
    }

    /// Serialized size in bytes of the canonical encoding.
    pub fn serialized_size(&self) -> Result<usize, TransactionError> {
        Ok(self.encode()?.len())
    }

    /// Identifier of the box created by the output at `index`.
    ///
    /// BLAKE3 over `txid || index` (index little-endian u32), so every
    /// output of every transaction produces a distinct box id.
    pub fn output_box_id(&self, index: usize) -> Result<BoxId, TransactionError> {
        if index >= self.outputs.len() {
            return Err(TransactionError::OutputIndexOutOfBounds {
                index,
                len: self.outputs.len(),
            });
        }
        let txid = self.id()?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(txid.as_bytes());
        hasher.update(&(index as u32).to_le_bytes());
        Ok(BoxId(hasher.finalize().into()))
    }

    /// Identifiers of all boxes created by this transaction, in output order.
    pub fn output_box_ids(&self) -> Result<Vec<BoxId>, TransactionError> {
        (0..self.outputs.len())
            .map(|i| self.output_box_id(i))
            .collect()
    }

    /// Fee paid by this transaction: the sum of output values guarded by
    /// the fee proposition. Saturates on overflow.
    pub fn fee(&self, fee_proposition: &[u8]) -> u64 {
        self.outputs
            .iter()
            .filter(|out| out.is_fee_output(fee_proposition))
            .fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))
    }
}

/// A transaction wrapped with arrival metadata, as held by the mempool.
///
/// Identifier, serialized size, and created box ids are computed once at
/// construction so pool index maintenance never re-serializes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnconfirmedTransaction {
    /// The wrapped transaction.
    pub transaction: Transaction,
    /// Precomputed transaction id.
    pub id: TxId,
    /// Serialized size in bytes.
    pub size: usize,
    /// Identifiers of the boxes created by the transaction, in output order.
    pub output_ids: Vec<BoxId>,
    /// Peer the transaction arrived from, if delivered over the network.
    pub source: Option<String>,
    /// Arrival time in unix millis.
    pub received_at: u64,
    /// Validation cost, once known.
    pub cost: Option<u64>,
}

impl UnconfirmedTransaction {
    /// Wrap a locally submitted transaction, stamping the current time.
    pub fn new(transaction: Transaction) -> Result<Self, TransactionError> {
        Self::build(transaction, None)
    }

    /// Wrap a transaction received from `source`.
    pub fn with_source(transaction: Transaction, source: String) -> Result<Self, TransactionError> {
        Self::build(transaction, Some(source))
    }

    fn build(transaction: Transaction, source: Option<String>) -> Result<Self, TransactionError> {
        let id = transaction.id()?;
        let size = transaction.serialized_size()?;
        let output_ids = transaction.output_box_ids()?;
        Ok(Self {
            transaction,
            id,
            size,
            output_ids,
            source,
            received_at: now_millis(),
            cost: None,
        })
    }
}

/// Current wall-clock time in unix millis.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
