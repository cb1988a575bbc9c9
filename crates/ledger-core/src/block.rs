use crate::constants::GENESIS_PREVIOUS_HASH;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque transaction record. The core only ever stores and hashes it.
pub type Transaction = serde_json::Map<String, serde_json::Value>;

/// One unit of chain history, in the shape peers exchange over the wire.
///
/// `hash` is not part of the hashed content. It stays `None` until the block
/// has been mined or admitted by [`crate::chain::Chain::try_append`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: f64,
    pub previous_hash: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// The hashed projection of a block. Fields are declared in lexicographic
/// order so the serialized object has sorted keys.
#[derive(Serialize)]
struct HashedContent<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: &'a [Transaction],
}

impl Block {
    /// A block that has not been mined yet (`nonce` 0, no hash).
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        timestamp: f64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            transactions,
            timestamp,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: None,
        }
    }

    /// The fixed first block of every chain. Its hash is computed, not mined.
    pub fn genesis() -> Self {
        let mut block = Self::new(0, vec![], 0.0, GENESIS_PREVIOUS_HASH);
        block.hash = Some(block.compute_hash());
        block
    }

    /// Canonical serialization of everything but `hash`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let content = HashedContent {
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            transactions: &self.transactions,
        };
        // Maps of strings to JSON values and plain scalars cannot fail to
        // serialize; NaN/inf timestamps become `null`.
        serde_json::to_vec(&content).unwrap_or_default()
    }

    /// Lowercase hex SHA-256 of [`Block::canonical_bytes`].
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        hex::encode(hasher.finalize())
    }

    /// The hash assigned at admission, or `""` when there is none yet.
    pub fn hash_str(&self) -> &str {
        self.hash.as_deref().unwrap_or("")
    }
}

/// Seconds since the Unix epoch with sub-second precision.
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
