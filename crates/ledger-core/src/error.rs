use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("block {index}: hash fails the difficulty or content check")]
    InvalidProof { index: u64 },

    #[error("previous_hash mismatch: expected {expected}, found {found}")]
    ChainMismatch { expected: String, found: String },

    #[error("block index {found} does not follow {expected_parent}")]
    UnexpectedIndex { expected_parent: u64, found: u64 },

    #[error("no pending transactions to mine")]
    EmptyPendingPool,

    #[error("chain dump was tampered with at block {index}")]
    TamperedChainDump { index: u64 },

    #[error("chain dump is empty")]
    EmptyChainDump,

    #[error("chain dump does not start with this network's genesis block")]
    GenesisMismatch,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
