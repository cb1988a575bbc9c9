//! Chain and consensus core of the ledger node: block hashing, proof of
//! work, the append-only chain with its admission gate, longest-valid-chain
//! resolution, and the lock-guarded [`Ledger`] handle the transport layer
//! drives.

pub mod block;
pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod pow;

pub use block::{now_timestamp, Block, Transaction};
pub use chain::{check_chain, is_valid_chain, Chain};
pub use consensus::{resolve, ChainSnapshot};
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, MineOutcome};
