//! HTTP shell around `ledger-core`: routes for clients and peers, plus the
//! outbound peer calls behind consensus, announce and network joins.

pub mod api;
pub mod config;
pub mod constants;
pub mod peers;

pub use api::{router, AppState};
pub use config::{Args, NodeConfig};
