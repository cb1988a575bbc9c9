//! Outbound calls to other nodes: chain fetches for consensus, block
//! announcements, and joining an existing network.

use crate::api::AppState;
use anyhow::{Context, Result};
use ledger_core::{Block, ChainSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Body of `POST /register_node` and `POST /register_with`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddress {
    pub node_address: String,
}

#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building peer http client")?;
        Ok(Self { http })
    }

    /// `GET {peer}/chain`.
    pub async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot> {
        let snapshot = self
            .http
            .get(format!("{peer}/chain"))
            .send()
            .await?
            .error_for_status()?
            .json::<ChainSnapshot>()
            .await?;
        Ok(snapshot)
    }

    /// `POST {peer}/add_block` with the block's wire record.
    pub async fn post_block(&self, peer: &str, block: &Block) -> Result<()> {
        self.http
            .post(format!("{peer}/add_block"))
            .json(block)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Ask `remote` to add `self_address` to its peers; returns its chain.
    pub async fn register_with(&self, remote: &str, self_address: &str) -> Result<ChainSnapshot> {
        let body = NodeAddress {
            node_address: self_address.to_owned(),
        };
        let snapshot = self
            .http
            .post(format!("{remote}/register_node"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<ChainSnapshot>()
            .await?;
        Ok(snapshot)
    }
}

/// Fetch every known peer's chain and adopt the longest valid one if it is
/// strictly longer than ours. Unreachable peers are skipped.
pub async fn run_consensus(state: &AppState) -> bool {
    let mut reports = Vec::new();
    for peer in state.ledger.list_peers() {
        match state.peers.fetch_chain(&peer).await {
            Ok(snapshot) => reports.push((peer, snapshot)),
            Err(err) => warn!(%peer, error = %err, "could not fetch peer chain"),
        }
    }
    if reports.is_empty() {
        return false;
    }

    let ledger = state.ledger.clone();
    match tokio::task::spawn_blocking(move || ledger.adopt_longest(reports)).await {
        Ok(replaced) => replaced,
        Err(err) => {
            warn!(error = %err, "consensus task failed");
            false
        }
    }
}

/// Best-effort push of `block` to every known peer. No retries.
pub async fn announce(state: &AppState, block: &Block) {
    for peer in state.ledger.list_peers() {
        match state.peers.post_block(&peer, block).await {
            Ok(()) => info!(%peer, index = block.index, "announced block"),
            Err(err) => warn!(%peer, index = block.index, error = %err, "announce failed"),
        }
    }
}
