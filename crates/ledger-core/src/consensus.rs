use crate::block::Block;
use crate::chain::check_chain;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::{debug, warn};

/// What a node reports about its chain: the `GET /chain` body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub length: usize,
    pub chain: Vec<Block>,
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Longest-valid-chain rule. Scans the peer reports in iteration order and
/// keeps the first chain that is strictly longer than the best seen so far
/// (starting from `local_len`) and passes validation. Returns the winning
/// peer and its blocks, or `None` if the local chain should stand.
///
/// A report whose `length` disagrees with the blocks it carries is ignored.
pub fn resolve<P, I>(local_len: usize, peer_chains: I, difficulty: usize) -> Option<(P, Vec<Block>)>
where
    P: Display,
    I: IntoIterator<Item = (P, ChainSnapshot)>,
{
    let mut best_len = local_len;
    let mut best = None;

    for (peer, report) in peer_chains {
        if report.length <= best_len {
            debug!(%peer, length = report.length, best_len, "peer chain not longer");
            continue;
        }
        if report.length != report.chain.len() {
            warn!(%peer, reported = report.length, actual = report.chain.len(), "peer misreported its length");
            continue;
        }
        if let Err(err) = check_chain(&report.chain, difficulty) {
            warn!(%peer, %err, "peer chain is invalid");
            continue;
        }
        best_len = report.length;
        best = Some((peer, report.chain));
    }
    best
}
