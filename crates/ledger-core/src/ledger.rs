use crate::block::{Block, Transaction};
use crate::chain::Chain;
use crate::consensus::{resolve, ChainSnapshot};
use crate::constants::DIFFICULTY;
use crate::pow::find_proof;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Result of [`Ledger::trigger_mine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MineOutcome {
    NoPendingTx,
    MinedBlock(u64),
    /// A proof was found but the tip moved while mining; the block was
    /// dropped and the pending pool left as it was.
    Discarded,
}

struct Slot {
    version: u64,
    chain: Chain,
}

/// A block ready for proof-of-work, built from a snapshot of the pending pool.
pub(crate) struct MiningJob {
    pub(crate) block: Block,
    mined_count: usize,
    pub(crate) difficulty: usize,
}

/// The node's single chain behind a lock, plus its add-only peer set.
///
/// Every change to the blocks (admission, mining commit, replacement) takes
/// the write lock and bumps `version`; a consensus swap only commits if the
/// version it resolved against is still current. Proof-of-work runs without
/// any lock.
pub struct Ledger {
    slot: RwLock<Slot>,
    peers: RwLock<BTreeSet<String>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_difficulty(DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: usize) -> Self {
        Self::from_chain(Chain::with_difficulty(difficulty))
    }

    pub fn from_chain(chain: Chain) -> Self {
        Self {
            slot: RwLock::new(Slot { version: 0, chain }),
            peers: RwLock::new(BTreeSet::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn difficulty(&self) -> usize {
        self.read().chain.difficulty()
    }

    pub fn len(&self) -> usize {
        self.read().chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().chain.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.read().version
    }

    pub fn last_block(&self) -> Block {
        self.read().chain.last_block().clone()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        let slot = self.read();
        let index = usize::try_from(index).ok()?;
        slot.chain.blocks().get(index).cloned()
    }

    /// The caller validates the record's fields before handing it over.
    pub fn submit_transaction(&self, tx: Transaction) {
        self.write().chain.add_transaction(tx);
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.read().chain.pending_transactions().to_vec()
    }

    pub fn chain_snapshot(&self) -> ChainSnapshot {
        let peers = self.list_peers();
        let slot = self.read();
        ChainSnapshot {
            length: slot.chain.len(),
            chain: slot.chain.blocks().to_vec(),
            peers,
        }
    }

    /// Mine the currently pending transactions into a new block.
    ///
    /// The template is taken under a read lock and the nonce search runs with
    /// no lock held. Only admission and removal of the mined transactions
    /// happen under the write lock, so anything submitted meanwhile stays
    /// pending for the next block.
    pub fn trigger_mine(&self) -> MineOutcome {
        let Some(mut job) = self.mining_job() else {
            return MineOutcome::NoPendingTx;
        };
        let hash = find_proof(&mut job.block, job.difficulty);
        self.commit_mined(job, &hash)
    }

    pub(crate) fn mining_job(&self) -> Option<MiningJob> {
        let slot = self.read();
        let pending = slot.chain.pending_transactions();
        if pending.is_empty() {
            return None;
        }
        Some(MiningJob {
            block: slot.chain.next_block(pending.to_vec()),
            mined_count: pending.len(),
            difficulty: slot.chain.difficulty(),
        })
    }

    pub(crate) fn commit_mined(&self, job: MiningJob, hash: &str) -> MineOutcome {
        let index = job.block.index;
        let mut slot = self.write();
        match slot.chain.try_append(job.block, hash) {
            Ok(()) => {
                slot.chain.drain_pending(job.mined_count);
                slot.version += 1;
                info!(index, %hash, "mined block");
                MineOutcome::MinedBlock(index)
            }
            Err(err) => {
                warn!(index, %err, "discarding mined block");
                MineOutcome::Discarded
            }
        }
    }

    /// Admit a block announced by a peer. Pending transactions it confirms
    /// are dropped from the pool.
    pub fn receive_block(&self, block: Block, claimed_hash: &str) -> bool {
        let index = block.index;
        let mut slot = self.write();
        match slot.chain.try_append(block, claimed_hash) {
            Ok(()) => {
                let confirmed = slot.chain.last_block().transactions.clone();
                slot.chain.prune_confirmed(&confirmed);
                slot.version += 1;
                info!(index, hash = claimed_hash, "accepted block from peer");
                true
            }
            Err(err) => {
                warn!(index, %err, "rejected block from peer");
                false
            }
        }
    }

    /// Adds `address` (trailing `/` trimmed) to the peer set. Returns false
    /// for an empty address or one already known.
    pub fn register_peer(&self, address: &str) -> bool {
        let address = address.trim().trim_end_matches('/');
        if address.is_empty() {
            return false;
        }
        let added = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_owned());
        if added {
            info!(peer = address, "registered peer");
        }
        added
    }

    pub fn list_peers(&self) -> Vec<String> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Replace the local chain with the longest valid peer chain, if any peer
    /// has one strictly longer than ours. Validation runs without the lock;
    /// the swap is a compare-and-swap on the version read before resolving.
    pub fn adopt_longest<P, I>(&self, peer_chains: I) -> bool
    where
        P: Display,
        I: IntoIterator<Item = (P, ChainSnapshot)>,
    {
        let (version, local_len, difficulty) = {
            let slot = self.read();
            (slot.version, slot.chain.len(), slot.chain.difficulty())
        };
        let Some((peer, blocks)) = resolve(local_len, peer_chains, difficulty) else {
            return false;
        };
        let candidate = match Chain::from_dump(blocks, difficulty) {
            Ok(chain) => chain,
            Err(err) => {
                warn!(%peer, %err, "candidate chain failed to rebuild");
                return false;
            }
        };
        let length = candidate.len();
        let adopted = self.swap_if_current(version, candidate);
        if adopted {
            info!(%peer, length, "adopted longer chain from peer");
        } else {
            info!(%peer, "local chain changed while resolving; keeping it");
        }
        adopted
    }

    /// Swap in `chain` only if no block was admitted or replaced since
    /// `expected_version` was read.
    pub(crate) fn swap_if_current(&self, expected_version: u64, chain: Chain) -> bool {
        let mut slot = self.write();
        if slot.version != expected_version {
            return false;
        }
        Self::swap(&mut slot, chain);
        true
    }

    /// Unconditionally replace the local chain, e.g. with one rebuilt from
    /// the node we just joined.
    pub fn install(&self, chain: Chain) {
        let mut slot = self.write();
        let length = chain.len();
        Self::swap(&mut slot, chain);
        info!(length, "installed chain");
    }

    /// Replace the chain. Transactions from orphaned local blocks and the
    /// old pending pool go back into the pool unless the new chain already
    /// confirms them.
    fn swap(slot: &mut Slot, chain: Chain) {
        let mut old = std::mem::replace(&mut slot.chain, chain);
        let mut carried: Vec<Transaction> = old
            .blocks()
            .iter()
            .flat_map(|b| b.transactions.iter().cloned())
            .collect();
        carried.extend(old.take_pending());
        slot.chain.requeue_pending(carried);
        slot.version += 1;
    }
}
