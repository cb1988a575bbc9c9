use crate::block::{now_timestamp, Block, Transaction};
use crate::constants::DIFFICULTY;
use crate::error::{LedgerError, Result};
use crate::pow::{find_proof, is_valid_proof};
use tracing::{info, warn};

/// An ordered run of admitted blocks plus the pool of transactions waiting
/// for the next mined block.
#[derive(Clone, Debug)]
pub struct Chain {
    difficulty: usize,
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// A chain holding only the genesis block, at the network difficulty.
    pub fn new() -> Self {
        Self::with_difficulty(DIFFICULTY)
    }

    pub fn with_difficulty(difficulty: usize) -> Self {
        Self {
            difficulty,
            blocks: vec![Block::genesis()],
            pending: Vec::new(),
        }
    }

    /// Rebuild a chain from blocks reported by a peer. The first block must be
    /// our genesis; every other block goes through [`Chain::try_append`].
    pub fn from_dump(dump: Vec<Block>, difficulty: usize) -> Result<Self> {
        let mut blocks = dump.into_iter();
        let first = blocks.next().ok_or(LedgerError::EmptyChainDump)?;
        let mut chain = Self::with_difficulty(difficulty);
        if first != chain.blocks[0] {
            return Err(LedgerError::GenesisMismatch);
        }

        for mut block in blocks {
            let index = block.index;
            let claimed = block.hash.take().unwrap_or_default();
            if let Err(err) = chain.try_append(block, &claimed) {
                warn!(index, %err, "rejecting chain dump");
                return Err(LedgerError::TamperedChainDump { index });
            }
        }
        Ok(chain)
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain is never without its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds at least the genesis block")
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.pending.push(tx);
    }

    /// The admission gate. On success the block gets `claimed_hash` as its
    /// hash and becomes the new tip; on failure nothing changes.
    pub fn try_append(&mut self, mut block: Block, claimed_hash: &str) -> Result<()> {
        let last = self.last_block();
        if block.previous_hash != last.hash_str() {
            return Err(LedgerError::ChainMismatch {
                expected: last.hash_str().to_owned(),
                found: block.previous_hash,
            });
        }
        if block.index != last.index + 1 {
            return Err(LedgerError::UnexpectedIndex {
                expected_parent: last.index,
                found: block.index,
            });
        }
        if !is_valid_proof(&block, claimed_hash, self.difficulty) {
            return Err(LedgerError::InvalidProof { index: block.index });
        }

        block.hash = Some(claimed_hash.to_owned());
        self.blocks.push(block);
        Ok(())
    }

    /// Boolean form of [`Chain::try_append`].
    pub fn append(&mut self, block: Block, claimed_hash: &str) -> bool {
        match self.try_append(block, claimed_hash) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "block rejected");
                false
            }
        }
    }

    /// The next block to mine: built on the current tip from `transactions`.
    pub fn next_block(&self, transactions: Vec<Transaction>) -> Block {
        let last = self.last_block();
        Block::new(
            last.index + 1,
            transactions,
            now_timestamp(),
            last.hash_str(),
        )
    }

    /// Mine every pending transaction into a new block in place. Holds
    /// `&mut self` for the whole proof-of-work search; callers sharing the
    /// chain should go through [`crate::ledger::Ledger::trigger_mine`].
    pub fn mine(&mut self) -> Result<u64> {
        if self.pending.is_empty() {
            return Err(LedgerError::EmptyPendingPool);
        }
        let mut block = self.next_block(self.pending.clone());
        let hash = find_proof(&mut block, self.difficulty);
        let index = block.index;
        self.try_append(block, &hash)?;
        self.pending.clear();
        info!(index, %hash, "mined block");
        Ok(index)
    }

    /// Drop the first `count` pending transactions (the ones just mined).
    pub(crate) fn drain_pending(&mut self, count: usize) {
        let count = count.min(self.pending.len());
        self.pending.drain(..count);
    }

    /// Remove one pending entry per record in `confirmed`. Repeated
    /// submissions of the same record are only removed as often as they
    /// were confirmed.
    pub(crate) fn prune_confirmed(&mut self, confirmed: &[Transaction]) {
        for tx in confirmed {
            if let Some(pos) = self.pending.iter().position(|t| t == tx) {
                self.pending.remove(pos);
            }
        }
    }

    /// Carry over transactions from a replaced chain. Each record this chain
    /// already confirms cancels one carried copy; the rest are appended to
    /// the pool in order.
    pub fn requeue_pending(&mut self, previous: Vec<Transaction>) {
        let mut confirmed: Vec<&Transaction> = self
            .blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .collect();
        for tx in previous {
            match confirmed.iter().position(|t| **t == tx) {
                Some(pos) => {
                    confirmed.swap_remove(pos);
                }
                None => self.pending.push(tx),
            }
        }
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.pending)
    }
}

/// Validate a standalone run of block records: the canonical genesis first,
/// then for every block a valid proof over its stored hash and a link to the
/// previous block's stored hash. The genesis block is exempt from the
/// difficulty predicate.
pub fn check_chain(blocks: &[Block], difficulty: usize) -> Result<()> {
    let (first, rest) = blocks.split_first().ok_or(LedgerError::EmptyChainDump)?;
    if *first != Block::genesis() {
        return Err(LedgerError::GenesisMismatch);
    }

    let mut parent = first;
    for block in rest {
        if block.previous_hash != parent.hash_str() {
            return Err(LedgerError::ChainMismatch {
                expected: parent.hash_str().to_owned(),
                found: block.previous_hash.clone(),
            });
        }
        if block.index != parent.index + 1 {
            return Err(LedgerError::UnexpectedIndex {
                expected_parent: parent.index,
                found: block.index,
            });
        }
        if !is_valid_proof(block, block.hash_str(), difficulty) {
            return Err(LedgerError::InvalidProof { index: block.index });
        }
        parent = block;
    }
    Ok(())
}

pub fn is_valid_chain(blocks: &[Block], difficulty: usize) -> bool {
    check_chain(blocks, difficulty).is_ok()
}
