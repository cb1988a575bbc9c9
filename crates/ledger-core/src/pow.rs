use crate::block::Block;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::debug;

/// True if `hash` starts with `difficulty` `'0'` characters.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// `claimed_hash` satisfies the difficulty predicate and is the content hash
/// of `block`. The block's own `hash` field is ignored.
pub fn is_valid_proof(block: &Block, claimed_hash: &str, difficulty: usize) -> bool {
    meets_difficulty(claimed_hash, difficulty) && claimed_hash == block.compute_hash()
}

/// Canonical bytes of a block split around the nonce, so each attempt only
/// hashes `prefix ++ nonce ++ suffix` instead of re-serializing the block.
struct NonceTemplate {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
}

impl NonceTemplate {
    fn new(block: &Block) -> Self {
        let mut probe = block.clone();
        probe.nonce = 0;
        let bytes = probe.canonical_bytes();
        let prefix = format!(r#"{{"index":{},"nonce":"#, block.index).into_bytes();
        // `nonce` is the second key, rendered as `0` in the probe.
        let suffix = bytes[prefix.len() + 1..].to_vec();
        Self { prefix, suffix }
    }

    fn hash_with(&self, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.prefix);
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(&self.suffix);
        hex::encode(hasher.finalize())
    }
}

/// Resets `block.nonce` to 0 and searches upward for the first nonce whose
/// content hash meets `difficulty`. Leaves the winning nonce in the block and
/// returns the digest. `block.hash` is not touched.
///
/// The search is spread across the rayon pool but always yields the lowest
/// qualifying nonce, the same one a sequential scan from 0 would find.
pub fn find_proof(block: &mut Block, difficulty: usize) -> String {
    block.nonce = 0;
    let template = NonceTemplate::new(block);

    let nonce = (0u64..u64::MAX)
        .into_par_iter()
        .find_first(|nonce| meets_difficulty(&template.hash_with(*nonce), difficulty))
        .expect("nonce space exhausted (practically impossible)");

    block.nonce = nonce;
    let hash = template.hash_with(nonce);
    debug!(index = block.index, nonce, %hash, "proof of work found");
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Transaction;
    use crate::constants::DIFFICULTY;
    use serde_json::json;

    fn block_with_payload(payload: &str) -> Block {
        let mut tx = Transaction::new();
        tx.insert("author".into(), json!("alice"));
        tx.insert("content".into(), json!(payload));
        Block::new(1, vec![tx], 1_600_000_000.25, "00f3")
    }

    #[test]
    fn meets_difficulty_examples() {
        assert!(meets_difficulty("00ab", 2));
        assert!(meets_difficulty("000b", 2));
        assert!(!meets_difficulty("0a0b", 2));
        assert!(meets_difficulty("abcd", 0));
        assert!(!meets_difficulty("0", 2));
    }

    #[test]
    fn template_hash_matches_compute_hash() {
        let mut block = block_with_payload("template");
        let template = NonceTemplate::new(&block);
        for nonce in [0u64, 1, 9, 10, 12_345, u64::MAX - 1] {
            block.nonce = nonce;
            assert_eq!(template.hash_with(nonce), block.compute_hash());
        }
    }

    #[test]
    fn find_proof_meets_difficulty() {
        let mut block = block_with_payload("mine me");
        block.nonce = 999;
        let hash = find_proof(&mut block, DIFFICULTY);
        assert!(hash.starts_with(&"0".repeat(DIFFICULTY)));
        assert_eq!(hash, block.compute_hash());
        assert!(is_valid_proof(&block, &hash, DIFFICULTY));
        assert!(block.hash.is_none());
    }

    #[test]
    fn find_proof_returns_lowest_nonce() {
        let mut block = block_with_payload("lowest");
        let _ = find_proof(&mut block, DIFFICULTY);
        let winner = block.nonce;

        let mut probe = block.clone();
        for nonce in 0..winner {
            probe.nonce = nonce;
            assert!(!meets_difficulty(&probe.compute_hash(), DIFFICULTY));
        }
    }

    #[test]
    fn is_valid_proof_rejects_content_mismatch() {
        let mut block = block_with_payload("original");
        let hash = find_proof(&mut block, DIFFICULTY);

        let mut tampered = block.clone();
        tampered.transactions[0].insert("content".into(), json!("forged"));
        assert!(!is_valid_proof(&tampered, &hash, DIFFICULTY));
    }

    #[test]
    fn is_valid_proof_rejects_insufficient_difficulty() {
        let mut block = block_with_payload("weak");
        // Find a nonce whose hash is the content hash but misses the prefix.
        while meets_difficulty(&block.compute_hash(), DIFFICULTY) {
            block.nonce += 1;
        }
        let hash = block.compute_hash();
        assert!(!is_valid_proof(&block, &hash, DIFFICULTY));
        assert!(is_valid_proof(&block, &hash, 0));
    }
}
