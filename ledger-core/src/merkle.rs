//! Merkle batching over transaction identifiers
//!
//! A settlement batch is committed to the external ledger as a single
//! SHA-256 Merkle root over the **sorted** transaction identifiers:
//! each leaf is `sha256(txn_id bytes)`, each internal node is
//! `sha256(left ∥ right)`.
//!
//! # Odd-node promotion
//!
//! When a level has an odd element count, the last hash is carried up
//! to the next level **unchanged**: it is not duplicated and not
//! re-hashed alone. Any party recomputing a root must reproduce this
//! rule bit-for-bit; previously committed roots depend on it.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash a transaction identifier into a leaf.
pub fn leaf_hash(txn_id: &Uuid) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(txn_id.as_bytes());
    hasher.finalize().into()
}

/// Hash a pair of nodes (used for internal nodes)
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Fold one level into the next, promoting a lone trailing node.
fn fold_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    for i in (0..level.len()).step_by(2) {
        if i + 1 < level.len() {
            next.push(hash_pair(&level[i], &level[i + 1]));
        } else {
            // Odd element: promoted unchanged
            next.push(level[i]);
        }
    }
    next
}

/// Compute the Merkle root over a set of transaction identifiers.
///
/// The identifiers are sorted before hashing, so the root is a pure
/// function of the id *set*. An empty set yields the zero root;
/// callers reject empty batches before reaching this point.
pub fn merkle_root(txn_ids: &[Uuid]) -> [u8; 32] {
    if txn_ids.is_empty() {
        return [0u8; 32];
    }

    let mut sorted: Vec<Uuid> = txn_ids.to_vec();
    sorted.sort_unstable();

    let mut level: Vec<[u8; 32]> = sorted.iter().map(leaf_hash).collect();
    while level.len() > 1 {
        level = fold_level(&level);
    }
    level[0]
}

/// Encode a root for transport (base64, standard alphabet).
pub fn encode_root(root: &[u8; 32]) -> String {
    BASE64.encode(root)
}

/// Direction of a sibling relative to the node being proven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sibling is on the left
    Left,
    /// Sibling is on the right
    Right,
}

/// Inclusion proof: the sibling path from a leaf to the root. Levels
/// where the node was promoted contribute no step.
#[derive(Debug, Clone)]
pub struct InclusionProof {
    /// Leaf hash being proven
    pub leaf_hash: [u8; 32],
    /// Sibling hashes along the path to the root
    pub siblings: Vec<(Direction, [u8; 32])>,
    /// Root the proof resolves to
    pub root: [u8; 32],
}

impl InclusionProof {
    /// Verify the proof against its embedded root.
    pub fn verify(&self) -> bool {
        let mut current = self.leaf_hash;
        for (direction, sibling) in &self.siblings {
            current = match direction {
                Direction::Left => hash_pair(sibling, &current),
                Direction::Right => hash_pair(&current, sibling),
            };
        }
        current == self.root
    }
}

/// Build an inclusion proof for one identifier in a batch.
///
/// Returns `None` if `txn_id` is not in the set.
pub fn prove_inclusion(txn_ids: &[Uuid], txn_id: &Uuid) -> Option<InclusionProof> {
    let mut sorted: Vec<Uuid> = txn_ids.to_vec();
    sorted.sort_unstable();

    let mut index = sorted.iter().position(|id| id == txn_id)?;
    let leaf = leaf_hash(txn_id);

    let mut level: Vec<[u8; 32]> = sorted.iter().map(leaf_hash).collect();
    let mut siblings = Vec::new();

    while level.len() > 1 {
        let last = level.len() - 1;
        let promoted = level.len() % 2 == 1 && index == last;
        if !promoted {
            if index % 2 == 0 {
                siblings.push((Direction::Right, level[index + 1]));
            } else {
                siblings.push((Direction::Left, level[index - 1]));
            }
        }
        index /= 2;
        level = fold_level(&level);
    }

    Some(InclusionProof {
        leaf_hash: leaf,
        siblings,
        root: level[0],
    })
}
