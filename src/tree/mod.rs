//! Merkle commitment over a finalized distribution.
//!
//! ## Leaves
//!
//! Entries sharing a payout address are collapsed into one leaf whose amount
//! is the exact sum of their `match_amount`s. The smallest project id for
//! the address represents it in the leaf, so the encoding does not depend on
//! entry order. Leaves with a zero amount are not payable and are left out.
//!
//! Each leaf is the tuple `(address, uint256, bytes32)` encoded as three
//! 32-byte words and hashed twice: `H(H(encoding))`.
//!
//! ## Tree Shape
//!
//! Leaf hashes are sorted, parents are `H(min(a, b) ‖ max(a, b))`, and an
//! odd node at the end of a level moves up unchanged. Sorting makes the root
//! and every proof independent of the order entries were discovered in.
//!
//! ## Example
//!
//! ```
//! use qf_kernel::tree::DistributionTree;
//!
//! // Nothing payable: finalize must fail
//! assert!(DistributionTree::build(&[]).is_err());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use ruint::aliases::U256;
use serde::Serialize;
use sha2::digest::consts::U32;
use sha2::digest::OutputSizeUser;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{QfError, Result};
use crate::types::u256_string;
use crate::types::{Address, QFDistributionEntry};

/// 32-byte node hash.
pub type Hash = [u8; 32];

/// One payout in the commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutLeaf {
    pub payout_address: Address,
    #[serde(with = "u256_string")]
    pub match_amount: U256,
    /// Representative project id (smallest among those paid to this address)
    pub project_id: String,
    #[serde(skip)]
    project_word: Hash,
}

impl PayoutLeaf {
    fn new(payout_address: Address, match_amount: U256, project_id: &str) -> Result<Self> {
        Ok(Self {
            payout_address,
            match_amount,
            project_id: project_id.to_string(),
            project_word: project_id_word(project_id)?,
        })
    }

    /// `address ‖ uint256 ‖ bytes32`, each left- or right-aligned in a 32-byte word.
    pub fn encode(&self) -> [u8; 96] {
        let mut out = [0u8; 96];
        out[..32].copy_from_slice(&self.payout_address.to_word());
        out[32..64].copy_from_slice(&self.match_amount.to_be_bytes::<32>());
        out[64..].copy_from_slice(&self.project_word);
        out
    }

    /// `H(H(encode()))`
    pub fn hash_with<D>(&self) -> Hash
    where
        D: Digest + OutputSizeUser<OutputSize = U32>,
    {
        let inner = digest::<D>(&self.encode());
        digest::<D>(&inner)
    }

    pub fn hash(&self) -> Hash {
        self.hash_with::<Sha256>()
    }
}

/// Project id as a bytes32 word.
///
/// Only the part before the first `-` is used. A `0x`-prefixed 64-digit hex
/// id is taken as raw bytes; anything else is UTF-8, right-padded with zeros.
pub fn project_id_word(project_id: &str) -> Result<Hash> {
    let id = project_id.split('-').next().unwrap_or_default();
    let mut word = [0u8; 32];

    if let Some(digits) = id.strip_prefix("0x") {
        if digits.len() == 64 && hex::decode_to_slice(digits, &mut word).is_ok() {
            return Ok(word);
        }
    }

    let bytes = id.as_bytes();
    if bytes.len() > 31 {
        return Err(QfError::Validation(format!(
            "project id {id:?} does not fit in bytes32"
        )));
    }
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(word)
}

fn digest<D>(data: &[u8]) -> Hash
where
    D: Digest + OutputSizeUser<OutputSize = U32>,
{
    let mut hasher = D::new();
    hasher.update(data);
    let result = hasher.finalize();

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

fn hash_pair<D>(a: &Hash, b: &Hash) -> Hash
where
    D: Digest + OutputSizeUser<OutputSize = U32>,
{
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo);
    buf[32..].copy_from_slice(hi);
    digest::<D>(&buf)
}

/// Root, leaves and per-address proofs of a distribution.
#[derive(Clone, PartialEq, Eq)]
pub struct DistributionTree {
    root: Hash,
    leaves: Vec<PayoutLeaf>,
    proofs: BTreeMap<Address, Vec<Hash>>,
}

impl DistributionTree {
    /// Build the commitment with SHA-256.
    ///
    /// # Errors
    ///
    /// * `EmptyDistribution` if no leaf has a positive amount
    /// * `Precision` if a collapsed amount exceeds uint256
    /// * `Validation` if a project id does not fit in bytes32
    pub fn build(distribution: &[QFDistributionEntry]) -> Result<Self> {
        Self::build_with::<Sha256>(distribution)
    }

    /// Build the commitment with any 32-byte digest.
    pub fn build_with<D>(distribution: &[QFDistributionEntry]) -> Result<Self>
    where
        D: Digest + OutputSizeUser<OutputSize = U32>,
    {
        let leaves = collapse(distribution)?;
        if leaves.is_empty() {
            return Err(QfError::EmptyDistribution);
        }

        let mut hashed: Vec<(Hash, Address)> = leaves
            .iter()
            .map(|leaf| (leaf.hash_with::<D>(), leaf.payout_address))
            .collect();
        hashed.sort();

        let mut levels: Vec<Vec<Hash>> = vec![hashed.iter().map(|(h, _)| *h).collect()];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| {
                    pair.iter()
                        .copied()
                        .reduce(|a, b| hash_pair::<D>(&a, &b))
                        .unwrap_or_default()
                })
                .collect();
            levels.push(next);
        }
        let root = levels.last().and_then(|l| l.first()).copied().unwrap_or_default();

        let proofs = hashed
            .iter()
            .enumerate()
            .map(|(index, (_, address))| (*address, proof_for(&levels, index)))
            .collect();

        debug!(
            entries = distribution.len(),
            leaves = leaves.len(),
            root = %hex::encode(root),
            "built distribution tree"
        );

        Ok(Self { root, leaves, proofs })
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn root_hex(&self) -> String {
        format!("0x{}", hex::encode(self.root))
    }

    /// Collapsed leaves, ordered by payout address.
    pub fn leaves(&self) -> &[PayoutLeaf] {
        &self.leaves
    }

    pub fn leaf(&self, payout_address: &Address) -> Option<&PayoutLeaf> {
        self.leaves.iter().find(|l| l.payout_address == *payout_address)
    }

    pub fn proof(&self, payout_address: &Address) -> Option<&[Hash]> {
        self.proofs.get(payout_address).map(Vec::as_slice)
    }

    pub fn proofs(&self) -> &BTreeMap<Address, Vec<Hash>> {
        &self.proofs
    }

    /// Check a SHA-256 proof against a root.
    pub fn verify(root: &Hash, leaf: &PayoutLeaf, proof: &[Hash]) -> bool {
        Self::verify_with::<Sha256>(root, leaf, proof)
    }

    pub fn verify_with<D>(root: &Hash, leaf: &PayoutLeaf, proof: &[Hash]) -> bool
    where
        D: Digest + OutputSizeUser<OutputSize = U32>,
    {
        let computed = proof
            .iter()
            .fold(leaf.hash_with::<D>(), |acc, sibling| hash_pair::<D>(&acc, sibling));
        computed == *root
    }

    /// JSON-friendly view: hex root and hex proofs keyed by address.
    pub fn report(&self) -> CommitmentReport {
        CommitmentReport {
            root: self.root_hex(),
            leaves: self.leaves.clone(),
            proofs: self
                .proofs
                .iter()
                .map(|(address, proof)| {
                    (
                        address.to_string(),
                        proof.iter().map(|h| format!("0x{}", hex::encode(h))).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl fmt::Debug for DistributionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionTree")
            .field("root", &self.root_hex())
            .field("leaves", &self.leaves.len())
            .finish()
    }
}

/// Serializable form of a [`DistributionTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitmentReport {
    pub root: String,
    pub leaves: Vec<PayoutLeaf>,
    pub proofs: BTreeMap<String, Vec<String>>,
}

fn collapse(distribution: &[QFDistributionEntry]) -> Result<Vec<PayoutLeaf>> {
    let mut leaves: Vec<PayoutLeaf> = Vec::with_capacity(distribution.len());
    let mut index: HashMap<Address, usize> = HashMap::with_capacity(distribution.len());

    for entry in distribution {
        match index.get(&entry.payout_address) {
            Some(&i) => {
                let leaf = &mut leaves[i];
                leaf.match_amount = leaf.match_amount.checked_add(entry.match_amount).ok_or_else(|| {
                    QfError::Precision(format!("payout to {} exceeds uint256", entry.payout_address))
                })?;
                if entry.project_id < leaf.project_id {
                    leaf.project_word = project_id_word(&entry.project_id)?;
                    leaf.project_id = entry.project_id.clone();
                }
            }
            None => {
                index.insert(entry.payout_address, leaves.len());
                leaves.push(PayoutLeaf::new(entry.payout_address, entry.match_amount, &entry.project_id)?);
            }
        }
    }

    leaves.retain(|leaf| !leaf.match_amount.is_zero());
    leaves.sort_by(|a, b| a.payout_address.cmp(&b.payout_address));
    Ok(leaves)
}

fn proof_for(levels: &[Vec<Hash>], leaf_index: usize) -> Vec<Hash> {
    let mut proof = Vec::new();
    let mut index = leaf_index;
    for level in &levels[..levels.len().saturating_sub(1)] {
        if let Some(sibling) = level.get(index ^ 1) {
            proof.push(*sibling);
        }
        index /= 2;
    }
    proof
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn entry(project: &str, payout: u8, amount: u64) -> QFDistributionEntry {
        QFDistributionEntry {
            project_id: project.to_string(),
            payout_address: addr(payout),
            match_amount_in_usd: Decimal::from(amount),
            match_amount_in_token: Decimal::from(amount),
            match_pool_percentage: Decimal::ZERO,
            total_contributions_in_usd: Decimal::ZERO,
            total_contributions_in_token: "0".to_string(),
            unique_contributors_count: 1,
            match_amount: U256::from(amount),
        }
    }

    #[test]
    fn test_empty_distribution_fails() {
        assert!(matches!(DistributionTree::build(&[]), Err(QfError::EmptyDistribution)));
        assert!(matches!(
            DistributionTree::build(&[entry("p", 1, 0)]),
            Err(QfError::EmptyDistribution)
        ));
    }

    #[test]
    fn test_same_address_collapses_exactly() {
        let tree = DistributionTree::build(&[entry("p1", 1, 100), entry("p2", 1, 50)]).unwrap();
        assert_eq!(tree.leaves().len(), 1);

        let leaf = tree.leaf(&addr(1)).unwrap();
        assert_eq!(leaf.match_amount, U256::from(150u64));
        assert_eq!(leaf.project_id, "p1");
    }

    #[test]
    fn test_shared_address_root_ignores_entry_order() {
        let entries = vec![entry("p1", 1, 100), entry("p2", 1, 50), entry("p3", 2, 30)];
        let swapped = vec![entry("p2", 1, 50), entry("p1", 1, 100), entry("p3", 2, 30)];
        let reversed: Vec<_> = entries.iter().rev().cloned().collect();

        let a = DistributionTree::build(&entries).unwrap();
        for other in [&swapped, &reversed] {
            let b = DistributionTree::build(other).unwrap();
            assert_eq!(a.root(), b.root());
            assert_eq!(a.leaves(), b.leaves());
            assert_eq!(a.proofs(), b.proofs());
        }
        assert_eq!(a.leaf(&addr(1)).unwrap().project_id, "p1");
        assert_eq!(a.leaf(&addr(1)).unwrap().match_amount, U256::from(150u64));
    }

    #[test]
    fn test_root_is_order_independent() {
        let entries = vec![entry("a", 1, 10), entry("b", 2, 20), entry("c", 3, 30), entry("d", 4, 40), entry("e", 5, 50)];
        let mut reversed = entries.clone();
        reversed.reverse();

        let a = DistributionTree::build(&entries).unwrap();
        let b = DistributionTree::build(&reversed).unwrap();
        let again = DistributionTree::build(&entries).unwrap();
        assert_eq!(a.root(), b.root());
        assert_eq!(a.root(), again.root());
        assert_eq!(a.proofs(), b.proofs());
    }

    #[test]
    fn test_every_proof_verifies() {
        for n in 1..=9u8 {
            let entries: Vec<_> = (1..=n).map(|i| entry(&format!("p{i}"), i, i as u64 * 7)).collect();
            let tree = DistributionTree::build(&entries).unwrap();
            for leaf in tree.leaves() {
                let proof = tree.proof(&leaf.payout_address).unwrap();
                assert!(DistributionTree::verify(&tree.root(), leaf, proof), "n={n} leaf {:?}", leaf.payout_address);
            }
        }
    }

    #[test]
    fn test_tampered_leaf_fails_verification() {
        let tree = DistributionTree::build(&[entry("a", 1, 10), entry("b", 2, 20), entry("c", 3, 30)]).unwrap();
        let mut leaf = tree.leaf(&addr(1)).unwrap().clone();
        let proof = tree.proof(&addr(1)).unwrap().to_vec();

        leaf.match_amount = U256::from(11u64);
        assert!(!DistributionTree::verify(&tree.root(), &leaf, &proof));
    }

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        let tree = DistributionTree::build(&[entry("a", 1, 10)]).unwrap();
        let leaf = &tree.leaves()[0];
        assert_eq!(tree.root(), leaf.hash());
        assert!(tree.proof(&addr(1)).unwrap().is_empty());
    }

    #[test]
    fn test_leaf_encoding_layout() {
        let leaf = PayoutLeaf::new(addr(0xAA), U256::from(0x0102u64), "proj-0xround").unwrap();
        let enc = leaf.encode();
        assert_eq!(&enc[..12], &[0u8; 12]);
        assert_eq!(&enc[12..32], &[0xAA; 20]);
        assert_eq!(enc[62], 0x01);
        assert_eq!(enc[63], 0x02);
        assert_eq!(&enc[64..68], b"proj");
        assert!(enc[68..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_project_id_word() {
        let hex_id = format!("0x{}", "ab".repeat(32));
        assert_eq!(project_id_word(&hex_id).unwrap(), [0xAB; 32]);
        assert_eq!(&project_id_word("abc").unwrap()[..3], b"abc");
        assert!(matches!(
            project_id_word(&"x".repeat(40)),
            Err(QfError::Validation(_))
        ));
    }

    #[test]
    fn test_report_is_hex() {
        let tree = DistributionTree::build(&[entry("a", 1, 10), entry("b", 2, 20)]).unwrap();
        let report = tree.report();
        assert_eq!(report.root, tree.root_hex());
        assert_eq!(report.root.len(), 66);
        assert_eq!(report.proofs.len(), 2);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["leaves"][0]["matchAmount"], "10");
    }
}
