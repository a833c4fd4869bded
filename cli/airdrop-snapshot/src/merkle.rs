//! `(address, uint256)` Merkle trees compatible with OpenZeppelin's
//! `StandardMerkleTree` (`standard-v1`) and `MerkleProof.verify`.
//!
//! Leaves are `keccak256(keccak256(abi.encode(address, amount)))`. Nodes are
//! stored as a flat complete binary tree: the root at index 0, children of `i`
//! at `2i + 1` and `2i + 2`, and the leaves, sorted by hash, filling the tail
//! of the array in reverse. Pairs are hashed in sorted order, so a proof is
//! just the list of siblings from leaf to root.

use std::fs;
use std::path::Path;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::common::{
    keccak256, parse_address, parse_amount, to_hex_quantity, to_pretty_json, write_file_atomic,
};
use crate::error::{MerkleError, ParseError};
use crate::snapshot::{RawSnapshot, Snapshot};

pub const FORMAT: &str = "standard-v1";
pub const LEAF_ENCODING: [&str; 2] = ["address", "uint256"];

/// Hashes one `(address, amount)` leaf.
pub fn leaf_hash(address: Address, amount: U256) -> B256 {
    let mut encoded = [0u8; 64];
    encoded[12..32].copy_from_slice(address.as_slice());
    encoded[32..].copy_from_slice(&amount.to_be_bytes::<32>());
    keccak256(keccak256(encoded))
}

/// Computes a Keccak256 hash of two nodes, smaller one first.
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (left, right) = if a <= b { (a, b) } else { (b, a) };
    let hash: [u8; 32] = Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into();
    B256::from(hash)
}

/// Folds `leaf` with every proof element.
pub fn process_proof(leaf: B256, proof: &[B256]) -> B256 {
    proof.iter().fold(leaf, |node, sibling| hash_pair(node, *sibling))
}

/// Checks `proof` for `(address, amount)` against `root`.
pub fn verify(root: B256, address: Address, amount: U256, proof: &[B256]) -> bool {
    process_proof(leaf_hash(address, amount), proof) == root
}

fn sibling_index(i: usize) -> usize {
    if i % 2 == 1 {
        i + 1
    } else {
        i - 1
    }
}

fn parent_index(i: usize) -> usize {
    (i - 1) / 2
}

fn is_leaf_index(len: usize, i: usize) -> bool {
    2 * i + 1 >= len
}

fn make_tree(leaves: &[B256]) -> Vec<B256> {
    let len = 2 * leaves.len() - 1;
    let mut tree = vec![B256::ZERO; len];
    for (i, leaf) in leaves.iter().enumerate() {
        tree[len - 1 - i] = *leaf;
    }
    for i in (0..len - leaves.len()).rev() {
        tree[i] = hash_pair(tree[2 * i + 1], tree[2 * i + 2]);
    }
    tree
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleValue {
    pub address: Address,
    pub amount: U256,
    pub tree_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardMerkleTree {
    tree: Vec<B256>,
    values: Vec<MerkleValue>,
}

impl StandardMerkleTree {
    /// Builds a tree over `entries`. The root depends only on the set of
    /// leaves, not on their order; `values` keep the given order.
    pub fn of(entries: impl IntoIterator<Item = (Address, U256)>) -> Result<Self, MerkleError> {
        let entries: Vec<(Address, U256)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(MerkleError::Empty);
        }

        let mut hashed: Vec<(B256, usize)> = entries
            .iter()
            .enumerate()
            .map(|(i, (address, amount))| (leaf_hash(*address, *amount), i))
            .collect();
        hashed.sort_by(|a, b| a.0.cmp(&b.0));

        let leaves: Vec<B256> = hashed.iter().map(|(hash, _)| *hash).collect();
        let tree = make_tree(&leaves);

        let mut values: Vec<MerkleValue> = entries
            .iter()
            .map(|&(address, amount)| MerkleValue {
                address,
                amount,
                tree_index: 0,
            })
            .collect();
        for (leaf_index, &(_, value_index)) in hashed.iter().enumerate() {
            values[value_index].tree_index = tree.len() - 1 - leaf_index;
        }

        Ok(Self { tree, values })
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, MerkleError> {
        Self::of(snapshot.entries().iter().copied())
    }

    /// Builds from unvalidated snapshot text. Any malformed address or
    /// negative/non-numeric amount fails the whole build.
    pub fn from_raw(raw: &RawSnapshot) -> Result<Self, MerkleError> {
        let entries = raw
            .0
            .iter()
            .enumerate()
            .map(|(index, (address, amount))| parse_leaf(index, address, amount))
            .collect::<Result<Vec<_>, _>>()?;
        Self::of(entries)
    }

    pub fn root(&self) -> B256 {
        self.tree[0]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[MerkleValue] {
        &self.values
    }

    pub fn total(&self) -> U256 {
        self.values
            .iter()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(v.amount))
    }

    /// Index of the first value for `address`.
    pub fn leaf_lookup(&self, address: &Address) -> Option<usize> {
        self.values.iter().position(|v| &v.address == address)
    }

    /// Proof for the value at `index` (position in [`Self::values`]).
    pub fn get_proof(&self, index: usize) -> Result<Vec<B256>, MerkleError> {
        let value = self
            .values
            .get(index)
            .ok_or(MerkleError::IndexOutOfBounds {
                index,
                len: self.values.len(),
            })?;

        let mut proof = Vec::new();
        let mut i = value.tree_index;
        while i > 0 {
            proof.push(self.tree[sibling_index(i)]);
            i = parent_index(i);
        }
        Ok(proof)
    }

    pub fn proof_for(&self, address: &Address) -> Result<Vec<B256>, MerkleError> {
        let index = self
            .leaf_lookup(address)
            .ok_or(MerkleError::NotFound(*address))?;
        self.get_proof(index)
    }

    pub fn verify(&self, address: Address, amount: U256, proof: &[B256]) -> bool {
        verify(self.root(), address, amount, proof)
    }

    pub fn dump(&self) -> TreeDump {
        TreeDump {
            format: FORMAT.to_string(),
            tree: self.tree.clone(),
            values: self
                .values
                .iter()
                .map(|v| DumpValue {
                    value: (v.address.to_checksum(None), to_hex_quantity(v.amount)),
                    tree_index: v.tree_index,
                })
                .collect(),
            leaf_encoding: LEAF_ENCODING.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Restores a dumped tree, checking every node and leaf hash.
    pub fn load(dump: TreeDump) -> Result<Self, MerkleError> {
        if dump.format != FORMAT {
            return Err(MerkleError::UnsupportedFormat(dump.format));
        }
        if dump.leaf_encoding != LEAF_ENCODING {
            return Err(MerkleError::UnsupportedFormat(format!(
                "leaf encoding {:?}",
                dump.leaf_encoding
            )));
        }

        let values = dump
            .values
            .iter()
            .enumerate()
            .map(|(index, v)| -> Result<MerkleValue, MerkleError> {
                let (address, amount) = parse_leaf(index, &v.value.0, &v.value.1)?;
                Ok(MerkleValue {
                    address,
                    amount,
                    tree_index: v.tree_index,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tree = Self {
            tree: dump.tree,
            values,
        };
        tree.validate()?;
        Ok(tree)
    }

    pub fn validate(&self) -> Result<(), MerkleError> {
        let len = self.tree.len();
        if len == 0 || len % 2 == 0 {
            return Err(MerkleError::InvalidTree(format!(
                "{len} nodes is not a complete binary tree"
            )));
        }
        if self.values.len() != (len + 1) / 2 {
            return Err(MerkleError::InvalidTree(format!(
                "{} values for {} leaves",
                self.values.len(),
                (len + 1) / 2
            )));
        }

        for i in (0..len).filter(|&i| !is_leaf_index(len, i)) {
            if self.tree[i] != hash_pair(self.tree[2 * i + 1], self.tree[2 * i + 2]) {
                return Err(MerkleError::InvalidTree(format!(
                    "node {i} does not match its children"
                )));
            }
        }

        for (index, value) in self.values.iter().enumerate() {
            if value.tree_index >= len || !is_leaf_index(len, value.tree_index) {
                return Err(MerkleError::InvalidTree(format!(
                    "value {index} points at non-leaf index {}",
                    value.tree_index
                )));
            }
            if self.tree[value.tree_index] != leaf_hash(value.address, value.amount) {
                return Err(MerkleError::InvalidTree(format!(
                    "value {index} does not match leaf {}",
                    value.tree_index
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>, MerkleError> {
        Ok(to_pretty_json(&self.dump())?)
    }

    pub fn save(&self, path: &Path) -> Result<(), MerkleError> {
        write_file_atomic(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, MerkleError> {
        Self::load(serde_json::from_str(json)?)
    }

    pub fn read(path: &Path) -> Result<Self, MerkleError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

fn parse_leaf(index: usize, address: &str, amount: &str) -> Result<(Address, U256), MerkleError> {
    let invalid = |e: ParseError| MerkleError::InvalidLeaf {
        index,
        reason: e.to_string(),
    };
    Ok((
        parse_address(address).map_err(invalid)?,
        parse_amount(amount).map_err(invalid)?,
    ))
}

/// On-disk form of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDump {
    pub format: String,
    pub tree: Vec<B256>,
    pub values: Vec<DumpValue>,
    pub leaf_encoding: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpValue {
    pub value: (String, String),
    pub tree_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn amount(value: u64) -> U256 {
        U256::from(value)
    }

    fn sample() -> Vec<(Address, U256)> {
        vec![
            (addr(0xaa), amount(100)),
            (addr(0xbb), amount(200)),
            (addr(0xcc), amount(300)),
        ]
    }

    #[test]
    fn test_known_root() {
        let ether = U256::from(1_000_000_000_000_000_000u64);
        let tree = StandardMerkleTree::of([
            (addr(0x11), ether * U256::from(5u64)),
            (addr(0x22), ether * U256::from(5u64) / U256::from(2u64)),
        ])
        .unwrap();
        assert_eq!(
            tree.root().to_string(),
            "0xd4dee0beab2d53f2cc83e567171bd2820e49898130a22622b10ead383e90bd77"
        );
    }

    #[test]
    fn test_hash_pair_is_commutative() {
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        assert_eq!(hash_pair(a, b), hash_pair(b, a));
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = StandardMerkleTree::of([(addr(1), amount(5))]).unwrap();
        assert_eq!(tree.root(), leaf_hash(addr(1), amount(5)));
        assert!(tree.proof_for(&addr(1)).unwrap().is_empty());
        assert!(tree.verify(addr(1), amount(5), &[]));
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(matches!(
            StandardMerkleTree::of(Vec::new()),
            Err(MerkleError::Empty)
        ));
    }

    #[test]
    fn test_root_is_order_independent() {
        let forward = StandardMerkleTree::of(sample()).unwrap();
        let mut reversed = sample();
        reversed.reverse();
        let backward = StandardMerkleTree::of(reversed).unwrap();
        assert_eq!(forward.root(), backward.root());

        let pair = StandardMerkleTree::of([(addr(0xa), amount(1)), (addr(0xb), amount(2))]).unwrap();
        let swapped = StandardMerkleTree::of([(addr(0xb), amount(2)), (addr(0xa), amount(1))]).unwrap();
        assert_eq!(pair.root(), swapped.root());
    }

    #[test]
    fn test_every_proof_verifies() {
        let entries: Vec<_> = (1..=7u8).map(|i| (addr(i), amount(u64::from(i) * 10))).collect();
        let tree = StandardMerkleTree::of(entries.clone()).unwrap();
        for (address, value) in entries {
            let proof = tree.proof_for(&address).unwrap();
            assert!(tree.verify(address, value, &proof));
            assert!(!tree.verify(address, value + U256::from(1u64), &proof));
        }
    }

    #[test]
    fn test_proof_against_other_root_fails() {
        let tree = StandardMerkleTree::of(sample()).unwrap();
        assert_eq!(tree.total(), amount(600));
        let proof = tree.proof_for(&addr(0xbb)).unwrap();
        assert!(verify(tree.root(), addr(0xbb), amount(200), &proof));

        let other = StandardMerkleTree::of([
            (addr(0xaa), amount(100)),
            (addr(0xbb), amount(201)),
            (addr(0xcc), amount(300)),
        ])
        .unwrap();
        assert!(!verify(other.root(), addr(0xbb), amount(200), &proof));
    }

    #[test]
    fn test_proof_for_missing_address() {
        let tree = StandardMerkleTree::of(sample()).unwrap();
        assert!(matches!(
            tree.proof_for(&addr(0xdd)),
            Err(MerkleError::NotFound(a)) if a == addr(0xdd)
        ));
        assert!(matches!(
            tree.get_proof(3),
            Err(MerkleError::IndexOutOfBounds { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_layout_matches_standard_tree() {
        let tree = StandardMerkleTree::of(sample()).unwrap();
        let mut leaves: Vec<B256> = sample().iter().map(|(a, v)| leaf_hash(*a, *v)).collect();
        leaves.sort();

        assert_eq!(tree.tree.len(), 5);
        assert_eq!(tree.tree[4], leaves[0]);
        assert_eq!(tree.tree[3], leaves[1]);
        assert_eq!(tree.tree[2], leaves[2]);
        assert_eq!(tree.tree[1], hash_pair(leaves[1], leaves[0]));
        assert_eq!(tree.root(), hash_pair(tree.tree[1], leaves[2]));
    }

    #[test]
    fn test_dump_round_trip_preserves_proofs() {
        let tree = StandardMerkleTree::of(sample()).unwrap();
        let json = String::from_utf8(tree.to_json_pretty().unwrap()).unwrap();
        let reloaded = StandardMerkleTree::from_json(&json).unwrap();

        assert_eq!(reloaded.root(), tree.root());
        for i in 0..tree.len() {
            assert_eq!(reloaded.get_proof(i).unwrap(), tree.get_proof(i).unwrap());
        }
        assert_eq!(reloaded, tree);
    }

    #[test]
    fn test_dump_format() {
        let tree = StandardMerkleTree::of([(addr(0x11), amount(100))]).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&tree.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["format"], "standard-v1");
        assert_eq!(json["leafEncoding"], serde_json::json!(["address", "uint256"]));
        assert_eq!(
            json["values"][0]["value"],
            serde_json::json!(["0x1111111111111111111111111111111111111111", "0x64"])
        );
        assert_eq!(json["values"][0]["treeIndex"], 0);
    }

    #[test]
    fn test_load_rejects_tampering() {
        let tree = StandardMerkleTree::of(sample()).unwrap();

        let mut dump = tree.dump();
        dump.values[0].value.1 = "0x65".to_string();
        assert!(matches!(
            StandardMerkleTree::load(dump),
            Err(MerkleError::InvalidTree(_))
        ));

        let mut dump = tree.dump();
        dump.tree[1] = B256::repeat_byte(7);
        assert!(matches!(
            StandardMerkleTree::load(dump),
            Err(MerkleError::InvalidTree(_))
        ));

        let mut dump = tree.dump();
        dump.format = "standard-v2".to_string();
        assert!(matches!(
            StandardMerkleTree::load(dump),
            Err(MerkleError::UnsupportedFormat(_))
        ));

        let mut dump = tree.dump();
        dump.leaf_encoding = vec!["address".to_string(), "uint128".to_string()];
        assert!(matches!(
            StandardMerkleTree::load(dump),
            Err(MerkleError::UnsupportedFormat(_))
        ));

        let mut dump = tree.dump();
        dump.values[1].tree_index = 0;
        assert!(matches!(
            StandardMerkleTree::load(dump),
            Err(MerkleError::InvalidTree(_))
        ));
    }

    #[test]
    fn test_from_raw_rejects_invalid_leaves() {
        let negative = RawSnapshot(vec![
            ("0x1111111111111111111111111111111111111111".into(), "0x01".into()),
            ("0x2222222222222222222222222222222222222222".into(), "-5".into()),
        ]);
        assert!(matches!(
            StandardMerkleTree::from_raw(&negative),
            Err(MerkleError::InvalidLeaf { index: 1, .. })
        ));

        let bad_checksum = RawSnapshot(vec![(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAeD".into(),
            "0x01".into(),
        )]);
        assert!(matches!(
            StandardMerkleTree::from_raw(&bad_checksum),
            Err(MerkleError::InvalidLeaf { index: 0, .. })
        ));
    }

    #[test]
    fn test_from_snapshot_matches_raw() {
        let raw = RawSnapshot(vec![
            ("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into(), "0x64".into()),
            ("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".into(), "200".into()),
        ]);
        let snapshot = raw.parse().unwrap();
        assert_eq!(
            StandardMerkleTree::from_raw(&raw).unwrap().root(),
            StandardMerkleTree::from_snapshot(&snapshot).unwrap().root()
        );
    }
}
