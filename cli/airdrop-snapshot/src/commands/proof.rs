use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use airdrop_snapshot::common::to_pretty_json;
use airdrop_snapshot::{parse_address, write_file_atomic, StandardMerkleTree};

#[derive(Args, Debug)]
pub struct ProofArgs {
    /// Path to Merkle tree file
    #[arg(short, long)]
    pub tree: PathBuf,

    /// Claimer address
    #[arg(short, long)]
    pub address: String,

    /// Output JSON file
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Arguments of the on-chain claim call, plus the root they prove against.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimOutput {
    root: String,
    address: String,
    amount: String,
    tree_index: usize,
    proof: Vec<String>,
}

fn build_claim(tree: &StandardMerkleTree, address: &str) -> Result<ClaimOutput> {
    let address = parse_address(address).context("Invalid claimer address")?;
    let index = tree
        .leaf_lookup(&address)
        .with_context(|| format!("Address {address} is not in the tree"))?;
    let value = tree.values()[index];
    let proof = tree.get_proof(index)?;

    if !tree.verify(value.address, value.amount, &proof) {
        bail!("Generated proof does not verify against the tree root");
    }

    Ok(ClaimOutput {
        root: tree.root().to_string(),
        address: value.address.to_checksum(None),
        amount: value.amount.to_string(),
        tree_index: value.tree_index,
        proof: proof.iter().map(ToString::to_string).collect(),
    })
}

pub fn run(args: &ProofArgs) -> Result<()> {
    println!("Loading Merkle tree...");
    let tree = StandardMerkleTree::read(&args.tree).context("Failed to load Merkle tree")?;
    println!("Merkle root: {}", tree.root());

    let claim = build_claim(&tree, &args.address)?;
    println!("Amount: {}", claim.amount);
    println!("Proof length: {}", claim.proof.len());

    write_file_atomic(&args.output, to_pretty_json(&claim)?)
        .context("Failed to write claim file")?;
    println!("Claim saved to {}", args.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};

    use super::*;

    fn tree() -> StandardMerkleTree {
        StandardMerkleTree::of([
            (Address::repeat_byte(0xa1), U256::from(100)),
            (Address::repeat_byte(0xb2), U256::from(200)),
            (Address::repeat_byte(0xc3), U256::from(300)),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_claim() {
        let tree = tree();
        let claim = build_claim(&tree, "0xb2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2").unwrap();
        assert_eq!(claim.amount, "200");
        assert_eq!(claim.root, tree.root().to_string());
        assert_eq!(claim.proof.len(), 2);

        let json: serde_json::Value =
            serde_json::from_slice(&to_pretty_json(&claim).unwrap()).unwrap();
        assert!(json.get("treeIndex").is_some());
    }

    #[test]
    fn test_unknown_address() {
        assert!(build_claim(&tree(), "0xd4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4d4").is_err());
    }
}
