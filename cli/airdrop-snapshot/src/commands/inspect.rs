use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use airdrop_snapshot::{format_units, StandardMerkleTree};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to Merkle tree file
    #[arg(short, long)]
    pub tree: PathBuf,

    /// Token decimals used to format the distribution size
    #[arg(long, default_value_t = 18)]
    pub decimals: u8,
}

pub fn run(args: &InspectArgs) -> Result<()> {
    let tree = StandardMerkleTree::read(&args.tree).context("Failed to load Merkle tree")?;
    let total = tree.total();

    println!("Merkle root: {}", tree.root());
    println!("Leaves: {}", tree.len());
    println!("Airdrop size: {total}");
    println!("Airdrop size: {}", format_units(total, args.decimals));
    Ok(())
}
