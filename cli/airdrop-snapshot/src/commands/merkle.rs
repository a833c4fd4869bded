use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use airdrop_snapshot::{RawSnapshot, StandardMerkleTree};

#[derive(Args, Debug)]
pub struct MerkleArgs {
    /// Path to snapshot JSON file
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// Output file (defaults to merkle-<snapshot name> next to the snapshot)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &MerkleArgs) -> Result<()> {
    println!("Reading snapshot from {}...", args.snapshot.display());
    let raw = RawSnapshot::read(&args.snapshot).context("Failed to read snapshot")?;
    println!("Total accounts: {}", raw.0.len());

    println!("Building Merkle tree...");
    let tree = StandardMerkleTree::from_raw(&raw).context("Failed to build Merkle tree")?;
    println!("Total: {}", tree.total());
    println!("Merkle root: {}", tree.root());

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output(&args.snapshot)?,
    };
    tree.save(&output).context("Failed to write Merkle tree")?;
    println!("Merkle tree saved to {}", output.display());
    Ok(())
}

fn default_output(snapshot: &Path) -> Result<PathBuf> {
    let name = snapshot
        .file_name()
        .context("Snapshot path has no file name")?;
    Ok(snapshot.with_file_name(format!("merkle-{}", name.to_string_lossy())))
}
