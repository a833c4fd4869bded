use alloy_primitives::B256;
use anyhow::{bail, Context, Result};
use clap::Args;

use airdrop_snapshot::{merkle, parse_address, parse_amount};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Merkle root (hex)
    #[arg(short, long)]
    pub root: String,

    /// Claimer address
    #[arg(short, long)]
    pub address: String,

    /// Claimed amount (decimal or 0x hex)
    #[arg(long)]
    pub amount: String,

    /// Proof elements, comma separated
    #[arg(short, long, value_delimiter = ',', num_args = 0..)]
    pub proof: Vec<String>,
}

fn parse_hash(s: &str) -> Result<B256> {
    s.trim()
        .parse::<B256>()
        .with_context(|| format!("Invalid 32-byte hash: {s}"))
}

pub fn run(args: &VerifyArgs) -> Result<()> {
    let root = parse_hash(&args.root).context("Invalid Merkle root")?;
    let address = parse_address(&args.address).context("Invalid claimer address")?;
    let amount = parse_amount(&args.amount).context("Invalid amount")?;
    let proof = args
        .proof
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| parse_hash(p))
        .collect::<Result<Vec<_>>>()?;

    if !merkle::verify(root, address, amount, &proof) {
        bail!("Proof does not verify against root {root}");
    }
    println!("Proof is valid for {address} claiming {amount}");
    Ok(())
}
