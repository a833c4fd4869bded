#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{inspect, merkle, proof, snapshot, verify};

#[derive(Parser, Debug)]
#[command(name = "airdrop")]
#[command(about = "Token holder snapshots and Merkle distribution trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generates snapshot of token holders from Transfer logs
    Snapshot(snapshot::SnapshotArgs),
    /// Generates snapshot of stakers from pool Deposit/Withdraw logs
    SnapshotStake(snapshot::StakeArgs),
    /// Builds a Merkle tree from a snapshot file
    Merkle(merkle::MerkleArgs),
    /// Generates the claim proof of one address
    Proof(proof::ProofArgs),
    /// Verifies a claim proof against a Merkle root
    Verify(verify::VerifyArgs),
    /// Prints root and distribution size of a Merkle tree file
    Inspect(inspect::InspectArgs),
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "airdrop_snapshot=info,airdrop=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot(args) => snapshot::run(args).await?,
        Commands::SnapshotStake(args) => snapshot::run_stake(args).await?,
        Commands::Merkle(args) => merkle::run(&args)?,
        Commands::Proof(args) => proof::run(&args)?,
        Commands::Verify(args) => verify::run(&args)?,
        Commands::Inspect(args) => inspect::run(&args)?,
    }

    Ok(())
}
