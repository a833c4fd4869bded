use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use airdrop_snapshot::config::{DEFAULT_OUTPUT_DIR, DEFAULT_PAGE_SIZE};
use airdrop_snapshot::events::DEFAULT_POOL_ID;
use airdrop_snapshot::{
    parse_address, AnkrClient, BlockRange, EventKind, ExclusionSet, HarvestConfig, Harvester,
    RetryPolicy,
};

/// Options shared by every harvest command.
#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Chain identifier understood by the log API (bsc, eth, metis, ...)
    #[arg(short, long)]
    pub network: String,

    /// First block of the snapshot (inclusive)
    #[arg(long)]
    pub start_block: u64,

    /// Last block of the snapshot (inclusive)
    #[arg(long)]
    pub end_block: u64,

    /// Log API endpoint
    #[arg(long, env = "ANKR_API_URI")]
    pub api_url: String,

    /// Addresses left out of accounting, comma separated
    #[arg(long, env = "EXCLUDE_ADDRESSES", default_value = "")]
    pub exclude: String,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Directory the snapshot file is written to
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Attempts per page before giving up (0 retries forever)
    #[arg(long, default_value_t = 10)]
    pub max_attempts: u32,

    /// Initial backoff between attempts, doubled after each failure
    #[arg(long, default_value_t = 500)]
    pub retry_delay_ms: u64,
}

impl HarvestArgs {
    fn config(&self) -> Result<HarvestConfig> {
        let exclusions =
            ExclusionSet::parse(&self.exclude).context("Invalid exclusion list")?;
        let retry = RetryPolicy {
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            base_delay: Duration::from_millis(self.retry_delay_ms),
            ..RetryPolicy::default()
        };

        Ok(HarvestConfig::new(self.api_url.clone(), self.network.clone())
            .with_exclusions(exclusions)
            .with_page_size(self.page_size)
            .with_retry(retry)
            .with_output_dir(self.output_dir.clone()))
    }
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Token contract address
    #[arg(short, long)]
    pub token: String,

    #[command(flatten)]
    pub harvest: HarvestArgs,
}

#[derive(Args, Debug)]
pub struct StakeArgs {
    /// Staking contract address
    #[arg(short, long)]
    pub contract: String,

    /// Pool whose deposits and withdrawals are counted
    #[arg(long, default_value_t = DEFAULT_POOL_ID)]
    pub pool_id: u64,

    #[command(flatten)]
    pub harvest: HarvestArgs,
}

pub async fn run(args: SnapshotArgs) -> Result<()> {
    let token = parse_address(&args.token).context("Invalid token address")?;
    let config = args.harvest.config()?;
    harvest(&[EventKind::Transfer], token, &args.harvest, config).await
}

pub async fn run_stake(args: StakeArgs) -> Result<()> {
    let contract = parse_address(&args.contract).context("Invalid staking contract address")?;
    let config = args.harvest.config()?.with_pool_id(args.pool_id);
    harvest(
        &[EventKind::StakeDeposit, EventKind::StakeWithdraw],
        contract,
        &args.harvest,
        config,
    )
    .await
}

async fn harvest(
    kinds: &[EventKind],
    contract: Address,
    args: &HarvestArgs,
    config: HarvestConfig,
) -> Result<()> {
    let range = BlockRange::new(args.start_block, args.end_block)?;
    info!(
        network = %config.network,
        %contract,
        start = range.start,
        end = range.end,
        excluded = config.exclusions.len(),
        "starting snapshot"
    );

    let client = AnkrClient::new(reqwest::Client::new(), &config.api_url);
    let harvester = Harvester::new(client, config);
    let (path, outcome) = harvester
        .harvest_to_file(kinds, contract, range)
        .await
        .context("Snapshot failed")?;

    println!("Pages fetched: {}", outcome.stats.pages);
    println!("Logs processed: {}", outcome.stats.logs);
    println!("Holders: {}", outcome.snapshot.len());
    println!("Total balance: {}", outcome.snapshot.total());
    println!("Snapshot saved to {}", path.display());
    Ok(())
}
