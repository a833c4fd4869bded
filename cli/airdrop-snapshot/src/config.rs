use std::path::PathBuf;

use crate::events::DEFAULT_POOL_ID;
use crate::ledger::ExclusionSet;
use crate::retry::RetryPolicy;

pub const DEFAULT_PAGE_SIZE: u32 = 10_000;
pub const DEFAULT_OUTPUT_DIR: &str = "snapshots";

/// Everything a harvest run needs besides the contract and block range.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Log-indexing API endpoint.
    pub api_url: String,
    /// Chain identifier understood by the API, also the snapshot filename
    /// prefix.
    pub network: String,
    pub exclusions: ExclusionSet,
    pub page_size: u32,
    /// Staking pool whose deposits and withdrawals are counted.
    pub pool_id: u64,
    pub retry: RetryPolicy,
    pub output_dir: PathBuf,
}

impl HarvestConfig {
    pub fn new(api_url: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            network: network.into(),
            exclusions: ExclusionSet::default(),
            page_size: DEFAULT_PAGE_SIZE,
            pool_id: DEFAULT_POOL_ID,
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_id(mut self, pool_id: u64) -> Self {
        self.pool_id = pool_id;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}
