//! Builds balance snapshots by replaying historical logs.

use std::path::PathBuf;

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::events::EventKind;
use crate::ledger::BalanceLedger;
use crate::log_api::{LogPage, LogQuery, LogSource};
use crate::snapshot::Snapshot;

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Result<Self, HarvestError> {
        if start > end {
            return Err(HarvestError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HarvestStats {
    pub pages: u64,
    pub logs: u64,
    pub skipped: u64,
    pub retries: u64,
}

#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub snapshot: Snapshot,
    pub stats: HarvestStats,
}

pub struct Harvester<S> {
    source: S,
    config: HarvestConfig,
}

impl<S: LogSource> Harvester<S> {
    pub fn new(source: S, config: HarvestConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Replays every `kind` log of `contract` in `range` and returns the
    /// resulting snapshot.
    pub async fn harvest(
        &self,
        kind: EventKind,
        contract: Address,
        range: BlockRange,
    ) -> Result<HarvestOutcome, HarvestError> {
        self.harvest_kinds(&[kind], contract, range).await
    }

    /// Runs one full pagination pass per kind, in order, into a single ledger.
    pub async fn harvest_kinds(
        &self,
        kinds: &[EventKind],
        contract: Address,
        range: BlockRange,
    ) -> Result<HarvestOutcome, HarvestError> {
        let mut ledger = BalanceLedger::new(self.config.exclusions.clone());
        let mut stats = HarvestStats::default();

        for &kind in kinds {
            self.replay(kind, contract, range, &mut ledger, &mut stats)
                .await?;
        }

        let snapshot = Snapshot::from_ledger(&ledger)?;
        info!(
            holders = snapshot.len(),
            tracked = ledger.len(),
            logs = stats.logs,
            skipped = stats.skipped,
            "harvest complete"
        );
        Ok(HarvestOutcome { snapshot, stats })
    }

    /// Harvests and writes the snapshot to its deterministic path under the
    /// configured output directory. Nothing is written unless every page was
    /// processed.
    pub async fn harvest_to_file(
        &self,
        kinds: &[EventKind],
        contract: Address,
        range: BlockRange,
    ) -> Result<(PathBuf, HarvestOutcome), HarvestError> {
        let outcome = self.harvest_kinds(kinds, contract, range).await?;
        let path = self.snapshot_path(contract, range);
        outcome.snapshot.save(&path)?;
        info!(path = %path.display(), "snapshot written");
        Ok((path, outcome))
    }

    pub fn snapshot_path(&self, contract: Address, range: BlockRange) -> PathBuf {
        self.config.output_dir.join(Snapshot::file_name(
            &self.config.network,
            &contract.to_checksum(None),
            range.start,
            range.end,
        ))
    }

    fn query(&self, kind: EventKind, contract: Address, range: BlockRange) -> LogQuery {
        LogQuery {
            blockchain: self.config.network.clone(),
            from_block: range.start,
            to_block: range.end,
            address: contract.to_checksum(None),
            topics: kind.topic_filter(self.config.pool_id),
            page_size: self.config.page_size,
            decode_logs: true,
        }
    }

    async fn replay(
        &self,
        kind: EventKind,
        contract: Address,
        range: BlockRange,
        ledger: &mut BalanceLedger,
        stats: &mut HarvestStats,
    ) -> Result<(), HarvestError> {
        let query = self.query(kind, contract, range);
        let mut cursor: Option<String> = None;
        let mut pass_logs = 0u64;

        loop {
            let page = self.fetch_page(&query, cursor.as_deref(), stats).await?;
            if page.logs.is_empty() {
                break;
            }

            stats.pages += 1;
            pass_logs += page.logs.len() as u64;
            stats.logs += page.logs.len() as u64;

            for log in &page.logs {
                match kind.decode(log) {
                    Ok(event) => ledger.apply(&event),
                    Err(err) => {
                        stats.skipped += 1;
                        debug!(
                            kind = kind.label(),
                            tx = log.transaction_hash.as_deref().unwrap_or("-"),
                            error = %err,
                            "skipping undecodable log"
                        );
                    }
                }
            }
            info!(kind = kind.label(), "{pass_logs} {} logs fetched", kind.label());

            match page.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        Ok(())
    }

    /// Requests one page, retrying transient failures at the same cursor.
    async fn fetch_page(
        &self,
        query: &LogQuery,
        cursor: Option<&str>,
        stats: &mut HarvestStats,
    ) -> Result<LogPage, HarvestError> {
        let policy = self.config.retry;
        let mut failures = 0u32;

        loop {
            debug!(page = cursor.unwrap_or("<first>"), "requesting logs");
            let err = match self.source.get_logs(query, cursor).await {
                Ok(page) => return Ok(page),
                Err(err) if err.is_fatal() => return Err(HarvestError::Fetch(err)),
                Err(err) => err,
            };

            failures = failures.saturating_add(1);
            if !policy.allows(failures) {
                return Err(HarvestError::RetriesExhausted {
                    attempts: failures,
                    cursor: cursor.map(str::to_string),
                    last: err,
                });
            }

            stats.retries += 1;
            let delay = policy.delay_for(failures);
            warn!(attempt = failures, ?delay, error = %err, "log request failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
