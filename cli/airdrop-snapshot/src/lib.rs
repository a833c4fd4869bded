pub mod common;
pub mod config;
pub mod error;
pub mod events;
pub mod harvest;
pub mod ledger;
pub mod log_api;
pub mod merkle;
pub mod retry;
pub mod snapshot;

pub use common::{
    format_units, keccak256, parse_address, parse_amount, to_hex_quantity, write_file_atomic,
};
pub use config::HarvestConfig;
pub use error::{DecodeError, FetchError, HarvestError, MerkleError, ParseError, SnapshotError};
pub use events::{EventKind, LedgerEvent};
pub use harvest::{BlockRange, HarvestOutcome, HarvestStats, Harvester};
pub use ledger::{BalanceLedger, ExclusionSet};
pub use log_api::{AnkrClient, LogPage, LogQuery, LogSource, RawLog};
pub use merkle::{StandardMerkleTree, TreeDump};
pub use retry::RetryPolicy;
pub use snapshot::{RawSnapshot, Snapshot};
