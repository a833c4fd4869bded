//! Error types for the snapshot and Merkle pipeline

use alloy_primitives::Address;
use thiserror::Error;

/// Rejected address or amount text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid address {input:?}: {reason}")]
    Address { input: String, reason: String },

    #[error("invalid amount {input:?}: {reason}")]
    Amount { input: String, reason: String },
}

impl ParseError {
    pub(crate) fn address(input: &str, reason: impl Into<String>) -> Self {
        Self::Address {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn amount(input: &str, reason: impl Into<String>) -> Self {
        Self::Amount {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single log page request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network failure, rate limiting, server error or garbled body. The same
    /// page may be requested again.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// The API refused the request itself (bad range, bad params). Retrying
    /// the same request cannot succeed.
    #[error("log API rejected the request ({code}): {message}")]
    Fatal { code: i64, message: String },
}

impl FetchError {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            408 | 429 => Self::Transient(format!("HTTP {status}: {body}")),
            400..=499 => Self::Fatal {
                code: i64::from(status),
                message: body,
            },
            _ => Self::Transient(format!("HTTP {status}: {body}")),
        }
    }

    /// Classifies a JSON-RPC error object.
    pub fn from_rpc(code: i64, message: String) -> Self {
        match code {
            -32600 | -32602 => Self::Fatal { code, message },
            _ => Self::Transient(format!("RPC error {code}: {message}")),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::Transient(err.to_string()),
        }
    }
}

/// A log that could not be turned into a ledger event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log carries neither a decoded event nor a raw payload")]
    Missing,

    #[error("expected {expected} event inputs, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("unexpected topic0 {0}")]
    UnexpectedTopic(String),

    #[error("malformed {field}: {reason}")]
    Field { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid snapshot entry: {0}")]
    Entry(#[from] ParseError),

    #[error("balance of {0} does not fit in 256 bits")]
    Overflow(Address),
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("invalid block range: start {start} is after end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error(transparent)]
    Fetch(FetchError),

    #[error("giving up on page {cursor:?} after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        cursor: Option<String>,
        #[source]
        last: FetchError,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("invalid leaf #{index}: {reason}")]
    InvalidLeaf { index: usize, reason: String },

    #[error("address {0} not found in tree")]
    NotFound(Address),

    #[error("cannot build a tree without leaves")]
    Empty,

    #[error("unsupported tree format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid tree: {0}")]
    InvalidTree(String),

    #[error("value index {index} out of bounds for tree with {len} values")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert!(!FetchError::from_status(429, String::new()).is_fatal());
        assert!(!FetchError::from_status(408, String::new()).is_fatal());
        assert!(!FetchError::from_status(503, String::new()).is_fatal());
        assert!(FetchError::from_status(400, String::new()).is_fatal());
        assert!(FetchError::from_status(401, String::new()).is_fatal());
    }

    #[test]
    fn test_rpc_code_classification() {
        assert!(FetchError::from_rpc(-32602, "bad range".into()).is_fatal());
        assert!(FetchError::from_rpc(-32600, "bad request".into()).is_fatal());
        assert!(!FetchError::from_rpc(-32000, "busy".into()).is_fatal());
    }
}
