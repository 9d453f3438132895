use thiserror::Error;

use crate::model::OutcomeStatus;

/// Every engine failure is recoverable by the caller: re-capture, fetch more
/// source data, fix the config, or retry persistence. None leaves a side
/// effect behind (counter and ledger unchanged).
#[derive(Debug, Error)]
pub enum ReconError {
    /// A source record carried no usable data (or a malformed envelope).
    #[error("source '{source_id}': invalid record: {reason}")]
    InvalidSourceRecord { source_id: String, reason: String },
    /// `reconcile` was called with zero sources.
    #[error("no source records supplied")]
    EmptySources,
    /// The merged record has neither a title nor any identifier.
    #[error("merged record has no title and no identifier; cannot catalogue or deduplicate")]
    InsufficientData,
    /// The sequence store could not be read.
    #[error("cannot read catalog sequence: {0}")]
    SequenceRead(#[source] StoreError),
    /// Computing the next number succeeded but persisting it failed.
    #[error("cannot persist catalog sequence {sequence}: {source}")]
    AllocationPersist {
        sequence: u64,
        #[source]
        source: StoreError,
    },
    /// The next sequence does not fit the configured digit width.
    #[error("catalog sequence exhausted: {width} digit(s) allow at most {max}")]
    CatalogExhausted { width: usize, max: u64 },
    /// `resolve` was called on an outcome that is not waiting for a human.
    #[error("outcome is {status}, only ambiguous outcomes can be resolved")]
    NotPending { status: OutcomeStatus },
    /// The ledger collaborator refused the new entry.
    #[error("cannot append to ledger: {0}")]
    LedgerAppend(String),
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, weight, format, ...).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// Missing required column in ledger data.
    #[error("ledger: missing column '{column}'")]
    MissingColumn { column: String },
    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(String),
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl ReconError {
    pub(crate) fn invalid_source(source_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSourceRecord {
            source_id: source_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures of a [`crate::allocator::SequenceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored value could not be decoded.
    #[error("corrupt sequence state: {0}")]
    Corrupt(String),
    /// Another writer moved the counter since it was read.
    #[error("sequence moved underneath us: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },
}
