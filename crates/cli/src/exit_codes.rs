//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts branch on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success (NEW book catalogued)            |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-4     | reconcile        | Decision outcomes other than NEW         |
//! | 5-9     | reconcile        | Input, data and persistence failures     |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `exit_code_for` or the relevant command

use shelfmark_recon::{OutcomeStatus, ReconError};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success. For `reconcile`, the book was NEW.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input file, invalid config.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Reconcile outcomes (3-4)
// =============================================================================

/// The book is already in the ledger.
pub const EXIT_DUPLICATE: u8 = 3;

/// A close ledger match needs a human decision (`--resolve new|duplicate`).
pub const EXIT_AMBIGUOUS: u8 = 4;

// =============================================================================
// Reconcile failures (5-9)
// =============================================================================

/// A source payload was malformed or empty.
pub const EXIT_INVALID_INPUT: u8 = 5;

/// Sources merged to neither a title nor an identifier.
pub const EXIT_INSUFFICIENT_DATA: u8 = 6;

/// The catalog counter or ledger could not be updated.
pub const EXIT_PERSIST: u8 = 7;

/// Exit code for a decided outcome.
pub fn outcome_exit_code(status: OutcomeStatus) -> u8 {
    match status {
        OutcomeStatus::New => EXIT_SUCCESS,
        OutcomeStatus::Duplicate => EXIT_DUPLICATE,
        OutcomeStatus::Ambiguous => EXIT_AMBIGUOUS,
    }
}

/// Map an engine error to its exit code.
pub fn exit_code_for(err: &ReconError) -> u8 {
    match err {
        ReconError::InvalidSourceRecord { .. } | ReconError::EmptySources => EXIT_INVALID_INPUT,
        ReconError::InsufficientData => EXIT_INSUFFICIENT_DATA,
        ReconError::AllocationPersist { .. }
        | ReconError::SequenceRead(_)
        | ReconError::CatalogExhausted { .. }
        | ReconError::LedgerAppend(_) => EXIT_PERSIST,
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::MissingColumn { .. }
        | ReconError::Csv(_)
        | ReconError::Io(_)
        | ReconError::NotPending { .. } => EXIT_USAGE,
    }
}
