//! `shelfmark-recon`: book metadata reconciliation engine.
//!
//! Pure engine crate: receives pre-extracted source records and a ledger
//! snapshot, returns a canonical record plus a NEW / DUPLICATE / AMBIGUOUS
//! decision. No CLI dependencies; the ledger CSV adapter and the file-backed
//! sequence store are collaborators the caller opts into.

pub mod allocator;
pub mod catalog;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod ledger;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod similarity;
pub mod source;

pub use allocator::{Allocation, Allocator, CatalogFormat, FileSequenceStore, MemorySequenceStore, SequenceStore};
pub use catalog::{LedgerSink, SharedCatalog};
pub use config::ReconConfig;
pub use engine::{Engine, HumanChoice};
pub use ledger::CsvLedger;
pub use error::{ReconError, StoreError};
pub use model::{CanonicalRecord, Field, FieldValue, LedgerEntry, Outcome, OutcomeStatus, SourceRecord};
pub use source::{from_payload, parse_sources_json};
