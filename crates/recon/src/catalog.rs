//! Ledger + allocator in one critical section, for callers cataloguing
//! several books at once.

use std::sync::{Mutex, PoisonError};

use crate::allocator::{Allocation, Allocator, SequenceStore};
use crate::engine::{Engine, HumanChoice};
use crate::error::ReconError;
use crate::model::{LedgerEntry, Outcome, SourceRecord};

/// Where accepted records are filed.
pub trait LedgerSink {
    fn snapshot(&self) -> Result<Vec<LedgerEntry>, ReconError>;
    fn append(&mut self, entry: LedgerEntry) -> Result<(), ReconError>;
}

impl LedgerSink for Vec<LedgerEntry> {
    fn snapshot(&self) -> Result<Vec<LedgerEntry>, ReconError> {
        Ok(self.clone())
    }

    fn append(&mut self, entry: LedgerEntry) -> Result<(), ReconError> {
        self.push(entry);
        Ok(())
    }
}

/// Serializes "snapshot → detect → allocate → append" so two copies of the
/// same book processed concurrently cannot both come out NEW.
pub struct SharedCatalog<S, L> {
    engine: Engine,
    allocator: Allocator<S>,
    ledger: Mutex<L>,
}

impl<S: SequenceStore, L: LedgerSink> SharedCatalog<S, L> {
    pub fn new(engine: Engine, allocator: Allocator<S>, ledger: L) -> Self {
        Self {
            engine,
            allocator,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn allocator(&self) -> &Allocator<S> {
        &self.allocator
    }

    /// Reconcile `sources` against the current ledger and file the record
    /// if it is NEW.
    pub fn process(&self, sources: &[SourceRecord]) -> Result<Outcome, ReconError> {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = ledger.snapshot()?;
        let (outcome, allocation) = self.engine.reconcile_tracked(sources, &snapshot, &self.allocator)?;
        self.file(&mut *ledger, &outcome, allocation)?;
        Ok(outcome)
    }

    /// Apply a human decision and file the record if it became NEW.
    pub fn resolve(&self, outcome: Outcome, choice: HumanChoice) -> Result<Outcome, ReconError> {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = ledger.snapshot()?;
        let (outcome, allocation) = self
            .engine
            .resolve_tracked(outcome, choice, &snapshot, &self.allocator)?;
        self.file(&mut *ledger, &outcome, allocation)?;
        Ok(outcome)
    }

    pub fn into_parts(self) -> (Engine, Allocator<S>, L) {
        let ledger = self.ledger.into_inner().unwrap_or_else(PoisonError::into_inner);
        (self.engine, self.allocator, ledger)
    }

    fn file(&self, ledger: &mut L, outcome: &Outcome, allocation: Option<Allocation>) -> Result<(), ReconError> {
        let Some(allocation) = allocation else {
            return Ok(());
        };
        let Some(entry) = outcome.canonical_record.to_ledger_entry() else {
            return Ok(());
        };

        if let Err(e) = ledger.append(entry) {
            if let Err(rollback) = self.allocator.rollback(&allocation) {
                tracing::warn!(
                    catalog_number = %allocation.catalog_number,
                    error = %rollback,
                    "ledger append failed and the counter could not be rolled back"
                );
            }
            return Err(match e {
                ReconError::LedgerAppend(msg) => ReconError::LedgerAppend(msg),
                other => ReconError::LedgerAppend(other.to_string()),
            });
        }
        Ok(())
    }
}
