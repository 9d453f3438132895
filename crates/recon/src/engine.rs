//! Reconciliation pipeline: merge, detect, then allocate for new books.

use serde::{Deserialize, Serialize};

use crate::allocator::{Allocation, Allocator, SequenceStore};
use crate::config::ReconConfig;
use crate::detect::detect;
use crate::error::ReconError;
use crate::model::{LedgerEntry, Outcome, OutcomeStatus, SourceRecord};
use crate::reconcile::reconcile_fields;

/// A reviewer's answer to an AMBIGUOUS outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanChoice {
    /// Not the surfaced book after all: catalogue it under a fresh number.
    AcceptAsNew,
    /// Same book as the surfaced ledger entry.
    ConfirmDuplicate,
}

/// Reconciliation pipeline bound to one validated config.
///
/// The engine owns no mutable state; the ledger snapshot and the allocator
/// (with its sequence store) are supplied per call.
#[derive(Debug, Clone)]
pub struct Engine {
    config: ReconConfig,
}

impl Engine {
    pub fn new(config: ReconConfig) -> Result<Self, ReconError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// Lowest sequence a new allocation must exceed: the configured
    /// `start_after` or the newest number already in the ledger.
    pub fn sequence_floor(&self, ledger: &[LedgerEntry]) -> u64 {
        let format = self.config.catalog.format();
        ledger
            .iter()
            .filter_map(|e| format.parse_sequence(&e.catalog_number))
            .fold(self.config.catalog.start_after, u64::max)
    }

    /// validate → merge → detect → allocate (NEW only).
    ///
    /// Invalid input fails before detection; allocation failure leaves the
    /// counter untouched and returns no outcome.
    pub fn reconcile<S: SequenceStore>(
        &self,
        sources: &[SourceRecord],
        ledger: &[LedgerEntry],
        allocator: &Allocator<S>,
    ) -> Result<Outcome, ReconError> {
        self.reconcile_tracked(sources, ledger, allocator).map(|(outcome, _)| outcome)
    }

    /// Apply a human decision to an AMBIGUOUS outcome.
    pub fn resolve<S: SequenceStore>(
        &self,
        outcome: Outcome,
        choice: HumanChoice,
        ledger: &[LedgerEntry],
        allocator: &Allocator<S>,
    ) -> Result<Outcome, ReconError> {
        self.resolve_tracked(outcome, choice, ledger, allocator)
            .map(|(outcome, _)| outcome)
    }

    /// Like [`reconcile`](Self::reconcile), also reporting the allocation so
    /// a caller that fails to persist the record can roll it back.
    pub(crate) fn reconcile_tracked<S: SequenceStore>(
        &self,
        sources: &[SourceRecord],
        ledger: &[LedgerEntry],
        allocator: &Allocator<S>,
    ) -> Result<(Outcome, Option<Allocation>), ReconError> {
        let candidate = reconcile_fields(sources, &self.config)?;
        let mut outcome = detect(&candidate, ledger, &self.config);

        let allocation = if outcome.status == OutcomeStatus::New {
            let allocation = allocator.allocate_above(self.sequence_floor(ledger))?;
            outcome
                .canonical_record
                .assign_catalog_number(allocation.catalog_number.clone());
            Some(allocation)
        } else {
            None
        };

        tracing::info!(
            status = %outcome.status,
            score = outcome.similarity_score,
            title = outcome.canonical_record.title.as_ref().map(|t| t.value.as_str()),
            catalog_number = outcome.canonical_record.catalog_number(),
            matched = outcome.matched_entry.as_ref().map(|e| e.catalog_number.as_str()),
            sources = sources.len(),
            "reconciled"
        );
        Ok((outcome, allocation))
    }

    pub(crate) fn resolve_tracked<S: SequenceStore>(
        &self,
        outcome: Outcome,
        choice: HumanChoice,
        ledger: &[LedgerEntry],
        allocator: &Allocator<S>,
    ) -> Result<(Outcome, Option<Allocation>), ReconError> {
        if outcome.status != OutcomeStatus::Ambiguous {
            return Err(ReconError::NotPending { status: outcome.status });
        }

        let resolved = match choice {
            HumanChoice::AcceptAsNew => {
                let allocation = allocator.allocate_above(self.sequence_floor(ledger))?;
                let mut canonical_record = outcome.canonical_record;
                canonical_record.assign_catalog_number(allocation.catalog_number.clone());
                (
                    Outcome {
                        status: OutcomeStatus::New,
                        canonical_record,
                        matched_entry: None,
                        similarity_score: outcome.similarity_score,
                    },
                    Some(allocation),
                )
            }
            HumanChoice::ConfirmDuplicate => (
                Outcome {
                    status: OutcomeStatus::Duplicate,
                    ..outcome
                },
                None,
            ),
        };

        tracing::info!(?choice, status = %resolved.0.status, "resolved ambiguous outcome");
        Ok(resolved)
    }
}
