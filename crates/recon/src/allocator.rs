//! Catalog number allocation.
//!
//! The counter lives behind [`SequenceStore`], never in a global. Allocation
//! is "load current max, compute next, commit expected → next" under the
//! [`Allocator`]'s mutex; `commit` is compare-and-swap, so a store shared with
//! another writer fails instead of handing out the same number twice.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, StoreError};

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFormat {
    pub prefix: String,
    pub width: usize,
    pub suffix: String,
}

impl Default for CatalogFormat {
    fn default() -> Self {
        Self {
            prefix: "b".into(),
            width: 7,
            suffix: "x".into(),
        }
    }
}

impl CatalogFormat {
    /// Largest sequence that fits in `width` digits.
    pub fn max_sequence(&self) -> u64 {
        10u64
            .checked_pow(self.width as u32)
            .map_or(u64::MAX, |n| n - 1)
    }

    pub fn format(&self, sequence: u64) -> String {
        format!("{}{:0width$}{}", self.prefix, sequence, self.suffix, width = self.width)
    }

    /// Inverse of [`format`](Self::format). Prefix and suffix match
    /// case-insensitively; anything else yields `None`.
    pub fn parse_sequence(&self, catalog_number: &str) -> Option<u64> {
        let id = catalog_number.trim();
        let head = id.get(..self.prefix.len())?;
        if !head.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }
        let rest = &id[self.prefix.len()..];
        let digits_len = rest.len().checked_sub(self.suffix.len())?;
        let (digits, tail) = (rest.get(..digits_len)?, rest.get(digits_len..)?);
        if !tail.eq_ignore_ascii_case(&self.suffix) {
            return None;
        }
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Pure step: the identifier after `current_max`, and the new max.
    pub fn allocate_next(&self, current_max: u64) -> Result<(String, u64), ReconError> {
        let max = self.max_sequence();
        let next = current_max
            .checked_add(1)
            .filter(|n| *n <= max)
            .ok_or(ReconError::CatalogExhausted { width: self.width, max })?;
        Ok((self.format(next), next))
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Persistent home of the highest sequence issued so far.
pub trait SequenceStore {
    fn load(&self) -> Result<u64, StoreError>;

    /// Replace `expected` with `new`. Must fail with
    /// [`StoreError::Conflict`] (and change nothing) if the stored value is
    /// no longer `expected`.
    fn commit(&mut self, expected: u64, new: u64) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySequenceStore {
    current: u64,
}

impl MemorySequenceStore {
    pub fn new(current_max: u64) -> Self {
        Self { current: current_max }
    }
}

impl SequenceStore for MemorySequenceStore {
    fn load(&self) -> Result<u64, StoreError> {
        Ok(self.current)
    }

    fn commit(&mut self, expected: u64, new: u64) -> Result<(), StoreError> {
        if self.current != expected {
            return Err(StoreError::Conflict { expected, found: self.current });
        }
        self.current = new;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterFile {
    current_max: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<String>,
}

/// JSON counter file (`{"current_max": 41, "updated_at": "..."}`).
///
/// A missing file reads as `initial`. Commits re-read the file, check it
/// still holds `expected`, then write a sibling `.tmp` and rename it over
/// the original so a crash never leaves a half-written counter.
#[derive(Debug, Clone)]
pub struct FileSequenceStore {
    path: PathBuf,
    initial: u64,
}

impl FileSequenceStore {
    pub fn new(path: impl Into<PathBuf>, initial: u64) -> Self {
        Self {
            path: path.into(),
            initial,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SequenceStore for FileSequenceStore {
    fn load(&self) -> Result<u64, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self.initial),
            Err(e) => return Err(e.into()),
        };
        let file: CounterFile = serde_json::from_str(&text)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))?;
        Ok(file.current_max)
    }

    fn commit(&mut self, expected: u64, new: u64) -> Result<(), StoreError> {
        let found = self.load()?;
        if found != expected {
            return Err(StoreError::Conflict { expected, found });
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = CounterFile {
            current_max: new,
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        let json = serde_json::to_string_pretty(&body)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// One issued number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub catalog_number: String,
    pub sequence: u64,
    /// Store value before this allocation; used to undo it.
    pub previous: u64,
}

/// Serializes every read-increment-write against its store.
#[derive(Debug)]
pub struct Allocator<S> {
    format: CatalogFormat,
    store: Mutex<S>,
}

impl<S: SequenceStore> Allocator<S> {
    pub fn new(format: CatalogFormat, store: S) -> Self {
        Self {
            format,
            store: Mutex::new(store),
        }
    }

    pub fn format(&self) -> &CatalogFormat {
        &self.format
    }

    pub fn current(&self) -> Result<u64, ReconError> {
        self.lock().load().map_err(ReconError::SequenceRead)
    }

    /// The number the next allocation would produce, without issuing it.
    pub fn peek(&self, floor: u64) -> Result<String, ReconError> {
        let current = self.current()?.max(floor);
        self.format.allocate_next(current).map(|(id, _)| id)
    }

    pub fn allocate(&self) -> Result<Allocation, ReconError> {
        self.allocate_above(0)
    }

    /// Allocate a number strictly above both the stored max and `floor`
    /// (typically the highest sequence already present in the ledger).
    pub fn allocate_above(&self, floor: u64) -> Result<Allocation, ReconError> {
        let mut store = self.lock();
        allocate_with(&self.format, &mut *store, floor)
    }

    /// Undo `allocation`, provided nothing was issued after it.
    pub fn rollback(&self, allocation: &Allocation) -> Result<(), StoreError> {
        self.lock().commit(allocation.sequence, allocation.previous)
    }

    pub fn into_store(self) -> S {
        self.store.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, S> {
        // A panic mid-allocation cannot leave the store half-updated (commit
        // is all-or-nothing), so a poisoned lock is still safe to use.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Load → compute → commit against an exclusively borrowed store.
pub fn allocate_with<S: SequenceStore + ?Sized>(
    format: &CatalogFormat,
    store: &mut S,
    floor: u64,
) -> Result<Allocation, ReconError> {
    let stored = store.load().map_err(ReconError::SequenceRead)?;
    let (catalog_number, sequence) = format.allocate_next(stored.max(floor))?;
    store
        .commit(stored, sequence)
        .map_err(|source| ReconError::AllocationPersist { sequence, source })?;

    tracing::info!(%catalog_number, sequence, "allocated catalog number");
    Ok(Allocation {
        catalog_number,
        sequence,
        previous: stored,
    })
}
