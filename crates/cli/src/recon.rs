//! `shelfmark reconcile | validate | peek`: file-backed front end for the engine.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use shelfmark_recon::allocator::SequenceStore;
use shelfmark_recon::catalog::LedgerSink;
use shelfmark_recon::model::{DiscardReason, Field};
use shelfmark_recon::{
    parse_sources_json, Allocator, CsvLedger, Engine, FileSequenceStore, HumanChoice, MemorySequenceStore, Outcome,
    OutcomeStatus, ReconConfig, ReconError, SharedCatalog,
};

use crate::exit_codes::{exit_code_for, outcome_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use crate::CliError;

#[derive(Args)]
pub struct ReconcileArgs {
    /// JSON array of source payloads, each with a "source_id"
    pub sources: PathBuf,

    /// Engine config (.recon.toml); built-in defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ledger CSV snapshot (missing file = empty ledger)
    #[arg(long)]
    pub ledger: PathBuf,

    /// Catalog counter file [default: <data dir>/shelfmark/counter.json]
    #[arg(long, env = "SHELFMARK_COUNTER")]
    pub counter: Option<PathBuf>,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Append NEW records to the ledger CSV and advance the counter;
    /// without it the catalog number is a preview
    #[arg(long)]
    pub record: bool,

    /// Settle an AMBIGUOUS outcome without asking again
    #[arg(long, value_enum)]
    pub resolve: Option<Resolution>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Resolution {
    /// Catalogue as a new book
    New,
    /// Same book as the surfaced ledger entry
    Duplicate,
}

impl From<Resolution> for HumanChoice {
    fn from(r: Resolution) -> Self {
        match r {
            Resolution::New => HumanChoice::AcceptAsNew,
            Resolution::Duplicate => HumanChoice::ConfirmDuplicate,
        }
    }
}

fn engine_err(err: ReconError) -> CliError {
    let code = exit_code_for(&err);
    let hint = match &err {
        ReconError::InsufficientData => Some("re-capture the cover or add a source with an ISBN".to_string()),
        ReconError::AllocationPersist { .. } | ReconError::SequenceRead(_) => {
            Some("check that the counter file is writable; nothing was catalogued".to_string())
        }
        ReconError::CatalogExhausted { .. } => Some("raise catalog.width in the config".to_string()),
        _ => None,
    };
    CliError {
        code,
        message: err.to_string(),
        hint,
    }
}

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    match path {
        Some(path) => ReconConfig::load(path).map_err(engine_err),
        None => Ok(ReconConfig::default()),
    }
}

fn counter_path(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|d| d.join("shelfmark").join("counter.json"))
        .ok_or_else(|| CliError {
            code: EXIT_USAGE,
            message: "cannot determine a data directory for the catalog counter".into(),
            hint: Some("pass --counter <file>".into()),
        })
}

fn allocator_for(config: &ReconConfig, counter: PathBuf) -> Allocator<FileSequenceStore> {
    tracing::debug!(counter = %counter.display(), "using counter file");
    Allocator::new(config.catalog.format(), FileSequenceStore::new(counter, 0))
}

/// In-memory copy of the counter file: numbers handed out here are never
/// written back, so a run that files nothing leaves the counter alone.
fn preview_allocator(config: &ReconConfig, counter: PathBuf) -> Result<Allocator<MemorySequenceStore>, CliError> {
    tracing::debug!(counter = %counter.display(), "previewing against counter file");
    let current = FileSequenceStore::new(counter, 0)
        .load()
        .map_err(|e| engine_err(ReconError::SequenceRead(e)))?;
    Ok(Allocator::new(config.catalog.format(), MemorySequenceStore::new(current)))
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

pub fn cmd_reconcile(args: ReconcileArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let columns = config.ledger.columns.clone();
    let counter = counter_path(args.counter)?;
    let engine = Engine::new(config).map_err(engine_err)?;

    let json = std::fs::read_to_string(&args.sources).map_err(|e| CliError {
        code: EXIT_USAGE,
        message: format!("cannot read {}: {e}", args.sources.display()),
        hint: None,
    })?;
    let sources = parse_sources_json(&json).map_err(engine_err)?;
    let ledger = CsvLedger::new(&args.ledger, columns);
    let choice = args.resolve.map(HumanChoice::from);

    let outcome = if args.record {
        let allocator = allocator_for(engine.config(), counter);
        let catalog = SharedCatalog::new(engine, allocator, ledger);
        let outcome = catalog.process(&sources).map_err(engine_err)?;
        match (outcome.status, choice) {
            (OutcomeStatus::Ambiguous, Some(choice)) => catalog.resolve(outcome, choice).map_err(engine_err)?,
            _ => outcome,
        }
    } else {
        let allocator = preview_allocator(engine.config(), counter)?;
        let snapshot = ledger.snapshot().map_err(engine_err)?;
        let outcome = engine.reconcile(&sources, &snapshot, &allocator).map_err(engine_err)?;
        match (outcome.status, choice) {
            (OutcomeStatus::Ambiguous, Some(choice)) => engine
                .resolve(outcome, choice, &snapshot, &allocator)
                .map_err(engine_err)?,
            _ => outcome,
        }
    };

    if args.json {
        let text = serde_json::to_string_pretty(&outcome).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: format!("JSON serialization error: {e}"),
            hint: None,
        })?;
        println!("{text}");
    } else {
        print!("{}", render_outcome(&outcome));
    }
    if outcome.status == OutcomeStatus::New {
        if args.record {
            eprintln!("recorded in {}", args.ledger.display());
        } else {
            eprintln!("preview only: counter not advanced; rerun with --record to file it");
        }
    }

    match outcome_exit_code(outcome.status) {
        EXIT_SUCCESS => Ok(()),
        code => Err(CliError {
            code,
            message: String::new(),
            hint: (outcome.status == OutcomeStatus::Ambiguous)
                .then(|| "rerun with --resolve new or --resolve duplicate".to_string()),
        }),
    }
}

/// Human-readable outcome: one line per merged field, then any discarded values.
pub fn render_outcome(outcome: &Outcome) -> String {
    let rec = &outcome.canonical_record;
    let mut out = format!("status: {}\n", outcome.status);
    if let Some(id) = rec.catalog_number() {
        out.push_str(&format!("catalog number: {id}\n"));
    }
    if let Some(entry) = &outcome.matched_entry {
        out.push_str(&format!(
            "matched: {} {}\n",
            entry.catalog_number,
            entry.title.as_deref().unwrap_or("(untitled)")
        ));
    }
    out.push_str(&format!("score: {:.3}\n", outcome.similarity_score));

    for field in Field::ALL {
        if let Some(v) = rec.field(field) {
            out.push_str(&format!(
                "  {:<17}{}  [{}, {:.2}]\n",
                field.name(),
                v.value,
                v.source_id,
                v.confidence
            ));
        }
    }
    for d in &rec.discarded {
        let reason = match d.reason {
            DiscardReason::Outvoted => "outvoted",
            DiscardReason::InvalidIdentifier => "invalid identifier",
            DiscardReason::Unreadable => "unreadable",
        };
        out.push_str(&format!("  discarded {} {:?} from {} ({reason})\n", d.field, d.value, d.source_id));
    }
    out
}

// ---------------------------------------------------------------------------
// validate / peek
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = ReconConfig::load(&config_path).map_err(engine_err)?;
    let name = if config.name.is_empty() {
        config_path.display().to_string()
    } else {
        config.name.clone()
    };
    eprintln!(
        "valid: '{}' duplicate >= {}, ambiguous >= {}, catalog numbers like {}",
        name,
        config.thresholds.duplicate,
        config.thresholds.ambiguous,
        config.catalog.format().format(1),
    );
    Ok(())
}

pub fn cmd_peek(config: Option<PathBuf>, counter: Option<PathBuf>, ledger: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let engine = Engine::new(config).map_err(engine_err)?;
    let allocator = allocator_for(engine.config(), counter_path(counter)?);

    let snapshot = match ledger {
        Some(path) => CsvLedger::new(path, engine.config().ledger.columns.clone())
            .snapshot()
            .map_err(engine_err)?,
        None => Vec::new(),
    };
    let next = allocator.peek(engine.sequence_floor(&snapshot)).map_err(engine_err)?;
    println!("{next}");
    Ok(())
}
