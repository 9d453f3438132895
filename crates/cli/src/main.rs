// Shelfmark CLI - reconcile book metadata against a ledger and assign catalog numbers

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "shelfmark")]
#[command(about = "Merge book metadata from several sources, detect duplicates, assign catalog numbers")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile source payloads for one book against the ledger
    #[command(after_help = "\
Examples:
  shelfmark reconcile scan.json --ledger ledger.csv
  shelfmark reconcile scan.json --config desk.recon.toml --ledger ledger.csv --record
  shelfmark reconcile scan.json --ledger ledger.csv --json --resolve new

Without --record nothing is written: a NEW book shows the number it would get.

Exit codes:
  0 new, 3 duplicate, 4 ambiguous (decision pending), 5 invalid input,
  6 insufficient data, 7 counter/ledger write failed, 2 usage")]
    Reconcile(recon::ReconcileArgs),

    /// Validate an engine config without running
    #[command(after_help = "\
Examples:
  shelfmark validate desk.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },

    /// Print the next catalog number without allocating it
    Peek {
        /// Engine config (.recon.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Catalog counter file
        #[arg(long, env = "SHELFMARK_COUNTER")]
        counter: Option<PathBuf>,

        /// Ledger CSV; its highest catalog number is respected
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "shelfmark_recon=debug,shelfmark_cli=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Reconcile(args) => recon::cmd_reconcile(args),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Peek { config, counter, ledger } => recon::cmd_peek(config, counter, ledger),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}
