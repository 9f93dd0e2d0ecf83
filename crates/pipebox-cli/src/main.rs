//! pipebox CLI: black-box console test harness.
//!
//! Serves the adapter line protocol for an external test generator and
//! validates adapter spec files.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use miette::Result;
use pipebox::adapter::spec::AdapterSpec;
use pipebox::adapter::{run_adapter, AdapterConfig};
use pipebox::model::HarnessConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pipebox", version, about = "Black-box console test harness")]
struct Cli {
    /// Echo SUT input/output lines to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the adapter protocol on stdin/stdout
    Adapter {
        /// Adapter spec file (YAML or JSON)
        #[arg(long)]
        spec: PathBuf,
        /// Override the spec's output wait, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Validate an adapter spec file without running anything
    Check {
        /// Adapter spec file (YAML or JSON)
        #[arg(long)]
        spec: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Adapter { spec, timeout_ms } => {
            let mut spec = AdapterSpec::load(&spec)?;
            if let Some(timeout_ms) = timeout_ms {
                spec.timeout_ms = timeout_ms;
            }
            let mut harness = HarnessConfig::from_env();
            harness.echo = harness.echo || cli.verbose;
            run_adapter(AdapterConfig { spec, harness })?;
            Ok(())
        }
        Commands::Check { spec } => {
            let spec = AdapterSpec::load(&spec)?;
            let classifiers = spec.compile_classifiers()?;
            let vocabulary = spec.vocabulary();
            println!(
                "ok: {} classifiers, {} input events, command '{}'",
                classifiers.len(),
                vocabulary.len(),
                spec.command
            );
            Ok(())
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            generate(shell, &mut command, "pipebox", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Protocol replies own stdout, so all diagnostics go to stderr.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pipebox=info" } else { "pipebox=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
