//! confguard CLI tool.
//!
//! Usage:
//! ```bash
//! confguard check [OPTIONS] [PATH]
//! confguard diff [OPTIONS] ORIGINAL REVISED
//! confguard list-rules
//! confguard init
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Compliance checks and diffs for network device configurations
#[derive(Parser)]
#[command(name = "confguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "CONFGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate policies against the inventory
    Check {
        /// Project directory holding the inventory (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Policy files (default: `[evaluator] policies` from the configuration)
        #[arg(short, long)]
        policy: Vec<PathBuf>,

        /// Only run specific rules (comma-separated names)
        #[arg(long)]
        rules: Option<String>,

        /// Exclude inventory patterns (can be specified multiple times)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Compare two configuration snapshots
    Diff {
        /// Original snapshot file (TOML or JSON)
        original: PathBuf,

        /// Revised snapshot file (TOML or JSON)
        revised: PathBuf,

        /// Only report snapshot metadata, without deltas
        #[arg(long)]
        no_deltas: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: DiffFormat,
    },

    /// List rule kinds and templates
    ListRules,

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for check results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-result compact format.
    Compact,
}

/// Output format for diffs.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum DiffFormat {
    /// Unified-style text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            path,
            format,
            policy,
            rules,
            exclude,
        } => {
            let source = config_resolver::resolve(&path, cli.config.as_deref());
            let options = commands::check::CheckOptions {
                format,
                policies: policy,
                rules,
                exclude,
            };
            let failed = commands::check::run(&path, options, &source)?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Diff {
            original,
            revised,
            no_deltas,
            format,
        } => {
            let source = config_resolver::resolve(Path::new("."), cli.config.as_deref());
            commands::diff::run(&original, &revised, !no_deltas, format, &source)
        }
        Commands::ListRules => {
            commands::list_rules::run();
            Ok(())
        }
        Commands::Init { force } => commands::init::run(Path::new("."), force).map(|_| ()),
    }
}
