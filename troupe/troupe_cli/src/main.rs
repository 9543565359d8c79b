use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use troupe_runtime::RuntimeConfig;

mod commands;

use commands::factorial::FactorialArgs;
use commands::matrix::MatrixArgs;

/// Troupe Command Line Interface
///
/// Runs demo programs on the troupe actor runtime.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Runtime configuration file (TOML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute n! with a chain of spawned actors
    Factorial(FactorialArgs),

    /// Sum matrix rows with one actor per column, reading the matrix from stdin
    Matrix(MatrixArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("cannot use configuration {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Factorial(args) => commands::factorial::execute(&args, config),
        Commands::Matrix(args) => commands::matrix::execute(&args, config),
    }
}
