use anyhow::Result;
use clap::{error::ErrorKind, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod output;

use commands::{AnalyzeArgs, RewriteArgs};
use output::{HelpResponse, JsonError, Output, VersionResponse};
use plancheck::Config;

/// Version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter
const LOG_ENV: &str = "PLANCHECK_LOG";

#[derive(Parser)]
#[command(name = "plancheck")]
#[command(version)]
#[command(about = "Query plan diagnostics", long_about = None)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Path to config file (default: ./plancheck.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    /// Minimal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Show metrics, strategy attempts and debug logs
    #[arg(long, global = true)]
    verbose: bool,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect performance issues in a statement and its execution plan
    Analyze(AnalyzeArgs),
    /// Extract and validate a rewritten statement from a model response
    Rewrite(RewriteArgs),
    /// List supported plan engines
    Engines,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    // Check for --json flag early (before full parsing) for error handling
    let json_mode = std::env::args().any(|arg| arg == "--json");

    // Use try_parse to handle clap errors in JSON mode
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if json_mode {
                match e.kind() {
                    ErrorKind::DisplayHelp => {
                        HelpResponse::new(e.to_string()).print();
                        std::process::exit(0);
                    }
                    ErrorKind::DisplayVersion => {
                        VersionResponse::new(VERSION.to_string()).print();
                        std::process::exit(0);
                    }
                    _ => {
                        JsonError::new("usage_error", e.to_string()).print();
                        std::process::exit(exit_codes::OPERATIONAL_FAILURE);
                    }
                }
            } else {
                // Human mode: let clap print its formatted output
                e.exit();
            }
        }
    };

    init_tracing(cli.verbose);
    let output = Output::new(cli.json, cli.quiet, cli.verbose);

    let config = match Config::load(cli.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            if output.is_json() {
                JsonError::with_details("config_error", e.to_string(), format!("{e:#}")).print();
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    match run(&cli, &config, &output) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if output.is_json() {
                JsonError::with_details("operational_failure", e.to_string(), format!("{e:#}"))
                    .print();
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(exit_codes::OPERATIONAL_FAILURE);
        }
    }
}

fn run(cli: &Cli, config: &Config, output: &Output) -> Result<i32> {
    match &cli.command {
        Commands::Analyze(args) => commands::analyze(args, config, output),
        Commands::Rewrite(args) => commands::rewrite(args, config, output),
        Commands::Engines => commands::engines(output),
    }
}
