//! apiverify CLI - Main Entry Point
//!
//! Runs declarative API-contract suites against a live service and reports
//! which scenarios held.
//!
//! Exit status: 0 when every scenario passed, 1 when any failed, 2 when the
//! run could not be carried out.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{list, run, validate};

/// apiverify - Declarative API contract verification
#[derive(Parser)]
#[command(name = "apiverify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true, env = "APIVERIFY_FORMAT")]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites against the configured service
    Run(run::RunArgs),

    /// List scenarios without running them
    List(list::ListArgs),

    /// Check that suites compile
    Validate(validate::ValidateArgs),

    /// Show version information
    Version,
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run(args) => run::execute(args, cli.format).await,
        Commands::List(args) => list::execute(args, cli.format).await,
        Commands::Validate(args) => validate::execute(args, cli.format).await,
        Commands::Version => {
            println!("apiverify v{}", apiverify_common::VERSION);
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match dispatch(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}
