mod commands;
mod utils;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scale")]
#[command(about = "Declarative autoscaling topologies, planned and reconciled", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// State directory (inventory and run locks), overrides the config file
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the topology file
    Validate {
        /// Topology file (defaults to topology.kdl discovery)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show the actions apply would take
    Plan {
        /// Topology file (defaults to topology.kdl discovery)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Print the plans as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bring provider resources in line with the topology
    Apply {
        /// Topology file (defaults to topology.kdl discovery)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Print the reconciliation results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every resource owned by the topology
    Destroy {
        /// Topology file (defaults to topology.kdl discovery)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Print the reconciliation results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show owned resources, drift and run locks
    Status {
        /// Topology file (defaults to topology.kdl discovery)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // logs go to stderr so --json output stays parseable
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            utils::exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // Version and validate need no provider configuration
    match &cli.command {
        Commands::Version => {
            println!("scaleflow {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Commands::Validate { file } => return commands::validate::handle(file.as_deref()),
        _ => {}
    }

    let ctx = utils::Context::load(cli.state_dir)?;

    match cli.command {
        Commands::Plan { file, json } => commands::plan::handle(&ctx, file.as_deref(), json).await,
        Commands::Apply { file, json } => {
            commands::apply::handle(&ctx, file.as_deref(), json).await
        }
        Commands::Destroy { file, json } => {
            commands::destroy::handle(&ctx, file.as_deref(), json).await
        }
        Commands::Status { file } => commands::status::handle(&ctx, file.as_deref()).await,
        Commands::Version | Commands::Validate { .. } => {
            unreachable!("handled before configuration loading")
        }
    }
}
