mod commands;
mod input;
mod logging;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::fee::FeeArgs;
use commands::simulate::SimulateArgs;
use commands::waterfall::WaterfallArgs;

/// Tranche waterfall accounting for structured portfolios
#[derive(Parser)]
#[command(
    name = "spf",
    version,
    about = "Tranche waterfall accounting for structured portfolios",
    long_about = "A CLI for structured portfolio accounting with decimal precision. \
                  Runs the seniority waterfall, single-tranche fee accrual, and \
                  checkpointed scenario replays against in-memory vaults."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Reallocate total value across tranches and charge fees
    Waterfall(WaterfallArgs),
    /// Accrue protocol and tranche fees on a single value
    Fee(FeeArgs),
    /// Replay a portfolio scenario step by step
    Simulate(SimulateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Fee(args) => commands::fee::run_fee(args),
        Commands::Simulate(args) => commands::simulate::run_simulate(args),
        Commands::Version => {
            println!("spf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            log::debug!("command failed: {:?}", e);
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
