mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// imc-preprocess converts IMC data sets stored in the *.mcd format into images for segmentation and analysis.
#[derive(Parser)]
#[command(name = "imc-preprocess", author = "Alan Race <alan.race@uni-marburg.de>")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all acquisitions of one or more .mcd files as OME-TIFF
    Extract(commands::extract::ExtractArgs),
    /// Create analysis stacks from extracted acquisitions
    Stacks(commands::stacks::StacksArgs),
    /// Export extracted acquisitions to histoCAT
    Histocat(commands::histocat::HistocatArgs),
    /// Print the slides, panoramas and acquisitions of an .mcd file
    Info(commands::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Extract(args) => commands::extract::run(args),
        Commands::Stacks(args) => commands::stacks::run(args),
        Commands::Histocat(args) => commands::histocat::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
