use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use imc_segpipe::{create_analysis_stacks, AnalysisStackOptions, Panel};
use tracing::info;

#[derive(Args)]
pub struct StacksArgs {
    /// Directory containing the extracted acquisitions (*.ome.tiff)
    pub acquisition_dir: PathBuf,

    /// Output directory for the analysis stacks
    pub output: PathBuf,

    /// Panel .csv file listing the channels
    #[arg(short, long)]
    pub panel: PathBuf,

    /// Panel column containing the metal tags
    #[arg(long, default_value = "Metal Tag")]
    pub metal_column: String,

    /// Panel column flagging (1/0) the channels to include
    #[arg(short, long, default_value = "full")]
    pub column: String,

    /// Suffix added to the file names of the stacks, e.g. "_full"
    #[arg(short, long)]
    pub suffix: Option<String>,

    /// Threshold for hot pixel removal (no filtering if omitted)
    #[arg(long)]
    pub hpf: Option<f32>,

    /// Skip images whose smaller side is not larger than this (in pixels)
    #[arg(long)]
    pub min_size: Option<usize>,
}

pub fn run(args: &StacksArgs) -> Result<()> {
    let panel = Panel::from_path(&args.panel, &args.metal_column)
        .with_context(|| format!("Failed to read panel {}", args.panel.display()))?;

    let channels = panel.channels(&args.column)?;
    if channels.is_empty() {
        bail!("No channels selected in column `{}` of the panel", args.column);
    }

    let options = AnalysisStackOptions {
        suffix: args.suffix.clone(),
        hot_pixel_threshold: args.hpf,
        min_size: args.min_size,
    };

    let stacks = create_analysis_stacks(&args.acquisition_dir, &args.output, &channels, &options)?;

    info!(
        "Created {} analysis stack(s) with {} channel(s) in {}",
        stacks.len(),
        channels.len(),
        args.output.display()
    );

    Ok(())
}
