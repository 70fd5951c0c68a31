use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use imc_segpipe::export_to_histocat;
use tracing::info;

#[derive(Args)]
pub struct HistocatArgs {
    /// Directory containing the extracted acquisitions (*.ome.tiff)
    pub acquisition_dir: PathBuf,

    /// Output directory for the histoCAT folders
    pub output: PathBuf,

    /// Directory containing segmentation masks (*_mask.tiff)
    #[arg(short, long)]
    pub masks: Option<PathBuf>,
}

pub fn run(args: &HistocatArgs) -> Result<()> {
    let image_dirs = export_to_histocat(&args.acquisition_dir, &args.output, args.masks.as_deref())?;

    info!(
        "Exported {} acquisition(s) to {}",
        image_dirs.len(),
        args.output.display()
    );

    Ok(())
}
