use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use imc_segpipe::{ContainerReader, McdFile};

#[derive(Args)]
pub struct InfoArgs {
    /// *.mcd filename
    pub file: PathBuf,

    /// Only print the slide with this ID
    #[arg(short, long)]
    pub slide: Option<u16>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let mcd = McdFile::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    let slides = mcd
        .slides()
        .iter()
        .filter(|slide| args.slide.map_or(true, |id| slide.id() == id))
        .collect::<Vec<_>>();

    if slides.is_empty() {
        let ids = mcd.slides().iter().map(|slide| slide.id()).collect::<Vec<_>>();
        println!("No such slide (IDs are: {:?})", ids);
    }

    for slide in slides {
        println!("{}", slide);
    }

    Ok(())
}
