use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use imc_segpipe::{extract_mcd_path, extract_zip_file, match_txt_files, write_acquisition_metadata};
use rayon::prelude::*;
use tempfile::TempDir;
use tracing::{error, info};

#[derive(Args)]
pub struct ExtractArgs {
    /// .mcd, .txt and .zip files, or directories containing them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for the extracted acquisitions
    #[arg(short, long)]
    pub output: PathBuf,

    /// Write the acquisition metadata table to this .csv file
    #[arg(short, long)]
    pub metadata: Option<PathBuf>,

    /// Unpack .zip archives into this directory instead of a temporary one, which is removed afterwards
    #[arg(long)]
    pub unzip_dir: Option<PathBuf>,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}

#[derive(Default)]
struct Inputs {
    mcd_files: Vec<PathBuf>,
    txt_files: Vec<PathBuf>,
    zip_files: Vec<PathBuf>,
}

impl Inputs {
    fn add(&mut self, path: PathBuf) {
        if has_extension(&path, "mcd") {
            self.mcd_files.push(path);
        } else if has_extension(&path, "txt") {
            self.txt_files.push(path);
        } else if has_extension(&path, "zip") {
            self.zip_files.push(path);
        }
    }
}

/// Collects the .mcd, .txt and .zip files given directly, or found (non-recursively) in the given directories
fn collect_inputs(inputs: &[PathBuf]) -> Result<Inputs> {
    let mut collected = Inputs::default();

    for input in inputs {
        if input.is_dir() {
            let pattern = Path::new(&glob::Pattern::escape(&input.to_string_lossy())).join("[!.]*");

            for candidate in glob::glob(&pattern.to_string_lossy())? {
                collected.add(candidate?);
            }
        } else if input.is_file() {
            collected.add(input.clone());
        } else {
            bail!("No such file or directory: {}", input.display());
        }
    }

    Ok(collected)
}

/// Unpacks every archive into its own directory below `unzip_dir` and collects the contained files
fn unpack_archives(inputs: &mut Inputs, unzip_dir: &Path) -> Result<()> {
    for zip_file in std::mem::take(&mut inputs.zip_files) {
        let stem = zip_file.file_stem().unwrap_or_default();
        let dest_dir = unzip_dir.join(stem);

        info!("Unpacking {} to {}", zip_file.display(), dest_dir.display());
        let files = extract_zip_file(&zip_file, &dest_dir)
            .with_context(|| format!("Failed to unpack {}", zip_file.display()))?;

        for file in files {
            inputs.add(file);
        }
    }

    // Archives nested in archives are not unpacked
    inputs.zip_files.clear();

    Ok(())
}

pub fn run(args: &ExtractArgs) -> Result<()> {
    let mut inputs = collect_inputs(&args.inputs)?;

    // Kept alive until extraction has finished
    let mut scratch_dir = None;
    if !inputs.zip_files.is_empty() {
        let unzip_dir = match &args.unzip_dir {
            Some(unzip_dir) => unzip_dir.clone(),
            None => scratch_dir.insert(TempDir::new()?).path().to_path_buf(),
        };

        unpack_archives(&mut inputs, &unzip_dir)?;
    }

    let Inputs {
        mut mcd_files,
        mut txt_files,
        ..
    } = inputs;
    mcd_files.sort();
    txt_files.sort();

    if mcd_files.is_empty() {
        bail!("No .mcd files found");
    }

    info!(
        "Extracting {} .mcd file(s) ({} .txt file(s)) to {}",
        mcd_files.len(),
        txt_files.len(),
        args.output.display()
    );

    let matched = match_txt_files(&mcd_files, &txt_files);

    let results = mcd_files
        .par_iter()
        .map(|mcd_file| {
            let txt_files = matched.get(mcd_file).map(Vec::as_slice);

            extract_mcd_path(mcd_file, &args.output, txt_files)
                .with_context(|| format!("Failed to extract {}", mcd_file.display()))
        })
        .collect::<Vec<_>>();

    let mut metadata = Vec::new();
    let mut failed = 0;
    for result in results {
        match result {
            Ok(rows) => metadata.extend(rows),
            Err(err) => {
                error!("{:#}", err);
                failed += 1;
            }
        }
    }

    let invalid = metadata.iter().filter(|row| !row.is_valid).count();
    info!(
        "Extracted {} of {} acquisition(s)",
        metadata.len() - invalid,
        metadata.len()
    );

    if let Some(metadata_file) = &args.metadata {
        write_acquisition_metadata(metadata_file, &metadata).with_context(|| {
            format!("Failed to write acquisition metadata to {}", metadata_file.display())
        })?;
    }

    if failed > 0 {
        bail!("{} of {} .mcd file(s) could not be extracted", failed, mcd_files.len());
    }

    Ok(())
}
