use std::{
    fs::File,
    path::{Path, PathBuf},
};

use zip::ZipArchive;

use crate::error::Result;

/// Extract all files of the .zip archive `zip_file` into `dest_dir`, which is created if needed.
///
/// Raw data are commonly shipped as one archive per acquisition session, holding the .mcd file and its .txt
/// exports. Returns the extracted files, sorted. Entries whose names would escape `dest_dir` are rejected.
pub fn extract_zip_file<P: AsRef<Path>, Q: AsRef<Path>>(
    zip_file: P,
    dest_dir: Q,
) -> Result<Vec<PathBuf>> {
    let dest_dir = dest_dir.as_ref();

    let mut archive = ZipArchive::new(File::open(zip_file.as_ref())?)?;
    archive.extract(dest_dir)?;

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;

        if entry.is_file() {
            if let Some(name) = entry.enclosed_name() {
                files.push(dest_dir.join(name));
            }
        }
    }
    files.sort();

    Ok(files)
}
