use std::{
    fs,
    path::{Path, PathBuf},
};

use ndarray::Axis;
use tracing::warn;

use crate::{
    error::Result,
    images::{image_stem, list_acquisition_images, read_acquisition_image, write_imagej_tiff_f32},
    AcquisitionChannel,
};

/// Replace every character that is not an ASCII letter, digit or parenthesis with `-`
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '(' || c == ')' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Returns the histoCAT file name of a channel: `<label>_<name>.tiff`, with the name standing in for a missing label
pub fn histocat_filename(channel: &AcquisitionChannel) -> String {
    let label = if channel.label().is_empty() {
        channel.name().to_string()
    } else {
        sanitize_label(channel.label())
    };

    format!("{}_{}.tiff", label, channel.name())
}

/// Returns the mask files for the image with file stem `image_stem`: non-hidden files whose name starts with
/// the stem and ends with `_mask.tiff`, sorted by name
pub fn find_mask_files<S: AsRef<str>>(file_names: &[S], image_stem: &str) -> Vec<String> {
    let mut masks = file_names
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| {
            !name.starts_with('.') && name.starts_with(image_stem) && name.ends_with("_mask.tiff")
        })
        .map(String::from)
        .collect::<Vec<_>>();
    masks.sort();

    masks
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    Ok(names)
}

/// Export a single acquisition image to histoCAT format.
///
/// Each channel is written as single-channel TIFF to `<histocat_dir>/<stem>/` (see [`histocat_filename`]).
/// If `mask_dir` contains a mask for the image (see [`find_mask_files`]), it is copied into `histocat_dir`.
pub fn export_acquisition_to_histocat<P, Q>(
    image_file: P,
    histocat_dir: Q,
    mask_dir: Option<&Path>,
) -> Result<PathBuf>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let image_file = image_file.as_ref();
    let histocat_dir = histocat_dir.as_ref();

    let (data, channels) = read_acquisition_image(image_file)?;

    let file_name = image_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = image_stem(&file_name);

    let image_dir = histocat_dir.join(stem);
    fs::create_dir_all(&image_dir)?;

    for (plane, channel) in data.axis_iter(Axis(0)).zip(&channels) {
        write_imagej_tiff_f32(image_dir.join(histocat_filename(channel)), plane)?;
    }

    if let Some(mask_dir) = mask_dir.filter(|mask_dir| mask_dir.is_dir()) {
        let masks = find_mask_files(&list_file_names(mask_dir)?, stem);

        if masks.len() > 1 {
            warn!(
                "Multiple mask files found for image {}: {:?}; using the first one",
                file_name, masks
            );
        }

        if let Some(mask) = masks.first() {
            fs::copy(mask_dir.join(mask), histocat_dir.join(mask))?;
        }
    }

    Ok(image_dir)
}

/// Export every acquisition image in `acquisition_dir` to histoCAT format (see [`export_acquisition_to_histocat`]).
///
/// Returns the created per-acquisition directories.
pub fn export_to_histocat<P, Q>(
    acquisition_dir: P,
    histocat_dir: Q,
    mask_dir: Option<&Path>,
) -> Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let histocat_dir = histocat_dir.as_ref();
    fs::create_dir_all(histocat_dir)?;

    list_acquisition_images(acquisition_dir)?
        .into_iter()
        .map(|image_file| export_acquisition_to_histocat(image_file, histocat_dir, mask_dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_fall_back_to_channel_name() {
        assert_eq!(
            histocat_filename(&AcquisitionChannel::new("Ir191", "")),
            "Ir191_Ir191.tiff"
        );
        assert_eq!(
            histocat_filename(&AcquisitionChannel::new("Ir191", "DNA 1")),
            "DNA-1_Ir191.tiff"
        );
    }

    #[test]
    fn labels_are_sanitized_per_character() {
        assert_eq!(sanitize_label("CD45(RA)"), "CD45(RA)");
        assert_eq!(sanitize_label("Histone H3/pS28"), "Histone-H3-pS28");
        assert_eq!(sanitize_label("E-Cad  β"), "E-Cad---");
    }

    #[test]
    fn masks_match_stem_and_suffix() {
        let files = [
            "run1_s0_a2_ac_ilastik_mask.tiff",
            "run1_s0_a1_ac_full_mask.tiff",
            ".run1_s0_a1_ac_mask.tiff",
            "run1_s0_a1_ac_ilastik_mask.tiff",
            "run1_s0_a1_ac_Probabilities.tiff",
        ];

        assert_eq!(
            find_mask_files(&files, "run1_s0_a1_ac"),
            vec![
                "run1_s0_a1_ac_full_mask.tiff".to_string(),
                "run1_s0_a1_ac_ilastik_mask.tiff".to_string()
            ]
        );
        assert!(find_mask_files(&files, "run2_s0_a1_ac").is_empty());
    }
}
