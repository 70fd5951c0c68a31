use std::{
    fs,
    path::{Path, PathBuf},
};

use ndarray::Axis;
use tracing::{debug, info};

use crate::{
    channel::{channel_index, write_channel_order},
    error::{ImcError, Result},
    filter::filter_hot_pixels,
    images::{image_stem, list_acquisition_images, read_acquisition_image, write_imagej_tiff_u16},
};

/// Options controlling how analysis stacks are generated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisStackOptions {
    /// Appended to the file stem of every stack (and of its channel order file), e.g. `_full`
    pub suffix: Option<String>,
    /// When set, hot pixels are removed with this threshold before writing
    pub hot_pixel_threshold: Option<f32>,
    /// When set, images whose smaller side is not larger than this (in pixels) are skipped
    pub min_size: Option<usize>,
}

/// Create an analysis stack from a single acquisition image.
///
/// The channels named in `channels` are taken, in that order, from the image and written as `u16` to
/// `<analysis_dir>/<stem><suffix>.tiff`, with the channel names (one per line) in `<stem><suffix>.csv`.
///
/// Returns the path of the stack, or `None` if the image was skipped for being too small. Fails with
/// [`ImcError::NoSuchChannel`] (without writing anything) if a channel is missing from the image.
pub fn create_analysis_stack<P, Q, S>(
    image_file: P,
    analysis_dir: Q,
    channels: &[S],
    options: &AnalysisStackOptions,
) -> Result<Option<PathBuf>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: AsRef<str>,
{
    let image_file = image_file.as_ref();
    let (data, acquisition_channels) = read_acquisition_image(image_file)?;

    if let Some(min_size) = options.min_size {
        let (_, height, width) = data.dim();

        if height.min(width) <= min_size {
            info!(
                "Skipping {} as the image is too small ({} x {} pixels)",
                image_file.display(),
                width,
                height
            );
            return Ok(None);
        }
    }

    let indices = channels
        .iter()
        .map(|channel| {
            channel_index(&acquisition_channels, channel.as_ref()).ok_or_else(|| {
                ImcError::NoSuchChannel {
                    channel: channel.as_ref().to_string(),
                    image: image_file.to_path_buf(),
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut stack = data.select(Axis(0), &indices);
    if let Some(threshold) = options.hot_pixel_threshold {
        stack = filter_hot_pixels(&stack, threshold);
    }

    let file_name = image_file
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stack_stem = format!(
        "{}{}",
        image_stem(&file_name),
        options.suffix.as_deref().unwrap_or_default()
    );

    let analysis_dir = analysis_dir.as_ref();
    let stack_file = analysis_dir.join(format!("{}.tiff", stack_stem));

    write_imagej_tiff_u16(&stack_file, &stack)?;
    write_channel_order(analysis_dir.join(format!("{}.csv", stack_stem)), channels)?;

    debug!("Written analysis stack {}", stack_file.display());

    Ok(Some(stack_file))
}

/// Create an analysis stack (see [`create_analysis_stack`]) for every acquisition image in `acquisition_dir`.
///
/// Stops at the first image lacking one of the requested channels. Returns the paths of the written stacks.
pub fn create_analysis_stacks<P, Q, S>(
    acquisition_dir: P,
    analysis_dir: Q,
    channels: &[S],
    options: &AnalysisStackOptions,
) -> Result<Vec<PathBuf>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: AsRef<str>,
{
    let analysis_dir = analysis_dir.as_ref();
    fs::create_dir_all(analysis_dir)?;

    let mut stacks = Vec::new();
    for image_file in list_acquisition_images(acquisition_dir)? {
        if let Some(stack_file) = create_analysis_stack(&image_file, analysis_dir, channels, options)? {
            stacks.push(stack_file);
        }
    }

    Ok(stacks)
}
