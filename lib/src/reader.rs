//! Capabilities used by the extractor to read acquisition data.
//!
//! The extractor never touches a file format directly. It is generic over a [`ContainerReader`]
//! (implemented for .mcd files by [`McdFile`](crate::McdFile)) and a [`TxtReader`] (implemented by
//! [`TxtFile::read`](crate::TxtFile::read)), so either can be replaced, e.g. to simulate corrupted data.

use std::path::Path;

use image::DynamicImage;
use ndarray::Array3;

use crate::{error::Result, Acquisition, AcquisitionChannel, Panorama, Slide};

/// A container of slides, panoramas and acquisitions which can be read entity by entity.
///
/// Every read is independently failable: a failure to read one acquisition says nothing about its siblings.
pub trait ContainerReader {
    /// Location of the container, whose file stem names all extracted files
    fn path(&self) -> &Path;

    /// Returns the slides (with their panoramas and acquisitions) sorted by ID
    fn slides(&self) -> &[Slide];

    /// Returns the schema (metadata) XML describing the whole container
    fn schema_xml(&self) -> Result<String>;

    /// Reads the overview image of a slide, or `None` if the slide has no image
    fn read_slide(&self, slide: &Slide) -> Result<Option<DynamicImage>>;

    /// Reads the image of a panorama, or `None` if the panorama has no image
    fn read_panorama(&self, panorama: &Panorama) -> Result<Option<DynamicImage>>;

    /// Reads the pixel data of an acquisition as an array of shape (channels, height, width),
    /// with channels in the order of [`Acquisition::channels`]
    fn read_acquisition(&self, acquisition: &Acquisition) -> Result<Array3<f32>>;
}

/// Acquisition data restored from a stand-alone .txt export
#[derive(Debug, Clone)]
pub struct TxtAcquisition {
    /// Channels in the order of the first axis of `data`
    pub channels: Vec<AcquisitionChannel>,
    /// Pixel data of shape (channels, height, width)
    pub data: Array3<f32>,
}

/// Returns the shape (channels, height, width) of the cube holding `num_pixels` pixels whose largest
/// coordinates span `width` x `height`.
///
/// Pixels are acquired row by row from the origin, so every row but the last is complete and the pixel
/// with the largest X coordinate is preceded by at least `width - 1` others.
pub(crate) fn cube_shape(
    num_channels: usize,
    width: usize,
    height: usize,
    num_pixels: usize,
) -> std::result::Result<(usize, usize, usize), String> {
    let complete_rows = height.saturating_sub(1).checked_mul(width);

    match complete_rows {
        Some(complete_pixels) if width <= num_pixels && complete_pixels < num_pixels => {
            Ok((num_channels, height, width))
        }
        _ => Err(format!(
            "pixel coordinates spanning {}x{} do not fit {} acquired pixels",
            width, height, num_pixels
        )),
    }
}

/// Reads a stand-alone .txt export of a single acquisition
pub trait TxtReader {
    /// Read the acquisition stored in the .txt file at `path`
    fn read_txt(&self, path: &Path) -> Result<TxtAcquisition>;
}

impl<F> TxtReader for F
where
    F: Fn(&Path) -> Result<TxtAcquisition>,
{
    fn read_txt(&self, path: &Path) -> Result<TxtAcquisition> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_shape_allows_an_incomplete_last_row() {
        assert_eq!(cube_shape(2, 3, 2, 6), Ok((2, 2, 3)));
        assert_eq!(cube_shape(2, 3, 2, 4), Ok((2, 2, 3)));
        assert_eq!(cube_shape(1, 1, 1, 1), Ok((1, 1, 1)));
    }

    #[test]
    fn cube_shape_rejects_sparse_coordinates() {
        assert!(cube_shape(2, 3, 2, 3).is_err());
        assert!(cube_shape(2, 4, 1, 3).is_err());
        assert!(cube_shape(2, 3_000_000_001, 3_000_000_001, 1).is_err());
        assert!(cube_shape(2, usize::MAX, usize::MAX, usize::MAX).is_err());
        assert!(cube_shape(2, 0, 0, 0).is_err());
    }
}
