#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]

//! This library converts imaging mass cytometry (Fluidigm) data stored in the (*.mcd) format into
//! images ready for segmentation and analysis.
//!
//! Raw data shipped as .zip archives are unpacked with [`extract_zip_file`]. The pipeline then consists of
//! three steps:
//! 1. [`extract_mcd_file`] writes every acquisition of an .mcd file as OME-TIFF (plus a channel table),
//!    restoring acquisitions that cannot be read from the accompanying .txt exports (see [`match_txt_files`]).
//! 2. [`create_analysis_stacks`] selects, orders and (optionally) hot-pixel filters channels of the extracted
//!    images to create analysis stacks.
//! 3. [`export_to_histocat`] writes every channel of the extracted images as a separate image for histoCAT.
//!
//! # Example
//!
//! ```no_run
//! use imc_segpipe::{
//!     create_analysis_stacks, extract_mcd_path, match_txt_files, write_acquisition_metadata,
//!     AnalysisStackOptions, Panel,
//! };
//!
//! fn main() -> imc_segpipe::error::Result<()> {
//!     let mcd_files = ["raw/20200612_FLU_1923.mcd"];
//!     let txt_files = ["raw/20200612_FLU_1923_1.txt"];
//!
//!     let mut metadata = Vec::new();
//!     for (mcd_file, txt_files) in match_txt_files(&mcd_files, &txt_files) {
//!         metadata.extend(extract_mcd_path(&mcd_file, "acquisitions", Some(txt_files.as_slice()))?);
//!     }
//!     write_acquisition_metadata("acquisition_metadata.csv", &metadata)?;
//!
//!     let panel = Panel::from_path("panel.csv", "Metal Tag")?;
//!     let options = AnalysisStackOptions {
//!         suffix: Some("_full".to_string()),
//!         hot_pixel_threshold: Some(50.0),
//!         ..Default::default()
//!     };
//!     create_analysis_stacks("acquisitions", "analysis", &panel.channels("full")?, &options)?;
//!
//!     Ok(())
//! }
//! ```

/// Errors associated with reading and converting IMC data
pub mod error;
/// Tables describing the channels of acquisition images and analysis stacks
pub mod channel;
/// Reading and writing TIFF images
pub mod images;
pub mod reader;

mod acquisition;
mod archive;
mod extract;
mod filter;
mod histocat;
mod matching;
mod mcd;
mod metadata;
mod panel;
mod panorama;
mod slide;
mod stacks;
mod txt;

pub use self::acquisition::Acquisition;
pub use self::archive::extract_zip_file;
pub use self::channel::AcquisitionChannel;
pub use self::extract::{extract_mcd_file, extract_mcd_path};
pub use self::filter::filter_hot_pixels;
pub use self::histocat::{
    export_acquisition_to_histocat, export_to_histocat, find_mask_files, histocat_filename,
    sanitize_label,
};
pub use self::matching::{acquisition_txt_files, match_txt_files};
pub use self::mcd::McdFile;
pub use self::metadata::{write_acquisition_metadata, AcquisitionMetadata, AcquisitionOrigin};
pub use self::panel::Panel;
pub use self::panorama::Panorama;
pub use self::reader::{ContainerReader, TxtAcquisition, TxtReader};
pub use self::slide::Slide;
pub use self::stacks::{create_analysis_stack, create_analysis_stacks, AnalysisStackOptions};
pub use self::txt::TxtFile;

use std::fmt;

/// Print to `writer` trait
pub trait Print {
    /// Formats and prints to `writer`
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result;
}
