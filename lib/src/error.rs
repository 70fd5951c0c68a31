use std::{io, path::PathBuf, result, string::FromUtf16Error};

use thiserror::Error;

/// A type alias for `Result<T, imc_segpipe::ImcError>`.
pub type Result<T> = result::Result<T, ImcError>;

/// Describes what has gone wrong when reading, extracting or converting IMC data
#[derive(Error, Debug)]
pub enum ImcError {
    /// An I/O error occurred
    #[error("An I/O error occured: {source}")]
    Io {
        #[from]
        /// The original error that was raised.
        source: io::Error,
    },

    /// No slide present in MCD file, so likely this is not a valid .mcd file.
    #[error("No slide found in MCD file - is this a valid .mcd file?")]
    NoSlidePresent,

    /// The trailing XML schema could not be located in the .mcd file
    #[error("No MCD schema found at the end of the file")]
    MissingSchema,

    /// The mutex guarding the file handle was poisoned by a panicking reader
    #[error("The reader mutex was poisoned")]
    PoisonMutex,

    /// An error occurred when converting XML to UTF-16
    #[error("An error occurred when converting XML to UTF-16")]
    Utf16Erorr {
        #[from]
        /// The original error that was raised.
        source: FromUtf16Error,
    },

    /// An error occured when parsing the XML file
    #[error("An error occured when parsing the XML file: {source}")]
    InvalidXML {
        #[from]
        /// The original error that was raised.
        source: quick_xml::Error,
    },

    /// A record in the XML schema is missing a required field, or the field could not be parsed
    #[error("{record} record is missing a valid `{field}` field")]
    MissingField {
        /// Name of the XML record (e.g. `Acquisition`)
        record: &'static str,
        /// Name of the missing field
        field: &'static str,
    },

    /// The binary data stored for an acquisition is inconsistent with its metadata
    #[error("acquisition {acquisition} is corrupted: {reason}")]
    CorruptAcquisition {
        /// ID of the acquisition
        acquisition: u16,
        /// Description of the problem
        reason: String,
    },

    /// The byte range of an optical (slide or panorama) image lies outside of the .mcd file
    #[error("image data ({start_offset}..{end_offset}) extends beyond the end of the file")]
    InvalidImageOffsets {
        /// Start of the image record
        start_offset: i64,
        /// End of the image data
        end_offset: i64,
    },

    /// A stand-alone .txt export could not be parsed
    #[error("invalid .txt file {path:?}: {reason}")]
    InvalidTxt {
        /// Location of the .txt file
        path: PathBuf,
        /// Description of the problem
        reason: String,
    },

    /// A requested channel is not present in the channel table of an image
    #[error("no channel named `{channel}` in {image:?}")]
    NoSuchChannel {
        /// Name of the requested channel
        channel: String,
        /// Image whose channel table was searched
        image: PathBuf,
    },

    /// The number of channels in an image and in its channel table differ
    #[error("{image:?} has {image_channels} channels but its channel table lists {table_channels}")]
    ChannelCountMismatch {
        /// The image file
        image: PathBuf,
        /// Number of channels (planes) in the image
        image_channels: usize,
        /// Number of rows in the channel table
        table_channels: usize,
    },

    /// Channel names and channel labels must pair up one to one
    #[error("{names} channel names but {labels} channel labels")]
    ChannelLabelMismatch {
        /// Number of channel names
        names: usize,
        /// Number of channel labels
        labels: usize,
    },

    /// A restored acquisition does not describe the same channels as the .mcd acquisition
    #[error("channels {found:?} do not match the expected channels {expected:?}")]
    ChannelSetMismatch {
        /// Channel names expected from the .mcd file
        expected: Vec<String>,
        /// Channel names found in the restored data
        found: Vec<String>,
    },

    /// A column required for parsing a .csv file is missing
    #[error("column `{column}` not found in {path:?}")]
    MissingColumn {
        /// Name of the column
        column: String,
        /// Location of the .csv file
        path: PathBuf,
    },

    /// The TIFF file stores a pixel type that cannot be converted
    #[error("unsupported pixel type in {path:?}")]
    UnsupportedPixelType {
        /// Location of the TIFF file
        path: PathBuf,
    },

    /// The pages of a multi-page TIFF file do not share the same dimensions
    #[error("image dimensions of {path:?} are inconsistent")]
    InvalidImageDimensions {
        /// Location of the TIFF file
        path: PathBuf,
    },

    /// An error occurred when reading or writing a .csv file
    #[error("An error occured when processing a .csv file: {source}")]
    Csv {
        #[from]
        /// The original error that was raised.
        source: csv::Error,
    },

    /// An error occurred when reading or writing a TIFF file
    #[error("An error occured when processing a TIFF file: {source}")]
    Tiff {
        #[from]
        /// The original error that was raised.
        source: tiff::TiffError,
    },

    /// An error occurred when decoding or encoding an optical image
    #[error("An error occured when processing an optical image: {source}")]
    Image {
        #[from]
        /// The original error that was raised.
        source: image::ImageError,
    },

    /// Pixel data could not be arranged into the requested shape
    #[error("Invalid array shape: {source}")]
    Shape {
        #[from]
        /// The original error that was raised.
        source: ndarray::ShapeError,
    },

    /// A regular expression could not be compiled
    #[error("Invalid regular expression: {source}")]
    Regex {
        #[from]
        /// The original error that was raised.
        source: regex::Error,
    },

    /// An error occurred when reading a .zip archive
    #[error("An error occured when extracting a .zip archive: {source}")]
    Zip {
        #[from]
        /// The original error that was raised.
        source: zip::result::ZipError,
    },

    /// An invalid glob pattern was constructed from a directory name
    #[error("Invalid search pattern: {source}")]
    Pattern {
        #[from]
        /// The original error that was raised.
        source: glob::PatternError,
    },

    /// A directory entry could not be read while searching for files
    #[error("Error when listing files: {source}")]
    Glob {
        #[from]
        /// The original error that was raised.
        source: glob::GlobError,
    },
}
