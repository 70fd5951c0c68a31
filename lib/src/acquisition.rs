use core::fmt;
use std::collections::HashMap;

use crate::{
    channel::AcquisitionChannel,
    error::{ImcError, Result},
    Print,
};

/// Location and layout of the raw spectra of an acquisition within the .mcd file.
///
/// Each spectrum holds one value per raw channel (including the X, Y and Z coordinate channels).
#[derive(Debug, Clone, Default)]
pub(crate) struct DataLayout {
    pub(crate) data_start_offset: i64,
    pub(crate) data_end_offset: i64,
    pub(crate) value_bytes: u8,
    pub(crate) num_raw_channels: usize,
    pub(crate) x_index: Option<usize>,
    pub(crate) y_index: Option<usize>,
    /// Position within each spectrum of every channel listed in `Acquisition::channels`
    pub(crate) channel_indices: Vec<usize>,
}

/// Acquisition represents a single region analysed by IMC.
#[derive(Debug, Clone)]
pub struct Acquisition {
    id: u16,
    slide_id: u16,
    description: String,
    max_x: i32,
    max_y: i32,

    channels: Vec<AcquisitionChannel>,
    metadata: HashMap<String, String>,

    pub(crate) layout: DataLayout,
}

impl Acquisition {
    /// Create an acquisition from its channel names and labels, which must pair up one to one.
    pub fn new<N: AsRef<str>, L: AsRef<str>>(
        id: u16,
        slide_id: u16,
        channel_names: &[N],
        channel_labels: &[L],
    ) -> Result<Self> {
        if channel_names.len() != channel_labels.len() {
            return Err(ImcError::ChannelLabelMismatch {
                names: channel_names.len(),
                labels: channel_labels.len(),
            });
        }

        let channels = channel_names
            .iter()
            .zip(channel_labels)
            .map(|(name, label)| AcquisitionChannel::new(name.as_ref(), label.as_ref()))
            .collect();

        Ok(Acquisition {
            id,
            slide_id,
            description: String::new(),
            max_x: 0,
            max_y: 0,
            channels,
            metadata: HashMap::new(),
            layout: DataLayout::default(),
        })
    }

    /// Set the free-form metadata (element name -> text) describing the acquisition.
    ///
    /// `Description`, `MaxX` and `MaxY` are also taken from the metadata when present.
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        if let Some(description) = metadata.get("Description") {
            self.description = description.clone();
        }
        if let Some(max_x) = metadata.get("MaxX").and_then(|value| value.trim().parse().ok()) {
            self.max_x = max_x;
        }
        if let Some(max_y) = metadata.get("MaxY").and_then(|value| value.trim().parse().ok()) {
            self.max_y = max_y;
        }

        self.metadata = metadata;
        self
    }

    /// Returns the ID associated with the acquisition
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the ID of the slide on which the acquisition was performed
    pub fn slide_id(&self) -> u16 {
        self.slide_id
    }

    /// Returns a description of the acquisition
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the width of the acquired region (in pixels)
    pub fn max_x(&self) -> i32 {
        self.max_x
    }

    /// Returns the height of the acquired region (in pixels)
    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Returns a list of all channels acquired within this acquisition (excluding the X, Y and Z coordinates)
    pub fn channels(&self) -> &[AcquisitionChannel] {
        &self.channels
    }

    /// Returns the channel names, in channel order
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    /// Returns the channel labels (empty when not set), in channel order
    pub fn channel_labels(&self) -> Vec<&str> {
        self.channels.iter().map(|channel| channel.label()).collect()
    }

    /// Returns the raw metadata recorded for the acquisition
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

#[rustfmt::skip]
impl Print for Acquisition {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Acquisition", 48)?;

        writeln!(writer, "{:indent$}{: <22} | {}", "", "ID",          self.id,          indent = indent)?;
        writeln!(writer, "{:indent$}{: <22} | {}", "", "Description", self.description, indent = indent)?;
        writeln!(writer, "{:indent$}{: <22} | {} x {}", "", "Dimensions (pixels)", self.max_x, self.max_y, indent = indent)?;

        for key in ["AblationFrequency", "AblationPower", "StartTimeStamp", "EndTimeStamp"] {
            if let Some(value) = self.metadata.get(key) {
                writeln!(writer, "{:indent$}{: <22} | {}", "", key, value, indent = indent)?;
            }
        }

        for channel in &self.channels {
            writeln!(writer, "{:indent$}{: <22} | {}", "", channel.name(), channel.label(), indent = indent)?;
        }

        Ok(())
    }
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.print(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_labels_must_pair_up() {
        let result = Acquisition::new(1, 1, &["Ir191", "Ir193"], &["DNA1"]);

        assert!(matches!(
            result,
            Err(ImcError::ChannelLabelMismatch {
                names: 2,
                labels: 1
            })
        ));
    }

    #[test]
    fn metadata_sets_description_and_extent() -> Result<()> {
        let metadata = HashMap::from([
            ("Description".to_string(), "ROI_001".to_string()),
            ("MaxX".to_string(), "500".to_string()),
            ("MaxY".to_string(), "400".to_string()),
        ]);

        let acquisition =
            Acquisition::new(3, 1, &["Ir191"], &["DNA1"])?.with_metadata(metadata);

        assert_eq!(acquisition.description(), "ROI_001");
        assert_eq!((acquisition.max_x(), acquisition.max_y()), (500, 400));
        assert_eq!(acquisition.channel_names(), vec!["Ir191"]);
        assert_eq!(acquisition.channel_labels(), vec!["DNA1"]);

        Ok(())
    }
}
