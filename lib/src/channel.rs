use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single channel of an acquisition, identified by its name (e.g. `Ir191`) and
/// an optional human-readable label (e.g. `DNA1`, empty if not set).
///
/// Serialises to a row of the channel table (`channel_name,channel_label`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionChannel {
    #[serde(rename = "channel_name")]
    name: String,
    #[serde(rename = "channel_label", default)]
    label: String,
}

impl AcquisitionChannel {
    /// Create a new channel description
    pub fn new(name: &str, label: &str) -> Self {
        AcquisitionChannel {
            name: name.to_string(),
            label: label.to_string(),
        }
    }

    /// Returns the channel name (metal and mass, e.g. `Ir191`)
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channel label, which is empty when none was specified
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the label if one is set, otherwise the name
    pub fn label_or_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Returns the position of the channel with the given name, if present
pub fn channel_index(channels: &[AcquisitionChannel], name: &str) -> Option<usize> {
    channels.iter().position(|channel| channel.name() == name)
}

/// Read a channel table (`channel_name,channel_label`). Row order is the channel order of the image it describes.
pub fn read_channel_table<P: AsRef<Path>>(path: P) -> Result<Vec<AcquisitionChannel>> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut channels = Vec::new();
    for record in reader.deserialize() {
        channels.push(record?);
    }

    Ok(channels)
}

/// Write a channel table, one row per channel, in the order given
pub fn write_channel_table<P: AsRef<Path>>(path: P, channels: &[AcquisitionChannel]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    if channels.is_empty() {
        writer.write_record(["channel_name", "channel_label"])?;
    }

    for channel in channels {
        writer.serialize(channel)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the channel order file accompanying an analysis stack (one channel name per line, no header)
pub fn write_channel_order<P: AsRef<Path>, S: AsRef<str>>(path: P, names: &[S]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    let joined = names
        .iter()
        .map(|name| name.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    writer.write_all(joined.as_bytes())?;
    writer.flush()?;

    Ok(())
}

/// Read a channel order file written by [`write_channel_order`]
pub fn read_channel_order<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);

    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');

        if !line.is_empty() {
            names.push(line.to_string());
        }
    }

    Ok(names)
}
