use core::fmt;
use std::collections::HashMap;

use crate::Print;

/// Represents a panorama (an optical overview image acquired on a slide)
#[derive(Debug, Clone)]
pub struct Panorama {
    id: u16,
    slide_id: u16,
    description: String,

    pub(crate) image_start_offset: i64,
    pub(crate) image_end_offset: i64,

    metadata: HashMap<String, String>,
}

impl Panorama {
    /// Create a panorama without associated image data
    pub fn new(id: u16, slide_id: u16) -> Self {
        Panorama {
            id,
            slide_id,
            description: String::new(),
            image_start_offset: 0,
            image_end_offset: 0,
            metadata: HashMap::new(),
        }
    }

    /// Set the free-form metadata (element name -> text) describing the panorama
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        if let Some(description) = metadata.get("Description") {
            self.description = description.clone();
        }

        self.metadata = metadata;
        self
    }

    /// Returns the panorama ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the slide ID to which this panorama belongs
    pub fn slide_id(&self) -> u16 {
        self.slide_id
    }

    /// Returns the given description for the panorama
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the panorama type (e.g. `Default` or `Instrument`), if recorded
    pub fn panorama_type(&self) -> Option<&str> {
        self.metadata.get("Type").map(|value| value.as_str())
    }

    /// Returns the raw metadata recorded for the panorama
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

impl Print for Panorama {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Panorama", 42)?;

        writeln!(
            writer,
            "{:indent$}{: <16} | {}",
            "",
            "ID",
            self.id,
            indent = indent
        )?;
        writeln!(
            writer,
            "{:indent$}{: <16} | {}",
            "",
            "Description",
            self.description,
            indent = indent
        )?;

        if let Some(panorama_type) = self.panorama_type() {
            writeln!(
                writer,
                "{:indent$}{: <16} | {}",
                "",
                "Type",
                panorama_type,
                indent = indent
            )?;
        }

        Ok(())
    }
}

impl fmt::Display for Panorama {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.print(f, 0)
    }
}
