use core::fmt;
use std::collections::HashMap;

use crate::{Acquisition, Panorama, Print};

/// Represents a slide (contains multiple panoramas and acquisitions) in the *.mcd format
#[derive(Debug, Clone)]
pub struct Slide {
    id: u16,
    description: String,

    pub(crate) image_start_offset: i64,
    pub(crate) image_end_offset: i64,

    metadata: HashMap<String, String>,

    panoramas: Vec<Panorama>,
    acquisitions: Vec<Acquisition>,
}

impl Slide {
    /// Create an empty slide
    pub fn new(id: u16) -> Self {
        Slide {
            id,
            description: String::new(),
            image_start_offset: 0,
            image_end_offset: 0,
            metadata: HashMap::new(),
            panoramas: Vec::new(),
            acquisitions: Vec::new(),
        }
    }

    /// Set the free-form metadata (element name -> text) describing the slide
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        if let Some(description) = metadata.get("Description") {
            self.description = description.clone();
        }

        self.metadata = metadata;
        self
    }

    /// Add a panorama to the slide
    pub fn with_panorama(mut self, panorama: Panorama) -> Self {
        self.panoramas.push(panorama);
        self
    }

    /// Add an acquisition to the slide
    pub fn with_acquisition(mut self, acquisition: Acquisition) -> Self {
        self.acquisitions.push(acquisition);
        self
    }

    /// Returns the slide ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns the description given to the slide
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the panoramas acquired on the slide, sorted by ID
    pub fn panoramas(&self) -> &[Panorama] {
        &self.panoramas
    }

    /// Returns the acquisitions performed on the slide, sorted by ID
    pub fn acquisitions(&self) -> &[Acquisition] {
        &self.acquisitions
    }

    /// Returns the raw metadata recorded for the slide
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub(crate) fn panoramas_mut(&mut self) -> &mut Vec<Panorama> {
        &mut self.panoramas
    }

    pub(crate) fn acquisitions_mut(&mut self) -> &mut Vec<Acquisition> {
        &mut self.acquisitions
    }
}

impl Print for Slide {
    fn print<W: fmt::Write + ?Sized>(&self, writer: &mut W, indent: usize) -> fmt::Result {
        write!(writer, "{:indent$}", "", indent = indent)?;
        writeln!(writer, "{:-^1$}", "Slide", 46)?;

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

        for panorama in &self.panoramas {
            panorama.print(writer, indent + 1)?;
        }

        for acquisition in &self.acquisitions {
            acquisition.print(writer, indent + 1)?;
        }

        Ok(())
    }
}

impl fmt::Display for Slide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.print(f, 0)
    }
}
