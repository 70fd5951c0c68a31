mod parser;

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::Mutex,
};

use byteorder::{ByteOrder, LittleEndian};
use image::DynamicImage;
use ndarray::Array3;

use crate::{
    acquisition::DataLayout,
    error::{ImcError, Result},
    reader::{cube_shape, ContainerReader},
    Acquisition, Panorama, Slide,
};

use parser::{McdParser, ParserState, Record, RecordType};

const CHUNK_SIZE: u64 = 1 << 20;

// Optical images are preceded by a fixed-size header written by the acquisition software
const OPTICAL_IMAGE_OFFSET: i64 = 161;

const COORDINATE_CHANNELS: [&str; 3] = ["X", "Y", "Z"];

/// Represents an imaging mass cytometry (*.mcd) file.
#[derive(Debug)]
pub struct McdFile<R = File> {
    reader: Mutex<BufReader<R>>,
    location: PathBuf,

    schema_xml: String,
    slides: Vec<Slide>,
}

impl McdFile<File> {
    /// Open and parse the .mcd file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<McdFile<File>> {
        let mut mcd = McdFile::parse(File::open(&path)?)?;
        mcd.set_location(path);

        Ok(mcd)
    }
}

impl<R> McdFile<R> {
    /// Sets the location (path) of the .mcd file
    pub fn set_location<P: AsRef<Path>>(&mut self, location: P) {
        self.location = location.as_ref().to_path_buf();
    }
}

impl<R: Read + Seek> McdFile<R> {
    /// Parse *.mcd format
    pub fn parse(reader: R) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let schema_xml = read_schema_xml(&mut reader)?;

        let mut xml_reader = quick_xml::Reader::from_str(&schema_xml);
        xml_reader.trim_text(true);

        let mut parser = McdParser::new();
        while parser.current_state() != ParserState::Finished {
            parser.process(xml_reader.read_event()?)?;
        }

        let slides = assemble_slides(parser.records())?;

        if slides.is_empty() {
            return Err(ImcError::NoSlidePresent);
        }

        Ok(McdFile {
            reader: Mutex::new(reader),
            location: PathBuf::new(),
            schema_xml,
            slides,
        })
    }

    fn file_size(&self) -> Result<u64> {
        let mut reader = self.reader.lock().or(Err(ImcError::PoisonMutex))?;

        Ok(reader.seek(SeekFrom::End(0))?)
    }

    fn read_bytes(&self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut reader = self.reader.lock().or(Err(ImcError::PoisonMutex))?;

        let mut buf_u8 = vec![0; size];
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut buf_u8)?;

        Ok(buf_u8)
    }

    fn read_optical_image(&self, start_offset: i64, end_offset: i64) -> Result<Option<DynamicImage>> {
        let image_start_offset = start_offset.saturating_add(OPTICAL_IMAGE_OFFSET);

        if start_offset <= 0 || image_start_offset >= end_offset {
            return Ok(None);
        }
        if end_offset as u64 > self.file_size()? {
            return Err(ImcError::InvalidImageOffsets {
                start_offset,
                end_offset,
            });
        }

        let data = self.read_bytes(
            image_start_offset as u64,
            (end_offset - image_start_offset) as usize,
        )?;

        Ok(Some(image::load_from_memory(&data)?))
    }
}

impl<R: Read + Seek> ContainerReader for McdFile<R> {
    fn path(&self) -> &Path {
        &self.location
    }

    fn slides(&self) -> &[Slide] {
        &self.slides
    }

    fn schema_xml(&self) -> Result<String> {
        Ok(self.schema_xml.clone())
    }

    fn read_slide(&self, slide: &Slide) -> Result<Option<DynamicImage>> {
        self.read_optical_image(slide.image_start_offset, slide.image_end_offset)
    }

    fn read_panorama(&self, panorama: &Panorama) -> Result<Option<DynamicImage>> {
        // Default panoramas are placeholders without image data
        if panorama.panorama_type() == Some("Default") {
            return Ok(None);
        }

        self.read_optical_image(panorama.image_start_offset, panorama.image_end_offset)
    }

    fn read_acquisition(&self, acquisition: &Acquisition) -> Result<Array3<f32>> {
        let layout = &acquisition.layout;
        let corrupt = |reason: String| ImcError::CorruptAcquisition {
            acquisition: acquisition.id(),
            reason,
        };

        if layout.data_start_offset < 0 || layout.data_start_offset >= layout.data_end_offset {
            return Err(corrupt(format!(
                "invalid data offsets ({}..{})",
                layout.data_start_offset, layout.data_end_offset
            )));
        }
        if layout.value_bytes != 4 {
            return Err(corrupt(format!(
                "unsupported value size of {} bytes",
                layout.value_bytes
            )));
        }
        let (x_index, y_index) = match (layout.x_index, layout.y_index) {
            (Some(x_index), Some(y_index)) => (x_index, y_index),
            _ => return Err(corrupt("missing X/Y coordinate channels".to_string())),
        };
        if layout.data_end_offset as u64 > self.file_size()? {
            return Err(corrupt(
                "acquisition data extends beyond the end of the file".to_string(),
            ));
        }

        let data_size = (layout.data_end_offset - layout.data_start_offset) as usize;
        let spectrum_size = layout.num_raw_channels * layout.value_bytes as usize;
        if data_size % spectrum_size != 0 {
            return Err(corrupt(format!(
                "data size {} is not a multiple of the spectrum size {}",
                data_size, spectrum_size
            )));
        }

        let buf_u8 = self.read_bytes(layout.data_start_offset as u64, data_size)?;
        let mut values = vec![0.0f32; data_size / 4];
        LittleEndian::read_f32_into(&buf_u8, &mut values);

        let mut width = 0;
        let mut height = 0;
        for spectrum in values.chunks_exact(layout.num_raw_channels) {
            let (x, y) = (spectrum[x_index], spectrum[y_index]);

            if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
                return Err(corrupt(format!("invalid pixel coordinates ({}, {})", x, y)));
            }
            if (acquisition.max_x() > 0 && x as i32 >= acquisition.max_x())
                || (acquisition.max_y() > 0 && y as i32 >= acquisition.max_y())
            {
                return Err(corrupt(format!(
                    "pixel ({}, {}) outside of the acquired region",
                    x, y
                )));
            }

            width = width.max((x as usize).saturating_add(1));
            height = height.max((y as usize).saturating_add(1));
        }

        let num_spectra = values.len() / layout.num_raw_channels;
        let shape = cube_shape(layout.channel_indices.len(), width, height, num_spectra)
            .map_err(corrupt)?;

        let mut data = Array3::zeros(shape);
        for spectrum in values.chunks_exact(layout.num_raw_channels) {
            let (x, y) = (spectrum[x_index] as usize, spectrum[y_index] as usize);

            for (channel, &raw_index) in layout.channel_indices.iter().enumerate() {
                data[[channel, y, x]] = spectrum[raw_index];
            }
        }

        Ok(data)
    }
}

/// Locate and decode the UTF-16 schema XML stored at the end of the .mcd file
fn read_schema_xml<R: Read + Seek>(reader: &mut R) -> Result<String> {
    let start_tag = utf16_bytes("<MCDSchema");
    let end_tag = "</MCDSchema>";

    let file_size = reader.seek(SeekFrom::End(0))?;

    let mut tail: Vec<u8> = Vec::new();
    let mut chunk_end = file_size;

    while chunk_end > 0 {
        let chunk_start = chunk_end.saturating_sub(CHUNK_SIZE);

        let mut chunk = vec![0; (chunk_end - chunk_start) as usize];
        reader.seek(SeekFrom::Start(chunk_start))?;
        reader.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&tail);
        tail = chunk;

        if let Some(start_index) = rfind(&tail, &start_tag) {
            let xml_bytes = &tail[start_index..];

            let mut buf_u16 = vec![0; xml_bytes.len() / 2];
            LittleEndian::read_u16_into(&xml_bytes[..buf_u16.len() * 2], &mut buf_u16);

            let mut xml = String::from_utf16(&buf_u16)?;
            if let Some(end_index) = xml.find(end_tag) {
                xml.truncate(end_index + end_tag.len());
            }

            return Ok(xml);
        }

        chunk_end = chunk_start;
    }

    Err(ImcError::MissingSchema)
}

fn utf16_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }

    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&index| &haystack[index..index + needle.len()] == needle)
}

/// Converts channel names such as `Ir(191)` to `Ir191`. Other names are returned unchanged.
pub(crate) fn normalise_channel_name(name: &str) -> String {
    if let Some(inner) = name.strip_suffix(')') {
        if let Some((metal, mass)) = inner.split_once('(') {
            if !metal.is_empty()
                && !mass.is_empty()
                && metal.chars().all(|c| c.is_ascii_alphabetic())
                && mass.chars().all(|c| c.is_ascii_digit())
            {
                return format!("{}{}", metal, mass);
            }
        }
    }

    name.to_string()
}

fn field<T: std::str::FromStr>(
    record: &Record,
    record_name: &'static str,
    field: &'static str,
) -> Result<T> {
    record
        .fields
        .get(field)
        .and_then(|value| value.trim().parse().ok())
        .ok_or(ImcError::MissingField {
            record: record_name,
            field,
        })
}

fn optional_field<T: std::str::FromStr + Default>(record: &Record, field: &str) -> T {
    record
        .fields
        .get(field)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_default()
}

struct ChannelRecord {
    order_number: i16,
    name: String,
    label: String,
}

/// Build the slide -> panorama / acquisition hierarchy from the parsed records.
///
/// Acquisitions are attached to slides via AcquisitionROI -> Panorama -> Slide.
fn assemble_slides(records: Vec<Record>) -> Result<Vec<Slide>> {
    let mut slides: HashMap<u16, Slide> = HashMap::new();
    let mut panoramas = Vec::new();
    let mut panorama_slides: HashMap<u16, u16> = HashMap::new();
    let mut roi_panoramas: HashMap<u16, u16> = HashMap::new();
    let mut acquisition_records = Vec::new();
    let mut channels: HashMap<u16, Vec<ChannelRecord>> = HashMap::new();

    for record in records {
        match record.record_type {
            RecordType::Slide => {
                let id = field(&record, "Slide", "ID")?;

                let mut slide = Slide::new(id);
                slide.image_start_offset = optional_field(&record, "ImageStartOffset");
                slide.image_end_offset = optional_field(&record, "ImageEndOffset");

                slides.insert(id, slide.with_metadata(record.fields));
            }
            RecordType::Panorama => {
                let id = field(&record, "Panorama", "ID")?;
                let slide_id = field(&record, "Panorama", "SlideID")?;

                let mut panorama = Panorama::new(id, slide_id);
                panorama.image_start_offset = optional_field(&record, "ImageStartOffset");
                panorama.image_end_offset = optional_field(&record, "ImageEndOffset");

                panorama_slides.insert(id, slide_id);
                panoramas.push(panorama.with_metadata(record.fields));
            }
            RecordType::AcquisitionROI => {
                let id = field(&record, "AcquisitionROI", "ID")?;
                let panorama_id = field(&record, "AcquisitionROI", "PanoramaID")?;

                roi_panoramas.insert(id, panorama_id);
            }
            RecordType::AcquisitionChannel => {
                let acquisition_id = field(&record, "AcquisitionChannel", "AcquisitionID")?;

                channels
                    .entry(acquisition_id)
                    .or_default()
                    .push(ChannelRecord {
                        order_number: field(&record, "AcquisitionChannel", "OrderNumber")?,
                        name: field(&record, "AcquisitionChannel", "ChannelName")?,
                        label: optional_field(&record, "ChannelLabel"),
                    });
            }
            RecordType::Acquisition => acquisition_records.push(record),
        }
    }

    for panorama in panoramas {
        if let Some(slide) = slides.get_mut(&panorama.slide_id()) {
            slide.panoramas_mut().push(panorama);
        }
    }

    for record in acquisition_records {
        let id: u16 = field(&record, "Acquisition", "ID")?;
        let roi_id: u16 = field(&record, "Acquisition", "AcquisitionROIID")?;

        let slide_id = roi_panoramas
            .get(&roi_id)
            .and_then(|panorama_id| panorama_slides.get(panorama_id))
            .copied()
            .ok_or(ImcError::MissingField {
                record: "AcquisitionROI",
                field: "PanoramaID",
            })?;

        let mut acquisition_channels = channels.remove(&id).unwrap_or_default();
        acquisition_channels.sort_by_key(|channel| channel.order_number);

        let mut layout = DataLayout {
            data_start_offset: optional_field(&record, "DataStartOffset"),
            data_end_offset: optional_field(&record, "DataEndOffset"),
            value_bytes: optional_field(&record, "ValueBytes"),
            num_raw_channels: acquisition_channels.len(),
            ..Default::default()
        };

        let mut names = Vec::new();
        let mut labels = Vec::new();
        for (raw_index, channel) in acquisition_channels.iter().enumerate() {
            match channel.name.as_str() {
                "X" => layout.x_index = Some(raw_index),
                "Y" => layout.y_index = Some(raw_index),
                _ => {}
            }

            if !COORDINATE_CHANNELS.contains(&channel.name.as_str()) {
                layout.channel_indices.push(raw_index);
                names.push(normalise_channel_name(&channel.name));
                labels.push(channel.label.clone());
            }
        }

        let mut acquisition =
            Acquisition::new(id, slide_id, &names, &labels)?.with_metadata(record.fields);
        acquisition.layout = layout;

        if let Some(slide) = slides.get_mut(&slide_id) {
            slide.acquisitions_mut().push(acquisition);
        }
    }

    let mut slides: Vec<Slide> = slides.into_values().collect();
    slides.sort_by_key(|slide| slide.id());

    for slide in slides.iter_mut() {
        slide.panoramas_mut().sort_by_key(|panorama| panorama.id());
        slide.acquisitions_mut().sort_by_key(|acquisition| acquisition.id());
    }

    Ok(slides)
}
