//! Reading and writing of the TIFF files produced by the pipeline.
//!
//! Acquisition images are written as OME-TIFF (one `f32` page per channel, OME-XML in the first page's
//! `ImageDescription`), analysis stacks as ImageJ-style `u16` multi-page TIFF and histoCAT channels as
//! single-page `f32` TIFF.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use ndarray::{Array3, ArrayView2, Axis};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    encoder::{colortype, TiffEncoder},
    tags::Tag,
    ColorType,
};

use crate::{
    channel::read_channel_table,
    error::{ImcError, Result},
    AcquisitionChannel,
};

const OME_XML_CREATOR: &str = "IMC Segmentation Pipeline";
const OME_XML_NAMESPACE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";
const OME_XML_SCHEMA_LOCATION: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06 http://www.openmicroscopy.org/Schemas/OME/2016-06/ome.xsd";

/// Returns the file name without the `.ome.tiff` extension (or without its last extension otherwise)
pub fn image_stem(file_name: &str) -> &str {
    match file_name.strip_suffix(".ome.tiff") {
        Some(stem) => stem,
        None => file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(file_name),
    }
}

/// Returns the channel table accompanying an acquisition image (`<stem>.csv` next to `<stem>.ome.tiff`)
pub fn channel_table_path(image_file: &Path) -> PathBuf {
    let file_name = image_file
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();

    image_file.with_file_name(format!("{}.csv", image_stem(&file_name)))
}

/// Returns the acquisition images (`*.ome.tiff`, excluding hidden files) directly within `dir`, sorted by name
pub fn list_acquisition_images<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let pattern = Path::new(&glob::Pattern::escape(&dir.as_ref().to_string_lossy()))
        .join("[!.]*.ome.tiff");

    let mut images = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        if path.is_file() {
            images.push(path);
        }
    }
    images.sort();

    Ok(images)
}

/// Read an acquisition image together with its channel table, which must list one row per image channel
pub fn read_acquisition_image<P: AsRef<Path>>(
    image_file: P,
) -> Result<(Array3<f32>, Vec<AcquisitionChannel>)> {
    let image_file = image_file.as_ref();

    let data = read_tiff_stack(image_file)?;
    let channels = read_channel_table(channel_table_path(image_file))?;

    if data.dim().0 != channels.len() {
        return Err(ImcError::ChannelCountMismatch {
            image: image_file.to_path_buf(),
            image_channels: data.dim().0,
            table_channels: channels.len(),
        });
    }

    Ok((data, channels))
}

/// Generate the OME-XML describing an acquisition image of shape (channels, height, width).
///
/// Each channel is given a `Name` (the label, or the name when no label is set) and a `Fluor` (the channel
/// name). When `xml_metadata` is given, it is attached as `OriginalMetadata` with the key `MCD-XML`.
pub fn ome_xml<S: AsRef<str>>(
    image_name: &str,
    shape: (usize, usize, usize),
    channel_names: &[S],
    channel_fluors: &[S],
    xml_metadata: Option<&str>,
) -> Result<String> {
    let (size_c, size_y, size_x) = shape;
    if channel_names.len() != size_c || channel_fluors.len() != size_c {
        return Err(ImcError::ChannelCountMismatch {
            image: image_name.into(),
            image_channels: size_c,
            table_channels: channel_names.len().max(channel_fluors.len()),
        });
    }

    let (size_c, size_y, size_x) = (size_c.to_string(), size_y.to_string(), size_x.to_string());

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.write_event(Event::Start(BytesStart::new("OME").with_attributes([
        ("xmlns", OME_XML_NAMESPACE),
        ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ("xsi:schemaLocation", OME_XML_SCHEMA_LOCATION),
        ("Creator", OME_XML_CREATOR),
    ])))?;

    writer.write_event(Event::Start(
        BytesStart::new("Image").with_attributes([("ID", "Image:0"), ("Name", image_name)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("Pixels").with_attributes([
        ("ID", "Pixels:0"),
        ("DimensionOrder", "XYCZT"),
        ("Type", "float"),
        ("SizeX", size_x.as_str()),
        ("SizeY", size_y.as_str()),
        ("SizeC", size_c.as_str()),
        ("SizeZ", "1"),
        ("SizeT", "1"),
        ("BigEndian", "false"),
    ])))?;

    for (index, (name, fluor)) in channel_names.iter().zip(channel_fluors).enumerate() {
        let id = format!("Channel:0:{}", index);

        writer.write_event(Event::Empty(BytesStart::new("Channel").with_attributes([
            ("ID", id.as_str()),
            ("Name", name.as_ref()),
            ("Fluor", fluor.as_ref()),
            ("SamplesPerPixel", "1"),
        ])))?;
    }

    writer.write_event(Event::Empty(
        BytesStart::new("TiffData").with_attributes([("IFD", "0"), ("PlaneCount", size_c.as_str())]),
    ))?;

    writer.write_event(Event::End(BytesEnd::new("Pixels")))?;
    writer.write_event(Event::End(BytesEnd::new("Image")))?;

    if let Some(xml_metadata) = xml_metadata {
        writer.write_event(Event::Start(BytesStart::new("StructuredAnnotations")))?;
        writer.write_event(Event::Start(
            BytesStart::new("XMLAnnotation").with_attributes([("ID", "Annotation:0")]),
        ))?;
        writer.write_event(Event::Start(BytesStart::new("Value")))?;
        writer.write_event(Event::Start(BytesStart::new("OriginalMetadata")))?;

        writer.write_event(Event::Start(BytesStart::new("Key")))?;
        writer.write_event(Event::Text(BytesText::new("MCD-XML")))?;
        writer.write_event(Event::End(BytesEnd::new("Key")))?;

        writer.write_event(Event::Start(BytesStart::new("Value")))?;
        writer.write_event(Event::Text(BytesText::new(xml_metadata)))?;
        writer.write_event(Event::End(BytesEnd::new("Value")))?;

        writer.write_event(Event::End(BytesEnd::new("OriginalMetadata")))?;
        writer.write_event(Event::End(BytesEnd::new("Value")))?;
        writer.write_event(Event::End(BytesEnd::new("XMLAnnotation")))?;
        writer.write_event(Event::End(BytesEnd::new("StructuredAnnotations")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("OME")))?;

    Ok(ascii_character_references(&String::from_utf8_lossy(
        &writer.into_inner(),
    )))
}

/// TIFF ASCII fields only hold 7-bit characters, so anything else is written as an XML character reference
fn ascii_character_references(xml: &str) -> String {
    let mut ascii = String::with_capacity(xml.len());

    for c in xml.chars() {
        if c.is_ascii() && c != '\0' {
            ascii.push(c);
        } else if c != '\0' {
            ascii.push_str(&format!("&#x{:X};", c as u32));
        }
    }

    ascii
}

fn imagej_description(images: usize) -> String {
    format!(
        "ImageJ=1.11a\nimages={images}\nchannels={images}\nhyperstack=true\nmode=grayscale\nloop=false\n"
    )
}

fn dimensions(path: &Path, height: usize, width: usize) -> Result<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok((width, height)),
        _ => Err(ImcError::InvalidImageDimensions {
            path: path.to_path_buf(),
        }),
    }
}

/// Write an acquisition image as OME-TIFF, one `f32` page per channel, with `ome_xml` describing the image
pub fn write_ome_tiff<P: AsRef<Path>>(path: P, data: &Array3<f32>, ome_xml: &str) -> Result<()> {
    let path = path.as_ref();
    let (_, height, width) = data.dim();
    let (width, height) = dimensions(path, height, width)?;

    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;

    for (index, plane) in data.axis_iter(Axis(0)).enumerate() {
        let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;
        if index == 0 {
            image.encoder().write_tag(Tag::ImageDescription, ome_xml)?;
        }

        let plane = plane.iter().copied().collect::<Vec<_>>();
        image.write_data(&plane)?;
    }

    Ok(())
}

/// Write an image stack as ImageJ-style multi-page TIFF with `u16` pixels.
///
/// Values are truncated towards zero and saturate at the bounds of `u16`.
pub fn write_imagej_tiff_u16<P: AsRef<Path>>(path: P, data: &Array3<f32>) -> Result<()> {
    let path = path.as_ref();
    let (images, height, width) = data.dim();
    let (width, height) = dimensions(path, height, width)?;

    let description = imagej_description(images);
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;

    for (index, plane) in data.axis_iter(Axis(0)).enumerate() {
        let mut image = encoder.new_image::<colortype::Gray16>(width, height)?;
        if index == 0 {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description.as_str())?;
        }

        let plane = plane.iter().map(|value| *value as u16).collect::<Vec<_>>();
        image.write_data(&plane)?;
    }

    Ok(())
}

/// Write a single channel as ImageJ-style TIFF with `f32` pixels
pub fn write_imagej_tiff_f32<P: AsRef<Path>>(path: P, plane: ArrayView2<f32>) -> Result<()> {
    let path = path.as_ref();
    let (height, width) = plane.dim();
    let (width, height) = dimensions(path, height, width)?;

    let description = imagej_description(1);
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;

    let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;
    image
        .encoder()
        .write_tag(Tag::ImageDescription, description.as_str())?;

    let plane = plane.iter().copied().collect::<Vec<_>>();
    image.write_data(&plane)?;

    Ok(())
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    Ok(Decoder::new(BufReader::new(File::open(path)?))?.with_limits(Limits::unlimited()))
}

/// Read every page of a grayscale TIFF into an array of shape (pages, height, width).
///
/// All pages must share the dimensions of the first page.
pub fn read_tiff_stack<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;

    let (width, height) = decoder.dimensions()?;
    let mut pages = 0;
    let mut data = Vec::new();

    loop {
        if decoder.dimensions()? != (width, height) {
            return Err(ImcError::InvalidImageDimensions {
                path: path.to_path_buf(),
            });
        }

        if !matches!(decoder.colortype()?, ColorType::Gray(_)) {
            return Err(ImcError::UnsupportedPixelType {
                path: path.to_path_buf(),
            });
        }

        match decoder.read_image()? {
            DecodingResult::U8(values) => data.extend(values.into_iter().map(f32::from)),
            DecodingResult::U16(values) => data.extend(values.into_iter().map(f32::from)),
            DecodingResult::U32(values) => data.extend(values.into_iter().map(|value| value as f32)),
            DecodingResult::I8(values) => data.extend(values.into_iter().map(f32::from)),
            DecodingResult::I16(values) => data.extend(values.into_iter().map(f32::from)),
            DecodingResult::I32(values) => data.extend(values.into_iter().map(|value| value as f32)),
            DecodingResult::F32(values) => data.extend(values),
            DecodingResult::F64(values) => data.extend(values.into_iter().map(|value| value as f32)),
            _ => {
                return Err(ImcError::UnsupportedPixelType {
                    path: path.to_path_buf(),
                })
            }
        }
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(Array3::from_shape_vec(
        (pages, height as usize, width as usize),
        data,
    )?)
}

/// Returns the `ImageDescription` of the first page of a TIFF file, if present
pub fn read_image_description<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let mut decoder = open_decoder(path.as_ref())?;

    match decoder.find_tag(Tag::ImageDescription)? {
        Some(value) => Ok(Some(value.into_string()?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn stack() -> Array3<f32> {
        array![
            [[0.5, 1.0, 2.0], [3.0, 4.0, 5.0]],
            [[10.0, 11.0, 12.0], [13.0, 14.0, 70000.0]]
        ]
    }

    #[test]
    fn strips_ome_tiff_extension() {
        assert_eq!(image_stem("run1_s0_a1_ac.ome.tiff"), "run1_s0_a1_ac");
        assert_eq!(image_stem("run1_s0_a1_ac.tiff"), "run1_s0_a1_ac");
        assert_eq!(image_stem("mask"), "mask");
    }

    #[test]
    fn channel_table_sits_next_to_image() {
        assert_eq!(
            channel_table_path(Path::new("acquisitions/run1_s0_a1_ac.ome.tiff")),
            PathBuf::from("acquisitions/run1_s0_a1_ac.csv")
        );
    }

    #[test]
    fn lists_visible_acquisition_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b_ac.ome.tiff", "a_ac.ome.tiff", ".hidden_ac.ome.tiff", "a_ac.csv", "stack.tiff"] {
            std::fs::write(dir.path().join(name), b"")?;
        }
        std::fs::create_dir(dir.path().join("nested"))?;
        std::fs::write(dir.path().join("nested").join("c_ac.ome.tiff"), b"")?;

        assert_eq!(
            list_acquisition_images(dir.path())?,
            vec![dir.path().join("a_ac.ome.tiff"), dir.path().join("b_ac.ome.tiff")]
        );

        Ok(())
    }

    #[test]
    fn ome_xml_describes_channels_and_schema() -> Result<()> {
        let xml = ome_xml(
            "run1_s0_a1_ac.ome.tiff",
            (2, 2, 3),
            &["DNA1", "Yb171"],
            &["Ir191", "Yb171"],
            Some("<MCDSchema><Slide><Description>5 µm</Description></Slide></MCDSchema>"),
        )?;

        assert!(xml.is_ascii());
        assert!(xml.contains(r#"Creator="IMC Segmentation Pipeline""#));
        assert!(xml.contains(r#"SizeX="3" SizeY="2" SizeC="2""#));
        assert!(xml.contains(r#"<Channel ID="Channel:0:0" Name="DNA1" Fluor="Ir191""#));
        assert!(xml.contains(r#"<Channel ID="Channel:0:1" Name="Yb171" Fluor="Yb171""#));
        assert!(xml.contains(r#"<XMLAnnotation ID="Annotation:0">"#));
        assert!(xml.contains("<Key>MCD-XML</Key>"));
        assert!(xml.contains("&lt;MCDSchema&gt;"));
        assert!(xml.contains("5 &#xB5;m"));

        Ok(())
    }

    #[test]
    fn ome_xml_rejects_mismatched_channels() {
        assert!(matches!(
            ome_xml("image", (2, 1, 1), &["Ir191"], &["Ir191"], None),
            Err(ImcError::ChannelCountMismatch { .. })
        ));
    }

    #[test]
    fn ome_tiff_keeps_pages_and_description() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("image.ome.tiff");

        write_ome_tiff(&path, &stack(), "<OME />")?;

        assert_eq!(read_tiff_stack(&path)?, stack());
        assert_eq!(read_image_description(&path)?.as_deref(), Some("<OME />"));

        Ok(())
    }

    #[test]
    fn u16_stack_truncates_and_saturates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stack.tiff");

        write_imagej_tiff_u16(&path, &stack())?;

        let data = read_tiff_stack(&path)?;
        assert_eq!(data.dim(), (2, 2, 3));
        assert_eq!(data[[0, 0, 0]], 0.0);
        assert_eq!(data[[1, 0, 2]], 12.0);
        assert_eq!(data[[1, 1, 2]], 65535.0);

        let description = read_image_description(&path)?.unwrap_or_default();
        assert!(description.starts_with("ImageJ="));
        assert!(description.contains("images=2"));

        Ok(())
    }

    #[test]
    fn empty_images_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.tiff");

        assert!(matches!(
            write_imagej_tiff_u16(&path, &Array3::zeros((1, 0, 4))),
            Err(ImcError::InvalidImageDimensions { .. })
        ));

        Ok(())
    }
}
