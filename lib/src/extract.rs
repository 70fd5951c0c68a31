//! Extraction of every slide, panorama and acquisition of an .mcd file into a directory.
//!
//! Each entity is extracted independently: a failure is logged and recorded (for acquisitions, as an invalid
//! row of the metadata table) without affecting its siblings. Acquisitions which cannot be read from the .mcd
//! file are restored from a matching .txt export when exactly one is available.

use std::{
    fs,
    path::{Path, PathBuf},
};

use ndarray::{Array3, Axis};
use tracing::{debug, error, info, warn};

use crate::{
    channel::write_channel_table,
    error::{ImcError, Result},
    images::{ome_xml, write_ome_tiff},
    matching::acquisition_txt_files,
    metadata::{AcquisitionMetadata, AcquisitionOrigin},
    reader::{ContainerReader, TxtAcquisition, TxtReader},
    Acquisition, McdFile, Panorama, Slide, TxtFile,
};

fn container_stem(container: &impl ContainerReader) -> String {
    container
        .path()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn container_name(container: &impl ContainerReader) -> String {
    container
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Open the .mcd file at `mcd_path` and extract it into `acquisition_dir`, restoring unreadable acquisitions
/// from `txt_files` with [`TxtFile`]. See [`extract_mcd_file`].
pub fn extract_mcd_path<P: AsRef<Path>, Q: AsRef<Path>>(
    mcd_path: P,
    acquisition_dir: Q,
    txt_files: Option<&[PathBuf]>,
) -> Result<Vec<AcquisitionMetadata>> {
    let mcd = McdFile::open(mcd_path)?;

    extract_mcd_file(&mcd, &TxtFile, acquisition_dir, txt_files)
}

/// Extract the schema, slide images, panorama images and acquisitions of `container` into `acquisition_dir`.
///
/// Files are named after the stem of the container: `<stem>_schema.xml`, `<stem>_s<slide>_slide.png`,
/// `<stem>_s<slide>_p<panorama>_pano.png` and, per acquisition, `<stem>_s<slide>_a<acquisition>_ac.ome.tiff`
/// with the channel table `<stem>_s<slide>_a<acquisition>_ac.csv`.
///
/// An acquisition that cannot be read from the container is restored from `txt_files` when exactly one of
/// them has a file stem ending in `_<acquisition id>`.
///
/// Returns one metadata row per acquisition, in slide and acquisition order, including acquisitions for which
/// no image could be written. The only error returned is a failure to create `acquisition_dir`.
pub fn extract_mcd_file<C, T, P>(
    container: &C,
    txt_reader: &T,
    acquisition_dir: P,
    txt_files: Option<&[PathBuf]>,
) -> Result<Vec<AcquisitionMetadata>>
where
    C: ContainerReader,
    T: TxtReader,
    P: AsRef<Path>,
{
    let acquisition_dir = acquisition_dir.as_ref();
    fs::create_dir_all(acquisition_dir)?;

    let stem = container_stem(container);

    let schema_xml = match container.schema_xml() {
        Ok(schema_xml) => {
            let schema_file = acquisition_dir.join(format!("{}_schema.xml", stem));
            if let Err(err) = fs::write(&schema_file, &schema_xml) {
                error!(
                    "Error writing schema XML of file {} to {}: {}",
                    container_name(container),
                    schema_file.display(),
                    err
                );
            }

            Some(schema_xml.replace("\r\n", ""))
        }
        Err(err) => {
            error!(
                "Error reading schema XML from file {}: {}",
                container_name(container),
                err
            );
            None
        }
    };

    let mut rows = Vec::new();

    for slide in container.slides() {
        let slide_stem = format!("{}_s{}", stem, slide.id());

        extract_slide(
            container,
            slide,
            &acquisition_dir.join(format!("{}_slide.png", slide_stem)),
        );

        for panorama in slide.panoramas() {
            extract_panorama(
                container,
                panorama,
                &acquisition_dir.join(format!("{}_p{}_pano.png", slide_stem, panorama.id())),
            );
        }

        for acquisition in slide.acquisitions() {
            let files = AcquisitionFiles {
                image: acquisition_dir.join(format!("{}_a{}_ac.ome.tiff", slide_stem, acquisition.id())),
                channels: acquisition_dir.join(format!("{}_a{}_ac.csv", slide_stem, acquisition.id())),
                schema_xml: schema_xml.as_deref(),
            };

            let mut origin = AcquisitionOrigin::Mcd;
            let mut source_path = container.path().to_path_buf();

            let mut is_valid = match container
                .read_acquisition(acquisition)
                .and_then(|data| files.write(acquisition, &data))
            {
                Ok(()) => true,
                Err(err) => {
                    error!(
                        "Error reading acquisition {} from file {}: {}",
                        acquisition.id(),
                        container_name(container),
                        err
                    );
                    false
                }
            };

            if let (false, Some(txt_files)) = (is_valid, txt_files) {
                let candidates = acquisition_txt_files(txt_files, acquisition.id());

                match candidates.as_slice() {
                    [] => debug!(
                        "No .txt file found for acquisition {} in {}",
                        acquisition.id(),
                        container_name(container)
                    ),
                    [txt_file] => {
                        info!(
                            "Attempting to restore acquisition {} from file {}",
                            acquisition.id(),
                            txt_file.display()
                        );

                        match txt_reader
                            .read_txt(txt_file)
                            .and_then(|restored| restore_channel_order(acquisition, restored))
                            .and_then(|data| files.write(acquisition, &data))
                        {
                            Ok(()) => {
                                is_valid = true;
                                origin = AcquisitionOrigin::Txt;
                                source_path = txt_file.clone();
                            }
                            Err(err) => error!(
                                "Error restoring acquisition {} for file {} from file {}: {}",
                                acquisition.id(),
                                container_name(container),
                                txt_file.display(),
                                err
                            ),
                        }
                    }
                    _ => warn!(
                        "Multiple .txt files found for acquisition {} in {}: {:?}",
                        acquisition.id(),
                        container_name(container),
                        candidates
                    ),
                }
            }

            rows.push(AcquisitionMetadata::new(
                &stem,
                acquisition,
                origin,
                &source_path,
                is_valid,
            ));
        }
    }

    Ok(rows)
}

fn extract_slide(container: &impl ContainerReader, slide: &Slide, slide_file: &Path) {
    let result = container.read_slide(slide).and_then(|image| match image {
        Some(image) => Ok(image.save(slide_file)?),
        None => Ok(()),
    });

    if let Err(err) = result {
        error!(
            "Error reading slide {} from file {}: {}",
            slide.id(),
            container_name(container),
            err
        );
    }
}

fn extract_panorama(container: &impl ContainerReader, panorama: &Panorama, panorama_file: &Path) {
    let result = container.read_panorama(panorama).and_then(|image| match image {
        Some(image) => Ok(image.save(panorama_file)?),
        None => Ok(()),
    });

    if let Err(err) = result {
        error!(
            "Error reading panorama {} from file {}: {}",
            panorama.id(),
            container_name(container),
            err
        );
    }
}

struct AcquisitionFiles<'a> {
    image: PathBuf,
    channels: PathBuf,
    schema_xml: Option<&'a str>,
}

impl AcquisitionFiles<'_> {
    /// Write the channel table, followed by the acquisition image as OME-TIFF.
    ///
    /// On failure neither file is left behind.
    fn write(&self, acquisition: &Acquisition, data: &Array3<f32>) -> Result<()> {
        let channels = acquisition.channels();
        if data.dim().0 != channels.len() {
            return Err(ImcError::ChannelCountMismatch {
                image: self.image.clone(),
                image_channels: data.dim().0,
                table_channels: channels.len(),
            });
        }

        let channel_names = channels
            .iter()
            .map(|channel| channel.label_or_name())
            .collect::<Vec<_>>();
        let channel_fluors = acquisition.channel_names();

        let image_name = self
            .image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let xml = ome_xml(
            &image_name,
            data.dim(),
            &channel_names,
            &channel_fluors,
            self.schema_xml,
        )?;

        write_channel_table(&self.channels, channels)?;

        if let Err(err) = write_ome_tiff(&self.image, data, &xml) {
            let _ = fs::remove_file(&self.image);
            let _ = fs::remove_file(&self.channels);

            return Err(err);
        }

        Ok(())
    }
}

/// Arrange the channels of a restored acquisition in the channel order of the .mcd acquisition.
///
/// Both must describe the same set of channels.
fn restore_channel_order(acquisition: &Acquisition, restored: TxtAcquisition) -> Result<Array3<f32>> {
    let mismatch = || ImcError::ChannelSetMismatch {
        expected: acquisition
            .channel_names()
            .into_iter()
            .map(String::from)
            .collect(),
        found: restored
            .channels
            .iter()
            .map(|channel| channel.name().to_string())
            .collect(),
    };

    if restored.channels.len() != acquisition.channels().len()
        || restored.data.dim().0 != restored.channels.len()
    {
        return Err(mismatch());
    }

    let indices = acquisition
        .channels()
        .iter()
        .map(|channel| {
            restored
                .channels
                .iter()
                .position(|restored| restored.name() == channel.name())
                .ok_or_else(mismatch)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(restored.data.select(Axis(0), &indices))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::AcquisitionChannel;

    #[test]
    fn restored_channels_follow_mcd_order() -> Result<()> {
        let acquisition = Acquisition::new(5, 0, &["Ir191", "Yb171"], &["DNA1", "CD3"])?;
        let restored = TxtAcquisition {
            channels: vec![
                AcquisitionChannel::new("Yb171", "CD3"),
                AcquisitionChannel::new("Ir191", "DNA1"),
            ],
            data: array![[[2.0f32]], [[1.0]]],
        };

        let data = restore_channel_order(&acquisition, restored)?;

        assert_eq!(data, array![[[1.0f32]], [[2.0]]]);

        Ok(())
    }

    #[test]
    fn restored_channels_must_match() -> Result<()> {
        let acquisition = Acquisition::new(5, 0, &["Ir191", "Yb171"], &["DNA1", "CD3"])?;
        let restored = TxtAcquisition {
            channels: vec![
                AcquisitionChannel::new("Ir191", "DNA1"),
                AcquisitionChannel::new("Pt195", ""),
            ],
            data: Array3::zeros((2, 1, 1)),
        };

        assert!(matches!(
            restore_channel_order(&acquisition, restored),
            Err(ImcError::ChannelSetMismatch { .. })
        ));

        Ok(())
    }
}
