use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{error::Result, Acquisition};

/// Where the image of an acquisition was (last) read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionOrigin {
    /// The .mcd file
    Mcd,
    /// A stand-alone .txt export
    Txt,
}

impl fmt::Display for AcquisitionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AcquisitionOrigin::Mcd => write!(f, "mcd"),
            AcquisitionOrigin::Txt => write!(f, "txt"),
        }
    }
}

/// One row of the acquisition metadata table, describing a single acquisition and the outcome of its extraction.
///
/// Numeric attributes that are missing (or cannot be parsed) are `NaN`; text attributes are kept verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionMetadata {
    /// File stem of the .mcd file
    #[serde(rename = "AcSession")]
    pub ac_session: String,
    /// ID of the slide the acquisition belongs to
    pub slide_id: u16,
    /// Source of the extracted image
    pub origin: AcquisitionOrigin,
    /// File the image was read from
    pub source_path: PathBuf,
    /// Acquisition ID
    pub id: u16,
    #[allow(missing_docs)]
    pub description: String,
    #[allow(missing_docs)]
    pub ablation_power: f64,
    #[allow(missing_docs)]
    pub ablation_distance_between_shots_x: f64,
    #[allow(missing_docs)]
    pub ablation_distance_between_shots_y: f64,
    #[allow(missing_docs)]
    pub ablation_frequency: f64,
    #[allow(missing_docs)]
    pub signal_type: String,
    #[allow(missing_docs)]
    pub dual_count_start: String,
    #[allow(missing_docs)]
    pub start_timestamp: String,
    #[allow(missing_docs)]
    pub end_timestamp: String,
    #[allow(missing_docs)]
    pub roi_start_x_pos_um: f64,
    #[allow(missing_docs)]
    pub roi_start_y_pos_um: f64,
    #[allow(missing_docs)]
    pub roi_end_x_pos_um: f64,
    #[allow(missing_docs)]
    pub roi_end_y_pos_um: f64,
    #[allow(missing_docs)]
    pub movement_type: String,
    #[allow(missing_docs)]
    pub segment_data_format: String,
    #[allow(missing_docs)]
    pub value_bytes: f64,
    #[allow(missing_docs)]
    pub max_x: f64,
    #[allow(missing_docs)]
    pub max_y: f64,
    #[allow(missing_docs)]
    pub plume_start: f64,
    #[allow(missing_docs)]
    pub plume_end: f64,
    #[allow(missing_docs)]
    pub template: String,
    /// Whether an image was written for the acquisition
    pub is_valid: bool,
}

fn number(metadata: &HashMap<String, String>, key: &str) -> f64 {
    metadata
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(f64::NAN)
}

fn text(metadata: &HashMap<String, String>, key: &str) -> String {
    metadata.get(key).cloned().unwrap_or_default()
}

impl AcquisitionMetadata {
    /// Describe `acquisition` of the session `ac_session` (the .mcd file stem)
    pub fn new(
        ac_session: &str,
        acquisition: &Acquisition,
        origin: AcquisitionOrigin,
        source_path: &Path,
        is_valid: bool,
    ) -> Self {
        let metadata = acquisition.metadata();

        AcquisitionMetadata {
            ac_session: ac_session.to_string(),
            slide_id: acquisition.slide_id(),
            origin,
            source_path: source_path.to_path_buf(),
            id: acquisition.id(),
            description: acquisition.description().to_string(),
            ablation_power: number(metadata, "AblationPower"),
            ablation_distance_between_shots_x: number(metadata, "AblationDistanceBetweenShotsX"),
            ablation_distance_between_shots_y: number(metadata, "AblationDistanceBetweenShotsY"),
            ablation_frequency: number(metadata, "AblationFrequency"),
            signal_type: text(metadata, "SignalType"),
            dual_count_start: text(metadata, "DualCountStart"),
            start_timestamp: text(metadata, "StartTimeStamp"),
            end_timestamp: text(metadata, "EndTimeStamp"),
            roi_start_x_pos_um: number(metadata, "ROIStartXPosUm"),
            roi_start_y_pos_um: number(metadata, "ROIStartYPosUm"),
            roi_end_x_pos_um: number(metadata, "ROIEndXPosUm"),
            roi_end_y_pos_um: number(metadata, "ROIEndYPosUm"),
            movement_type: text(metadata, "MovementType"),
            segment_data_format: text(metadata, "SegmentDataFormat"),
            value_bytes: number(metadata, "ValueBytes"),
            max_x: number(metadata, "MaxX"),
            max_y: number(metadata, "MaxY"),
            plume_start: number(metadata, "PlumeStart"),
            plume_end: number(metadata, "PlumeEnd"),
            template: text(metadata, "Template"),
            is_valid,
        }
    }
}

/// Write the acquisition metadata table, one row per acquisition
pub fn write_acquisition_metadata<P: AsRef<Path>>(path: P, rows: &[AcquisitionMetadata]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_numbers_are_nan() -> Result<()> {
        let acquisition = Acquisition::new(5, 0, &["Ir191"], &[""])?.with_metadata(HashMap::from([
            ("AblationPower".to_string(), "50".to_string()),
            ("ROIStartXPosUm".to_string(), "not a number".to_string()),
            ("SignalType".to_string(), "Dual".to_string()),
        ]));

        let row = AcquisitionMetadata::new(
            "run2",
            &acquisition,
            AcquisitionOrigin::Txt,
            Path::new("run2_5.txt"),
            true,
        );

        assert_eq!(row.ablation_power, 50.0);
        assert!(row.roi_start_x_pos_um.is_nan());
        assert!(row.plume_end.is_nan());
        assert_eq!(row.signal_type, "Dual");
        assert_eq!(row.template, "");

        Ok(())
    }

    #[test]
    fn writes_one_row_per_acquisition() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("acquisition_metadata.csv");

        let acquisition = Acquisition::new(3, 0, &["Ir191"], &["DNA1"])?;
        let rows = [AcquisitionMetadata::new(
            "run1",
            &acquisition,
            AcquisitionOrigin::Mcd,
            Path::new("run1.mcd"),
            false,
        )];
        write_acquisition_metadata(&path, &rows)?;

        let contents = std::fs::read_to_string(&path)?;
        let mut lines = contents.lines();

        assert_eq!(
            lines.next(),
            Some("AcSession,slide_id,origin,source_path,id,description,ablation_power,ablation_distance_between_shots_x,ablation_distance_between_shots_y,ablation_frequency,signal_type,dual_count_start,start_timestamp,end_timestamp,roi_start_x_pos_um,roi_start_y_pos_um,roi_end_x_pos_um,roi_end_y_pos_um,movement_type,segment_data_format,value_bytes,max_x,max_y,plume_start,plume_end,template,is_valid")
        );
        let row = lines.next().unwrap_or_default();
        assert!(row.starts_with("run1,0,mcd,run1.mcd,3,,NaN,"));
        assert!(row.ends_with(",false"));
        assert_eq!(lines.next(), None);

        Ok(())
    }
}
