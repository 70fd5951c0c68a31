use std::path::Path;

use ndarray::Array3;
use regex::Regex;

use crate::{
    error::{ImcError, Result},
    reader::{cube_shape, TxtAcquisition, TxtReader},
    AcquisitionChannel,
};

/// Columns preceding the channel columns in a .txt export
const LEADING_COLUMNS: [&str; 6] = ["Start_push", "End_push", "Pushes_duration", "X", "Y", "Z"];

const CHANNEL_PATTERN: &str = r"^(?P<label>.*)\((?P<metal>[a-zA-Z]+)(?P<mass>[0-9]+)[^0-9]*\)$";

/// Reader for the tab-separated .txt files exported alongside an .mcd file (one per acquisition).
///
/// The header lists `Start_push`, `End_push`, `Pushes_duration`, `X`, `Y`, `Z` followed by one column per
/// channel, formatted `<label>(<metal><mass>Di)`, e.g. `191Ir_DNA1(Ir191Di)`. Each further row is one pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxtFile;

impl TxtFile {
    /// Read the acquisition stored in the .txt file at `path`
    pub fn read(path: &Path) -> Result<TxtAcquisition> {
        let invalid = |reason: String| ImcError::InvalidTxt {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|error| invalid(error.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|error| invalid(error.to_string()))?
            .clone();

        if headers.len() < LEADING_COLUMNS.len()
            || headers
                .iter()
                .zip(LEADING_COLUMNS)
                .any(|(header, expected)| header.trim() != expected)
        {
            return Err(invalid(format!(
                "expected the columns {:?} at the start of the header",
                LEADING_COLUMNS
            )));
        }

        let pattern = Regex::new(CHANNEL_PATTERN)?;
        let channels = headers
            .iter()
            .skip(LEADING_COLUMNS.len())
            .map(|header| {
                parse_channel_header(&pattern, header.trim())
                    .ok_or_else(|| invalid(format!("invalid channel column `{}`", header)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut pixels = Vec::new();
        let mut width = 0;
        let mut height = 0;

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|error| invalid(error.to_string()))?;

            let values = record
                .iter()
                .map(|value| value.trim().parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|error| invalid(format!("row {}: {}", row + 1, error)))?;

            let (x, y) = (values[3], values[4]);
            if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
                return Err(invalid(format!(
                    "row {}: invalid pixel coordinates ({}, {})",
                    row + 1,
                    x,
                    y
                )));
            }

            width = width.max((x as usize).saturating_add(1));
            height = height.max((y as usize).saturating_add(1));
            pixels.push(values);
        }

        if pixels.is_empty() {
            return Err(invalid("no pixel data".to_string()));
        }

        let shape = cube_shape(channels.len(), width, height, pixels.len()).map_err(invalid)?;

        let mut data = Array3::zeros(shape);
        for values in pixels {
            let (x, y) = (values[3] as usize, values[4] as usize);

            for (channel, value) in values[LEADING_COLUMNS.len()..].iter().enumerate() {
                data[[channel, y, x]] = *value;
            }
        }

        Ok(TxtAcquisition { channels, data })
    }
}

impl TxtReader for TxtFile {
    fn read_txt(&self, path: &Path) -> Result<TxtAcquisition> {
        TxtFile::read(path)
    }
}

/// Parses a channel column header such as `191Ir_DNA1(Ir191Di)` into name `Ir191` and label `191Ir_DNA1`
fn parse_channel_header(pattern: &Regex, header: &str) -> Option<AcquisitionChannel> {
    let captures = pattern.captures(header)?;

    let name = format!("{}{}", &captures["metal"], &captures["mass"]);

    Some(AcquisitionChannel::new(&name, &captures["label"]))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str =
        "Start_push\tEnd_push\tPushes_duration\tX\tY\tZ\t191Ir_DNA1(Ir191Di)\tCD3(Yb171Di)";

    fn write_txt(dir: &Path, name: &str, contents: &str) -> Result<std::path::PathBuf> {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path)?;
        file.write_all(contents.as_bytes())?;

        Ok(path)
    }

    #[test]
    fn parses_channel_headers() {
        let pattern = Regex::new(CHANNEL_PATTERN).unwrap();

        let channel = parse_channel_header(&pattern, "191Ir_DNA1(Ir191Di)").unwrap();
        assert_eq!(channel, AcquisitionChannel::new("Ir191", "191Ir_DNA1"));

        let channel = parse_channel_header(&pattern, "(Pt195Di)").unwrap();
        assert_eq!(channel, AcquisitionChannel::new("Pt195", ""));

        assert!(parse_channel_header(&pattern, "Background").is_none());
    }

    #[test]
    fn reads_pixels_into_cube() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_txt(
            dir.path(),
            "run2_5.txt",
            &format!(
                "{}\n0\t1\t1\t0\t0\t0\t1\t10\n1\t2\t1\t1\t0\t0\t2\t20\n2\t3\t1\t0\t1\t0\t3\t30\n3\t4\t1\t1\t1\t0\t4\t40\n",
                HEADER
            ),
        )?;

        let acquisition = TxtFile.read_txt(&path)?;

        assert_eq!(
            acquisition.channels,
            vec![
                AcquisitionChannel::new("Ir191", "191Ir_DNA1"),
                AcquisitionChannel::new("Yb171", "CD3"),
            ]
        );
        assert_eq!(acquisition.data.shape(), &[2, 2, 2]);
        assert_eq!(acquisition.data[[0, 1, 0]], 3.0);
        assert_eq!(acquisition.data[[1, 0, 1]], 20.0);

        Ok(())
    }

    #[test]
    fn truncated_rows_are_invalid() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_txt(
            dir.path(),
            "run2_5.txt",
            &format!("{}\n0\t1\t1\t0\t0\t0\t1\t10\n1\t2\t1\t1\t0\n", HEADER),
        )?;

        assert!(matches!(
            TxtFile::read(&path),
            Err(ImcError::InvalidTxt { .. })
        ));

        Ok(())
    }

    #[test]
    fn out_of_range_coordinates_are_invalid() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_txt(
            dir.path(),
            "run2_5.txt",
            &format!("{}\n0\t1\t1\t3000000000\t3000000000\t0\t1\t10\n", HEADER),
        )?;

        assert!(matches!(
            TxtFile::read(&path),
            Err(ImcError::InvalidTxt { .. })
        ));

        Ok(())
    }
}
