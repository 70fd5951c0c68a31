use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::error::{ImcError, Result};

/// The antibody panel: one row per metal tag, with columns flagging (`1`/`0`) the tags used for each purpose
#[derive(Debug, Clone)]
pub struct Panel {
    location: PathBuf,
    headers: StringRecord,
    metal_column: usize,
    rows: Vec<StringRecord>,
}

impl Panel {
    /// Read the panel .csv file at `path`, whose metal tags are listed in the column `metal_column`
    pub fn from_path<P: AsRef<Path>>(path: P, metal_column: &str) -> Result<Self> {
        let location = path.as_ref().to_path_buf();

        let mut reader = csv::Reader::from_path(&location)?;
        let headers = reader.headers()?.clone();

        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        let mut panel = Panel {
            location,
            headers,
            metal_column: 0,
            rows,
        };
        panel.metal_column = panel.column(metal_column)?;

        Ok(panel)
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| ImcError::MissingColumn {
                column: name.to_string(),
                path: self.location.clone(),
            })
    }

    /// Returns all metal tags, in panel order
    pub fn metals(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(self.metal_column))
            .map(|metal| metal.trim().to_string())
            .collect()
    }

    /// Returns the metal tags flagged in `flag_column` (a non-zero number), in panel order
    pub fn channels(&self, flag_column: &str) -> Result<Vec<String>> {
        let flag_column = self.column(flag_column)?;

        Ok(self
            .rows
            .iter()
            .filter(|row| {
                row.get(flag_column)
                    .and_then(|flag| flag.trim().parse::<f64>().ok())
                    .map_or(false, |flag| flag != 0.0)
            })
            .filter_map(|row| row.get(self.metal_column))
            .map(|metal| metal.trim().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_panel(dir: &Path) -> Result<PathBuf> {
        let path = dir.join("panel.csv");
        std::fs::write(
            &path,
            "Metal Tag,Target,full,ilastik\nIn113,Histone H3,1,0\nYb171,CD3,1.0,1\nIr191,DNA1,1,1\nPt195,empty,,\nLa139,control,0,0\n",
        )?;

        Ok(path)
    }

    #[test]
    fn selects_flagged_channels_in_panel_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let panel = Panel::from_path(write_panel(dir.path())?, "Metal Tag")?;

        assert_eq!(panel.channels("full")?, vec!["In113", "Yb171", "Ir191"]);
        assert_eq!(panel.channels("ilastik")?, vec!["Yb171", "Ir191"]);
        assert_eq!(panel.metals().len(), 5);

        Ok(())
    }

    #[test]
    fn unknown_columns_are_reported() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_panel(dir.path())?;

        assert!(matches!(
            Panel::from_path(&path, "Metal"),
            Err(ImcError::MissingColumn { .. })
        ));

        let panel = Panel::from_path(&path, "Metal Tag")?;
        assert!(matches!(
            panel.channels("segmentation"),
            Err(ImcError::MissingColumn { .. })
        ));

        Ok(())
    }
}
