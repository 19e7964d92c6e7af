use super::CtrlTree;
use crate::error::{Result, WarnError};
use crate::types::ControlPoint;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One row of the control point table.
///
/// Column names follow the shipped `ctrls` table (`id, la, lo, sp, st`).
/// The remaining columns (`ve, ty, co, ne`) are accepted and ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CtrlRow {
    pub id: i64,
    #[serde(alias = "latitude")]
    pub la: f64,
    #[serde(alias = "longitude")]
    pub lo: f64,
    #[serde(default, alias = "speed")]
    pub sp: Option<u32>,
    #[serde(default, alias = "description")]
    pub st: Option<String>,
}

impl CtrlRow {
    fn into_point(self) -> Option<ControlPoint> {
        let valid = self.la.is_finite()
            && self.lo.is_finite()
            && self.la.abs() <= 90.0
            && self.lo.abs() <= 180.0;
        if !valid {
            log::warn!(
                "Skipping control point {}: bad coordinates ({}, {})",
                self.id,
                self.la,
                self.lo
            );
            return None;
        }

        Some(ControlPoint {
            id: self.id,
            latitude: self.la,
            longitude: self.lo,
            speed_limit: self.sp.unwrap_or(0),
            description: self.st.unwrap_or_default(),
        })
    }
}

/// Parse a JSON array of rows into control points
pub fn parse_dataset(json: &str) -> Result<Vec<ControlPoint>> {
    let rows: Vec<CtrlRow> = serde_json::from_str(json)
        .map_err(|e| WarnError::Dataset(format!("Failed to parse dataset: {}", e)))?;
    Ok(rows.into_iter().filter_map(CtrlRow::into_point).collect())
}

fn read_rows<R: Read>(reader: R) -> Result<Vec<ControlPoint>> {
    let rows: Vec<CtrlRow> = serde_json::from_reader(BufReader::new(reader))
        .map_err(|e| WarnError::Dataset(format!("Failed to parse dataset: {}", e)))?;
    Ok(rows.into_iter().filter_map(CtrlRow::into_point).collect())
}

/// Load the dataset (`.json` or gzip-compressed `.json.gz`) into an R-Tree
pub fn load_dataset(path: &Path) -> Result<CtrlTree> {
    let file = File::open(path).map_err(|e| {
        WarnError::Dataset(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let points = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        read_rows(GzDecoder::new(file))?
    } else {
        read_rows(file)?
    };

    let tree = CtrlTree::from_points(points);
    log::info!("{} controls found in {}", tree.len(), path.display());
    Ok(tree)
}
