//! JSON documents read and written by the command line tool
//!
//! A grid document holds one variable:
//!
//! ```json
//! {
//!   "variable": "tas",
//!   "dims": ["time", "lat", "lon"],
//!   "coords": {"time": [2000, 2001], "lat": [...], "lon": [...]},
//!   "values": [...]
//! }
//! ```
//!
//! `values` is flat in row-major order over `dims`. JSON has no NaN, so missing
//! cells are written as `null`.

use climate_toolbox_core::aggregate::RegionAggregate;
use climate_toolbox_core::field::{Axis, FloatValue, GriddedField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Dimension '{0}' has no coordinates")]
    MissingCoordinates(String),
    #[error(transparent)]
    Toolbox(#[from] climate_toolbox_core::errors::ToolboxError),
    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDocument {
    pub variable: String,
    pub dims: Vec<String>,
    pub coords: BTreeMap<String, Vec<FloatValue>>,
    pub values: Vec<Option<FloatValue>>,
}

impl GridDocument {
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn into_field(
        self,
        lat_name: &str,
        lon_name: &str,
    ) -> Result<GriddedField, DocumentError> {
        let axes = self
            .dims
            .iter()
            .map(|name| {
                self.coords
                    .get(name)
                    .map(|c| Axis::new(name, c.clone()))
                    .ok_or_else(|| DocumentError::MissingCoordinates(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let values = self
            .values
            .into_iter()
            .map(|v| v.unwrap_or(FloatValue::NAN))
            .collect();
        Ok(GriddedField::from_shape_vec(axes, values, lat_name, lon_name)?)
    }

    pub fn from_field(variable: &str, field: &GriddedField) -> Self {
        Self {
            variable: variable.to_string(),
            dims: field.axes().iter().map(|a| a.name.clone()).collect(),
            coords: field
                .axes()
                .iter()
                .map(|a| (a.name.clone(), a.coords.to_vec()))
                .collect(),
            values: field
                .values()
                .iter()
                .map(|&v| if v.is_nan() { None } else { Some(v) })
                .collect(),
        }
    }
}

/// Regional averages of one variable
#[derive(Debug, Serialize)]
pub struct AggregateDocument<'a> {
    pub variable: &'a str,
    #[serde(flatten)]
    pub aggregate: &'a RegionAggregate,
}

pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), DocumentError> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
        }
        None => {
            serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
            println!();
        }
    }
    Ok(())
}
