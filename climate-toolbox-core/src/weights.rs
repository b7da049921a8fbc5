//! Point weight tables
//!
//! A [`PointWeightTable`] lists the sample points used to reduce a gridded field to
//! regions. Each row is one point, located by its `lon`/`lat` pixel centre, and
//! carries any number of named columns holding region ids (`ISO`, `hierid`, ...)
//! and weights (`areawt`, `popwt`, ...). Row order defines the point index.
//!
//! Tables are usually read from CSV with [`PointWeightTable::from_csv_path`], which
//! also applies the clean-up configured in [`TableParameters`]. The caller owns the
//! loaded table and may reuse it across any number of reductions.

use crate::errors::{ToolboxError, ToolboxResult};
use crate::field::FloatValue;
use crate::longitude::wrap_longitude;
use crate::parameters::TableParameters;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Column holding point ids, when present in a CSV file
pub const POINT_ID_COLUMN: &str = "reshape_index";

/// Alternative names accepted for the coordinate columns
const COLUMN_ALIASES: [(&str, &str); 2] = [("pix_cent_x", "lon"), ("pix_cent_y", "lat")];

/// Identifier of a region.
///
/// Ids are compared exactly: `Integer(1)` and `Text("1")` are different regions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionId {
    Integer(i64),
    Text(String),
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionId::Integer(v) => write!(f, "{}", v),
            RegionId::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for RegionId {
    fn from(value: i64) -> Self {
        RegionId::Integer(value)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        RegionId::Text(value.to_string())
    }
}

impl From<String> for RegionId {
    fn from(value: String) -> Self {
        RegionId::Text(value)
    }
}

/// Typed values of one table column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Float(Vec<FloatValue>),
    Integer(Vec<i64>),
    Text(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            ColumnValues::Float(_) => "float",
            ColumnValues::Integer(_) => "integer",
            ColumnValues::Text(_) => "text",
        }
    }

    /// Infer the narrowest column type that holds every raw value.
    ///
    /// Blank and `NA` cells force a float column and are read as NaN.
    fn infer(raw: Vec<String>) -> Self {
        let integers: Option<Vec<i64>> = raw.iter().map(|v| v.parse::<i64>().ok()).collect();
        if let Some(values) = integers {
            return ColumnValues::Integer(values);
        }
        let floats: Option<Vec<FloatValue>> = raw.iter().map(|v| parse_float(v)).collect();
        match floats {
            Some(values) => ColumnValues::Float(values),
            None => ColumnValues::Text(raw),
        }
    }
}

fn parse_float(value: &str) -> Option<FloatValue> {
    match value {
        "" | "NA" => Some(FloatValue::NAN),
        v => v.parse().ok(),
    }
}

/// Sample points with their region ids and weights
#[derive(Debug, Clone, PartialEq)]
pub struct PointWeightTable {
    lon: Vec<FloatValue>,
    lat: Vec<FloatValue>,
    point_ids: Vec<i64>,
    columns: Vec<(String, ColumnValues)>,
}

impl PointWeightTable {
    /// Create a table of points without any region or weight columns.
    ///
    /// Point ids default to the row positions.
    pub fn new(lon: Vec<FloatValue>, lat: Vec<FloatValue>) -> ToolboxResult<Self> {
        if lon.len() != lat.len() {
            return Err(ToolboxError::ColumnLength {
                column: "lat".to_string(),
                expected: lon.len(),
                found: lat.len(),
            });
        }
        let point_ids = (0..lon.len() as i64).collect();
        Ok(Self {
            lon,
            lat,
            point_ids,
            columns: Vec::new(),
        })
    }

    /// Add or replace a named column
    pub fn with_column(mut self, name: &str, values: ColumnValues) -> ToolboxResult<Self> {
        self.check_length(name, values.len())?;
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name.to_string(), values)),
        }
        Ok(self)
    }

    pub fn with_weights(self, name: &str, weights: Vec<FloatValue>) -> ToolboxResult<Self> {
        self.with_column(name, ColumnValues::Float(weights))
    }

    /// Add a region-id column.
    ///
    /// Stored as an integer column when every id is an integer, otherwise as text.
    pub fn with_regions<T: Into<RegionId>>(
        self,
        name: &str,
        ids: impl IntoIterator<Item = T>,
    ) -> ToolboxResult<Self> {
        let ids: Vec<RegionId> = ids.into_iter().map(Into::into).collect();
        let integers: Option<Vec<i64>> = ids
            .iter()
            .map(|id| match id {
                RegionId::Integer(v) => Some(*v),
                RegionId::Text(_) => None,
            })
            .collect();
        let values = match integers {
            Some(values) => ColumnValues::Integer(values),
            None => ColumnValues::Text(ids.iter().map(RegionId::to_string).collect()),
        };
        self.with_column(name, values)
    }

    pub fn with_point_ids(mut self, point_ids: Vec<i64>) -> ToolboxResult<Self> {
        self.check_length(POINT_ID_COLUMN, point_ids.len())?;
        self.point_ids = point_ids;
        Ok(self)
    }

    fn check_length(&self, column: &str, found: usize) -> ToolboxResult<()> {
        if found != self.len() {
            return Err(ToolboxError::ColumnLength {
                column: column.to_string(),
                expected: self.len(),
                found,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    pub fn lon(&self) -> &[FloatValue] {
        &self.lon
    }

    pub fn lat(&self) -> &[FloatValue] {
        &self.lat
    }

    pub fn point_ids(&self) -> &[i64] {
        &self.point_ids
    }

    /// Names of the region and weight columns, in file order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> ToolboxResult<&ColumnValues> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values)
            .ok_or_else(|| ToolboxError::UnknownColumn(name.to_string()))
    }

    /// Values of a weight column as floats.
    ///
    /// Integer columns are converted; text columns cannot be used as weights.
    pub fn weights(&self, name: &str) -> ToolboxResult<Cow<'_, [FloatValue]>> {
        match self.column(name)? {
            ColumnValues::Float(values) => Ok(Cow::Borrowed(values)),
            ColumnValues::Integer(values) => Ok(Cow::Owned(
                values.iter().map(|&v| v as FloatValue).collect(),
            )),
            ColumnValues::Text(_) => Err(ToolboxError::ColumnType {
                column: name.to_string(),
                expected: "weights",
            }),
        }
    }

    /// Values of a region-id column.
    ///
    /// Float columns are rejected since their values cannot be grouped exactly.
    pub fn region_ids(&self, name: &str) -> ToolboxResult<Vec<RegionId>> {
        match self.column(name)? {
            ColumnValues::Integer(values) => Ok(values.iter().map(|&v| v.into()).collect()),
            ColumnValues::Text(values) => Ok(values.iter().map(|v| v.as_str().into()).collect()),
            ColumnValues::Float(_) => Err(ToolboxError::ColumnType {
                column: name.to_string(),
                expected: "region ids",
            }),
        }
    }

    /// Read a table from CSV.
    ///
    /// The header must name `lon` and `lat` columns (or `pix_cent_x` and
    /// `pix_cent_y`). A `reshape_index` column, if present, supplies the point ids;
    /// otherwise each point is identified by its row number in the file. Every other
    /// column is kept and typed as integer, float or text.
    pub fn from_reader<R: Read>(reader: R, params: &TableParameters) -> ToolboxResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| {
                COLUMN_ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == h)
                    .map_or(h, |(_, name)| *name)
                    .to_string()
            })
            .collect();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ToolboxError::UnknownColumn(name.to_string()))
        };
        let lon_col = position("lon")?;
        let lat_col = position("lat")?;
        let id_col = headers.iter().position(|h| h == POINT_ID_COLUMN);

        let mut lon = Vec::new();
        let mut lat = Vec::new();
        let mut point_ids = Vec::new();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let (mut wrapped, mut duplicates) = (0usize, 0usize);

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let coordinate = |col: usize, name: &str| {
                record
                    .get(col)
                    .and_then(|v| v.parse::<FloatValue>().ok())
                    .ok_or_else(|| ToolboxError::ColumnType {
                        column: name.to_string(),
                        expected: if name == "lon" { "longitude" } else { "latitude" },
                    })
            };
            let mut x = coordinate(lon_col, "lon")?;
            let y = coordinate(lat_col, "lat")?;
            if params.fix_longitude && x > 180.0 {
                x = wrap_longitude(x);
                wrapped += 1;
            }

            if params.drop_duplicates {
                // Compare on the cleaned coordinates so a wrapped boundary pixel
                // matches a row already given in -180..180
                let key: Vec<String> = record
                    .iter()
                    .enumerate()
                    .map(|(col, v)| match col {
                        c if c == lon_col => x.to_bits().to_string(),
                        c if Some(c) == id_col => String::new(),
                        _ => v.to_string(),
                    })
                    .collect();
                if !seen.insert(key) {
                    duplicates += 1;
                    continue;
                }
            }

            let id = match id_col {
                Some(col) => record
                    .get(col)
                    .and_then(|v| v.parse::<i64>().ok())
                    .ok_or_else(|| ToolboxError::ColumnType {
                        column: POINT_ID_COLUMN.to_string(),
                        expected: "integer point ids",
                    })?,
                None => row as i64,
            };
            lon.push(x);
            lat.push(y);
            point_ids.push(id);
            for (col, values) in raw.iter_mut().enumerate() {
                values.push(record.get(col).unwrap_or_default().to_string());
            }
        }

        let mut table = Self::new(lon, lat)?.with_point_ids(point_ids)?;
        for (col, (name, values)) in headers.iter().zip(raw).enumerate() {
            if col == lon_col || col == lat_col || Some(col) == id_col {
                continue;
            }
            let values = ColumnValues::infer(values);
            debug!(column = %name, kind = values.kind(), "Read weights column");
            table = table.with_column(name, values)?;
        }

        info!(
            points = table.len(),
            columns = table.columns.len(),
            wrapped,
            duplicates,
            "Loaded weights table"
        );
        Ok(table)
    }

    pub fn from_csv_path(path: impl AsRef<Path>, params: &TableParameters) -> ToolboxResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), params)
    }
}
