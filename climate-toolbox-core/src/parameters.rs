//! Parameters controlling hole filling, table preparation and regional aggregation
//!
//! All parameter structs deserialize with defaults for missing fields so a
//! configuration file only needs to name what it changes:
//!
//! ```toml
//! [fill]
//! method = "nearest"
//! max_attempts = 20
//!
//! [aggregation]
//! aggwt = "popwt"
//! agglev = "hierid"
//! ```

use crate::errors::ToolboxResult;
use crate::field::FloatValue;
use crate::interpolate::ScatteredMethod;
use crate::mask::DEFAULT_SENTINEL;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Order in which missing patches are visited by the fill loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOrder {
    /// Cycle through the current patches, one per attempt
    #[default]
    RoundRobin,
    /// Always process the patch with the most missing cells
    LargestFirst,
    /// Uniformly random patch from a generator seeded per slice
    Random { seed: u64 },
}

/// Parameters for the iterative hole filling of gridded fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillParameters {
    /// Initial number of attempts per slice.
    ///
    /// Raised to twice the number of patches whenever that is larger.
    ///
    /// Default: 10
    pub max_attempts: usize,

    /// Values at or above this threshold are treated as missing.
    ///
    /// Default: 1e10
    pub sentinel: FloatValue,

    /// Scattered interpolation method used inside each grown window.
    ///
    /// Default: linear
    pub method: ScatteredMethod,

    /// Patch visiting order.
    ///
    /// Default: round_robin
    pub patch_order: PatchOrder,

    /// Fill independent broadcast slices on the rayon thread pool.
    ///
    /// Default: false
    pub parallel: bool,
}

impl Default for FillParameters {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            sentinel: DEFAULT_SENTINEL,
            method: ScatteredMethod::Linear,
            patch_order: PatchOrder::RoundRobin,
            parallel: false,
        }
    }
}

/// How table coordinates are matched against grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointLookup {
    /// Coordinates must be bitwise-equal floats; a miss is an error
    #[default]
    Exact,
    /// Closest coordinate within the given absolute tolerance; a miss is an error
    Tolerance(FloatValue),
    /// Exact match, with misses producing NaN samples instead of an error
    MissingAsNan,
}

/// Parameters for the weighted reduction of sample points to regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParameters {
    /// Weight column (e.g. `popwt`, `areawt`, `cropwt`)
    ///
    /// Default: "popwt"
    pub aggwt: String,

    /// Region-id column selecting the regional scheme (e.g. `ISO`, `hierid`)
    ///
    /// Default: "hierid"
    pub agglev: String,

    /// Weight column substituted where `aggwt` is missing or non-positive
    ///
    /// Default: "areawt"
    pub backup_aggwt: String,

    /// Grid lookup policy for table coordinates
    ///
    /// Default: exact
    pub lookup: PointLookup,
}

impl Default for AggregationParameters {
    fn default() -> Self {
        Self {
            aggwt: "popwt".to_string(),
            agglev: "hierid".to_string(),
            backup_aggwt: "areawt".to_string(),
            lookup: PointLookup::Exact,
        }
    }
}

impl AggregationParameters {
    pub fn new(aggwt: &str, agglev: &str) -> Self {
        Self {
            aggwt: aggwt.to_string(),
            agglev: agglev.to_string(),
            ..Default::default()
        }
    }

    pub fn with_backup(mut self, backup_aggwt: &str) -> Self {
        self.backup_aggwt = backup_aggwt.to_string();
        self
    }

    pub fn with_lookup(mut self, lookup: PointLookup) -> Self {
        self.lookup = lookup;
        self
    }
}

/// Parameters applied when loading a weights table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableParameters {
    /// Wrap longitudes above 180 (e.g. the 180.125 boundary pixel centre) by -360
    ///
    /// Default: true
    pub fix_longitude: bool,

    /// Drop rows that exactly repeat an earlier row
    ///
    /// Default: true
    pub drop_duplicates: bool,
}

impl Default for TableParameters {
    fn default() -> Self {
        Self {
            fix_longitude: true,
            drop_duplicates: true,
        }
    }
}

/// Complete configuration, as read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolboxConfig {
    pub fill: FillParameters,
    pub aggregation: AggregationParameters,
    pub table: TableParameters,
}

impl ToolboxConfig {
    pub fn from_toml_str(source: &str) -> ToolboxResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ToolboxResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
