use thiserror::Error;

/// Error type for invalid operations.
///
/// Every variant is a caller input problem and is surfaced immediately. Recoverable
/// conditions (an exhausted fill budget, an underdetermined interpolation window) are
/// reported through [`crate::fill::FillReport`] and logged instead.
#[derive(Error, Debug)]
pub enum ToolboxError {
    #[error("Expected exactly one longitude axis among {candidates:?}, found {found:?}")]
    AmbiguousSpatialAxis {
        candidates: Vec<String>,
        found: Vec<String>,
    },
    #[error("Axis '{0}' does not exist")]
    UnknownAxis(String),
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("Coordinates of axis '{axis}' must be strictly monotonic (problem at position {position})")]
    NonMonotonicCoordinate { axis: String, position: usize },
    #[error("Table row {row} (lon={lon}, lat={lat}) has no matching grid cell")]
    PointLookupMiss {
        row: usize,
        lon: f64,
        lat: f64,
    },
    #[error("Column '{0}' is not present in the weights table")]
    UnknownColumn(String),
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Column '{column}' cannot be used as {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
    #[error("Could not parse weights table: {0}")]
    TableParse(#[from] csv::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, ToolboxError>`.
pub type ToolboxResult<T> = Result<T, ToolboxError>;
