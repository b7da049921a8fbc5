//! Python bindings
//!
//! Arrays cross the boundary as numpy arrays together with their dimension names,
//! matching how gridded variables are laid out in xarray. Broadcast dimensions only
//! need a name; latitude and longitude also need their coordinate values.

use crate::errors::ToolboxError;
use crate::field::{Axis, FloatValue, GriddedField};
use crate::fill::fill_holes;
use crate::interpolate::ScatteredMethod;
use crate::longitude::standardize_coordinates;
use crate::mask::DEFAULT_SENTINEL;
use crate::parameters::{AggregationParameters, FillParameters, PointLookup, TableParameters};
use crate::pipeline::weighted_aggregate_grid_to_regions;
use crate::weights::{PointWeightTable, RegionId};
use ndarray::ArrayViewD;
use numpy::{IntoPyArray, PyArray1, PyArrayDyn, PyReadonlyArray1, PyReadonlyArrayDyn, ToPyArray};
use pyo3::exceptions::{PyIOError, PyUserWarning, PyValueError};
use pyo3::prelude::*;

impl From<ToolboxError> for PyErr {
    fn from(err: ToolboxError) -> PyErr {
        match err {
            ToolboxError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

fn build_field(
    values: ArrayViewD<'_, FloatValue>,
    dims: &[String],
    lat: &[FloatValue],
    lon: &[FloatValue],
    lat_name: &str,
    lon_name: &str,
) -> Result<GriddedField, ToolboxError> {
    if dims.len() != values.ndim() {
        return Err(ToolboxError::ShapeMismatch(format!(
            "{} dimension names given for an array with {} dimensions",
            dims.len(),
            values.ndim()
        )));
    }
    let axes = dims
        .iter()
        .zip(values.shape())
        .map(|(name, &len)| match name.as_str() {
            n if n == lat_name => Axis::new(n, lat.to_vec()),
            n if n == lon_name => Axis::new(n, lon.to_vec()),
            n => Axis::positional(n, len),
        })
        .collect();
    GriddedField::new(axes, values.to_owned(), lat_name, lon_name)
}

/// Fill missing cells of a gridded array by iterative local interpolation.
///
/// Returns a new array; the input is left untouched. A `UserWarning` is emitted for
/// every slice whose attempt budget ran out before all holes were filled.
#[pyfunction]
#[pyo3(name = "fill_holes")]
#[pyo3(signature = (values, dims, lat, lon, lat_name="lat", lon_name="lon", method="linear", max_attempts=10, sentinel=DEFAULT_SENTINEL, parallel=false))]
#[allow(clippy::too_many_arguments)]
pub fn py_fill_holes<'py>(
    py: Python<'py>,
    values: PyReadonlyArrayDyn<'py, FloatValue>,
    dims: Vec<String>,
    lat: PyReadonlyArray1<'py, FloatValue>,
    lon: PyReadonlyArray1<'py, FloatValue>,
    lat_name: &str,
    lon_name: &str,
    method: &str,
    max_attempts: usize,
    sentinel: FloatValue,
    parallel: bool,
) -> PyResult<Bound<'py, PyArrayDyn<FloatValue>>> {
    let method: ScatteredMethod = method.parse().map_err(PyValueError::new_err)?;
    let mut field = build_field(
        values.as_array(),
        &dims,
        lat.as_slice()?,
        lon.as_slice()?,
        lat_name,
        lon_name,
    )?;
    let params = FillParameters {
        max_attempts,
        sentinel,
        method,
        parallel,
        ..Default::default()
    };

    let report = py.allow_threads(|| fill_holes(&mut field, &params))?;
    let category = py.get_type_bound::<PyUserWarning>().into_any();
    for warning in &report.warnings {
        PyErr::warn_bound(py, &category, &warning.to_string(), 1)?;
    }
    Ok(field.into_values().into_pyarray_bound(py))
}

/// Weights table read from CSV
#[pyclass]
#[pyo3(name = "PointWeightTable")]
#[derive(Debug, Clone)]
pub struct PyPointWeightTable(pub PointWeightTable);

#[pymethods]
impl PyPointWeightTable {
    /// Load a table, wrapping longitudes above 180 and dropping duplicate rows
    #[staticmethod]
    #[pyo3(signature = (path, fix_longitude=true, drop_duplicates=true))]
    fn from_csv(path: &str, fix_longitude: bool, drop_duplicates: bool) -> PyResult<Self> {
        let params = TableParameters {
            fix_longitude,
            drop_duplicates,
        };
        Ok(Self(PointWeightTable::from_csv_path(path, &params)?))
    }

    /// Names of the region and weight columns
    #[getter]
    fn columns(&self) -> Vec<String> {
        self.0.column_names().into_iter().map(String::from).collect()
    }

    #[getter]
    fn lon<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<FloatValue>> {
        self.0.lon().to_pyarray_bound(py)
    }

    #[getter]
    fn lat<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray1<FloatValue>> {
        self.0.lat().to_pyarray_bound(py)
    }

    fn __len__(&self) -> usize {
        self.0.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "PointWeightTable(points={}, columns={:?})",
            self.0.len(),
            self.0.column_names()
        )
    }
}

fn region_to_py(py: Python<'_>, id: &RegionId) -> PyObject {
    match id {
        RegionId::Integer(v) => (*v).into_py(py),
        RegionId::Text(v) => v.as_str().into_py(py),
    }
}

/// Weighted average of a gridded array over the regions of a weights table.
///
/// Returns the region ids and an array whose first dimension runs over those
/// regions, followed by the broadcast dimensions of `values`.
#[pyfunction]
#[pyo3(name = "weighted_aggregate_grid_to_regions")]
#[pyo3(signature = (values, dims, lat, lon, weights, aggwt, agglev, backup_aggwt="areawt", lat_name="lat", lon_name="lon", tolerance=None))]
#[allow(clippy::too_many_arguments)]
pub fn py_weighted_aggregate_grid_to_regions<'py>(
    py: Python<'py>,
    values: PyReadonlyArrayDyn<'py, FloatValue>,
    dims: Vec<String>,
    lat: PyReadonlyArray1<'py, FloatValue>,
    lon: PyReadonlyArray1<'py, FloatValue>,
    weights: PyRef<'py, PyPointWeightTable>,
    aggwt: &str,
    agglev: &str,
    backup_aggwt: &str,
    lat_name: &str,
    lon_name: &str,
    tolerance: Option<FloatValue>,
) -> PyResult<(Vec<PyObject>, Bound<'py, PyArrayDyn<FloatValue>>)> {
    let field = build_field(
        values.as_array(),
        &dims,
        lat.as_slice()?,
        lon.as_slice()?,
        lat_name,
        lon_name,
    )?;
    let lookup = tolerance.map_or(PointLookup::Exact, PointLookup::Tolerance);
    let params = AggregationParameters::new(aggwt, agglev)
        .with_backup(backup_aggwt)
        .with_lookup(lookup);

    let aggregate = weighted_aggregate_grid_to_regions(&field, &weights.0, &params)?;
    let regions = aggregate
        .regions()
        .iter()
        .map(|id| region_to_py(py, id))
        .collect();
    Ok((regions, aggregate.values().to_pyarray_bound(py)))
}

/// Wrap longitudes into -180..180 and sort them.
///
/// Returns the sorted coordinates and the permutation to apply along the
/// longitude dimension (`values.take(order, axis=lon_axis)`).
#[pyfunction]
#[pyo3(name = "standardize_longitude")]
pub fn py_standardize_longitude(lon: Vec<FloatValue>) -> (Vec<FloatValue>, Vec<usize>) {
    standardize_coordinates(&lon)
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(py_fill_holes, m)?)?;
    m.add_function(wrap_pyfunction!(py_weighted_aggregate_grid_to_regions, m)?)?;
    m.add_function(wrap_pyfunction!(py_standardize_longitude, m)?)?;
    m.add_class::<PyPointWeightTable>()?;
    Ok(())
}
