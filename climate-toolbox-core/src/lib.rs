//! Hole filling and regional aggregation of gridded climate data
//!
//! The crate has two halves. [`fill`] repairs missing cells of a
//! [`field::GriddedField`] by iterative local scattered interpolation. [`reindex`]
//! and [`aggregate`] sample a field at the points of a [`weights::PointWeightTable`]
//! and reduce those samples to weighted regional averages. [`pipeline`] chains the
//! steps the way they are normally used.

pub mod aggregate;
pub mod errors;
pub mod field;
pub mod fill;
pub mod interpolate;
pub mod longitude;
pub mod mask;
pub mod parameters;
pub mod pipeline;
pub mod python;
pub mod reindex;
pub mod weights;
