//! Reduction of cryostat transport measurements.
//!
//! Instrument text files are split into per-condition measurements
//! ([`data::loader`]), assembled into sweeps along one environmental axis
//! ([`data::extract`]) and reduced to curves: IV and dV/dI families,
//! constant-bias slices, critical current, zero-bias resistance and lock-in
//! magnitude. The `transport-panda` binary puts an egui viewer on top.

pub mod config;
pub mod data;
pub mod units;

pub use data::error::{DataError, Result};
pub use data::grid::{Curve2D, CurveLabel, SweepGrid};
pub use data::model::{Dataset, Instrument, SweepAxis};
