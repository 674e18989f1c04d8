/// Data layer: measurement model, loading, sweep grids and reductions.
///
/// Architecture:
/// ```text
///  instrument .txt files
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  split time series at environment changes → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ extract   │  Dataset → SweepGrid (Regular | Irregular)
///   └──────────┘
///        │
///        ▼
///   ┌──────────────────┐
///   │ filter / ops      │  selection, constant bias, derivative
///   │ extract           │  critical current, resistance, series R
///   └──────────────────┘
///        │
///        ▼
///     Curve2D  → viewer / CSV export
/// ```

pub mod error;
pub mod export;
pub mod extract;
pub mod filter;
pub mod fit;
pub mod grid;
pub mod loader;
pub mod model;
pub mod ops;
