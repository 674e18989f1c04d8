use std::fmt;

use ndarray::{Array2, ArrayView1, Axis};

use super::error::{DataError, Result};
use crate::units::SiLabel;

// ---------------------------------------------------------------------------
// Curve2D – the output of every extraction
// ---------------------------------------------------------------------------

/// Display label attached to a curve.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveLabel {
    /// Literal text, always shown as-is.
    Text(String),
    /// A scalar (e.g. the field of an IV curve), optionally with its unit.
    Value { value: f64, unit: Option<SiLabel> },
}

impl fmt::Display for CurveLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveLabel::Text(t) => f.write_str(t),
            CurveLabel::Value {
                value,
                unit: Some(unit),
            } => f.write_str(&unit.format_value(*value)),
            CurveLabel::Value { value, unit: None } => write!(f, "{value:.4e}"),
        }
    }
}

/// An ordered (x, y) series.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve2D {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Per-point spread, when the extraction produces one.
    pub y_err: Option<Vec<f64>>,
    pub label: Option<CurveLabel>,
}

impl Curve2D {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), y.len(), "x and y must have same length");
        Self {
            x,
            y,
            y_err: None,
            label: None,
        }
    }

    pub fn with_label(mut self, label: CurveLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.x.iter().zip(&self.y).map(|(&x, &y)| [x, y])
    }
}

// ---------------------------------------------------------------------------
// RegularGrid – equal-shape (bias samples × measurements) arrays
// ---------------------------------------------------------------------------

/// Sweep on a full grid: column `j` is measurement `j`, row `i` is bias sample `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid {
    x: Vec<f64>,
    xx: Array2<f64>,
    yy: Array2<f64>,
    zz: Array2<f64>,
}

impl RegularGrid {
    /// `x` holds one environmental value per column, kept separately so that
    /// a grid with zero bias samples still knows its columns' values.
    pub fn new(x: Vec<f64>, xx: Array2<f64>, yy: Array2<f64>, zz: Array2<f64>) -> Result<Self> {
        if xx.dim() != yy.dim() || yy.dim() != zz.dim() {
            return Err(DataError::Configuration(format!(
                "regular grid arrays differ in shape: x {:?}, y {:?}, z {:?}",
                xx.dim(),
                yy.dim(),
                zz.dim()
            )));
        }
        if x.len() != xx.ncols() {
            return Err(DataError::Configuration(format!(
                "{} x values for {} grid columns",
                x.len(),
                xx.ncols()
            )));
        }
        Ok(Self { x, xx, yy, zz })
    }

    /// Build from per-measurement environmental values and equal-length columns.
    pub fn from_columns(x: &[f64], ys: &[&[f64]], zs: &[&[f64]]) -> Result<Self> {
        let cols = x.len();
        if ys.len() != cols || zs.len() != cols {
            return Err(DataError::Configuration(
                "regular grid needs one bias and one response column per x value".into(),
            ));
        }
        let rows = ys.first().map_or(0, |c| c.len());
        let mut xx = Array2::zeros((rows, cols));
        let mut yy = Array2::zeros((rows, cols));
        let mut zz = Array2::zeros((rows, cols));
        for j in 0..cols {
            if ys[j].len() != rows || zs[j].len() != rows {
                return Err(DataError::Configuration(format!(
                    "column {j} has {} bias / {} response samples, expected {rows}",
                    ys[j].len(),
                    zs[j].len()
                )));
            }
            xx.column_mut(j).fill(x[j]);
            yy.column_mut(j).assign(&ArrayView1::from(ys[j]));
            zz.column_mut(j).assign(&ArrayView1::from(zs[j]));
        }
        Ok(Self {
            x: x.to_vec(),
            xx,
            yy,
            zz,
        })
    }

    pub fn xx(&self) -> &Array2<f64> {
        &self.xx
    }

    pub fn yy(&self) -> &Array2<f64> {
        &self.yy
    }

    pub fn zz(&self) -> &Array2<f64> {
        &self.zz
    }

    /// Number of measurements (columns).
    pub fn columns(&self) -> usize {
        self.xx.ncols()
    }

    /// Number of bias samples (rows).
    pub fn rows(&self) -> usize {
        self.xx.nrows()
    }

    /// Environmental value of each column.
    pub fn x_values(&self) -> Vec<f64> {
        self.x.clone()
    }

    pub fn bias_column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.yy.column(j)
    }

    pub fn response_column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.zz.column(j)
    }

    /// Keep only the columns whose mask entry is true.
    pub fn select_columns(&self, mask: &[bool]) -> Self {
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m)
            .map(|(j, _)| j)
            .collect();
        Self {
            x: keep.iter().map(|&j| self.x[j]).collect(),
            xx: self.xx.select(Axis(1), &keep),
            yy: self.yy.select(Axis(1), &keep),
            zz: self.zz.select(Axis(1), &keep),
        }
    }

    /// The same data laid out per measurement.
    pub fn to_irregular(&self) -> IrregularGrid {
        IrregularGrid {
            x: self.x.clone(),
            ys: self.yy.columns().into_iter().map(|c| c.to_vec()).collect(),
            zs: self.zz.columns().into_iter().map(|c| c.to_vec()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// IrregularGrid – per-measurement arrays of differing length
// ---------------------------------------------------------------------------

/// Sweep whose measurements may have different numbers of bias samples.
#[derive(Debug, Clone, PartialEq)]
pub struct IrregularGrid {
    x: Vec<f64>,
    ys: Vec<Vec<f64>>,
    zs: Vec<Vec<f64>>,
}

impl IrregularGrid {
    pub fn new(x: Vec<f64>, ys: Vec<Vec<f64>>, zs: Vec<Vec<f64>>) -> Result<Self> {
        if ys.len() != x.len() || zs.len() != x.len() {
            return Err(DataError::Configuration(format!(
                "irregular grid has {} x values but {} bias and {} response arrays",
                x.len(),
                ys.len(),
                zs.len()
            )));
        }
        if let Some(i) = ys.iter().zip(&zs).position(|(y, z)| y.len() != z.len()) {
            return Err(DataError::Configuration(format!(
                "measurement {i}: bias has {} samples but response has {}",
                ys[i].len(),
                zs[i].len()
            )));
        }
        Ok(Self { x, ys, zs })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn ys(&self) -> &[Vec<f64>] {
        &self.ys
    }

    pub fn zs(&self) -> &[Vec<f64>] {
        &self.zs
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn select_columns(&self, mask: &[bool]) -> Self {
        let keep = |i: &usize| mask.get(*i).copied().unwrap_or(false);
        Self {
            x: (0..self.x.len()).filter(keep).map(|i| self.x[i]).collect(),
            ys: (0..self.ys.len()).filter(keep).map(|i| self.ys[i].clone()).collect(),
            zs: (0..self.zs.len()).filter(keep).map(|i| self.zs[i].clone()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// SweepGrid – tagged union over both layouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    Regular,
    Irregular,
}

/// An (environmental x, bias y, response z) sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepGrid {
    Regular(RegularGrid),
    Irregular(IrregularGrid),
}

impl SweepGrid {
    pub fn kind(&self) -> GridKind {
        match self {
            SweepGrid::Regular(_) => GridKind::Regular,
            SweepGrid::Irregular(_) => GridKind::Irregular,
        }
    }

    /// Number of measurements along the environmental axis.
    pub fn len(&self) -> usize {
        match self {
            SweepGrid::Regular(g) => g.columns(),
            SweepGrid::Irregular(g) => g.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_values(&self) -> Vec<f64> {
        match self {
            SweepGrid::Regular(g) => g.x_values(),
            SweepGrid::Irregular(g) => g.x().to_vec(),
        }
    }
}
