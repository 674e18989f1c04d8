use super::error::{DataError, Result};
use super::filter::{selection_mask, Selection};
use super::grid::{Curve2D, CurveLabel, SweepGrid};
use super::loader::argmin_abs;
use crate::units::SiLabel;

/// Numerical derivative dy/dx.
///
/// Interior points use central differences; the two end points use one-sided
/// three-point estimates, so a linear relation yields a constant derivative
/// everywhere on an evenly spaced axis.
pub fn derivative(x: &[f64], y: &[f64]) -> Result<Vec<f64>> {
    if x.len() != y.len() {
        return Err(DataError::Numerical(format!(
            "derivative inputs differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 3 {
        return Err(DataError::Numerical(format!(
            "derivative needs at least 3 samples, got {n}"
        )));
    }

    let mut dydx = vec![0.0; n];
    for i in 1..n - 1 {
        dydx[i] = (y[i + 1] - y[i - 1]) / (x[i + 1] - x[i - 1]);
    }
    dydx[0] = (-1.5 * y[0] + 2.0 * y[1] - 0.5 * y[2]) / (x[1] - x[0]);
    dydx[n - 1] = (1.5 * y[n - 1] - 2.0 * y[n - 2] + 0.5 * y[n - 3]) / (x[n - 1] - x[n - 2]);
    Ok(dydx)
}

/// Index of the bias sample nearest `target` (first one on ties).
fn nearest_index<'a, I>(bias: I, target: f64) -> Option<usize>
where
    I: IntoIterator<Item = &'a f64>,
{
    let shifted: Vec<f64> = bias.into_iter().map(|&b| b - target).collect();
    argmin_abs(&shifted)
}

/// Response at the bias nearest `yb`, one point per measurement.
///
/// No interpolation: each column contributes the sample whose bias is closest
/// to `yb`.
pub fn constant_bias(grid: &SweepGrid, yb: f64) -> Result<Curve2D> {
    let x = grid.x_values();
    let mut z = Vec::with_capacity(x.len());

    match grid {
        SweepGrid::Regular(g) => {
            for j in 0..g.columns() {
                let idx = nearest_index(g.bias_column(j), yb).ok_or_else(|| {
                    DataError::Numerical(format!("measurement {j} has no bias samples"))
                })?;
                z.push(g.zz()[[idx, j]]);
            }
        }
        SweepGrid::Irregular(g) => {
            for (j, (ys, zs)) in g.ys().iter().zip(g.zs()).enumerate() {
                let idx = nearest_index(ys, yb).ok_or_else(|| {
                    DataError::Numerical(format!("measurement {j} has no bias samples"))
                })?;
                z.push(zs[idx]);
            }
        }
    }

    Ok(Curve2D::new(x, z).with_label(CurveLabel::Value {
        value: yb,
        unit: None,
    }))
}

/// Split a sweep into one (bias, response) curve per selected measurement,
/// each labelled with its environmental value.
pub fn column_curves(
    grid: &SweepGrid,
    selection: &Selection,
    unit: Option<SiLabel>,
) -> Result<Vec<Curve2D>> {
    let x = grid.x_values();
    let mask = selection_mask(&x, selection)?;
    let label = |value: f64| CurveLabel::Value {
        value,
        unit: unit.clone(),
    };

    let curves = match grid {
        SweepGrid::Regular(g) => (0..g.columns())
            .filter(|&j| mask[j])
            .map(|j| {
                Curve2D::new(g.bias_column(j).to_vec(), g.response_column(j).to_vec())
                    .with_label(label(x[j]))
            })
            .collect(),
        SweepGrid::Irregular(g) => (0..g.len())
            .filter(|&j| mask[j])
            .map(|j| Curve2D::new(g.ys()[j].clone(), g.zs()[j].clone()).with_label(label(x[j])))
            .collect(),
    };
    Ok(curves)
}
