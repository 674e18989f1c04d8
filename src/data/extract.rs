use serde::{Deserialize, Serialize};

use super::error::{DataError, Result};
use super::filter::{select_grid, Selection};
use super::fit::{CurveFitter, LineGuess};
use super::grid::{Curve2D, IrregularGrid, RegularGrid, SweepGrid};
use super::loader::argmin_abs;
use super::model::{Dataset, IvRecord, SweepAxis};
use super::ops::{column_curves, constant_bias, derivative};
use crate::units::SiLabel;

// ---------------------------------------------------------------------------
// Sweep grids
// ---------------------------------------------------------------------------

fn build_grid<F>(dataset: &Dataset, axis: SweepAxis, device: usize, response: F) -> Result<SweepGrid>
where
    F: Fn(&IvRecord) -> Result<Vec<f64>>,
{
    let x = dataset.axis_values(axis);
    let records = dataset
        .measurements()
        .iter()
        .map(|m| m.iv(device))
        .collect::<Result<Vec<_>>>()?;
    let zs = records
        .iter()
        .map(|iv| response(*iv))
        .collect::<Result<Vec<_>>>()?;

    if dataset.is_regular(device)? {
        let ys: Vec<&[f64]> = records.iter().map(|iv| iv.current()).collect();
        let zs: Vec<&[f64]> = zs.iter().map(Vec::as_slice).collect();
        Ok(SweepGrid::Regular(RegularGrid::from_columns(&x, &ys, &zs)?))
    } else {
        let ys = records.iter().map(|iv| iv.current().to_vec()).collect();
        Ok(SweepGrid::Irregular(IrregularGrid::new(x, ys, zs)?))
    }
}

/// (environmental value, current, voltage) sweep of `device`.
/// Regular when every measurement has the same number of samples.
pub fn sweep_iv(dataset: &Dataset, axis: SweepAxis, device: usize) -> Result<SweepGrid> {
    build_grid(dataset, axis, device, |iv| Ok(iv.voltage().to_vec()))
}

/// (environmental value, current, dV/dI) sweep of `device`. Uses the
/// instrument's dV/dI when recorded, otherwise differentiates V(I).
pub fn sweep_didv(dataset: &Dataset, axis: SweepAxis, device: usize) -> Result<SweepGrid> {
    build_grid(dataset, axis, device, |iv| match iv.dvdi() {
        Some(d) => Ok(d.to_vec()),
        None => derivative(iv.current(), iv.voltage()),
    })
}

/// One IV curve per selected measurement, labelled with its condition.
pub fn iv_curves(
    dataset: &Dataset,
    axis: SweepAxis,
    device: usize,
    selection: &Selection,
) -> Result<Vec<Curve2D>> {
    column_curves(
        &sweep_iv(dataset, axis, device)?,
        selection,
        Some(SiLabel::for_axis(axis)),
    )
}

/// One dV/dI curve per selected measurement, labelled with its condition.
pub fn didv_curves(
    dataset: &Dataset,
    axis: SweepAxis,
    device: usize,
    selection: &Selection,
) -> Result<Vec<Curve2D>> {
    column_curves(
        &sweep_didv(dataset, axis, device)?,
        selection,
        Some(SiLabel::for_axis(axis)),
    )
}

/// Voltage at the bias nearest `yb` across the selected measurements.
pub fn constant_bias_sweep(
    dataset: &Dataset,
    axis: SweepAxis,
    yb: f64,
    device: usize,
    selection: &Selection,
) -> Result<Curve2D> {
    let grid = select_grid(&sweep_iv(dataset, axis, device)?, selection)?;
    constant_bias(&grid, yb)
}

// ---------------------------------------------------------------------------
// Critical current
// ---------------------------------------------------------------------------

/// Which side of the bias axis to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
    Unfiltered,
}

impl Polarity {
    fn accepts(self, bias: f64) -> bool {
        match self {
            Polarity::Positive => bias > 0.0,
            Polarity::Negative => bias < 0.0,
            Polarity::Unfiltered => bias > f64::NEG_INFINITY,
        }
    }
}

/// First bias (in scan order) whose response exceeds `threshold`.
///
/// Positive/unfiltered scans run in stored order; negative scans run from the
/// least-negative end. A column that never crosses returns the first sample
/// of the scan instead of signalling absence, so callers see a degenerate
/// critical current for it.
fn first_crossing<I>(samples: I, threshold: f64, polarity: Polarity) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (bias, response): (Vec<f64>, Vec<f64>) = samples
        .into_iter()
        .filter(|&(b, _)| polarity.accepts(b))
        .unzip();
    let last = bias.len().checked_sub(1)?;

    let idx = match polarity {
        Polarity::Negative => {
            last - response
                .iter()
                .rev()
                .position(|&z| z > threshold)
                .unwrap_or(0)
        }
        Polarity::Positive | Polarity::Unfiltered => {
            response.iter().position(|&z| z > threshold).unwrap_or(0)
        }
    };
    Some(bias[idx])
}

fn empty_column(j: usize, polarity: Polarity) -> DataError {
    DataError::Numerical(format!(
        "measurement {j} has no samples left after the {polarity:?} bias filter"
    ))
}

/// Threshold-crossing critical current for every measurement of `grid`.
pub fn critical_current(grid: &SweepGrid, threshold: f64, polarity: Polarity) -> Result<Curve2D> {
    let x = grid.x_values();
    let mut ic = Vec::with_capacity(x.len());

    match grid {
        SweepGrid::Regular(g) => {
            for j in 0..g.columns() {
                let (bias, response) = (g.bias_column(j), g.response_column(j));
                let samples = bias.iter().copied().zip(response.iter().copied());
                let value = first_crossing(samples, threshold, polarity)
                    .ok_or_else(|| empty_column(j, polarity))?;
                ic.push(value);
            }
        }
        SweepGrid::Irregular(g) => {
            for (j, (ys, zs)) in g.ys().iter().zip(g.zs()).enumerate() {
                let samples = ys.iter().copied().zip(zs.iter().copied());
                let value = first_crossing(samples, threshold, polarity)
                    .ok_or_else(|| empty_column(j, polarity))?;
                ic.push(value);
            }
        }
    }

    Ok(Curve2D::new(x, ic))
}

/// Critical current where the voltage first exceeds `v_threshold`.
pub fn critical_current_from_iv(
    dataset: &Dataset,
    axis: SweepAxis,
    v_threshold: f64,
    device: usize,
    polarity: Polarity,
    selection: &Selection,
) -> Result<Curve2D> {
    let grid = select_grid(&sweep_iv(dataset, axis, device)?, selection)?;
    critical_current(&grid, v_threshold, polarity)
}

/// Critical current where dV/dI first exceeds `didv_threshold`.
pub fn critical_current_from_didv(
    dataset: &Dataset,
    axis: SweepAxis,
    didv_threshold: f64,
    device: usize,
    polarity: Polarity,
    selection: &Selection,
) -> Result<Curve2D> {
    let grid = select_grid(&sweep_didv(dataset, axis, device)?, selection)?;
    critical_current(&grid, didv_threshold, polarity)
}

// ---------------------------------------------------------------------------
// Resistance
// ---------------------------------------------------------------------------

/// Slope of a straight-line fit of V(I) for every measurement.
pub fn resistance_sweep<F: CurveFitter>(
    dataset: &Dataset,
    axis: SweepAxis,
    device: usize,
    fitter: &F,
) -> Result<Curve2D> {
    let x = dataset.axis_values(axis);
    let resistance = dataset
        .measurements()
        .iter()
        .map(|m| {
            let iv = m.iv(device)?;
            let guess = LineGuess {
                slope: match (iv.voltage().first(), iv.current().first()) {
                    (Some(v), Some(i)) => v / i,
                    _ => 0.0,
                },
                intercept: 0.0,
            };
            Ok(fitter.fit_line(iv.current(), iv.voltage(), guess)?.slope)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Curve2D::new(x, resistance))
}

/// Outcome of [`remove_series_resistance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesCorrection {
    /// `resistance` (Ω) was subtracted from every trace.
    Applied { resistance: f64 },
    /// The estimate was not positive; the dataset is unchanged.
    Skipped { estimate: f64 },
}

/// Index of the sample nearest zero current, moved off the first sample.
fn zero_current_index(current: &[f64]) -> Result<usize> {
    let center = argmin_abs(current)
        .ok_or_else(|| DataError::Numerical("empty current trace".into()))?;
    Ok(if center == 0 { 1 } else { center })
}

/// Local slope of V(I) fitted over `center ± window`.
fn fitted_zero_bias_slope<F: CurveFitter>(iv: &IvRecord, window: usize, fitter: &F) -> Result<f64> {
    let (current, voltage) = (iv.current(), iv.voltage());
    let center = zero_current_index(current)?;
    if center < window || center + window >= current.len() {
        return Err(DataError::WindowOutOfRange {
            center,
            window,
            len: current.len(),
        });
    }
    let (lo, hi) = (center - window, center + window);
    let guess = LineGuess {
        slope: (voltage[hi] - voltage[lo]) / (current[hi] - current[lo]),
        intercept: 0.0,
    };
    Ok(fitter
        .fit_line(&current[lo..=hi], &voltage[lo..=hi], guess)?
        .slope)
}

/// Smallest instrument dV/dI in `[center - window, center + window)`.
fn minimum_zero_bias_dvdi(current: &[f64], dvdi: &[f64], window: usize) -> Result<f64> {
    let center = argmin_abs(current)
        .ok_or_else(|| DataError::Numerical("empty current trace".into()))?;
    if center < window || center + window > dvdi.len() {
        return Err(DataError::WindowOutOfRange {
            center,
            window,
            len: dvdi.len(),
        });
    }
    dvdi[center - window..center + window]
        .iter()
        .copied()
        .reduce(f64::min)
        .ok_or_else(|| DataError::Numerical("empty dV/dI window".into()))
}

/// Estimate the circuit's series resistance and subtract it from `device`.
///
/// Each measurement contributes a zero-bias resistance (a line fit of V(I)
/// over `window` samples either side of I = 0, or the smallest recorded
/// dV/dI in that window); the minimum over the dataset is taken as the
/// series resistance. When it is positive, `V -= R*I` and `dV/dI -= R` are
/// applied in place to every measurement. Otherwise the dataset is left
/// untouched and the estimate is reported back.
pub fn remove_series_resistance<F: CurveFitter>(
    dataset: &mut Dataset,
    device: usize,
    window: usize,
    fitter: &F,
) -> Result<SeriesCorrection> {
    if dataset.is_empty() {
        return Err(DataError::Configuration(
            "cannot estimate a series resistance from an empty dataset".into(),
        ));
    }

    let mut smallest = f64::INFINITY;
    for m in dataset.measurements() {
        let iv = m.iv(device)?;
        let estimate = match iv.dvdi() {
            Some(dvdi) => minimum_zero_bias_dvdi(iv.current(), dvdi, window)?,
            None => fitted_zero_bias_slope(iv, window, fitter)?,
        };
        smallest = smallest.min(estimate);
    }

    if smallest > 0.0 && smallest.is_finite() {
        log::info!(
            "Subtracting residual resistance of {} mOhm",
            (smallest * 1e3).round()
        );
        for m in dataset.measurements_mut() {
            m.iv_mut(device)?.subtract_series_resistance(smallest);
        }
        Ok(SeriesCorrection::Applied {
            resistance: smallest,
        })
    } else {
        log::warn!("Smallest resistance was non-positive ({smallest:e} Ohm), not modifying dataset");
        Ok(SeriesCorrection::Skipped { estimate: smallest })
    }
}

// ---------------------------------------------------------------------------
// Lock-in
// ---------------------------------------------------------------------------

/// Mean lock-in magnitude per measurement; the standard deviation goes into
/// `y_err`.
pub fn lockin_magnitude_sweep(dataset: &Dataset, axis: SweepAxis, device: usize) -> Result<Curve2D> {
    let x = dataset.axis_values(axis);
    let mut mean = Vec::with_capacity(x.len());
    let mut spread = Vec::with_capacity(x.len());

    for (j, m) in dataset.measurements().iter().enumerate() {
        let r = &m.lockin(device)?.magnitude;
        if r.is_empty() {
            return Err(DataError::Numerical(format!(
                "measurement {j} has no lock-in samples"
            )));
        }
        let n = r.len() as f64;
        let mu = r.iter().sum::<f64>() / n;
        let var = r.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
        mean.push(mu);
        spread.push(var.sqrt());
    }

    let mut curve = Curve2D::new(x, mean);
    curve.y_err = Some(spread);
    Ok(curve)
}
