use std::path::Path;

use serde::Serialize;

use super::error::Result;
use super::grid::Curve2D;

/// One row of the long-format export.
#[derive(Debug, Serialize)]
struct CurveRow<'a> {
    curve: usize,
    label: &'a str,
    x: f64,
    y: f64,
    y_err: Option<f64>,
}

/// Write curves as CSV with columns `curve,label,x,y,y_err`.
pub fn write_curves_csv(path: &Path, curves: &[Curve2D]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (idx, curve) in curves.iter().enumerate() {
        let label = curve
            .label
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_default();
        for (k, [x, y]) in curve.points().enumerate() {
            writer.serialize(CurveRow {
                curve: idx,
                label: &label,
                x,
                y,
                y_err: curve.y_err.as_ref().and_then(|e| e.get(k).copied()),
            })?;
        }
    }
    writer.flush()?;
    log::info!("Exported {} curve(s) to {}", curves.len(), path.display());
    Ok(())
}
