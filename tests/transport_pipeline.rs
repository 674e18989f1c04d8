//! End-to-end reductions: instrument files on disk → dataset → curves.

use std::io::Write;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use tempfile::TempDir;

use transport_panda::config::{ViewKind, ViewerConfig};
use transport_panda::data::export::write_curves_csv;
use transport_panda::data::extract::{self, Polarity, SeriesCorrection};
use transport_panda::data::filter::Selection;
use transport_panda::data::fit::LinearLeastSquares;
use transport_panda::data::grid::GridKind;
use transport_panda::data::loader::{load_dataset, load_file};
use transport_panda::{DataError, Instrument, SweepAxis};

const ENV_HEADER: &str = "Time T(K)[VTI] T(K)[Sample] Bx(T) By(T) Bz(T)";

/// Bias points in A: -3 µA .. 3 µA in 1 µA steps.
fn bias() -> Vec<f64> {
    (-3..=3).map(|k| k as f64 * 1e-6).collect()
}

/// Linear junction: no voltage up to `ic`, then `r * (|I| - ic)`.
fn junction(i: f64, ic: f64, r: f64) -> f64 {
    if i.abs() <= ic {
        0.0
    } else {
        i.signum() * r * (i.abs() - ic)
    }
}

fn write_file(dir: &Path, name: &str, header: &str, rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{ENV_HEADER} {header}").unwrap();
    for (t, row) in rows.iter().enumerate() {
        writeln!(file, "{t} {row}").unwrap();
    }
    path
}

fn env(bz: f64) -> String {
    format!("1.5 1.6 0 0 {bz:e}")
}

/// Keithley field sweep with one junction per field point.
fn keithley_sweep(dir: &Path, name: &str, points: &[(f64, f64)]) -> PathBuf {
    let mut rows = Vec::new();
    for &(bz, ic) in points {
        for i in bias() {
            rows.push(format!("{} {i:e} {:e}", env(bz), junction(i, ic, 100.0)));
        }
    }
    write_file(dir, name, "I(j1) V(j1)", &rows)
}

#[test]
fn files_are_appended_without_merging_conditions() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let a = keithley_sweep(dir.path(), "a.txt", &[(0.0, 1e-6), (1e-3, 1e-6)]);
    let b = keithley_sweep(dir.path(), "b.txt", &[(0.0, 1e-6)]);

    let ds = load_dataset(&[a, b], Instrument::Keithley)?;
    assert_eq!(ds.len(), 3);
    assert_eq!(ds.axis_values(SweepAxis::FieldZ), vec![0.0, 1e-3, 0.0]);
    assert_eq!(ds.axis_values(SweepAxis::SampleTemperature), vec![1.6; 3]);
    Ok(())
}

#[test]
fn critical_current_from_iv_on_regular_sweep() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let path = keithley_sweep(dir.path(), "ic.txt", &[(0.0, 1.5e-6), (1e-3, 0.5e-6)]);
    let ds = load_file(&path, Instrument::Keithley)?;

    let grid = extract::sweep_iv(&ds, SweepAxis::FieldZ, 0)?;
    assert_eq!(grid.kind(), GridKind::Regular);

    let ic = extract::critical_current_from_iv(
        &ds,
        SweepAxis::FieldZ,
        1e-6,
        0,
        Polarity::Positive,
        &Selection::all(),
    )?;
    assert_eq!(ic.x, vec![0.0, 1e-3]);
    assert_relative_eq!(ic.y[0], 2e-6);
    assert_relative_eq!(ic.y[1], 1e-6);

    let only_second = extract::critical_current_from_iv(
        &ds,
        SweepAxis::FieldZ,
        1e-6,
        0,
        Polarity::Positive,
        &Selection::range(0.5e-3, 2e-3),
    )?;
    assert_eq!(only_second.x, vec![1e-3]);
    Ok(())
}

#[test]
fn negative_critical_current_from_instrument_dvdi() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let ic = 1.5e-6;
    let rows: Vec<String> = bias()
        .into_iter()
        .map(|i| {
            let dvdi = if i.abs() > ic { 200.0 } else { 2.0 };
            format!("{} {i:e} {:e} {dvdi}", env(0.0), 2.0 * i + 1e-3)
        })
        .collect();
    let path = write_file(dir.path(), "synk.txt", "I_DC(j1) DC(j1) dV/dI(j1)", &rows);
    let ds = load_file(&path, Instrument::Synktek { invert_voltage: false })?;

    // Origin fixed at zero current.
    let iv = ds.measurements()[0].iv(0)?;
    assert_relative_eq!(iv.voltage()[3], 0.0);

    let curve = extract::critical_current_from_didv(
        &ds,
        SweepAxis::FieldZ,
        10.0,
        0,
        Polarity::Negative,
        &Selection::all(),
    )?;
    assert_relative_eq!(curve.y[0], -2e-6);
    Ok(())
}

#[test]
fn irregular_sweep_constant_bias_slice() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let mut rows = Vec::new();
    for i in [-1e-6, 0.0, 1e-6] {
        rows.push(format!("{} {i:e} {:e}", env(0.0), 10.0 * i));
    }
    for i in [-2e-6, -0.5e-6, 0.5e-6, 2e-6] {
        rows.push(format!("{} {i:e} {:e}", env(1e-3), 20.0 * i));
    }
    let path = write_file(dir.path(), "irr.txt", "I(j1) V(j1)", &rows);
    let ds = load_file(&path, Instrument::Keithley)?;

    assert_eq!(extract::sweep_iv(&ds, SweepAxis::FieldZ, 0)?.kind(), GridKind::Irregular);
    let slice = extract::constant_bias_sweep(&ds, SweepAxis::FieldZ, 0.6e-6, 0, &Selection::all())?;
    assert_relative_eq!(slice.y[0], 1e-5, max_relative = 1e-12);
    assert_relative_eq!(slice.y[1], 1e-5, max_relative = 1e-12);
    Ok(())
}

#[test]
fn series_resistance_is_removed_once() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let mut rows = Vec::new();
    for (bz, r) in [(0.0, 5.0), (1e-3, 7.0)] {
        for i in bias() {
            rows.push(format!("{} {i:e} {:e}", env(bz), r * i));
        }
    }
    let path = write_file(dir.path(), "ohmic.txt", "I(j1) V(j1)", &rows);
    let mut ds = load_file(&path, Instrument::Keithley)?;

    let first = extract::remove_series_resistance(&mut ds, 0, 2, &LinearLeastSquares)?;
    match first {
        SeriesCorrection::Applied { resistance } => {
            assert_relative_eq!(resistance, 5.0, max_relative = 1e-9)
        }
        other => panic!("expected a correction, got {other:?}"),
    }

    let r = extract::resistance_sweep(&ds, SweepAxis::FieldZ, 0, &LinearLeastSquares)?;
    assert!(r.y[0].abs() < 1e-6);
    assert_relative_eq!(r.y[1], 2.0, max_relative = 1e-6);

    let residual = match extract::remove_series_resistance(&mut ds, 0, 2, &LinearLeastSquares)? {
        SeriesCorrection::Applied { resistance } => resistance,
        SeriesCorrection::Skipped { estimate } => estimate,
    };
    assert!(residual.abs() < 1e-6);
    Ok(())
}

#[test]
fn series_window_past_trace_end_is_reported() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let path = keithley_sweep(dir.path(), "short.txt", &[(0.0, 0.0)]);
    let mut ds = load_file(&path, Instrument::Keithley)?;
    let err = extract::remove_series_resistance(&mut ds, 0, 5, &LinearLeastSquares).unwrap_err();
    assert!(matches!(err, DataError::WindowOutOfRange { .. }));
    Ok(())
}

#[test]
fn lockin_magnitude_mean_and_spread() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let rows = vec![
        format!("{} 1 0", env(0.0)),
        format!("{} 3 0", env(0.0)),
        format!("{} 2 0", env(1e-3)),
        format!("{} 2 0", env(1e-3)),
    ];
    let path = write_file(dir.path(), "lockin.txt", "R(ch1) Phi(ch1)", &rows);
    let ds = load_file(&path, Instrument::Lockin)?;

    let curve = extract::lockin_magnitude_sweep(&ds, SweepAxis::FieldZ, 0)?;
    assert_eq!(curve.y, vec![2.0, 2.0]);
    assert_eq!(curve.y_err, Some(vec![1.0, 0.0]));

    assert!(matches!(
        extract::sweep_iv(&ds, SweepAxis::FieldZ, 0),
        Err(DataError::Configuration(_))
    ));
    Ok(())
}

#[test]
fn iv_curves_export_to_csv() -> transport_panda::Result<()> {
    let dir = TempDir::new()?;
    let path = keithley_sweep(dir.path(), "ic.txt", &[(0.0, 1e-6), (2e-3, 1e-6)]);
    let ds = load_file(&path, Instrument::Keithley)?;

    let curves = extract::iv_curves(&ds, SweepAxis::FieldZ, 0, &Selection::mask(vec![true, false]))?;
    assert_eq!(curves.len(), 1);
    assert_eq!(curves[0].label.as_ref().map(|l| l.to_string()).as_deref(), Some("0.0000 mT"));

    let out = dir.path().join("iv.csv");
    write_curves_csv(&out, &curves)?;
    let text = std::fs::read_to_string(&out)?;
    assert_eq!(text.lines().count(), 1 + bias().len());
    Ok(())
}

#[test]
fn viewer_config_overrides_presets() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("transport-panda.json");
    std::fs::write(
        &path,
        r#"{ "analysis": { "series_window": 3 }, "style_overrides": { "title": "Sample A" } }"#,
    )?;
    let config = ViewerConfig::from_json_file(&path)?;
    assert_eq!(config.analysis.series_window, 3);

    let style = config.style_for(ViewKind::CriticalCurrent, SweepAxis::FieldX);
    assert_eq!(style.title.as_deref(), Some("Sample A"));
    assert_eq!(
        style.x_label.map(|l| l.text_label()).as_deref(),
        Some("µ0Hx (mT)")
    );
    Ok(())
}
