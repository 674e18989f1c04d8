use std::path::{Path, PathBuf};

use anyhow::Context;

use transport_panda::config::{PlotStyle, ViewKind, ViewerConfig};
use transport_panda::data::export::write_curves_csv;
use transport_panda::data::extract::{self, Polarity, SeriesCorrection};
use transport_panda::data::filter::{selection_mask, Selection};
use transport_panda::data::fit::LinearLeastSquares;
use transport_panda::data::loader;
use transport_panda::units::SiLabel;
use transport_panda::{Curve2D, Dataset, Instrument, SweepAxis};

// ---------------------------------------------------------------------------
// Instrument choice shown in the UI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Keithley,
    Synktek,
    Lockin,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 3] = [
        InstrumentKind::Keithley,
        InstrumentKind::Synktek,
        InstrumentKind::Lockin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InstrumentKind::Keithley => "Keithley",
            InstrumentKind::Synktek => "Synktek",
            InstrumentKind::Lockin => "Lock-in",
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded dataset (None until the user opens files).
    pub dataset: Option<Dataset>,

    /// Files the dataset was read from, in append order.
    pub files: Vec<PathBuf>,

    pub instrument: InstrumentKind,
    pub axis: SweepAxis,
    pub device: usize,
    pub view: ViewKind,
    pub polarity: Polarity,

    /// Critical current from dV/dI instead of V.
    pub ic_from_didv: bool,

    /// Analysis parameters and style overrides.
    pub config: ViewerConfig,

    /// Restrict to an environmental range instead of the checkboxes.
    pub use_range: bool,
    pub range: (f64, f64),

    /// One checkbox per measurement.
    pub selected: Vec<bool>,

    /// Curves of the current view (cached).
    pub curves: Vec<Curve2D>,

    /// Style of the current view.
    pub style: PlotStyle,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: ViewerConfig) -> Self {
        let axis = SweepAxis::FieldZ;
        let view = ViewKind::IvCurves;
        Self {
            dataset: None,
            files: Vec::new(),
            instrument: InstrumentKind::Keithley,
            axis,
            device: 0,
            view,
            polarity: Polarity::default(),
            ic_from_didv: false,
            style: config.style_for(view, axis),
            config,
            use_range: false,
            range: (0.0, 0.0),
            selected: Vec::new(),
            curves: Vec::new(),
            status_message: None,
        }
    }

    pub fn instrument(&self) -> Instrument {
        match self.instrument {
            InstrumentKind::Keithley => Instrument::Keithley,
            InstrumentKind::Synktek => Instrument::Synktek {
                invert_voltage: self.config.analysis.invert_voltage,
            },
            InstrumentKind::Lockin => Instrument::Lockin,
        }
    }

    /// Replace the dataset with the contents of `paths`.
    pub fn open_files(&mut self, paths: Vec<PathBuf>) -> anyhow::Result<()> {
        let dataset = loader::load_dataset(&paths, self.instrument())
            .with_context(|| format!("loading {} file(s) as {}", paths.len(), self.instrument()))?;
        self.files = paths;
        self.set_dataset(dataset);
        Ok(())
    }

    /// Append `paths` to the current dataset.
    pub fn append_files(&mut self, paths: Vec<PathBuf>) -> anyhow::Result<()> {
        let Some(mut dataset) = self.dataset.clone() else {
            return self.open_files(paths);
        };
        for path in &paths {
            loader::append_file(&mut dataset, path, self.instrument())
                .with_context(|| format!("appending {}", path.display()))?;
        }
        self.files.extend(paths);
        self.set_dataset(dataset);
        Ok(())
    }

    /// Ingest a newly loaded dataset and reset the selection.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        log::info!(
            "{} measurement(s) of {} device(s) from {} file(s)",
            dataset.len(),
            dataset.device_count(),
            self.files.len()
        );
        self.selected = vec![true; dataset.len()];
        self.device = self.device.min(dataset.device_count().saturating_sub(1));
        self.dataset = Some(dataset);
        self.reset_range();
        self.refresh();
    }

    /// Span the range selector over the whole sweep axis.
    pub fn reset_range(&mut self) {
        let values = self.axis_values();
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.range = if lo <= hi { (lo, hi) } else { (0.0, 0.0) };
    }

    pub fn axis_values(&self) -> Vec<f64> {
        self.dataset
            .as_ref()
            .map(|ds| ds.axis_values(self.axis))
            .unwrap_or_default()
    }

    /// Checkbox labels, one per measurement.
    pub fn measurement_labels(&self) -> Vec<String> {
        let unit = SiLabel::for_axis(self.axis);
        self.axis_values()
            .into_iter()
            .enumerate()
            .map(|(j, v)| format!("#{j}  {}", unit.format_value(v)))
            .collect()
    }

    pub fn selection(&self) -> Selection {
        if self.use_range {
            Selection::range(self.range.0, self.range.1)
        } else {
            Selection::mask(self.selected.clone())
        }
    }

    pub fn set_all_selected(&mut self, value: bool) {
        self.selected.iter_mut().for_each(|s| *s = value);
        self.refresh();
    }

    /// Recompute the curves and style of the current view.
    pub fn refresh(&mut self) {
        self.style = self.config.style_for(self.view, self.axis);
        let Some(dataset) = &self.dataset else {
            self.curves.clear();
            return;
        };
        match self.reduce(dataset) {
            Ok(curves) => {
                self.curves = curves;
                self.status_message = None;
            }
            Err(e) => {
                log::error!("{} failed: {e:#}", self.view.title());
                self.curves.clear();
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    fn reduce(&self, dataset: &Dataset) -> anyhow::Result<Vec<Curve2D>> {
        let analysis = &self.config.analysis;
        let selection = self.selection();
        let (axis, device) = (self.axis, self.device);

        let curves = match self.view {
            ViewKind::IvCurves => extract::iv_curves(dataset, axis, device, &selection)?,
            ViewKind::DifferentialResistance => {
                extract::didv_curves(dataset, axis, device, &selection)?
            }
            ViewKind::CriticalCurrent if self.ic_from_didv => {
                vec![extract::critical_current_from_didv(
                    dataset,
                    axis,
                    analysis.didv_threshold,
                    device,
                    self.polarity,
                    &selection,
                )?]
            }
            ViewKind::CriticalCurrent => vec![extract::critical_current_from_iv(
                dataset,
                axis,
                analysis.iv_threshold,
                device,
                self.polarity,
                &selection,
            )?],
            ViewKind::ConstantBias => vec![extract::constant_bias_sweep(
                dataset,
                axis,
                analysis.constant_bias,
                device,
                &selection,
            )?],
            ViewKind::Resistance => {
                let curve = extract::resistance_sweep(dataset, axis, device, &LinearLeastSquares)?;
                vec![restrict(curve, &selection)?]
            }
            ViewKind::LockinMagnitude => {
                let curve = extract::lockin_magnitude_sweep(dataset, axis, device)?;
                vec![restrict(curve, &selection)?]
            }
        };
        Ok(curves)
    }

    /// Subtract the series resistance from the loaded dataset.
    pub fn remove_series_resistance(&mut self) -> anyhow::Result<()> {
        let window = self.config.analysis.series_window;
        let device = self.device;
        let dataset = self.dataset.as_mut().context("no dataset loaded")?;
        let outcome =
            extract::remove_series_resistance(dataset, device, window, &LinearLeastSquares)?;
        self.refresh();
        self.status_message = Some(match outcome {
            SeriesCorrection::Applied { resistance } => {
                format!("Subtracted {resistance:.3} Ω")
            }
            SeriesCorrection::Skipped { estimate } => {
                format!("Series resistance estimate {estimate:.3e} Ω is not positive; unchanged")
            }
        });
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> anyhow::Result<()> {
        if self.curves.is_empty() {
            anyhow::bail!("nothing to export");
        }
        write_curves_csv(path, &self.curves)?;
        Ok(())
    }

    pub fn save_config(&self, path: &Path) -> anyhow::Result<()> {
        self.config.to_json_file(path)?;
        log::info!("Saved settings to {}", path.display());
        Ok(())
    }
}

/// Keep only the points of a per-measurement curve that `selection` picks.
fn restrict(curve: Curve2D, selection: &Selection) -> anyhow::Result<Curve2D> {
    let mask = selection_mask(&curve.x, selection)?;
    let keep = |values: &[f64]| -> Vec<f64> {
        values
            .iter()
            .zip(&mask)
            .filter(|&(_, &m)| m)
            .map(|(&v, _)| v)
            .collect()
    };
    Ok(Curve2D {
        x: keep(&curve.x),
        y: keep(&curve.y),
        y_err: curve.y_err.as_deref().map(keep),
        label: curve.label,
    })
}
