//! Configuration: analysis parameters and plot styling.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::error::Result;
use crate::data::model::SweepAxis;
use crate::units::{PlotScale, PlotUnit, SiLabel};

/// Parameters of the reductions run by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Samples either side of zero current used for the series-resistance fit.
    #[serde(default = "default_series_window")]
    pub series_window: usize,

    /// Voltage threshold (V) for critical current from IV curves.
    #[serde(default = "default_iv_threshold")]
    pub iv_threshold: f64,

    /// dV/dI threshold (Ω) for critical current from differential resistance.
    #[serde(default = "default_didv_threshold")]
    pub didv_threshold: f64,

    /// Bias (A) of the constant-bias slice.
    #[serde(default)]
    pub constant_bias: f64,

    /// Flip the sign of Synktek voltages at load.
    #[serde(default)]
    pub invert_voltage: bool,
}

fn default_series_window() -> usize {
    4
}

fn default_iv_threshold() -> f64 {
    1e-6
}

fn default_didv_threshold() -> f64 {
    10.0
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            series_window: default_series_window(),
            iv_threshold: default_iv_threshold(),
            didv_threshold: default_didv_threshold(),
            constant_bias: 0.0,
            invert_voltage: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Plot styling
// ---------------------------------------------------------------------------

/// What the viewer is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewKind {
    IvCurves,
    DifferentialResistance,
    CriticalCurrent,
    ConstantBias,
    Resistance,
    LockinMagnitude,
}

impl ViewKind {
    pub const ALL: [ViewKind; 6] = [
        ViewKind::IvCurves,
        ViewKind::DifferentialResistance,
        ViewKind::CriticalCurrent,
        ViewKind::ConstantBias,
        ViewKind::Resistance,
        ViewKind::LockinMagnitude,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::IvCurves => "IV curves",
            ViewKind::DifferentialResistance => "dV/dI curves",
            ViewKind::CriticalCurrent => "Critical current",
            ViewKind::ConstantBias => "Constant bias",
            ViewKind::Resistance => "Resistance",
            ViewKind::LockinMagnitude => "Lock-in magnitude",
        }
    }
}

/// Plot decoration. Every field is optional so that a partial style can be
/// laid over a preset with [`PlotStyle::merged`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotStyle {
    #[serde(default)]
    pub x_label: Option<SiLabel>,
    #[serde(default)]
    pub y_label: Option<SiLabel>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_limits: Option<[f64; 2]>,
    #[serde(default)]
    pub y_limits: Option<[f64; 2]>,
    #[serde(default)]
    pub marker_radius: Option<f32>,
    #[serde(default)]
    pub line_width: Option<f32>,
    #[serde(default)]
    pub connect_points: Option<bool>,
    #[serde(default)]
    pub legend: Option<bool>,
    #[serde(default)]
    pub grid: Option<bool>,
}

impl PlotStyle {
    /// A new style where every field set in `overrides` replaces ours.
    pub fn merged(&self, overrides: &PlotStyle) -> PlotStyle {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }
        PlotStyle {
            x_label: pick(&self.x_label, &overrides.x_label),
            y_label: pick(&self.y_label, &overrides.y_label),
            title: pick(&self.title, &overrides.title),
            x_limits: pick(&self.x_limits, &overrides.x_limits),
            y_limits: pick(&self.y_limits, &overrides.y_limits),
            marker_radius: pick(&self.marker_radius, &overrides.marker_radius),
            line_width: pick(&self.line_width, &overrides.line_width),
            connect_points: pick(&self.connect_points, &overrides.connect_points),
            legend: pick(&self.legend, &overrides.legend),
            grid: pick(&self.grid, &overrides.grid),
        }
    }

    /// Default decoration for a view of a sweep along `axis`.
    pub fn preset(view: ViewKind, axis: SweepAxis) -> PlotStyle {
        let current = SiLabel::new(PlotUnit::Current, PlotScale::Micro);
        let voltage = SiLabel::new(PlotUnit::Voltage, PlotScale::Micro);
        let sweep = SiLabel::for_axis(axis);

        let (x_label, y_label, connect) = match view {
            ViewKind::IvCurves => (current, voltage, true),
            ViewKind::DifferentialResistance => (
                current,
                SiLabel::new(PlotUnit::DifferentialResistance, PlotScale::Unit),
                true,
            ),
            ViewKind::CriticalCurrent => (
                sweep,
                SiLabel::new(PlotUnit::CriticalCurrent, PlotScale::Micro),
                false,
            ),
            ViewKind::ConstantBias => (sweep, voltage, false),
            ViewKind::Resistance => (
                sweep,
                SiLabel::new(PlotUnit::Resistance, PlotScale::Unit),
                true,
            ),
            ViewKind::LockinMagnitude => (
                sweep,
                SiLabel::new(PlotUnit::LockinMagnitude, PlotScale::Micro),
                true,
            ),
        };

        PlotStyle {
            x_label: Some(x_label),
            y_label: Some(y_label),
            title: Some(view.title().to_string()),
            marker_radius: Some(2.5),
            line_width: Some(1.5),
            connect_points: Some(connect),
            legend: Some(matches!(view, ViewKind::IvCurves | ViewKind::DifferentialResistance)),
            grid: Some(true),
            ..PlotStyle::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer configuration file
// ---------------------------------------------------------------------------

/// File name looked up in the working directory at start-up.
pub const CONFIG_FILE_NAME: &str = "transport-panda.json";

/// Everything the viewer reads from its JSON configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Laid over every preset style.
    #[serde(default)]
    pub style_overrides: PlotStyle,
}

impl ViewerConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read [`CONFIG_FILE_NAME`] if present, else defaults.
    pub fn load_or_default() -> Self {
        let path = Path::new(CONFIG_FILE_NAME);
        if !path.exists() {
            return Self::default();
        }
        match Self::from_json_file(path) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Preset for `view`/`axis` with the user's overrides applied.
    pub fn style_for(&self, view: ViewKind, axis: SweepAxis) -> PlotStyle {
        PlotStyle::preset(view, axis).merged(&self.style_overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::error::DataError;

    #[test]
    fn default_analysis_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.series_window, 4);
        assert!(!config.invert_voltage);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "analysis": { "iv_threshold": 2e-6 } }"#).unwrap();
        assert_eq!(config.analysis.iv_threshold, 2e-6);
        assert_eq!(config.analysis.series_window, 4);
        assert_eq!(config.style_overrides, PlotStyle::default());
    }

    #[test]
    fn merge_prefers_overrides_without_mutating() {
        let base = PlotStyle::preset(ViewKind::CriticalCurrent, SweepAxis::FieldX);
        let overrides = PlotStyle {
            title: Some("Ic(Bx)".into()),
            y_limits: Some([0.0, 5e-6]),
            ..PlotStyle::default()
        };
        let merged = base.merged(&overrides);
        assert_eq!(merged.title.as_deref(), Some("Ic(Bx)"));
        assert_eq!(merged.y_limits, Some([0.0, 5e-6]));
        assert_eq!(merged.x_label, base.x_label);
        assert_eq!(base.title.as_deref(), Some("Critical current"));
    }

    #[test]
    fn json_round_trip_through_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = ViewerConfig::default();
        config.analysis.series_window = 6;
        config.style_overrides.grid = Some(false);
        config.to_json_file(&path)?;
        assert_eq!(ViewerConfig::from_json_file(&path)?, config);
        Ok(())
    }

    #[test]
    fn malformed_json_is_typed_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ \"analysis\": ")?;
        assert!(matches!(
            ViewerConfig::from_json_file(&path),
            Err(DataError::Json(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json_file(dir.path().join("absent.json")),
            Err(DataError::Io(_))
        ));
        Ok(())
    }
}
