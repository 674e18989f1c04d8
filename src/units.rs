use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::model::SweepAxis;

// ---------------------------------------------------------------------------
// Physical quantities and SI prefixes used for labelling
// ---------------------------------------------------------------------------

/// A physical quantity together with its base SI unit symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotUnit {
    Current,
    Voltage,
    MagneticField,
    MagneticFieldX,
    MagneticFieldY,
    MagneticFieldZ,
    DifferentialResistance,
    Resistance,
    CriticalCurrent,
    Temperature,
    LockinMagnitude,
}

impl PlotUnit {
    /// Quantity name shown in front of the unit.
    pub fn quantity(self) -> &'static str {
        match self {
            PlotUnit::Current => "Current",
            PlotUnit::Voltage => "Voltage",
            PlotUnit::MagneticField => "µ0H",
            PlotUnit::MagneticFieldX => "µ0Hx",
            PlotUnit::MagneticFieldY => "µ0Hy",
            PlotUnit::MagneticFieldZ => "µ0Hz",
            PlotUnit::DifferentialResistance => "dV/dI",
            PlotUnit::Resistance => "Resistance",
            PlotUnit::CriticalCurrent => "Ic",
            PlotUnit::Temperature => "Temperature",
            PlotUnit::LockinMagnitude => "R",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PlotUnit::Current | PlotUnit::CriticalCurrent => "A",
            PlotUnit::Voltage | PlotUnit::LockinMagnitude => "V",
            PlotUnit::MagneticField
            | PlotUnit::MagneticFieldX
            | PlotUnit::MagneticFieldY
            | PlotUnit::MagneticFieldZ => "T",
            PlotUnit::DifferentialResistance | PlotUnit::Resistance => "Ω",
            PlotUnit::Temperature => "K",
        }
    }
}

/// Decimal SI prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotScale {
    Giga,
    Mega,
    Kilo,
    Unit,
    Milli,
    Micro,
    Nano,
    Pico,
}

impl PlotScale {
    pub fn factor(self) -> f64 {
        match self {
            PlotScale::Giga => 1e9,
            PlotScale::Mega => 1e6,
            PlotScale::Kilo => 1e3,
            PlotScale::Unit => 1.0,
            PlotScale::Milli => 1e-3,
            PlotScale::Micro => 1e-6,
            PlotScale::Nano => 1e-9,
            PlotScale::Pico => 1e-12,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            PlotScale::Giga => "G",
            PlotScale::Mega => "M",
            PlotScale::Kilo => "k",
            PlotScale::Unit => "",
            PlotScale::Milli => "m",
            PlotScale::Micro => "µ",
            PlotScale::Nano => "n",
            PlotScale::Pico => "p",
        }
    }
}

// ---------------------------------------------------------------------------
// SiLabel
// ---------------------------------------------------------------------------

/// Axis or value label: quantity, unit and display prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiLabel {
    pub unit: PlotUnit,
    pub scale: PlotScale,
    /// Replaces the quantity name when set.
    #[serde(default)]
    pub name: Option<String>,
}

impl SiLabel {
    pub fn new(unit: PlotUnit, scale: PlotScale) -> Self {
        Self {
            unit,
            scale,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label for an environmental axis: fields in mT, temperatures in K.
    pub fn for_axis(axis: SweepAxis) -> Self {
        match axis {
            SweepAxis::FieldX => SiLabel::new(PlotUnit::MagneticFieldX, PlotScale::Milli),
            SweepAxis::FieldY => SiLabel::new(PlotUnit::MagneticFieldY, PlotScale::Milli),
            SweepAxis::FieldZ => SiLabel::new(PlotUnit::MagneticFieldZ, PlotScale::Milli),
            SweepAxis::VtiTemperature => {
                SiLabel::new(PlotUnit::Temperature, PlotScale::Unit).named("T (VTI)")
            }
            SweepAxis::SampleTemperature => {
                SiLabel::new(PlotUnit::Temperature, PlotScale::Unit)
            }
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale.factor()
    }

    /// Convert a value in base SI units into the label's display scale.
    pub fn to_display(&self, value: f64) -> f64 {
        value / self.scale.factor()
    }

    /// e.g. `mT`.
    pub fn text_symbol(&self) -> String {
        format!("{}{}", self.scale.prefix(), self.unit.symbol())
    }

    /// e.g. `µ0Hx (mT)`.
    pub fn text_label(&self) -> String {
        let name = self.name.as_deref().unwrap_or(self.unit.quantity());
        format!("{name} ({})", self.text_symbol())
    }

    /// A value formatted in the display scale, e.g. `12.5 mT`.
    pub fn format_value(&self, value: f64) -> String {
        format!("{:.4} {}", self.to_display(value), self.text_symbol())
    }
}

impl fmt::Display for SiLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn field_axes_are_labelled_in_millitesla() {
        let label = SiLabel::for_axis(SweepAxis::FieldX);
        assert_eq!(label.text_symbol(), "mT");
        assert_eq!(label.text_label(), "µ0Hx (mT)");
        assert_relative_eq!(label.to_display(0.0125), 12.5);
    }

    #[test]
    fn name_override_replaces_quantity() {
        let label = SiLabel::new(PlotUnit::Current, PlotScale::Micro).named("Bias");
        assert_eq!(label.text_label(), "Bias (µA)");
        assert_eq!(label.format_value(2e-6), "2.0000 µA");
    }
}
