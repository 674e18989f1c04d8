use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{DataError, Result};

// ---------------------------------------------------------------------------
// SweepAxis – which environmental variable a sweep is indexed by
// ---------------------------------------------------------------------------

/// Environmental variable used as the x-axis of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SweepAxis {
    VtiTemperature,
    SampleTemperature,
    FieldX,
    FieldY,
    FieldZ,
}

impl SweepAxis {
    pub const ALL: [SweepAxis; 5] = [
        SweepAxis::VtiTemperature,
        SweepAxis::SampleTemperature,
        SweepAxis::FieldX,
        SweepAxis::FieldY,
        SweepAxis::FieldZ,
    ];

    /// Whether the axis is one of the vector-magnet field components.
    pub fn is_field(self) -> bool {
        matches!(self, SweepAxis::FieldX | SweepAxis::FieldY | SweepAxis::FieldZ)
    }
}

impl fmt::Display for SweepAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SweepAxis::VtiTemperature => "T (VTI)",
            SweepAxis::SampleTemperature => "T (sample)",
            SweepAxis::FieldX => "Bx",
            SweepAxis::FieldY => "By",
            SweepAxis::FieldZ => "Bz",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Environment – the scalar conditions shared by one measurement
// ---------------------------------------------------------------------------

/// Temperatures (K) and vector-magnet field components (T) logged with a sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Environment {
    pub vti_temperature: f64,
    pub sample_temperature: f64,
    pub bx: f64,
    pub by: f64,
    pub bz: f64,
}

impl Environment {
    pub fn value(&self, axis: SweepAxis) -> f64 {
        match axis {
            SweepAxis::VtiTemperature => self.vti_temperature,
            SweepAxis::SampleTemperature => self.sample_temperature,
            SweepAxis::FieldX => self.bx,
            SweepAxis::FieldY => self.by,
            SweepAxis::FieldZ => self.bz,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-device records
// ---------------------------------------------------------------------------

/// One current/voltage sweep of a single device, optionally with the
/// instrument's differential resistance. All traces have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct IvRecord {
    current: Vec<f64>,
    voltage: Vec<f64>,
    dvdi: Option<Vec<f64>>,
}

impl IvRecord {
    pub fn new(current: Vec<f64>, voltage: Vec<f64>, dvdi: Option<Vec<f64>>) -> Result<Self> {
        if current.len() != voltage.len() {
            return Err(DataError::Configuration(format!(
                "current has {} samples but voltage has {}",
                current.len(),
                voltage.len()
            )));
        }
        if let Some(d) = &dvdi {
            if d.len() != current.len() {
                return Err(DataError::Configuration(format!(
                    "current has {} samples but dV/dI has {}",
                    current.len(),
                    d.len()
                )));
            }
        }
        Ok(Self {
            current,
            voltage,
            dvdi,
        })
    }

    pub fn current(&self) -> &[f64] {
        &self.current
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn dvdi(&self) -> Option<&[f64]> {
        self.dvdi.as_deref()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Remove a series resistance `r`: `V -= r*I`, `dV/dI -= r`.
    pub(crate) fn subtract_series_resistance(&mut self, r: f64) {
        for (v, i) in self.voltage.iter_mut().zip(&self.current) {
            *v -= r * i;
        }
        if let Some(d) = &mut self.dvdi {
            for value in d.iter_mut() {
                *value -= r;
            }
        }
    }
}

/// Lock-in amplifier readout (magnitude R and phase) of a single device.
#[derive(Debug, Clone, PartialEq)]
pub struct LockinRecord {
    pub magnitude: Vec<f64>,
    pub phase: Vec<f64>,
}

/// What an instrument recorded for one device during one measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceRecord {
    Iv(IvRecord),
    Lockin(LockinRecord),
}

impl DeviceRecord {
    pub fn len(&self) -> usize {
        match self {
            DeviceRecord::Iv(iv) => iv.len(),
            DeviceRecord::Lockin(l) => l.magnitude.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Measurement – one distinct environmental condition
// ---------------------------------------------------------------------------

/// All device readings taken while the environment stayed constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    environment: Environment,
    devices: Vec<DeviceRecord>,
}

impl Measurement {
    pub fn new(environment: Environment, devices: Vec<DeviceRecord>) -> Self {
        Self {
            environment,
            devices,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environmental(&self, axis: SweepAxis) -> f64 {
        self.environment.value(axis)
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device(&self, device: usize) -> Result<&DeviceRecord> {
        self.devices.get(device).ok_or_else(|| {
            DataError::Configuration(format!(
                "device {device} out of range ({} devices)",
                self.devices.len()
            ))
        })
    }

    /// IV record of `device`; fails if the device carries lock-in data.
    pub fn iv(&self, device: usize) -> Result<&IvRecord> {
        match self.device(device)? {
            DeviceRecord::Iv(iv) => Ok(iv),
            DeviceRecord::Lockin(_) => Err(DataError::Configuration(format!(
                "device {device} holds lock-in data, not an IV sweep"
            ))),
        }
    }

    /// Lock-in record of `device`; fails if the device carries IV data.
    pub fn lockin(&self, device: usize) -> Result<&LockinRecord> {
        match self.device(device)? {
            DeviceRecord::Lockin(l) => Ok(l),
            DeviceRecord::Iv(_) => Err(DataError::Configuration(format!(
                "device {device} holds an IV sweep, not lock-in data"
            ))),
        }
    }

    pub(crate) fn iv_mut(&mut self, device: usize) -> Result<&mut IvRecord> {
        let count = self.devices.len();
        match self.devices.get_mut(device) {
            Some(DeviceRecord::Iv(iv)) => Ok(iv),
            Some(DeviceRecord::Lockin(_)) => Err(DataError::Configuration(format!(
                "device {device} holds lock-in data, not an IV sweep"
            ))),
            None => Err(DataError::Configuration(format!(
                "device {device} out of range ({count} devices)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Instrument – which family of files a dataset was read from
// ---------------------------------------------------------------------------

/// Instrument family; decides the column conventions used by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instrument {
    /// DC source-meter: `I(..)` / `V(..)` per device.
    Keithley,
    /// Lock-in IV setup: `I_DC(..)` / `DC(..)` / `dV/dI(..)` per device.
    Synktek { invert_voltage: bool },
    /// Lock-in amplifier: `R(..)` / `Phi(..)` per device.
    Lockin,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Keithley => f.write_str("Keithley"),
            Instrument::Synktek { .. } => f.write_str("Synktek"),
            Instrument::Lockin => f.write_str("Lock-in"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – ordered measurements from one or more files
// ---------------------------------------------------------------------------

/// Measurements in file-append, then chronological, order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    measurements: Vec<Measurement>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement. Every measurement must carry the same number of devices.
    pub fn push(&mut self, measurement: Measurement) -> Result<()> {
        if let Some(first) = self.measurements.first() {
            if first.device_count() != measurement.device_count() {
                return Err(DataError::Configuration(format!(
                    "measurement has {} devices, dataset has {}",
                    measurement.device_count(),
                    first.device_count()
                )));
            }
        }
        self.measurements.push(measurement);
        Ok(())
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub(crate) fn measurements_mut(&mut self) -> &mut [Measurement] {
        &mut self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn device_count(&self) -> usize {
        self.measurements.first().map_or(0, Measurement::device_count)
    }

    /// Environmental values along `axis`, one per measurement.
    pub fn axis_values(&self, axis: SweepAxis) -> Vec<f64> {
        self.measurements
            .iter()
            .map(|m| m.environmental(axis))
            .collect()
    }

    /// Whether every measurement has the same number of samples for `device`,
    /// so that the sweep can be laid out on a regular grid.
    pub fn is_regular(&self, device: usize) -> Result<bool> {
        let mut lengths = self
            .measurements
            .iter()
            .map(|m| m.device(device).map(DeviceRecord::len));
        let first = match lengths.next() {
            Some(len) => len?,
            None => return Ok(true),
        };
        for len in lengths {
            if len? != first {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(n: usize) -> DeviceRecord {
        let current: Vec<f64> = (0..n).map(|i| i as f64).collect();
        DeviceRecord::Iv(IvRecord::new(current.clone(), current, None).unwrap())
    }

    #[test]
    fn iv_record_rejects_mismatched_lengths() {
        assert!(IvRecord::new(vec![0.0, 1.0], vec![0.0], None).is_err());
        assert!(IvRecord::new(vec![0.0, 1.0], vec![0.0, 1.0], Some(vec![1.0])).is_err());
        assert!(IvRecord::new(vec![0.0, 1.0], vec![0.0, 1.0], Some(vec![1.0, 1.0])).is_ok());
    }

    #[test]
    fn series_subtraction_updates_voltage_and_dvdi() {
        let mut rec =
            IvRecord::new(vec![-1.0, 0.0, 2.0], vec![-3.0, 0.0, 6.0], Some(vec![3.0; 3])).unwrap();
        rec.subtract_series_resistance(2.0);
        assert_eq!(rec.voltage(), &[-1.0, 0.0, 2.0]);
        assert_eq!(rec.dvdi().unwrap(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn dataset_enforces_device_count() {
        let mut ds = Dataset::new();
        ds.push(Measurement::new(Environment::default(), vec![iv(3), iv(3)]))
            .unwrap();
        let err = ds.push(Measurement::new(Environment::default(), vec![iv(3)]));
        assert!(matches!(err, Err(DataError::Configuration(_))));
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.device_count(), 2);
    }

    #[test]
    fn regularity_is_per_device() {
        let mut ds = Dataset::new();
        ds.push(Measurement::new(Environment::default(), vec![iv(3), iv(4)]))
            .unwrap();
        ds.push(Measurement::new(Environment::default(), vec![iv(3), iv(5)]))
            .unwrap();
        assert!(ds.is_regular(0).unwrap());
        assert!(!ds.is_regular(1).unwrap());
        assert!(ds.is_regular(2).is_err());
    }

    #[test]
    fn lockin_device_is_not_an_iv() {
        let m = Measurement::new(
            Environment::default(),
            vec![DeviceRecord::Lockin(LockinRecord {
                magnitude: vec![1.0],
                phase: vec![0.0],
            })],
        );
        assert!(m.iv(0).is_err());
        assert!(m.lockin(0).is_ok());
    }
}
