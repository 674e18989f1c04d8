use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use super::error::{DataError, Result};
use super::model::{
    Dataset, DeviceRecord, Environment, Instrument, IvRecord, LockinRecord, Measurement,
};

/// Vector-magnet environment columns, in [`Environment`] field order.
pub const VTI_TEMPERATURE_COLUMN: &str = "T(K)[VTI]";
pub const SAMPLE_TEMPERATURE_COLUMN: &str = "T(K)[Sample]";
pub const BX_COLUMN: &str = "Bx(T)";
pub const BY_COLUMN: &str = "By(T)";
pub const BZ_COLUMN: &str = "Bz(T)";

const ENVIRONMENT_COLUMNS: [&str; 5] = [
    VTI_TEMPERATURE_COLUMN,
    SAMPLE_TEMPERATURE_COLUMN,
    BX_COLUMN,
    BY_COLUMN,
    BZ_COLUMN,
];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load several files into one dataset. Measurements are appended file by
/// file in the order given; measurements from different files are never
/// merged, even when their conditions coincide.
///
/// Column conventions per instrument:
/// * Keithley – `I(..)` and `V(..)` per device
/// * Synktek  – `I_DC(..)`, `DC(..)` and `dV/dI(..)` per device
/// * Lock-in  – `R(..)` and `Phi(..)` per device
///
/// Every file must also carry the vector-magnet columns `T(K)[VTI]`,
/// `T(K)[Sample]`, `Bx(T)`, `By(T)` and `Bz(T)`.
pub fn load_dataset<P: AsRef<Path>>(paths: &[P], instrument: Instrument) -> Result<Dataset> {
    if paths.is_empty() {
        return Err(DataError::Configuration("no input files given".into()));
    }
    for path in paths {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DataError::Configuration("input path list contains an empty path".into()));
        }
        if path.is_dir() {
            return Err(DataError::Configuration(format!(
                "input path {} is a directory",
                path.display()
            )));
        }
    }

    let mut dataset = Dataset::new();
    for path in paths {
        append_file(&mut dataset, path.as_ref(), instrument)?;
    }
    log::info!(
        "Loaded {} measurements ({} devices) from {} file(s)",
        dataset.len(),
        dataset.device_count(),
        paths.len()
    );
    Ok(dataset)
}

/// Load a single file.
pub fn load_file(path: &Path, instrument: Instrument) -> Result<Dataset> {
    load_dataset(&[path], instrument)
}

/// Parse `path` and append its measurements to `dataset`.
///
/// Only the environment and device columns are validated: a row is dropped
/// when one of those fields fails to parse, while text in any other column
/// (a wall-clock `Time`, say) is ignored.
pub fn append_file(dataset: &mut Dataset, path: &Path, instrument: Instrument) -> Result<()> {
    let mut table = read_table(path)?;
    let environment_idx = table.environment_indices(path)?;
    let devices = device_columns(&table, path, instrument)?;

    let used: Vec<usize> = environment_idx
        .iter()
        .copied()
        .chain(devices.iter().flat_map(DeviceColumns::indices))
        .collect();
    let dropped = table.retain_parsed_rows(&used);
    if dropped > 0 {
        log::warn!(
            "{}: dropped {dropped} row(s) with non-numeric measurement fields",
            path.display()
        );
    }
    if table.row_count() == 0 {
        return Err(DataError::format(path, "no valid data rows"));
    }

    let environment = environment_idx.map(|idx| table.columns[idx].as_slice());
    let spans = measurement_spans(
        &measurement_boundaries(&environment),
        table.row_count(),
    );
    log::debug!(
        "{}: {} rows, {} measurements",
        path.display(),
        table.row_count(),
        spans.len()
    );

    for span in spans {
        let start = span.start;
        let env = Environment {
            vti_temperature: environment[0][start],
            sample_temperature: environment[1][start],
            bx: environment[2][start],
            by: environment[3][start],
            bz: environment[4][start],
        };
        let records = devices
            .iter()
            .map(|dev| dev.record(&table, span.clone(), instrument))
            .collect::<Result<Vec<_>>>()?;
        dataset.push(Measurement::new(env, records))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Measurement boundaries
// ---------------------------------------------------------------------------

/// First sample index of every measurement: index 0, plus each index where
/// any environment column differs (exactly) from the previous sample.
pub fn measurement_boundaries(columns: &[&[f64]]) -> Vec<usize> {
    let len = columns.first().map_or(0, |c| c.len());
    if len == 0 {
        return Vec::new();
    }
    let mut boundaries = vec![0];
    for i in 1..len {
        if columns.iter().any(|c| c[i] != c[i - 1]) {
            boundaries.push(i);
        }
    }
    boundaries
}

/// Turn boundaries into half-open spans; the last runs to `len`.
pub fn measurement_spans(boundaries: &[usize], len: usize) -> Vec<Range<usize>> {
    boundaries
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = boundaries.get(i + 1).copied().unwrap_or(len);
            start..end
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Whitespace table reader
// ---------------------------------------------------------------------------

/// A parsed instrument file: header names and numeric columns.
///
/// Fields that fail to parse are stored as NaN and flagged, so that only the
/// columns a reader actually uses decide whether a row is kept.
#[derive(Debug, Clone)]
pub struct Table {
    pub headers: Vec<String>,
    pub columns: Vec<Vec<f64>>,
    unparsed: Vec<Vec<bool>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Indices of columns named `<prefix>(...)`, in header order.
    pub fn prefixed_columns(&self, prefix: &str) -> Vec<usize> {
        let pattern = format!("{prefix}(");
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with(&pattern))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether the field at (`row`, `column`) failed to parse.
    pub fn is_unparsed(&self, row: usize, column: usize) -> bool {
        self.unparsed[column][row]
    }

    /// Drop every row in which one of the `used` columns failed to parse.
    /// Returns the number of rows dropped.
    pub fn retain_parsed_rows(&mut self, used: &[usize]) -> usize {
        let keep: Vec<bool> = (0..self.row_count())
            .map(|row| used.iter().all(|&col| !self.unparsed[col][row]))
            .collect();
        let dropped = keep.iter().filter(|&&k| !k).count();
        if dropped == 0 {
            return 0;
        }
        for (column, flags) in self.columns.iter_mut().zip(&mut self.unparsed) {
            let mut k = keep.iter().copied();
            column.retain(|_| k.next().unwrap_or(false));
            let mut k = keep.iter().copied();
            flags.retain(|_| k.next().unwrap_or(false));
        }
        dropped
    }

    fn environment_indices(&self, path: &Path) -> Result<[usize; 5]> {
        let mut idx = [0; 5];
        for (slot, name) in idx.iter_mut().zip(ENVIRONMENT_COLUMNS) {
            *slot = self
                .column_index(name)
                .ok_or_else(|| DataError::format(path, format!("missing '{name}' column")))?;
        }
        Ok(idx)
    }
}

/// Read a whitespace-delimited table whose first line holds the column names.
/// Rows with the wrong field count are dropped; non-numeric fields are kept
/// as NaN and flagged (see [`Table::retain_parsed_rows`]).
pub fn read_table(path: &Path) -> Result<Table> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(DataError::format(path, "empty file, no header line")),
    };
    let headers: Vec<String> = header.split_whitespace().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(DataError::format(path, "header line has no column names"));
    }

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut unparsed: Vec<Vec<bool>> = vec![Vec::new(); headers.len()];
    let mut short = 0usize;

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if line.split_whitespace().count() != headers.len() {
            short += 1;
            continue;
        }
        for ((col, flags), field) in columns.iter_mut().zip(&mut unparsed).zip(line.split_whitespace()) {
            match field.parse::<f64>() {
                Ok(v) => {
                    col.push(v);
                    flags.push(false);
                }
                Err(_) => {
                    col.push(f64::NAN);
                    flags.push(true);
                }
            }
        }
    }

    if short > 0 {
        log::warn!(
            "{}: dropped {short} row(s) with the wrong field count",
            path.display()
        );
    }
    Ok(Table {
        headers,
        columns,
        unparsed,
    })
}

// ---------------------------------------------------------------------------
// Per-device column sets
// ---------------------------------------------------------------------------

/// Column indices that make up one device's readout.
#[derive(Debug, Clone, Copy)]
struct DeviceColumns {
    bias: usize,
    response: usize,
    dvdi: Option<usize>,
}

fn device_columns(table: &Table, path: &Path, instrument: Instrument) -> Result<Vec<DeviceColumns>> {
    let (bias_prefix, response_prefix, dvdi_prefix) = match instrument {
        Instrument::Keithley => ("I", "V", None),
        Instrument::Synktek { .. } => ("I_DC", "DC", Some("dV/dI")),
        Instrument::Lockin => ("R", "Phi", None),
    };
    let bias = table.prefixed_columns(bias_prefix);
    let response = table.prefixed_columns(response_prefix);
    let dvdi = dvdi_prefix.map(|p| table.prefixed_columns(p));

    if bias.is_empty() {
        return Err(DataError::format(
            path,
            format!("no '{bias_prefix}(..)' device columns"),
        ));
    }
    if response.len() != bias.len() {
        return Err(DataError::format(
            path,
            format!(
                "{} '{bias_prefix}(..)' columns but {} '{response_prefix}(..)' columns",
                bias.len(),
                response.len()
            ),
        ));
    }
    if let Some(d) = &dvdi {
        if d.len() != bias.len() {
            return Err(DataError::format(
                path,
                format!("{} bias columns but {} 'dV/dI(..)' columns", bias.len(), d.len()),
            ));
        }
    }

    Ok(bias
        .iter()
        .zip(&response)
        .enumerate()
        .map(|(i, (&bias, &response))| DeviceColumns {
            bias,
            response,
            dvdi: dvdi.as_ref().map(|d| d[i]),
        })
        .collect())
}

impl DeviceColumns {
    fn indices(&self) -> impl Iterator<Item = usize> {
        [self.bias, self.response].into_iter().chain(self.dvdi)
    }

    fn record(&self, table: &Table, span: Range<usize>, instrument: Instrument) -> Result<DeviceRecord> {
        let slice = |idx: usize| table.columns[idx][span.clone()].to_vec();
        match instrument {
            Instrument::Keithley => Ok(DeviceRecord::Iv(IvRecord::new(
                slice(self.bias),
                slice(self.response),
                None,
            )?)),
            Instrument::Synktek { invert_voltage } => {
                let current = slice(self.bias);
                let voltage = fix_origin(&current, slice(self.response), invert_voltage);
                let dvdi = self.dvdi.map(slice);
                Ok(DeviceRecord::Iv(IvRecord::new(current, voltage, dvdi)?))
            }
            Instrument::Lockin => Ok(DeviceRecord::Lockin(LockinRecord {
                magnitude: slice(self.bias),
                phase: slice(self.response),
            })),
        }
    }
}

/// Shift the voltage so that it is zero at the sample nearest zero current,
/// optionally flipping its sign.
fn fix_origin(current: &[f64], mut voltage: Vec<f64>, invert: bool) -> Vec<f64> {
    let Some(center) = argmin_abs(current) else {
        return voltage;
    };
    let offset = voltage[center];
    let sign = if invert { -1.0 } else { 1.0 };
    for v in voltage.iter_mut() {
        *v = sign * (*v - offset);
    }
    voltage
}

/// Index of the smallest |value|; the first one on ties.
pub(crate) fn argmin_abs(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v.abs() >= b => best,
            _ => Some((i, v.abs())),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Time T(K)[VTI] T(K)[Sample] Bx(T) By(T) Bz(T)";

    #[test]
    fn boundaries_follow_environment_changes() {
        let col = [1.0, 1.0, 2.0, 2.0, 2.0, 3.0];
        let flat = [0.0; 6];
        let b = measurement_boundaries(&[&col[..], &flat[..]]);
        assert_eq!(b, vec![0, 2, 5]);
        let spans = measurement_spans(&b, col.len());
        let lengths: Vec<usize> = spans.iter().map(|s| s.len()).collect();
        assert_eq!(lengths, vec![2, 3, 1]);
    }

    #[test]
    fn any_column_starts_a_new_measurement() {
        let a = [1.0, 1.0, 1.0];
        let b = [0.0, 0.0, 0.5];
        assert_eq!(measurement_boundaries(&[&a[..], &b[..]]), vec![0, 2]);
        let empty: [f64; 0] = [];
        assert!(measurement_boundaries(&[&empty[..]]).is_empty());
    }

    #[test]
    fn argmin_abs_prefers_first_tie() {
        assert_eq!(argmin_abs(&[-2.0, 1.0, -1.0, 3.0]), Some(1));
        assert_eq!(argmin_abs(&[]), None);
    }

    #[test]
    fn read_table_flags_unparsed_fields() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a b c")?;
        writeln!(file, "1 2 3")?;
        writeln!(file, "4 x 6")?;
        writeln!(file, "7 8")?;
        writeln!(file)?;
        writeln!(file, "9 10 11")?;

        let mut table = read_table(file.path())?;
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.row_count(), 3);
        assert!(table.is_unparsed(1, 1));
        assert!(table.columns[1][1].is_nan());

        // Column `b` is not read: every row survives.
        assert_eq!(table.retain_parsed_rows(&[0, 2]), 0);
        assert_eq!(table.columns[2], vec![3.0, 6.0, 11.0]);

        assert_eq!(table.retain_parsed_rows(&[0, 1]), 1);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns[1], vec![2.0, 10.0]);
        assert_eq!(table.columns[2], vec![3.0, 11.0]);
        Ok(())
    }

    #[test]
    fn text_in_unread_column_keeps_rows() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{HEADER} I(a) V(a)")?;
        writeln!(file, "12:00:01 1.5 1.6 0 0 0.0 -1 -2")?;
        writeln!(file, "12:00:02 1.5 1.6 0 0 0.0 0 0")?;
        writeln!(file, "12:00:03 1.5 1.6 0 0 0.0 1 2")?;
        writeln!(file, "12:00:04 1.5 1.6 0 0 0.0 x 4")?;

        let ds = load_file(file.path(), Instrument::Keithley)?;
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.measurements()[0].iv(0)?.current(), &[-1.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn file_without_valid_rows_is_format_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{HEADER} I(a) V(a)")?;
        writeln!(file, "0 1.5 1.6 0 0 n/a -1 -2")?;
        writeln!(file, "1 1.5 1.6 0 0 0.0 -1")?;
        let err = load_file(file.path(), Instrument::Keithley).unwrap_err();
        assert!(matches!(err, DataError::Format { .. }));
        Ok(())
    }

    #[test]
    fn keithley_file_is_split_per_condition() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{HEADER} I(dev1) V(dev1) I(dev2) V(dev2)")?;
        writeln!(file, "0 1.5 1.6 0 0 0.01 -1 -2 -1 -4")?;
        writeln!(file, "1 1.5 1.6 0 0 0.01 1 2 1 4")?;
        writeln!(file, "2 1.5 1.6 0 0 0.02 -1 -3 -1 -6")?;
        writeln!(file, "3 1.5 1.6 0 0 0.02 0 0 0 0")?;
        writeln!(file, "4 1.5 1.6 0 0 0.02 1 3 1 6")?;

        let ds = load_file(file.path(), Instrument::Keithley)?;
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.device_count(), 2);
        let second = &ds.measurements()[1];
        assert_eq!(second.environment().bz, 0.02);
        assert_eq!(second.iv(1)?.voltage(), &[-6.0, 0.0, 6.0]);
        assert!(second.iv(0)?.dvdi().is_none());
        Ok(())
    }

    #[test]
    fn missing_environment_column_is_format_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "T(K)[VTI] Bx(T) By(T) Bz(T) I(a) V(a)")?;
        writeln!(file, "1 0 0 0 1 1")?;
        let err = load_file(file.path(), Instrument::Keithley).unwrap_err();
        assert!(matches!(err, DataError::Format { .. }));
        Ok(())
    }

    #[test]
    fn missing_device_columns_is_format_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{HEADER}")?;
        writeln!(file, "0 1 1 0 0 0")?;
        let err = load_file(file.path(), Instrument::Keithley).unwrap_err();
        assert!(matches!(err, DataError::Format { .. }));
        Ok(())
    }

    #[test]
    fn synktek_voltage_origin_is_fixed() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{HEADER} I_DC(a) DC(a) dV/dI(a)")?;
        writeln!(file, "0 4 4 0 0 0 -1 0.5 2")?;
        writeln!(file, "1 4 4 0 0 0 0 1.0 2")?;
        writeln!(file, "2 4 4 0 0 0 1 3.0 2")?;

        let ds = load_file(file.path(), Instrument::Synktek { invert_voltage: false })?;
        let iv = ds.measurements()[0].iv(0)?;
        assert_eq!(iv.voltage(), &[-0.5, 0.0, 2.0]);
        assert_eq!(iv.dvdi(), Some(&[2.0, 2.0, 2.0][..]));

        let inverted = load_file(file.path(), Instrument::Synktek { invert_voltage: true })?;
        assert_eq!(inverted.measurements()[0].iv(0)?.voltage(), &[0.5, -0.0, -2.0]);
        Ok(())
    }

    #[test]
    fn lockin_file_yields_lockin_records() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{HEADER} R(ch1) Phi(ch1)")?;
        writeln!(file, "0 4 4 0.1 0 0 1e-6 10")?;
        writeln!(file, "1 4 4 0.2 0 0 2e-6 11")?;
        let ds = load_file(file.path(), Instrument::Lockin)?;
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.measurements()[1].lockin(0)?.magnitude, vec![2e-6]);
        Ok(())
    }

    #[test]
    fn empty_path_list_is_configuration_error() {
        let paths: [&Path; 0] = [];
        assert!(matches!(
            load_dataset(&paths, Instrument::Keithley),
            Err(DataError::Configuration(_))
        ));
        assert!(matches!(
            load_dataset(&[""], Instrument::Keithley),
            Err(DataError::Configuration(_))
        ));
    }
}
