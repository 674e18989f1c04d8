//! Writes synthetic Keithley, Synktek and lock-in files for trying out the
//! viewer: a Josephson-junction field sweep with a Fraunhofer-like critical
//! current, a small series resistance and Gaussian noise.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

const ENVIRONMENT_HEADER: &str = "T(K)[VTI] T(K)[Sample] Bx(T) By(T) Bz(T)";

/// Critical current at zero field (A).
const IC0: f64 = 2e-6;
/// Field period of the Fraunhofer pattern (T).
const FIELD_PERIOD: f64 = 4e-3;
/// Normal-state resistance (Ω).
const NORMAL_RESISTANCE: f64 = 50.0;
/// Wiring resistance in series with every device (Ω).
const SERIES_RESISTANCE: f64 = 2.0;

fn fraunhofer(bz: f64) -> f64 {
    let phase = std::f64::consts::PI * bz / FIELD_PERIOD;
    if phase == 0.0 {
        IC0
    } else {
        IC0 * (phase.sin() / phase).abs()
    }
}

/// Overdamped junction: zero voltage below Ic, hyperbolic above.
fn junction_voltage(current: f64, ic: f64) -> f64 {
    if current.abs() <= ic {
        0.0
    } else {
        current.signum() * NORMAL_RESISTANCE * (current * current - ic * ic).sqrt()
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn field_steps() -> Vec<f64> {
    (0..=20).map(|k| -10e-3 + k as f64 * 1e-3).collect()
}

fn bias_steps() -> Vec<f64> {
    (0..=80).map(|k| -8e-6 + k as f64 * 0.2e-6).collect()
}

/// Environment columns must stay constant within one sweep.
fn environment_row(bz: f64) -> String {
    format!("1.5 1.52 0 0 {bz:e}")
}

fn create(dir: &Path, name: &str) -> anyhow::Result<(PathBuf, BufWriter<File>)> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    Ok((path, BufWriter::new(file)))
}

/// Two devices; the second has a 30 % smaller critical current.
fn write_keithley(dir: &Path, rng: &mut SimpleRng) -> anyhow::Result<PathBuf> {
    let (path, mut out) = create(dir, "keithley_field_sweep.txt")?;
    writeln!(out, "{ENVIRONMENT_HEADER} I(dev1) V(dev1) I(dev2) V(dev2)")?;
    for bz in field_steps() {
        let ic = fraunhofer(bz);
        let env = environment_row(bz);
        for i in bias_steps() {
            let v1 = junction_voltage(i, ic) + SERIES_RESISTANCE * i + rng.gauss(0.0, 2e-8);
            let v2 = junction_voltage(i, 0.7 * ic) + SERIES_RESISTANCE * i + rng.gauss(0.0, 2e-8);
            writeln!(out, "{env} {i:e} {v1:e} {i:e} {v2:e}")?;
        }
    }
    out.flush()?;
    Ok(path)
}

/// Lock-in IV with a DC voltage offset and an instrument dV/dI.
fn write_synktek(dir: &Path, rng: &mut SimpleRng) -> anyhow::Result<PathBuf> {
    let (path, mut out) = create(dir, "synktek_field_sweep.txt")?;
    writeln!(out, "{ENVIRONMENT_HEADER} I_DC(dev1) DC(dev1) dV/dI(dev1)")?;
    let offset = 3e-6;
    let step = 1e-9;
    for bz in field_steps() {
        let ic = fraunhofer(bz);
        let env = environment_row(bz);
        for i in bias_steps() {
            let v = junction_voltage(i, ic) + SERIES_RESISTANCE * i;
            let didv = (junction_voltage(i + step, ic) - junction_voltage(i - step, ic)) / (2.0 * step)
                + SERIES_RESISTANCE;
            let noisy_v = v + offset + rng.gauss(0.0, 2e-8);
            let noisy_didv = didv + rng.gauss(0.0, 0.05);
            writeln!(out, "{env} {i:e} {noisy_v:e} {noisy_didv:e}")?;
        }
    }
    out.flush()?;
    Ok(path)
}

/// Twenty lock-in readings per field point.
fn write_lockin(dir: &Path, rng: &mut SimpleRng) -> anyhow::Result<PathBuf> {
    let (path, mut out) = create(dir, "lockin_field_sweep.txt")?;
    writeln!(out, "{ENVIRONMENT_HEADER} R(dev1) Phi(dev1)")?;
    for bz in field_steps() {
        let env = environment_row(bz);
        let r = 1e-6 * (1.0 + (bz / FIELD_PERIOD).powi(2));
        for _ in 0..20 {
            let noisy_r = r + rng.gauss(0.0, 2e-8);
            let phi = rng.gauss(0.0, 0.5);
            writeln!(out, "{env} {noisy_r:e} {phi:e}")?;
        }
    }
    out.flush()?;
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    let dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "sample_data".into()));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let written = [
        write_keithley(&dir, &mut rng)?,
        write_synktek(&dir, &mut rng)?,
        write_lockin(&dir, &mut rng)?,
    ];

    for path in &written {
        println!("Wrote {}", path.display());
    }
    println!("{} field steps per file", field_steps().len());
    Ok(())
}
