use super::error::{DataError, Result};

/// Best-fit parameters of `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Parameter covariance, ordered (slope, intercept). Infinite when the
    /// fit has no residual degrees of freedom.
    pub covariance: [[f64; 2]; 2],
}

/// Initial guess handed to a fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineGuess {
    pub slope: f64,
    pub intercept: f64,
}

/// Least-squares fitting of an unconstrained linear model.
pub trait CurveFitter {
    fn fit_line(&self, x: &[f64], y: &[f64], guess: LineGuess) -> Result<LineFit>;
}

/// Ordinary least squares in closed form. The guess is not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearLeastSquares;

impl CurveFitter for LinearLeastSquares {
    fn fit_line(&self, x: &[f64], y: &[f64], _guess: LineGuess) -> Result<LineFit> {
        if x.len() != y.len() {
            return Err(DataError::Numerical(format!(
                "fit input lengths differ: {} x vs {} y",
                x.len(),
                y.len()
            )));
        }
        let n = x.len();
        if n < 2 {
            return Err(DataError::Numerical(format!(
                "linear fit needs at least 2 points, got {n}"
            )));
        }

        let nf = n as f64;
        let mean_x = x.iter().sum::<f64>() / nf;
        let mean_y = y.iter().sum::<f64>() / nf;

        // Centered sums keep the normal equations well conditioned for µA/µV data.
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (&xi, &yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            sxx += dx * dx;
            sxy += dx * (yi - mean_y);
        }
        if sxx <= 0.0 || !sxx.is_finite() {
            return Err(DataError::Numerical(
                "linear fit is degenerate: x values have no spread".into(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let covariance = if n > 2 {
            let ssr: f64 = x
                .iter()
                .zip(y)
                .map(|(&xi, &yi)| {
                    let r = yi - (slope * xi + intercept);
                    r * r
                })
                .sum();
            let s2 = ssr / (nf - 2.0);
            let var_slope = s2 / sxx;
            let cov = -mean_x * var_slope;
            let var_intercept = s2 * (1.0 / nf + mean_x * mean_x / sxx);
            [[var_slope, cov], [cov, var_intercept]]
        } else {
            [[f64::INFINITY; 2]; 2]
        };

        Ok(LineFit {
            slope,
            intercept,
            covariance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GUESS: LineGuess = LineGuess {
        slope: 0.0,
        intercept: 0.0,
    };

    #[test]
    fn recovers_exact_line() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 1e-6).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 12.5 * xi + 3e-6).collect();
        let fit = LinearLeastSquares.fit_line(&x, &y, GUESS).unwrap();
        assert_relative_eq!(fit.slope, 12.5, max_relative = 1e-9);
        assert_relative_eq!(fit.intercept, 3e-6, max_relative = 1e-6);
        assert!(fit.covariance[0][0].abs() < 1e-12);
    }

    #[test]
    fn covariance_is_positive_for_noisy_data() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.1, 0.9, 2.2, 2.9];
        let fit = LinearLeastSquares.fit_line(&x, &y, GUESS).unwrap();
        assert!(fit.covariance[0][0] > 0.0);
        assert!(fit.covariance[1][1] > 0.0);
    }

    #[test]
    fn two_points_have_infinite_covariance() {
        let fit = LinearLeastSquares
            .fit_line(&[0.0, 1.0], &[1.0, 3.0], GUESS)
            .unwrap();
        assert_relative_eq!(fit.slope, 2.0);
        assert!(fit.covariance[0][0].is_infinite());
    }

    #[test]
    fn degenerate_inputs_are_numerical_errors() {
        assert!(matches!(
            LinearLeastSquares.fit_line(&[1.0], &[1.0], GUESS),
            Err(DataError::Numerical(_))
        ));
        assert!(matches!(
            LinearLeastSquares.fit_line(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0], GUESS),
            Err(DataError::Numerical(_))
        ));
    }
}
