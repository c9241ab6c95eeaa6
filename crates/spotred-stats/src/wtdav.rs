//! Inverse-variance weighted mean with MSWD and probability of fit.

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::Measurement;
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

/// Column of the mean in a weighted-mean row.
pub const MEAN: usize = 0;
/// Column of the absolute one-sigma uncertainty.
pub const ONE_SIGMA_ABS: usize = 1;
/// Column of the absolute two-sigma uncertainty.
pub const TWO_SIGMA_ABS: usize = 2;
/// Column of the 95% confidence half-width.
pub const CI95: usize = 3;
/// Column of the number of values combined.
pub const COUNT: usize = 4;
/// Column of the mean square weighted deviation.
pub const MSWD: usize = 5;
/// Column of the probability of fit.
pub const PROBABILITY: usize = 6;
/// Width of a weighted-mean row.
pub const WIDTH: usize = 7;

/// Probability below which the 95% interval is expanded by Student's t and
/// the square root of the MSWD.
pub const EXPANSION_THRESHOLD: f64 = 0.05;

const Z_975: f64 = 1.959_963_984_540_054;

fn stats_error(code: &str, message: impl Into<String>) -> ReductionError {
    ReductionError::Statistics(ErrorInfo::new(code, message.into()))
}

/// Result of [`weighted_mean`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedMean {
    /// Inverse-variance weighted mean.
    pub mean: f64,
    /// Absolute one-sigma uncertainty of the mean.
    pub one_sigma_abs: f64,
    /// Absolute two-sigma uncertainty of the mean.
    pub two_sigma_abs: f64,
    /// 95% confidence half-width.
    pub ci95: f64,
    /// Number of values combined.
    pub n: usize,
    /// Mean square weighted deviation.
    pub mswd: f64,
    /// Probability of fit of the MSWD for `n - 1` degrees of freedom.
    pub probability: f64,
}

impl WeightedMean {
    /// Row in the fixed column order described by the module constants.
    pub fn to_row(&self) -> Vec<f64> {
        vec![
            self.mean,
            self.one_sigma_abs,
            self.two_sigma_abs,
            self.ci95,
            self.n as f64,
            self.mswd,
            self.probability,
        ]
    }
}

/// Computes the inverse-variance weighted mean of `values`.
///
/// Every uncertainty must be finite and strictly positive. A single value
/// yields an MSWD of zero and a probability of one.
pub fn weighted_mean(values: &[Measurement]) -> Result<WeightedMean, ReductionError> {
    if values.is_empty() {
        return Err(stats_error("empty-group", "weighted mean of no values"));
    }
    if let Some(bad) = values
        .iter()
        .position(|m| !(m.one_sigma_abs.is_finite() && m.one_sigma_abs > 0.0) || !m.value.is_finite())
    {
        return Err(ReductionError::Statistics(
            ErrorInfo::new("invalid-uncertainty", "values need finite positive uncertainties")
                .with_context("index", bad.to_string()),
        ));
    }

    let mut sum_weights = 0.0;
    let mut sum_weighted = 0.0;
    for m in values {
        let weight = 1.0 / (m.one_sigma_abs * m.one_sigma_abs);
        sum_weights += weight;
        sum_weighted += weight * m.value;
    }
    let mean = sum_weighted / sum_weights;
    let one_sigma_abs = (1.0 / sum_weights).sqrt();

    let n = values.len();
    let (mswd, probability) = if n < 2 {
        (0.0, 1.0)
    } else {
        let chi_squared: f64 = values
            .iter()
            .map(|m| {
                let residual = (m.value - mean) / m.one_sigma_abs;
                residual * residual
            })
            .sum();
        let dof = (n - 1) as f64;
        (chi_squared / dof, probability_of_fit(chi_squared, dof)?)
    };

    let ci95 = if n < 2 || probability >= EXPANSION_THRESHOLD {
        Z_975 * one_sigma_abs
    } else {
        student_t_975((n - 1) as f64)? * one_sigma_abs * mswd.sqrt()
    };

    Ok(WeightedMean {
        mean,
        one_sigma_abs,
        two_sigma_abs: 2.0 * one_sigma_abs,
        ci95,
        n,
        mswd,
        probability,
    })
}

/// Upper-tail probability of `chi_squared` for `dof` degrees of freedom.
pub fn probability_of_fit(chi_squared: f64, dof: f64) -> Result<f64, ReductionError> {
    let distribution =
        ChiSquared::new(dof).map_err(|err| stats_error("chi-squared", err.to_string()))?;
    Ok((1.0 - distribution.cdf(chi_squared)).clamp(0.0, 1.0))
}

fn student_t_975(dof: f64) -> Result<f64, ReductionError> {
    let distribution =
        StudentsT::new(0.0, 1.0, dof).map_err(|err| stats_error("students-t", err.to_string()))?;
    Ok(distribution.inverse_cdf(0.975))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(values: &[f64], sigma: f64) -> Vec<Measurement> {
        values.iter().map(|&v| Measurement::new(v, sigma)).collect()
    }

    #[test]
    fn equal_weights_reduce_to_arithmetic_mean() {
        let wm = weighted_mean(&sample(&[100.0, 102.0, 101.0, 99.0], 2.0)).unwrap();
        assert!((wm.mean - 100.5).abs() < 1e-12);
        assert!((wm.one_sigma_abs - 1.0).abs() < 1e-12);
        assert!((wm.mswd - 5.0 / 12.0).abs() < 1e-12);
        assert!(wm.probability > 0.7 && wm.probability < 0.8);
        assert_eq!(wm.n, 4);
        assert!((wm.ci95 - Z_975).abs() < 1e-12);
    }

    #[test]
    fn overdispersed_group_expands_interval() {
        let wm = weighted_mean(&sample(&[100.0, 102.0, 101.0, 250.0, 99.0], 2.0)).unwrap();
        assert!(wm.probability < EXPANSION_THRESHOLD);
        assert!(wm.ci95 > wm.two_sigma_abs * wm.mswd.sqrt());
    }

    #[test]
    fn single_value_is_trivially_coherent() {
        let wm = weighted_mean(&[Measurement::new(5.0, 0.5)]).unwrap();
        assert_eq!(wm.mean, 5.0);
        assert_eq!(wm.mswd, 0.0);
        assert_eq!(wm.probability, 1.0);
    }

    #[test]
    fn rejects_empty_and_zero_sigma_inputs() {
        assert_eq!(weighted_mean(&[]).unwrap_err().info().code, "empty-group");
        let err = weighted_mean(&[Measurement::new(1.0, 0.0)]).unwrap_err();
        assert_eq!(err.info().code, "invalid-uncertainty");
    }

    #[test]
    fn row_layout_matches_column_constants() {
        let wm = weighted_mean(&sample(&[10.0, 11.0, 12.0], 1.0)).unwrap();
        let row = wm.to_row();
        assert_eq!(row.len(), WIDTH);
        assert_eq!(row[MEAN], wm.mean);
        assert_eq!(row[COUNT], 3.0);
        assert_eq!(row[PROBABILITY], wm.probability);
    }
}
