//! Conversion between correlation and covariance matrices of a
//! [`ParametersModel`].
//!
//! Both directions scale by the absolute one-sigma uncertainty of the row and
//! column values. Values whose uncertainty is not strictly positive are left
//! out of the matrix dimension entirely.

use crate::errors::ReductionError;
use crate::parameters::{rho_key, NamedMatrix, ParametersModel};

/// Builds a covariance matrix from `correlation` using `sigmas` for scaling.
///
/// Labels absent from `correlation` contribute a unit diagonal and zero
/// off-diagonal correlation.
pub fn covariance_from_correlation(
    names: &[String],
    sigmas: &[f64],
    correlation: &NamedMatrix,
) -> NamedMatrix {
    let mut covariance = NamedMatrix::zeros(names.to_vec());
    for (row, row_name) in names.iter().enumerate() {
        for (col, col_name) in names.iter().enumerate() {
            let rho = lookup_correlation(correlation, row_name, col_name, row == col);
            covariance.set(row, col, rho * sigmas[row] * sigmas[col]);
        }
    }
    covariance
}

/// Builds a correlation matrix from `covariance` using `sigmas` for scaling.
pub fn correlation_from_covariance(
    names: &[String],
    sigmas: &[f64],
    covariance: &NamedMatrix,
) -> NamedMatrix {
    let mut correlation = NamedMatrix::zeros(names.to_vec());
    for (row, row_name) in names.iter().enumerate() {
        for (col, col_name) in names.iter().enumerate() {
            let cov = covariance.get(row_name, col_name).unwrap_or_else(|| {
                if row == col {
                    sigmas[row] * sigmas[row]
                } else {
                    0.0
                }
            });
            correlation.set(row, col, cov / (sigmas[row] * sigmas[col]));
        }
    }
    correlation
}

fn lookup_correlation(matrix: &NamedMatrix, row: &str, col: &str, diagonal: bool) -> f64 {
    match matrix.get(row, col) {
        Some(value) => value,
        None if diagonal => 1.0,
        None => 0.0,
    }
}

impl ParametersModel {
    fn eligible(&self) -> Result<(Vec<String>, Vec<f64>), ReductionError> {
        let names = self.matrix_names();
        let sigmas = names
            .iter()
            .map(|name| self.sigma_of(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((names, sigmas))
    }

    /// Rebuilds the correlation matrix from the recorded correlation
    /// coefficients (unit diagonal, missing coefficients are zero).
    pub fn initialize_correlations(&mut self) -> Result<(), ReductionError> {
        let (names, _) = self.eligible()?;
        let mut correlation = NamedMatrix::zeros(names.clone());
        for row in 0..names.len() {
            correlation.set(row, row, 1.0);
            for col in (row + 1)..names.len() {
                if let Some(rho) = self.rho(&names[row], &names[col]) {
                    correlation.set_symmetric(row, col, rho);
                }
            }
        }
        log::debug!(
            "model {}: correlation matrix initialised over {} values",
            self.model_name,
            names.len()
        );
        self.correlation = correlation;
        Ok(())
    }

    /// Resizes the correlation matrix to the currently eligible values.
    ///
    /// Entries between values already in the matrix are kept; values that
    /// became eligible take their coefficients from the recorded ρ map.
    pub fn refresh_correlations(&mut self) -> Result<(), ReductionError> {
        let (names, _) = self.eligible()?;
        let mut correlation = NamedMatrix::zeros(names.clone());
        for row in 0..names.len() {
            correlation.set(row, row, 1.0);
            for col in (row + 1)..names.len() {
                let rho = self
                    .correlation
                    .get(&names[row], &names[col])
                    .or_else(|| self.rho(&names[row], &names[col]));
                if let Some(rho) = rho {
                    correlation.set_symmetric(row, col, rho);
                }
            }
        }
        self.correlation = correlation;
        Ok(())
    }

    /// Derives the covariance matrix from the current correlation matrix.
    pub fn generate_covariances_from_correlations(&mut self) -> Result<(), ReductionError> {
        let (names, sigmas) = self.eligible()?;
        self.covariance = covariance_from_correlation(&names, &sigmas, &self.correlation);
        Ok(())
    }

    /// Derives the correlation matrix from the current covariance matrix and
    /// refreshes the non-zero correlation coefficients.
    pub fn generate_correlations_from_covariances(&mut self) -> Result<(), ReductionError> {
        let (names, sigmas) = self.eligible()?;
        let correlation = correlation_from_covariance(&names, &sigmas, &self.covariance);
        for row in 0..names.len() {
            for col in (row + 1)..names.len() {
                let rho = correlation.at(row, col);
                let key = rho_key(&names[row], &names[col]);
                if rho != 0.0 {
                    self.rhos.insert(key, rho);
                } else {
                    self.rhos.remove(&key);
                }
            }
        }
        self.correlation = correlation;
        Ok(())
    }
}
