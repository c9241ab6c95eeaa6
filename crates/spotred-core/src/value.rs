//! Scalar values with an attached one-sigma uncertainty.

/// Value paired with its absolute one-sigma uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    /// Measured or derived value.
    pub value: f64,
    /// Absolute one-sigma uncertainty.
    pub one_sigma_abs: f64,
}

impl Measurement {
    /// Creates a new measurement.
    pub const fn new(value: f64, one_sigma_abs: f64) -> Self {
        Self {
            value,
            one_sigma_abs,
        }
    }
}

/// Canonical representation of a [`ValueModel`] uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "UPPERCASE")
)]
pub enum UncertaintyType {
    /// Absolute uncertainty in the units of the value.
    #[default]
    Abs,
    /// Percentage of the value.
    Pct,
}

/// Named scalar with a one-sigma uncertainty, used as a constant input to
/// expressions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueModel {
    /// Name used by parameter references and matrix keys.
    pub name: String,
    /// Central value.
    pub value: f64,
    /// One-sigma uncertainty in the representation named by `uncertainty_type`.
    pub one_sigma: f64,
    /// Canonical uncertainty representation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub uncertainty_type: UncertaintyType,
}

impl ValueModel {
    /// Creates a value model with an absolute uncertainty.
    pub fn abs(name: impl Into<String>, value: f64, one_sigma_abs: f64) -> Self {
        Self {
            name: name.into(),
            value,
            one_sigma: one_sigma_abs,
            uncertainty_type: UncertaintyType::Abs,
        }
    }

    /// Creates a value model with a percentage uncertainty.
    pub fn pct(name: impl Into<String>, value: f64, one_sigma_pct: f64) -> Self {
        Self {
            name: name.into(),
            value,
            one_sigma: one_sigma_pct,
            uncertainty_type: UncertaintyType::Pct,
        }
    }

    /// Absolute one-sigma uncertainty.
    pub fn one_sigma_abs(&self) -> f64 {
        match self.uncertainty_type {
            UncertaintyType::Abs => self.one_sigma,
            UncertaintyType::Pct => self.one_sigma / 100.0 * self.value.abs(),
        }
    }

    /// Percentage one-sigma uncertainty; zero when the value is zero.
    pub fn one_sigma_pct(&self) -> f64 {
        match self.uncertainty_type {
            UncertaintyType::Pct => self.one_sigma,
            UncertaintyType::Abs => {
                if self.value == 0.0 {
                    0.0
                } else {
                    self.one_sigma / self.value.abs() * 100.0
                }
            }
        }
    }

    /// Value and absolute uncertainty as a [`Measurement`].
    pub fn measurement(&self) -> Measurement {
        Measurement::new(self.value, self.one_sigma_abs())
    }

    /// Whether the value can take part in correlation and covariance matrices.
    pub fn has_positive_uncertainty(&self) -> bool {
        let sigma = self.one_sigma_abs();
        self.value.is_finite() && sigma.is_finite() && sigma > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_and_absolute_conversions_agree() {
        let abs = ValueModel::abs("lambda238", 1.55125e-10, 1.55125e-13);
        assert!((abs.one_sigma_pct() - 0.1).abs() < 1e-12);

        let pct = ValueModel::pct("lambda238", 1.55125e-10, 0.1);
        assert!((pct.one_sigma_abs() - 1.55125e-13).abs() < 1e-25);
    }

    #[test]
    fn zero_value_has_zero_percent() {
        let model = ValueModel::abs("offset", 0.0, 0.5);
        assert_eq!(model.one_sigma_pct(), 0.0);
        assert!(!ValueModel::abs("flat", 1.0, 0.0).has_positive_uncertainty());
    }
}
