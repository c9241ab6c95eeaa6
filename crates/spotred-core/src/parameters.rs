//! Ordered collections of value models with their correlation structure.

use std::collections::BTreeMap;

use crate::errors::{ErrorInfo, ReductionError};
use crate::value::ValueModel;

fn parameter_error(code: &str, message: impl Into<String>) -> ReductionError {
    ReductionError::Parameter(ErrorInfo::new(code, message.into()))
}

/// Role a parameter model plays for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ModelKind {
    /// Decay constants and isotopic abundances.
    PhysicalConstants,
    /// Certified values of the calibration standard.
    ReferenceMaterial,
    /// Common-lead isotopic composition.
    CommonPb,
}

/// Square matrix whose rows and columns are keyed by value names.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NamedMatrix {
    names: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl NamedMatrix {
    /// Creates a zero matrix over the provided names.
    pub fn zeros(names: Vec<String>) -> Self {
        let dim = names.len();
        Self {
            names,
            data: vec![vec![0.0; dim]; dim],
        }
    }

    /// Row and column labels.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.names.len()
    }

    /// Whether the matrix has no rows.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of a label.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Entry at the given indices.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row][col]
    }

    /// Entry keyed by labels.
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        Some(self.data[self.index_of(row)?][self.index_of(col)?])
    }

    /// Writes an entry at the given indices.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row][col] = value;
    }

    /// Writes an entry and its transpose.
    pub fn set_symmetric(&mut self, row: usize, col: usize, value: f64) {
        self.data[row][col] = value;
        self.data[col][row] = value;
    }

    /// Row-major entries.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.data
    }
}

/// Canonical key of the correlation coefficient between two named values.
pub fn rho_key(a: &str, b: &str) -> String {
    format!("rho_{a}__{b}")
}

/// Ordered set of [`ValueModel`]s with correlation and covariance matrices.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParametersModel {
    /// Human readable model name (e.g. certified standard label).
    pub model_name: String,
    /// Role of the model within a task.
    pub kind: ModelKind,
    pub(crate) values: Vec<ValueModel>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) rhos: BTreeMap<String, f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) correlation: NamedMatrix,
    #[cfg_attr(feature = "serde", serde(default))]
    pub(crate) covariance: NamedMatrix,
}

impl ParametersModel {
    /// Creates an empty model.
    pub fn new(model_name: impl Into<String>, kind: ModelKind) -> Self {
        Self {
            model_name: model_name.into(),
            kind,
            values: Vec::new(),
            rhos: BTreeMap::new(),
            correlation: NamedMatrix::default(),
            covariance: NamedMatrix::default(),
        }
    }

    /// Appends a value, replacing any earlier value of the same name.
    pub fn with_value(mut self, value: ValueModel) -> Self {
        match self.values.iter_mut().find(|v| v.name == value.name) {
            Some(existing) => *existing = value,
            None => self.values.push(value),
        }
        self
    }

    /// Records the correlation coefficient between two named values.
    pub fn with_rho(mut self, a: &str, b: &str, rho: f64) -> Self {
        self.rhos.insert(rho_key(a, b), rho);
        self
    }

    /// Values in model order.
    pub fn values(&self) -> &[ValueModel] {
        &self.values
    }

    /// Looks up a value by name.
    pub fn value(&self, name: &str) -> Option<&ValueModel> {
        self.values.iter().find(|value| value.name == name)
    }

    /// Correlation coefficient between two values in either key order.
    pub fn rho(&self, a: &str, b: &str) -> Option<f64> {
        self.rhos
            .get(&rho_key(a, b))
            .or_else(|| self.rhos.get(&rho_key(b, a)))
            .copied()
    }

    /// Every recorded correlation coefficient keyed by [`rho_key`].
    pub fn rhos(&self) -> &BTreeMap<String, f64> {
        &self.rhos
    }

    /// Current correlation matrix.
    pub fn correlation(&self) -> &NamedMatrix {
        &self.correlation
    }

    /// Current covariance matrix.
    pub fn covariance(&self) -> &NamedMatrix {
        &self.covariance
    }

    /// Replaces the correlation matrix wholesale.
    pub fn set_correlation(&mut self, matrix: NamedMatrix) {
        self.correlation = matrix;
    }

    /// Replaces the covariance matrix wholesale.
    pub fn set_covariance(&mut self, matrix: NamedMatrix) {
        self.covariance = matrix;
    }

    /// Replaces an existing value, returning the previous one.
    ///
    /// Unknown names are rejected without touching the model.
    pub fn replace_value(&mut self, value: ValueModel) -> Result<ValueModel, ReductionError> {
        let model_name = self.model_name.clone();
        let slot = self
            .values
            .iter_mut()
            .find(|v| v.name == value.name)
            .ok_or_else(|| {
                ReductionError::Parameter(
                    ErrorInfo::new("unknown-value", "value is not part of the model")
                        .with_context("model", model_name)
                        .with_context("value", value.name.clone()),
                )
            })?;
        Ok(std::mem::replace(slot, value))
    }

    /// Names of the values eligible for matrix construction, in model order.
    pub fn matrix_names(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|value| value.has_positive_uncertainty())
            .map(|value| value.name.clone())
            .collect()
    }

    /// Absolute one-sigma uncertainty for a matrix label.
    pub(crate) fn sigma_of(&self, name: &str) -> Result<f64, ReductionError> {
        self.value(name)
            .map(ValueModel::one_sigma_abs)
            .ok_or_else(|| parameter_error("missing-sigma", format!("no value named {name}")))
    }
}

/// Parameter models available to a task, at most one per [`ModelKind`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterSet {
    models: BTreeMap<ModelKind, ParametersModel>,
}

impl ParameterSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a model, replacing any model of the same kind.
    pub fn with_model(mut self, model: ParametersModel) -> Self {
        self.insert(model);
        self
    }

    /// Inserts a model, returning the model it replaced.
    pub fn insert(&mut self, model: ParametersModel) -> Option<ParametersModel> {
        self.models.insert(model.kind, model)
    }

    /// Model of the given kind.
    pub fn model(&self, kind: ModelKind) -> Option<&ParametersModel> {
        self.models.get(&kind)
    }

    /// Mutable model of the given kind.
    pub fn model_mut(&mut self, kind: ModelKind) -> Option<&mut ParametersModel> {
        self.models.get_mut(&kind)
    }

    /// Value `name` of the model of the given kind.
    pub fn value(&self, kind: ModelKind, name: &str) -> Option<&ValueModel> {
        self.model(kind).and_then(|model| model.value(name))
    }

    /// Models in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &ParametersModel> {
        self.models.values()
    }

    /// Mutable models in kind order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParametersModel> {
        self.models.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_value_rejects_unknown_names() {
        let mut model = ParametersModel::new("Common Pb", ModelKind::CommonPb)
            .with_value(ValueModel::abs("r206_204", 18.7, 0.1));
        let err = model
            .replace_value(ValueModel::abs("r207_204", 15.6, 0.1))
            .unwrap_err();
        assert_eq!(err.info().code, "unknown-value");
        assert_eq!(model.values().len(), 1);

        let previous = model
            .replace_value(ValueModel::abs("r206_204", 18.8, 0.1))
            .unwrap();
        assert_eq!(previous.value, 18.7);
        assert_eq!(model.value("r206_204").unwrap().value, 18.8);
    }

    #[test]
    fn parameter_set_keys_by_kind() {
        let set = ParameterSet::new()
            .with_model(
                ParametersModel::new("Decay", ModelKind::PhysicalConstants)
                    .with_value(ValueModel::abs("lambda238", 1.55125e-10, 0.0)),
            )
            .with_model(ParametersModel::new("Common Pb", ModelKind::CommonPb));
        assert!(set.value(ModelKind::PhysicalConstants, "lambda238").is_some());
        assert!(set.value(ModelKind::CommonPb, "lambda238").is_none());
        assert_eq!(set.iter().count(), 2);
    }
}
