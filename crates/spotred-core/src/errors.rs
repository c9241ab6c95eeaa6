//! Structured error types shared across spotred crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use thiserror::Error;

/// Structured payload attached to every [`ReductionError`] variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (expression names, spot ids, etc.).
    #[cfg_attr(feature = "serde", serde(default))]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the reduction engine.
///
/// Only [`ReductionError::Structure`] is fatal to a task; evaluation and
/// statistics failures are absorbed by the batch engine and surface as
/// sentinel values or shortened spot groups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "family", content = "detail")
)]
pub enum ReductionError {
    /// Registry construction errors (cycles, arity, unresolved names).
    #[error("structure error: {0}")]
    Structure(ErrorInfo),
    /// Expression evaluation errors.
    #[error("evaluation error: {0}")]
    Evaluation(ErrorInfo),
    /// Weighted mean and coherence filter errors.
    #[error("statistics error: {0}")]
    Statistics(ErrorInfo),
    /// Parameter model errors.
    #[error("parameter error: {0}")]
    Parameter(ErrorInfo),
    /// Serialization and configuration errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl ReductionError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ReductionError::Structure(info)
            | ReductionError::Evaluation(info)
            | ReductionError::Statistics(info)
            | ReductionError::Parameter(info)
            | ReductionError::Serde(info) => info,
        }
    }

    /// Whether the error must abort task construction.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReductionError::Structure(_))
    }
}
