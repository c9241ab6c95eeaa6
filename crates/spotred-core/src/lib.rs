#![deny(missing_docs)]
#![doc = "Spot records, value models and parameter models shared by the spotred reduction engine."]

pub mod correlation;
pub mod errors;
pub mod matrix;
pub mod parameters;
pub mod schema;
pub mod spot;
pub mod value;

pub use correlation::{correlation_from_covariance, covariance_from_correlation};
pub use errors::{ErrorInfo, ReductionError};
pub use matrix::Matrix;
pub use parameters::{rho_key, ModelKind, NamedMatrix, ParameterSet, ParametersModel};
pub use schema::SchemaVersion;
pub use spot::{RatioMeasurement, RetrievalMethod, Spot, SpotId, SpotKind};
pub use value::{Measurement, UncertaintyType, ValueModel};
