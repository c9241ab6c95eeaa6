//! Read-only analytical spot records.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Measurement;

/// Stable identifier for a spot, used for reporting and tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct SpotId(String);

impl SpotId {
    /// Creates a new identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpotId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SpotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Whether a spot was shot on a calibration standard or a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum SpotKind {
    /// Calibration standard.
    ReferenceMaterial,
    /// Sample of interest.
    Unknown,
}

/// Species-indexed arrays carried by every spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum RetrievalMethod {
    /// Total counts per second per species.
    TotalCps,
    /// Total counts per species.
    TotalCounts,
    /// Total counts from the secondary beam monitor per species.
    TotalCountsSbm,
}

impl RetrievalMethod {
    /// Every retrieval method in canonical order.
    pub const ALL: [RetrievalMethod; 3] = [
        RetrievalMethod::TotalCps,
        RetrievalMethod::TotalCounts,
        RetrievalMethod::TotalCountsSbm,
    ];

    /// Accessor name used by formula authors.
    pub fn accessor_name(&self) -> &'static str {
        match self {
            RetrievalMethod::TotalCps => "getTotalCps",
            RetrievalMethod::TotalCounts => "getTotalCounts",
            RetrievalMethod::TotalCountsSbm => "getTotalCountsSBM",
        }
    }

    /// Resolves an accessor name into a retrieval method.
    pub fn from_accessor_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.accessor_name() == name)
    }
}

/// Named ratio with an optional overcount-corrected replacement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RatioMeasurement {
    /// Ratio as measured.
    pub raw: Measurement,
    /// Replacement installed by an overcount correction.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub corrected: Option<Measurement>,
}

impl RatioMeasurement {
    /// Creates a ratio with no correction applied.
    pub fn new(value: f64, one_sigma_abs: f64) -> Self {
        Self {
            raw: Measurement::new(value, one_sigma_abs),
            corrected: None,
        }
    }

    /// Effective value seen by expressions.
    pub fn effective(&self) -> Measurement {
        self.corrected.unwrap_or(self.raw)
    }
}

/// Analytical measurement record consumed by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spot {
    id: SpotId,
    kind: SpotKind,
    species: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    arrays: BTreeMap<RetrievalMethod, Vec<f64>>,
    #[cfg_attr(feature = "serde", serde(default))]
    ratios: BTreeMap<String, RatioMeasurement>,
}

impl Spot {
    /// Creates an empty spot with the provided species labels.
    pub fn new(id: impl Into<SpotId>, kind: SpotKind, species: Vec<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            species,
            arrays: BTreeMap::new(),
            ratios: BTreeMap::new(),
        }
    }

    /// Attaches a species-indexed array.
    pub fn with_array(mut self, method: RetrievalMethod, values: Vec<f64>) -> Self {
        if values.len() != self.species.len() {
            log::warn!(
                "spot {}: {} array has {} entries for {} species",
                self.id,
                method.accessor_name(),
                values.len(),
                self.species.len()
            );
        }
        self.arrays.insert(method, values);
        self
    }

    /// Attaches a named ratio.
    pub fn with_ratio(mut self, name: impl Into<String>, value: f64, one_sigma_abs: f64) -> Self {
        self.ratios
            .insert(name.into(), RatioMeasurement::new(value, one_sigma_abs));
        self
    }

    /// Spot identifier.
    pub fn id(&self) -> &SpotId {
        &self.id
    }

    /// Reference material or unknown.
    pub fn kind(&self) -> SpotKind {
        self.kind
    }

    /// Ordered species labels.
    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Index of a species label, if the spot carries it.
    pub fn species_index(&self, species: &str) -> Option<usize> {
        self.species.iter().position(|label| label == species)
    }

    /// Species-indexed array for a retrieval method.
    pub fn array(&self, method: RetrievalMethod) -> Option<&[f64]> {
        self.arrays.get(&method).map(Vec::as_slice)
    }

    /// Effective ratio (corrected when an override is installed).
    pub fn ratio(&self, name: &str) -> Option<Measurement> {
        self.ratios.get(name).map(RatioMeasurement::effective)
    }

    /// Ratio as measured, ignoring corrections.
    pub fn raw_ratio(&self, name: &str) -> Option<Measurement> {
        self.ratios.get(name).map(|ratio| ratio.raw)
    }

    /// Names of every ratio carried by the spot.
    pub fn ratio_names(&self) -> impl Iterator<Item = &str> {
        self.ratios.keys().map(String::as_str)
    }

    /// Installs or clears the corrected replacement of a ratio.
    ///
    /// Returns `false` when the spot does not carry the ratio.
    pub fn set_ratio_correction(&mut self, name: &str, corrected: Option<Measurement>) -> bool {
        match self.ratios.get_mut(name) {
            Some(ratio) => {
                ratio.corrected = corrected;
                true
            }
            None => false,
        }
    }
}
