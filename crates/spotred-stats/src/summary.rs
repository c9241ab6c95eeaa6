//! Weighted-mean working set: the selected spots, their rejection mask and
//! the published record shape.

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{Matrix, Measurement, SchemaVersion, SpotId};

use crate::wtdav;

/// Version of the [`WeightedMeanRecord`] column layout.
pub const RECORD_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// One spot of a [`SelectionMask`] with its primary per-spot value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionEntry {
    /// Spot identifier.
    pub spot: SpotId,
    /// Per-spot value and absolute one-sigma uncertainty.
    pub measurement: Measurement,
    /// Whether the spot is excluded from the group.
    pub rejected: bool,
}

/// Ordered spot selection whose rejection flags travel with their spots.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectionMask {
    entries: Vec<SelectionEntry>,
}

impl SelectionMask {
    /// Builds an all-included mask over the given spots.
    pub fn new(spots: impl IntoIterator<Item = (SpotId, Measurement)>) -> Self {
        Self {
            entries: spots
                .into_iter()
                .map(|(spot, measurement)| SelectionEntry {
                    spot,
                    measurement,
                    rejected: false,
                })
                .collect(),
        }
    }

    /// Number of selected spots, rejected or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the selection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry in selection order.
    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    /// Identifiers of every selected spot.
    pub fn selected_spots(&self) -> Vec<SpotId> {
        self.entries.iter().map(|entry| entry.spot.clone()).collect()
    }

    /// Rejection flags aligned with [`SelectionMask::selected_spots`].
    pub fn rejected_indices(&self) -> Vec<bool> {
        self.entries.iter().map(|entry| entry.rejected).collect()
    }

    /// Sets the rejection flag of the entry at `index`.
    pub fn set_rejected(&mut self, index: usize, rejected: bool) -> Result<(), ReductionError> {
        let len = self.entries.len();
        let entry = self.entries.get_mut(index).ok_or_else(|| {
            ReductionError::Statistics(
                ErrorInfo::new("selection-index", "rejection index outside the selection")
                    .with_context("index", index.to_string())
                    .with_context("len", len.to_string()),
            )
        })?;
        entry.rejected = rejected;
        Ok(())
    }

    /// Clears every rejection flag.
    pub fn include_all(&mut self) {
        for entry in &mut self.entries {
            entry.rejected = false;
        }
    }

    /// Entries that are not rejected, paired with their selection index.
    pub fn included(&self) -> impl Iterator<Item = (usize, &SelectionEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.rejected)
    }

    /// Identifiers of the included spots in selection order.
    pub fn included_ids(&self) -> Vec<SpotId> {
        self.included().map(|(_, entry)| entry.spot.clone()).collect()
    }

    /// Identifiers of the rejected spots in selection order.
    pub fn rejected_ids(&self) -> Vec<SpotId> {
        self.entries
            .iter()
            .filter(|entry| entry.rejected)
            .map(|entry| entry.spot.clone())
            .collect()
    }

    /// Number of included spots.
    pub fn survivors(&self) -> usize {
        self.included().count()
    }

    /// Number of rejected spots.
    pub fn rejected_count(&self) -> usize {
        self.len() - self.survivors()
    }
}

/// Weighted-mean working set for one summary expression over one spot group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpotSummaryDetails {
    /// Name of the summary expression.
    pub expression: String,
    /// Spots under consideration and their rejection flags.
    pub selection: SelectionMask,
    /// Latest weighted-mean row, absent when no result may be reported.
    pub values: Option<Matrix>,
    /// Probability of fit the coherent group must reach.
    pub min_probability: f64,
}

impl SpotSummaryDetails {
    /// Creates a working set with every spot included and no result.
    pub fn new(expression: impl Into<String>, selection: SelectionMask, min_probability: f64) -> Self {
        Self {
            expression: expression.into(),
            selection,
            values: None,
            min_probability,
        }
    }

    /// Builds the published record from the current result, if any.
    pub fn record(&self) -> Option<WeightedMeanRecord> {
        let row = self.values.as_ref()?;
        let column = |col: usize| row.get(0, col);
        Some(WeightedMeanRecord {
            mean: column(wtdav::MEAN)?,
            one_sigma_abs: column(wtdav::ONE_SIGMA_ABS)?,
            two_sigma_abs: column(wtdav::TWO_SIGMA_ABS)?,
            ci95: column(wtdav::CI95)?,
            n_included: self.selection.survivors(),
            n_total: self.selection.len(),
            mswd: column(wtdav::MSWD)?,
            probability: column(wtdav::PROBABILITY)?,
            min_probability: self.min_probability,
            included: self.selection.included_ids(),
        })
    }
}

/// Fixed-shape output of a weighted-mean reduction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedMeanRecord {
    /// Weighted mean.
    pub mean: f64,
    /// Absolute one-sigma uncertainty.
    pub one_sigma_abs: f64,
    /// Absolute two-sigma uncertainty.
    pub two_sigma_abs: f64,
    /// 95% confidence half-width.
    pub ci95: f64,
    /// Spots in the coherent group.
    pub n_included: usize,
    /// Spots selected before rejection.
    pub n_total: usize,
    /// Mean square weighted deviation.
    pub mswd: f64,
    /// Probability of fit.
    pub probability: f64,
    /// Threshold the group was filtered against.
    pub min_probability: f64,
    /// Identifiers of the included spots.
    pub included: Vec<SpotId>,
}

impl WeightedMeanRecord {
    /// Numeric columns in [`RECORD_SCHEMA`] order.
    pub fn to_array(&self) -> [f64; 9] {
        [
            self.mean,
            self.one_sigma_abs,
            self.two_sigma_abs,
            self.ci95,
            self.n_included as f64,
            self.n_total as f64,
            self.mswd,
            self.probability,
            self.min_probability,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask() -> SelectionMask {
        SelectionMask::new(
            ["a", "b", "c"]
                .into_iter()
                .map(|id| (SpotId::from(id), Measurement::new(10.0, 1.0))),
        )
    }

    #[test]
    fn rejection_flags_stay_aligned_with_spots() {
        let mut selection = mask();
        selection.set_rejected(1, true).unwrap();
        assert_eq!(selection.rejected_indices(), vec![false, true, false]);
        assert_eq!(selection.selected_spots().len(), selection.rejected_indices().len());
        assert_eq!(selection.rejected_ids(), vec![SpotId::from("b")]);
        assert_eq!(selection.survivors(), 2);
    }

    #[test]
    fn out_of_range_rejection_is_refused() {
        let mut selection = mask();
        let err = selection.set_rejected(3, true).unwrap_err();
        assert_eq!(err.info().code, "selection-index");
        assert_eq!(selection.rejected_count(), 0);
    }

    #[test]
    fn record_reports_counts_from_selection() {
        let mut selection = mask();
        selection.set_rejected(0, true).unwrap();
        let mut details = SpotSummaryDetails::new("Age", selection, 0.05);
        assert!(details.record().is_none());
        details.values = Some(Matrix::row(vec![10.0, 0.7, 1.4, 1.37, 2.0, 0.0, 1.0]));
        let record = details.record().unwrap();
        assert_eq!(record.to_array()[4..6], [2.0, 3.0]);
        assert_eq!(record.to_array()[8], 0.05);
        assert_eq!(record.included, vec![SpotId::from("b"), SpotId::from("c")]);
    }
}
