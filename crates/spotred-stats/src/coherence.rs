//! Iterative coherent-group search over a [`SpotSummaryDetails`].
//!
//! The filter alternates between evaluating the weighted mean of the
//! included spots and rejecting the spot farthest (in sigma units) from the
//! median, until the probability of fit reaches the configured minimum or
//! the group falls to the two-spot floor.

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{Matrix, SpotId};

use crate::robust::{argmax_first, median};
use crate::summary::SpotSummaryDetails;
use crate::wtdav;

/// Smallest group the weighted-mean loop will evaluate.
pub const MIN_GROUP: usize = 3;

/// Evaluates a summary expression over an explicit spot subset.
pub trait SummarySource {
    /// Returns the weighted-mean row of `expression` over `spots`.
    fn evaluate_subset(&self, expression: &str, spots: &[SpotId]) -> Result<Matrix, ReductionError>;
}

impl<F> SummarySource for F
where
    F: Fn(&str, &[SpotId]) -> Result<Matrix, ReductionError>,
{
    fn evaluate_subset(&self, expression: &str, spots: &[SpotId]) -> Result<Matrix, ReductionError> {
        self(expression, spots)
    }
}

/// How the coherence loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CoherenceOutcome {
    /// The included group reached the minimum probability of fit.
    Coherent,
    /// No further spot could be rejected; the last result is kept.
    Exhausted,
    /// Fewer than [`MIN_GROUP`] spots remain; no result is reported.
    Insufficient,
    /// Evaluation failed inside the loop; rejections so far are kept.
    Aborted(ReductionError),
}

impl CoherenceOutcome {
    /// Whether the summary carries a reportable result.
    pub fn has_result(&self) -> bool {
        matches!(self, CoherenceOutcome::Coherent | CoherenceOutcome::Exhausted)
    }

    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            CoherenceOutcome::Coherent => "coherent",
            CoherenceOutcome::Exhausted => "exhausted",
            CoherenceOutcome::Insufficient => "insufficient",
            CoherenceOutcome::Aborted(_) => "aborted",
        }
    }
}

/// Trace of one coherence run.
#[derive(Debug, Clone, PartialEq)]
pub struct CoherenceReport {
    /// Terminal state of the loop.
    pub outcome: CoherenceOutcome,
    /// Selection indices rejected by the value-versus-sigma guard.
    pub pre_filter_rejections: Vec<usize>,
    /// Selection indices rejected by the loop, in rejection order.
    pub loop_rejections: Vec<usize>,
    /// Number of weighted-mean evaluations performed.
    pub evaluations: usize,
}

fn probability_of(row: &Matrix) -> Result<f64, ReductionError> {
    row.get(0, wtdav::PROBABILITY).ok_or_else(|| {
        ReductionError::Statistics(
            ErrorInfo::new("summary-shape", "weighted-mean row has no probability column")
                .with_context("columns", row.ncols().to_string()),
        )
    })
}

fn as_statistics(err: ReductionError, expression: &str) -> ReductionError {
    match err {
        ReductionError::Statistics(_) => err,
        other => ReductionError::Statistics(
            other.info().clone().with_context("expression", expression),
        ),
    }
}

/// Searches for the largest coherent group of `summary`, mutating its
/// rejection mask and result in place.
pub fn find_coherent_group(
    source: &dyn SummarySource,
    summary: &mut SpotSummaryDetails,
    min_probability: f64,
) -> CoherenceReport {
    summary.selection.include_all();
    summary.values = None;
    summary.min_probability = min_probability;

    let mut pre_filter_rejections = Vec::new();
    let degenerate: Vec<usize> = summary
        .selection
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.measurement.value <= entry.measurement.one_sigma_abs)
        .map(|(index, _)| index)
        .collect();
    for index in degenerate {
        if summary.selection.set_rejected(index, true).is_ok() {
            pre_filter_rejections.push(index);
        }
    }

    let mut report = CoherenceReport {
        outcome: CoherenceOutcome::Insufficient,
        pre_filter_rejections,
        loop_rejections: Vec::new(),
        evaluations: 0,
    };

    while summary.selection.survivors() >= MIN_GROUP {
        let included = summary.selection.included_ids();
        report.evaluations += 1;
        let row = match source
            .evaluate_subset(&summary.expression, &included)
            .and_then(|row| probability_of(&row).map(|p| (row, p)))
        {
            Ok(pair) => pair,
            Err(err) => {
                log::warn!("coherence loop for {} aborted: {err}", summary.expression);
                summary.values = None;
                report.outcome = CoherenceOutcome::Aborted(as_statistics(err, &summary.expression));
                return report;
            }
        };
        let (row, probability) = row;
        if probability >= min_probability {
            summary.values = Some(row);
            report.outcome = CoherenceOutcome::Coherent;
            return report;
        }

        let candidates: Vec<(usize, f64, f64)> = summary
            .selection
            .included()
            .map(|(index, entry)| (index, entry.measurement.value, entry.measurement.one_sigma_abs))
            .collect();
        let values: Vec<f64> = candidates.iter().map(|(_, value, _)| *value).collect();
        let residuals: Vec<f64> = match median(&values) {
            Some(centre) => candidates
                .iter()
                .map(|(_, value, sigma)| (value - centre).abs() / sigma)
                .collect(),
            None => Vec::new(),
        };
        let Some(position) = argmax_first(&residuals) else {
            summary.values = Some(row);
            report.outcome = CoherenceOutcome::Exhausted;
            return report;
        };
        let index = candidates[position].0;
        log::debug!(
            "{}: probability {probability:.4} below {min_probability}, rejecting {}",
            summary.expression,
            summary.selection.entries()[index].spot
        );
        if summary.selection.set_rejected(index, true).is_err() {
            summary.values = Some(row);
            report.outcome = CoherenceOutcome::Exhausted;
            return report;
        }
        report.loop_rejections.push(index);
    }

    summary.values = None;
    report.outcome = CoherenceOutcome::Insufficient;
    report
}

/// Re-evaluates `summary` over its current (possibly hand-edited) selection
/// without rejecting anything.
pub fn recompute(
    source: &dyn SummarySource,
    summary: &mut SpotSummaryDetails,
) -> Result<(), ReductionError> {
    if summary.selection.survivors() < MIN_GROUP {
        summary.values = None;
        return Ok(());
    }
    let included = summary.selection.included_ids();
    match source
        .evaluate_subset(&summary.expression, &included)
        .and_then(|row| probability_of(&row).map(|_| row))
    {
        Ok(row) => {
            summary.values = Some(row);
            Ok(())
        }
        Err(err) => {
            summary.values = None;
            Err(as_statistics(err, &summary.expression))
        }
    }
}
