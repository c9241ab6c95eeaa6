//! Summary reduction of root-evaluable expressions over spot groups.

use std::collections::btree_map::Entry;

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{Matrix, Measurement, Spot, SpotId, SpotKind};
use spotred_expr::{evaluate, evaluate_named, EvalContext, Node, ERROR_VALUE};
use spotred_stats::{
    find_coherent_group, recompute, wtdav, CoherenceOutcome, SelectionMask, SpotSummaryDetails,
    SummarySource,
};

use crate::task::{SummaryEntry, Task};

fn summary_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
}

impl Task {
    /// Reduces summary expression `name` over the spots of `kind` and stores
    /// the result for later references.
    pub(crate) fn reduce_summary(&mut self, name: &str, kind: SpotKind) {
        let Some(expression) = self.registry.get(name) else {
            return;
        };
        if !expression.applies_to(kind) {
            return;
        }
        let group = self.spots_of(kind);
        if group.is_empty() {
            return;
        }
        let ctx = EvalContext::new(&self.registry, &self.parameters, &self.results);

        let (values, entry) = match &expression.tree {
            Node::Function { args, .. } if expression.tree.is_weighted_mean() => {
                let selection = SelectionMask::new(
                    group
                        .iter()
                        .map(|spot| (spot.id().clone(), spot_measurement(args, spot, &ctx))),
                );
                let source = selection_source(&selection);
                let mut details =
                    SpotSummaryDetails::new(name, selection, self.config.min_probability_wm);
                let outcome = if self.config.auto_reject {
                    find_coherent_group(&source, &mut details, self.config.min_probability_wm)
                        .outcome
                } else {
                    settle(&source, &mut details)
                };
                log::debug!("summary {name} ({kind:?}): {}", outcome.label());
                let values = details
                    .values
                    .clone()
                    .unwrap_or_else(|| Matrix::row(vec![ERROR_VALUE; wtdav::WIDTH]));
                (values, Some(SummaryEntry { details, outcome }))
            }
            _ => {
                let values = evaluate_named(name, &group, &ctx).unwrap_or_else(|err| {
                    log::warn!("summary {name} ({kind:?}): {err}");
                    Matrix::scalar(ERROR_VALUE)
                });
                (values, None)
            }
        };

        self.results.insert_summary(name, kind, values);
        if let Some(entry) = entry {
            self.summaries
                .entry(name.to_string())
                .or_default()
                .insert(kind, entry);
        }
    }

    /// Toggles the rejection of one spot in a weighted-mean summary and
    /// recomputes that summary without further filtering.
    ///
    /// Dependent expressions are not re-evaluated; run
    /// [`Task::evaluate_kinds`] to propagate the new result.
    pub fn set_rejected(
        &mut self,
        expression: &str,
        kind: SpotKind,
        spot: &SpotId,
        rejected: bool,
    ) -> Result<&SummaryEntry, ReductionError> {
        let mut entry = self
            .summary(expression, kind)
            .cloned()
            .ok_or_else(|| {
                ReductionError::Statistics(
                    summary_error("unknown-summary", "no weighted-mean summary to edit")
                        .with_context("expression", expression)
                        .with_context("kind", format!("{kind:?}")),
                )
            })?;
        let index = entry
            .details
            .selection
            .entries()
            .iter()
            .position(|candidate| &candidate.spot == spot)
            .ok_or_else(|| {
                ReductionError::Statistics(
                    summary_error("unknown-spot", "spot is not part of the summary")
                        .with_context("spot", spot.as_str()),
                )
            })?;
        entry.details.selection.set_rejected(index, rejected)?;

        let source = selection_source(&entry.details.selection);
        entry.outcome = settle(&source, &mut entry.details);
        let values = entry
            .details
            .values
            .clone()
            .unwrap_or_else(|| Matrix::row(vec![ERROR_VALUE; wtdav::WIDTH]));

        self.results.insert_summary(expression, kind, values);
        self.changed = true;
        let slot = match self
            .summaries
            .entry(expression.to_string())
            .or_default()
            .entry(kind)
        {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(entry),
        };
        Ok(slot)
    }
}

/// Evaluates a weighted-mean summary over its current selection and
/// classifies the result against the minimum probability.
fn settle(
    source: &dyn SummarySource,
    details: &mut SpotSummaryDetails,
) -> CoherenceOutcome {
    match recompute(source, details) {
        Err(err) => CoherenceOutcome::Aborted(err),
        Ok(()) => match details.record() {
            None => CoherenceOutcome::Insufficient,
            Some(record) if record.probability >= details.min_probability => {
                CoherenceOutcome::Coherent
            }
            Some(_) => CoherenceOutcome::Exhausted,
        },
    }
}

/// Weighted mean over the included spots' own measurements, so the row
/// always covers exactly the spots the selection claims.
fn selection_source(
    selection: &SelectionMask,
) -> impl Fn(&str, &[SpotId]) -> Result<Matrix, ReductionError> {
    let measurements: Vec<(SpotId, Measurement)> = selection
        .entries()
        .iter()
        .map(|entry| (entry.spot.clone(), entry.measurement))
        .collect();
    move |_expression: &str, ids: &[SpotId]| {
        let included: Vec<Measurement> = measurements
            .iter()
            .filter(|(spot, _)| ids.contains(spot))
            .map(|(_, measurement)| *measurement)
            .collect();
        wtdav::weighted_mean(&included).map(|wm| Matrix::row(wm.to_row()))
    }
}

/// Per-spot value and sigma fed to the weighted mean, read from the
/// arguments of the weighted-mean node evaluated on `spot` alone.
fn spot_measurement(args: &[Node], spot: &Spot, ctx: &EvalContext<'_>) -> Measurement {
    let primary = args
        .first()
        .and_then(|node| evaluate(node, &[spot], ctx).ok());
    let Some(primary) = primary else {
        return Measurement::new(ERROR_VALUE, 0.0);
    };
    let value = primary.get(0, 0).unwrap_or(ERROR_VALUE);
    let sigma = match args.get(1) {
        Some(node) => evaluate(node, &[spot], ctx)
            .ok()
            .and_then(|matrix| matrix.get(0, 0))
            .unwrap_or(0.0),
        None => primary.get(0, 1).unwrap_or(0.0),
    };
    Measurement::new(value, sigma)
}
