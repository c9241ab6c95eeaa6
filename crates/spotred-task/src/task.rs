//! The task: owner of the registry, parameters, spots and results.

use std::collections::BTreeMap;

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{ModelKind, ParameterSet, Spot, SpotId, SpotKind, ValueModel};
use spotred_expr::{ExecutionOrder, Expression, ExpressionRegistry, ResultStore};
use spotred_stats::{CoherenceOutcome, SpotSummaryDetails};

use crate::config::TaskConfig;
use crate::overcount::{builtin_expressions, OvercountMode};

/// Weighted-mean working set of one summary expression for one spot kind,
/// with the way its last reduction ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    /// Selection, rejection flags and result.
    pub details: SpotSummaryDetails,
    /// Terminal state of the last reduction.
    pub outcome: CoherenceOutcome,
}

/// Summary entries keyed by expression name, then spot kind.
pub type SummaryTable = BTreeMap<String, BTreeMap<SpotKind, SummaryEntry>>;

/// Evaluation context owner for one reduction.
#[derive(Debug, Clone)]
pub struct Task {
    pub(crate) config: TaskConfig,
    pub(crate) registry: ExpressionRegistry,
    pub(crate) order: ExecutionOrder,
    pub(crate) parameters: ParameterSet,
    pub(crate) spots: Vec<Spot>,
    pub(crate) results: ResultStore,
    pub(crate) summaries: SummaryTable,
    pub(crate) overcount_mode: OvercountMode,
    pub(crate) changed: bool,
}

impl Task {
    /// Builds a task, registering the built-in expressions ahead of
    /// `expressions` and resolving the execution order.
    ///
    /// Structural problems abort construction. The configured overcount
    /// mode is installed on the spots but nothing is evaluated yet.
    pub fn new(
        config: TaskConfig,
        mut parameters: ParameterSet,
        expressions: Vec<Expression>,
        spots: Vec<Spot>,
    ) -> Result<Self, ReductionError> {
        let mut registry = ExpressionRegistry::new();
        for expression in builtin_expressions().into_iter().chain(expressions) {
            registry.insert(expression)?;
        }
        for name in &config.pinned_last {
            registry.pin_last(name.clone());
        }
        let order = registry.resolve_order()?;

        for model in parameters.iter_mut() {
            model.initialize_correlations()?;
            model.generate_covariances_from_correlations()?;
        }

        let mut seen = std::collections::BTreeSet::new();
        for spot in &spots {
            if !seen.insert(spot.id().clone()) {
                return Err(ReductionError::Structure(
                    ErrorInfo::new("duplicate-spot", "spot identifiers must be unique")
                        .with_context("spot", spot.id().as_str()),
                ));
            }
        }

        log::info!(
            "task {}: {} expressions, {} spots",
            config.name,
            order.len(),
            spots.len()
        );
        let mode = config.overcount_mode;
        let mut task = Self {
            config,
            registry,
            order,
            parameters,
            spots,
            results: ResultStore::new(),
            summaries: SummaryTable::new(),
            overcount_mode: OvercountMode::None,
            changed: false,
        };
        let overrides = task.compute_overrides(mode);
        task.commit_mode(mode, overrides);
        task.changed = false;
        Ok(task)
    }

    /// Configuration the task was built with.
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Registered expressions.
    pub fn registry(&self) -> &ExpressionRegistry {
        &self.registry
    }

    /// Resolved execution order.
    pub fn order(&self) -> &ExecutionOrder {
        &self.order
    }

    /// Parameter models.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Spots in input order.
    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    /// Looks up a spot by identifier.
    pub fn spot(&self, id: &SpotId) -> Option<&Spot> {
        self.spots.iter().find(|spot| spot.id() == id)
    }

    /// Spots of one kind in input order.
    pub fn spots_of(&self, kind: SpotKind) -> Vec<&Spot> {
        self.spots.iter().filter(|spot| spot.kind() == kind).collect()
    }

    /// Stored expression results.
    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Weighted-mean working sets from the last reduction.
    pub fn summaries(&self) -> &SummaryTable {
        &self.summaries
    }

    /// Weighted-mean working set of `expression` for `kind`.
    pub fn summary(&self, expression: &str, kind: SpotKind) -> Option<&SummaryEntry> {
        self.summaries.get(expression)?.get(&kind)
    }

    /// Active overcount correction.
    pub fn overcount_mode(&self) -> OvercountMode {
        self.overcount_mode
    }

    /// Whether lab data or the correction mode changed since the task was
    /// built or last marked clean.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Clears the changed flag.
    pub fn mark_clean(&mut self) {
        self.changed = false;
    }

    /// Replaces a value of a parameter model and invalidates every cached
    /// result.
    ///
    /// Unknown models or value names are rejected without side effects.
    pub fn update_parameter(
        &mut self,
        kind: ModelKind,
        value: ValueModel,
    ) -> Result<(), ReductionError> {
        let mut edited = self.parameters.clone();
        let model = edited.model_mut(kind).ok_or_else(|| {
            ReductionError::Parameter(
                ErrorInfo::new("unknown-model", "task has no parameter model of this kind")
                    .with_context("kind", format!("{kind:?}")),
            )
        })?;
        let name = value.name.clone();
        model.replace_value(value)?;
        model.refresh_correlations()?;
        model.generate_covariances_from_correlations()?;
        self.parameters = edited;
        self.invalidate_all();
        if self.overcount_mode != OvercountMode::None {
            let overrides = self.compute_overrides(self.overcount_mode);
            self.commit_mode(self.overcount_mode, overrides);
        }
        log::info!("parameter {name} updated; cached results cleared");
        Ok(())
    }

    /// Registers an expression and re-resolves the order.
    ///
    /// The registry is untouched when the new expression would make it
    /// structurally invalid.
    pub fn add_expression(&mut self, expression: Expression) -> Result<(), ReductionError> {
        let mut registry = self.registry.clone();
        registry.insert(expression)?;
        self.commit_registry(registry)
    }

    /// Removes an expression and re-resolves the order.
    pub fn remove_expression(&mut self, name: &str) -> Result<Option<Expression>, ReductionError> {
        let mut registry = self.registry.clone();
        let removed = registry.remove(name);
        if removed.is_some() {
            self.commit_registry(registry)?;
        }
        Ok(removed)
    }

    fn commit_registry(&mut self, registry: ExpressionRegistry) -> Result<(), ReductionError> {
        let order = registry.resolve_order()?;
        self.registry = registry;
        self.order = order;
        self.invalidate_all();
        Ok(())
    }

    pub(crate) fn invalidate_all(&mut self) {
        self.results.clear();
        self.summaries.clear();
        self.changed = true;
    }

    pub(crate) fn invalidate_kind(&mut self, kind: SpotKind) {
        let ids: Vec<SpotId> = self
            .spots_of(kind)
            .into_iter()
            .map(|spot| spot.id().clone())
            .collect();
        self.results.invalidate(&ids, kind);
        for by_kind in self.summaries.values_mut() {
            by_kind.remove(&kind);
        }
    }
}
