//! Expression registry and dependency-ordered execution.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use spotred_core::errors::{ErrorInfo, ReductionError};

use crate::expression::Expression;

fn structure_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
}

/// Named expressions in insertion order plus the pinned-last override list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionRegistry {
    expressions: IndexMap<String, Expression>,
    pinned_last: Vec<String>,
}

impl ExpressionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an expression after validating its tree.
    ///
    /// Duplicate names and arity mismatches are rejected without touching
    /// the registry.
    pub fn insert(&mut self, expression: Expression) -> Result<(), ReductionError> {
        if self.expressions.contains_key(&expression.name) {
            return Err(ReductionError::Structure(
                structure_error("duplicate-expression", "expression name already registered")
                    .with_context("expression", expression.name.clone()),
            ));
        }
        expression.tree.validate().map_err(|err| {
            ReductionError::Structure(
                err.info()
                    .clone()
                    .with_context("expression", expression.name.clone()),
            )
        })?;
        self.expressions.insert(expression.name.clone(), expression);
        Ok(())
    }

    /// Removes an expression, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Expression> {
        self.pinned_last.retain(|pinned| pinned != name);
        self.expressions.shift_remove(name)
    }

    /// Looks up an expression by name.
    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.expressions.get(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.expressions.contains_key(name)
    }

    /// Expressions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Expression> {
        self.expressions.values()
    }

    /// Number of registered expressions.
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Excludes `name` from automatic ordering and runs it after everything
    /// else, in pin order.
    pub fn pin_last(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.pinned_last.contains(&name) {
            self.pinned_last.push(name);
        }
    }

    /// Pinned names in pin order.
    pub fn pinned_last(&self) -> &[String] {
        &self.pinned_last
    }

    /// Resolves a dependency-respecting execution order.
    pub fn resolve_order(&self) -> Result<ExecutionOrder, ReductionError> {
        ExecutionOrder::resolve(self)
    }
}

/// Linear evaluation order of a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ExecutionOrder {
    names: Vec<String>,
}

/// Consecutive run of expressions sharing an evaluation shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Per-spot expressions evaluated in order for each spot.
    PerSpot(Vec<String>),
    /// A summary expression evaluated over spot groups.
    Summary(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    NotVisited,
    Visiting,
    Visited,
}

impl ExecutionOrder {
    /// Orders `registry` with Kahn's algorithm, breaking ties by insertion
    /// order, then appends the pinned expressions.
    pub fn resolve(registry: &ExpressionRegistry) -> Result<Self, ReductionError> {
        let index_of: BTreeMap<&str, usize> = registry
            .expressions
            .keys()
            .enumerate()
            .map(|(index, name)| (name.as_str(), index))
            .collect();

        let mut pinned_position: BTreeMap<usize, usize> = BTreeMap::new();
        for (position, name) in registry.pinned_last.iter().enumerate() {
            let index = *index_of.get(name.as_str()).ok_or_else(|| {
                ReductionError::Structure(
                    structure_error("unknown-pinned", "pinned expression is not registered")
                        .with_context("expression", name.clone()),
                )
            })?;
            pinned_position.insert(index, position);
        }

        let mut dependencies: Vec<BTreeSet<usize>> = Vec::with_capacity(registry.len());
        for (index, expression) in registry.expressions.values().enumerate() {
            let mut deps = BTreeSet::new();
            for reference in expression.tree.references() {
                let dep = *index_of.get(reference.as_str()).ok_or_else(|| {
                    ReductionError::Structure(
                        structure_error("unresolved-reference", "referenced expression is not registered")
                            .with_context("expression", expression.name.clone())
                            .with_context("reference", reference.clone()),
                    )
                })?;
                if let Some(dep_position) = pinned_position.get(&dep) {
                    let allowed = pinned_position
                        .get(&index)
                        .is_some_and(|own| own > dep_position);
                    if !allowed {
                        return Err(ReductionError::Structure(
                            structure_error(
                                "pinned-dependency",
                                "expression depends on an expression pinned to run later",
                            )
                            .with_context("expression", expression.name.clone())
                            .with_context("pinned", reference.clone()),
                        ));
                    }
                }
                deps.insert(dep);
            }
            dependencies.push(deps);
        }

        let ordered: Vec<usize> = (0..registry.len())
            .filter(|index| !pinned_position.contains_key(index))
            .collect();
        let mut remaining: BTreeMap<usize, usize> = ordered
            .iter()
            .map(|&index| {
                let unpinned = dependencies[index]
                    .iter()
                    .filter(|dep| !pinned_position.contains_key(dep))
                    .count();
                (index, unpinned)
            })
            .collect();
        let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &index in &ordered {
            for &dep in &dependencies[index] {
                dependents.entry(dep).or_default().push(index);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(index, _)| *index)
            .collect();
        let mut sequence = Vec::with_capacity(registry.len());
        while let Some(index) = ready.pop_first() {
            remaining.remove(&index);
            sequence.push(index);
            for dependent in dependents.get(&index).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if !remaining.is_empty() {
            let members = find_cycle(&remaining, &dependencies)
                .into_iter()
                .filter_map(|index| registry.expressions.get_index(index))
                .map(|(name, _)| name.clone())
                .collect::<Vec<_>>();
            return Err(ReductionError::Structure(
                structure_error("expression-cycle", "expression references form a cycle")
                    .with_context("members", members.join(", "))
                    .with_hint("break the cycle by inlining one of the members"),
            ));
        }

        let mut pinned: Vec<(usize, usize)> = pinned_position
            .iter()
            .map(|(index, position)| (*position, *index))
            .collect();
        pinned.sort_unstable();
        sequence.extend(pinned.into_iter().map(|(_, index)| index));

        let names: Vec<String> = sequence
            .into_iter()
            .filter_map(|index| registry.expressions.get_index(index))
            .map(|(name, _)| name.clone())
            .collect();
        log::debug!("resolved execution order: {}", names.join(" -> "));
        Ok(Self { names })
    }

    /// Names in execution order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of ordered expressions.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is ordered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name` in the order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Groups the order into per-spot runs separated by summary expressions.
    pub fn stages(&self, registry: &ExpressionRegistry) -> Vec<Stage> {
        let mut stages = Vec::new();
        let mut run = Vec::new();
        for name in &self.names {
            let Some(expression) = registry.get(name) else {
                continue;
            };
            if expression.is_summary() {
                if !run.is_empty() {
                    stages.push(Stage::PerSpot(std::mem::take(&mut run)));
                }
                stages.push(Stage::Summary(name.clone()));
            } else {
                run.push(name.clone());
            }
        }
        if !run.is_empty() {
            stages.push(Stage::PerSpot(run));
        }
        stages
    }
}

fn find_cycle(remaining: &BTreeMap<usize, usize>, dependencies: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut states: BTreeMap<usize, VisitState> = remaining
        .keys()
        .map(|index| (*index, VisitState::NotVisited))
        .collect();
    let mut stack = Vec::new();
    for &start in remaining.keys() {
        if let Some(cycle) = dfs(start, dependencies, &mut states, &mut stack) {
            return cycle;
        }
    }
    remaining.keys().copied().collect()
}

fn dfs(
    node: usize,
    dependencies: &[BTreeSet<usize>],
    states: &mut BTreeMap<usize, VisitState>,
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    match states.get(&node).copied() {
        None | Some(VisitState::Visited) => None,
        Some(VisitState::Visiting) => {
            let start = stack.iter().position(|entry| *entry == node)?;
            Some(stack[start..].to_vec())
        }
        Some(VisitState::NotVisited) => {
            states.insert(node, VisitState::Visiting);
            stack.push(node);
            for &dep in &dependencies[node] {
                if let Some(cycle) = dfs(dep, dependencies, states, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            states.insert(node, VisitState::Visited);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::ops::Operation;

    fn sum_of(name: &str, refs: &[&str]) -> Expression {
        let mut args: Vec<Node> = refs.iter().map(|r| Node::reference(*r)).collect();
        args.push(Node::number(1.0));
        let tree = if args.len() == 1 {
            args.remove(0)
        } else {
            args.into_iter()
                .reduce(|a, b| Node::op(Operation::Add, vec![a, b]))
                .unwrap_or_else(|| Node::number(0.0))
        };
        Expression::per_spot(name, tree)
    }

    #[test]
    fn dependencies_precede_dependents_and_ties_keep_insertion_order() {
        let mut registry = ExpressionRegistry::new();
        registry.insert(sum_of("C", &["B"])).unwrap();
        registry.insert(sum_of("A", &[])).unwrap();
        registry.insert(sum_of("B", &["A"])).unwrap();
        registry.insert(sum_of("D", &[])).unwrap();
        let order = registry.resolve_order().unwrap();
        assert_eq!(order.names(), ["A", "B", "C", "D"]);
    }

    #[test]
    fn cycle_names_its_members() {
        let mut registry = ExpressionRegistry::new();
        registry.insert(sum_of("free", &[])).unwrap();
        registry.insert(sum_of("x", &["y"])).unwrap();
        registry.insert(sum_of("y", &["z"])).unwrap();
        registry.insert(sum_of("z", &["x"])).unwrap();
        let err = registry.resolve_order().unwrap_err();
        assert_eq!(err.info().code, "expression-cycle");
        assert_eq!(
            err.info().context.get("members").map(String::as_str),
            Some("x, y, z")
        );
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let mut registry = ExpressionRegistry::new();
        registry.insert(sum_of("loop", &["loop"])).unwrap();
        assert_eq!(registry.resolve_order().unwrap_err().info().code, "expression-cycle");
    }

    #[test]
    fn unresolved_and_duplicate_names_are_structural() {
        let mut registry = ExpressionRegistry::new();
        registry.insert(sum_of("A", &["ghost"])).unwrap();
        let err = registry.resolve_order().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.info().code, "unresolved-reference");
        let dup = registry.insert(sum_of("A", &[])).unwrap_err();
        assert_eq!(dup.info().code, "duplicate-expression");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn pinned_expressions_run_last_in_pin_order() {
        let mut registry = ExpressionRegistry::new();
        registry.insert(sum_of("fix2", &["A"])).unwrap();
        registry.insert(sum_of("fix1", &[])).unwrap();
        registry.insert(sum_of("A", &[])).unwrap();
        registry.insert(sum_of("B", &["A"])).unwrap();
        registry.pin_last("fix1");
        registry.pin_last("fix2");
        let order = registry.resolve_order().unwrap();
        assert_eq!(order.names(), ["A", "B", "fix1", "fix2"]);
    }

    #[test]
    fn depending_on_a_pinned_expression_is_rejected() {
        let mut registry = ExpressionRegistry::new();
        registry.insert(sum_of("late", &[])).unwrap();
        registry.insert(sum_of("early", &["late"])).unwrap();
        registry.pin_last("late");
        let err = registry.resolve_order().unwrap_err();
        assert_eq!(err.info().code, "pinned-dependency");
        registry.pin_last("missing");
        registry.remove("early");
        assert_eq!(registry.resolve_order().unwrap_err().info().code, "unknown-pinned");
    }
}
