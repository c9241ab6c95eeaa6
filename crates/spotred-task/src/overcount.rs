//! Overcount-correction mode controller.
//!
//! The 204Pb/206Pb ratio of unknown spots can be replaced by a value
//! inferred from 207Pb or 208Pb, correcting an isobaric overcount on mass
//! 204. The corrections are ordinary built-in expressions; switching modes
//! evaluates the selected one on each unknown spot and installs its result
//! as the ratio override.

use spotred_core::errors::ReductionError;
use spotred_core::{Measurement, ModelKind, ParameterSet, Spot, SpotKind};
use spotred_expr::{
    evaluate, EvalContext, Expression, ExpressionRegistry, Function, Node, Operation, ResultStore,
    ERROR_VALUE,
};

use crate::engine::Progress;
use crate::task::Task;

/// Ratio replaced by an overcount correction.
pub const CORRECTED_RATIO: &str = "204/206";
/// Built-in expression computing the 207Pb-based correction.
pub const OVERCOUNT_207: &str = "204overcts/206 (207)";
/// Built-in expression computing the 208Pb-based correction.
pub const OVERCOUNT_208: &str = "204overcts/206 (208)";

/// Measured 207Pb/206Pb ratio name.
pub const MEASURED_76: &str = "207/206";
/// Measured 208Pb/206Pb ratio name.
pub const MEASURED_86: &str = "208/206";
/// Radiogenic 207Pb/206Pb of the reference material.
pub const RADIOGENIC_76: &str = "r207_206r";
/// Radiogenic 208Pb/206Pb of the reference material.
pub const RADIOGENIC_86: &str = "r208_206r";
/// Common-lead 206Pb/204Pb.
pub const COMMON_64: &str = "r206_204";
/// Common-lead 207Pb/204Pb.
pub const COMMON_74: &str = "r207_204";
/// Common-lead 208Pb/204Pb.
pub const COMMON_84: &str = "r208_204";

/// Which overcount correction is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OvercountMode {
    /// Measured ratios are used unchanged.
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "none"))]
    None,
    /// Correction inferred from 207Pb.
    #[cfg_attr(feature = "serde", serde(rename = "207"))]
    Fr207,
    /// Correction inferred from 208Pb.
    #[cfg_attr(feature = "serde", serde(rename = "208"))]
    Fr208,
}

impl OvercountMode {
    /// Built-in expression backing the mode.
    pub fn expression(self) -> Option<&'static str> {
        match self {
            OvercountMode::None => None,
            OvercountMode::Fr207 => Some(OVERCOUNT_207),
            OvercountMode::Fr208 => Some(OVERCOUNT_208),
        }
    }

    /// Short label.
    pub fn label(self) -> &'static str {
        match self {
            OvercountMode::None => "none",
            OvercountMode::Fr207 => "207",
            OvercountMode::Fr208 => "208",
        }
    }
}

impl std::str::FromStr for OvercountMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(OvercountMode::None),
            "207" => Ok(OvercountMode::Fr207),
            "208" => Ok(OvercountMode::Fr208),
            other => Err(format!("unknown overcount mode {other:?}")),
        }
    }
}

/// `[(m − R) / (c − R·c64), σ(m) / |c − R·c64|]`.
fn correction_tree(measured: &str, radiogenic: &str, common: &str) -> Node {
    let r = || Node::parameter(ModelKind::ReferenceMaterial, radiogenic);
    let denominator = || {
        Node::op(
            Operation::Subtract,
            vec![
                Node::parameter(ModelKind::CommonPb, common),
                Node::op(
                    Operation::Multiply,
                    vec![r(), Node::parameter(ModelKind::CommonPb, COMMON_64)],
                ),
            ],
        )
    };
    let value = Node::op(
        Operation::Divide,
        vec![
            Node::op(Operation::Subtract, vec![Node::ratio(measured), r()]),
            denominator(),
        ],
    );
    let sigma = Node::op(
        Operation::Divide,
        vec![
            Node::func(Function::Uncertainty, vec![Node::ratio(measured)]),
            Node::func(Function::Abs, vec![denominator()]),
        ],
    );
    Node::composite(vec![value, sigma])
}

/// Built-in expressions registered ahead of user expressions.
pub fn builtin_expressions() -> Vec<Expression> {
    vec![
        Expression::per_spot(
            OVERCOUNT_207,
            correction_tree(MEASURED_76, RADIOGENIC_76, COMMON_74),
        )
        .unknown_only()
        .built_in(),
        Expression::per_spot(
            OVERCOUNT_208,
            correction_tree(MEASURED_86, RADIOGENIC_86, COMMON_84),
        )
        .unknown_only()
        .built_in(),
    ]
}

fn correction_for(
    registry: &ExpressionRegistry,
    parameters: &ParameterSet,
    name: &str,
    spot: &Spot,
) -> Option<Measurement> {
    let expression = registry.get(name)?;
    let empty = ResultStore::new();
    let ctx = EvalContext::new(registry, parameters, &empty);
    match evaluate(&expression.tree, &[spot], &ctx) {
        Ok(matrix) => {
            let value = matrix.get(0, 0)?;
            let sigma = matrix.get(0, 1)?;
            if value == ERROR_VALUE || sigma == ERROR_VALUE {
                log::warn!("spot {}: {name} is undefined; ratio left uncorrected", spot.id());
                None
            } else {
                Some(Measurement::new(value, sigma))
            }
        }
        Err(err) => {
            log::warn!("spot {}: {name} failed: {err}", spot.id());
            None
        }
    }
}

impl Task {
    /// Clears every overcount override and re-evaluates unknown spots.
    pub fn apply_no_correction(&mut self) -> Result<(), ReductionError> {
        self.apply_mode(OvercountMode::None)
    }

    /// Installs the 207Pb-based correction and re-evaluates unknown spots.
    pub fn apply_correction_207(&mut self) -> Result<(), ReductionError> {
        self.apply_mode(OvercountMode::Fr207)
    }

    /// Installs the 208Pb-based correction and re-evaluates unknown spots.
    pub fn apply_correction_208(&mut self) -> Result<(), ReductionError> {
        self.apply_mode(OvercountMode::Fr208)
    }

    fn apply_mode(&mut self, mode: OvercountMode) -> Result<(), ReductionError> {
        let overrides = self.compute_overrides(mode);
        self.commit_mode(mode, overrides);
        log::info!("overcount correction set to {}", mode.label());
        self.evaluate_kinds(&[SpotKind::Unknown], &Progress::new())
    }

    /// Corrected ratio for every unknown spot carrying it, by spot index.
    pub(crate) fn compute_overrides(&self, mode: OvercountMode) -> Vec<(usize, Option<Measurement>)> {
        self.spots
            .iter()
            .enumerate()
            .filter(|(_, spot)| {
                spot.kind() == SpotKind::Unknown && spot.raw_ratio(CORRECTED_RATIO).is_some()
            })
            .map(|(index, spot)| {
                let corrected = mode.expression().and_then(|name| {
                    correction_for(&self.registry, &self.parameters, name, spot)
                });
                (index, corrected)
            })
            .collect()
    }

    pub(crate) fn commit_mode(&mut self, mode: OvercountMode, overrides: Vec<(usize, Option<Measurement>)>) {
        self.overcount_mode = mode;
        for (index, corrected) in overrides {
            if let Some(spot) = self.spots.get_mut(index) {
                spot.set_ratio_correction(CORRECTED_RATIO, corrected);
            }
        }
        self.changed = true;
        self.invalidate_kind(SpotKind::Unknown);
    }
}
