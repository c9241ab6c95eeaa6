//! Tree-walking evaluator.
//!
//! Every node evaluates to a [`Matrix`]. Row-wise primitives broadcast
//! single-row operands over the rows of the others and read column 0.
//! Numeric domain failures never raise; they produce [`ERROR_VALUE`].

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{Matrix, Measurement, ParameterSet, Spot, SpotKind};
use spotred_stats::{median, weighted_mean};

use crate::guard::{is_error, safe_div, safe_ln, safe_log10, safe_sqrt, sanitize, ERROR_VALUE};
use crate::node::Node;
use crate::ops::Function;
use crate::registry::ExpressionRegistry;
use crate::results::ResultLookup;

const AGE_ITERATIONS: usize = 100;
const AGE_TOLERANCE_YEARS: f64 = 1e-3;
const AGE_START_YEARS: f64 = 1.0e9;

fn eval_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
}

/// Everything an evaluation may read besides the spots themselves.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Registered expressions, consulted for the shape of references.
    pub registry: &'a ExpressionRegistry,
    /// Parameter models supplying constant inputs.
    pub parameters: &'a ParameterSet,
    /// Previously evaluated expression results.
    pub results: &'a dyn ResultLookup,
}

impl<'a> EvalContext<'a> {
    /// Creates a context.
    pub fn new(
        registry: &'a ExpressionRegistry,
        parameters: &'a ParameterSet,
        results: &'a dyn ResultLookup,
    ) -> Self {
        Self {
            registry,
            parameters,
            results,
        }
    }
}

/// Evaluates the registered expression `name` over `spots`.
pub fn evaluate_named(
    name: &str,
    spots: &[&Spot],
    ctx: &EvalContext<'_>,
) -> Result<Matrix, ReductionError> {
    let expression = ctx.registry.get(name).ok_or_else(|| {
        ReductionError::Evaluation(
            eval_error("unknown-expression", "expression is not registered")
                .with_context("expression", name),
        )
    })?;
    evaluate(&expression.tree, spots, ctx).map_err(|err| match err {
        ReductionError::Evaluation(info) => {
            ReductionError::Evaluation(info.with_context("expression", name))
        }
        other => other,
    })
}

/// Evaluates `node` over `spots`.
///
/// Species and ratio lookups read the first spot only; callers evaluate
/// per-spot expressions one spot at a time.
pub fn evaluate(node: &Node, spots: &[&Spot], ctx: &EvalContext<'_>) -> Result<Matrix, ReductionError> {
    match node {
        Node::Constant { value } => Ok(Matrix::scalar(value.as_number())),
        Node::Species { species, method } => {
            let spot = first_spot(spots)?;
            let value = spot
                .species_index(species)
                .and_then(|index| spot.array(*method)?.get(index).copied())
                .unwrap_or(0.0);
            Ok(Matrix::scalar(value))
        }
        Node::Ratio { name } => {
            let spot = first_spot(spots)?;
            let measurement = spot.ratio(name).unwrap_or_default();
            Ok(Matrix::row(vec![measurement.value, measurement.one_sigma_abs]))
        }
        Node::Parameter { model, name } => Ok(match ctx.parameters.value(*model, name) {
            Some(value) => Matrix::row(vec![value.value, value.one_sigma_abs()]),
            None => Matrix::row(vec![ERROR_VALUE, ERROR_VALUE]),
        }),
        Node::Expression { name } => lookup_reference(name, spots, ctx),
        Node::Operation { op, args } => {
            let operands = evaluate_all(args, spots, ctx)?;
            rowwise(&operands, |row| op.apply(row))
        }
        Node::Function { func, args } => {
            let operands = evaluate_all(args, spots, ctx)?;
            apply_function(*func, &operands)
        }
        Node::Composite { columns } => {
            let blocks = evaluate_all(columns, spots, ctx)?;
            let rows = broadcast_rows(&blocks)?;
            let out = (0..rows)
                .map(|row| {
                    blocks
                        .iter()
                        .flat_map(|block| block.rows()[row_of(block, row)].iter().copied())
                        .collect()
                })
                .collect();
            Ok(Matrix::from_rows(out))
        }
    }
}

fn first_spot<'s>(spots: &[&'s Spot]) -> Result<&'s Spot, ReductionError> {
    spots.first().copied().ok_or_else(|| {
        ReductionError::Evaluation(eval_error("no-spots", "evaluation needs at least one spot"))
    })
}

fn evaluate_all(
    nodes: &[Node],
    spots: &[&Spot],
    ctx: &EvalContext<'_>,
) -> Result<Vec<Matrix>, ReductionError> {
    nodes.iter().map(|node| evaluate(node, spots, ctx)).collect()
}

fn lookup_reference(
    name: &str,
    spots: &[&Spot],
    ctx: &EvalContext<'_>,
) -> Result<Matrix, ReductionError> {
    let expression = ctx.registry.get(name).ok_or_else(|| {
        ReductionError::Evaluation(
            eval_error("unknown-expression", "referenced expression is not registered")
                .with_context("reference", name),
        )
    })?;
    if expression.is_summary() {
        let kind = first_spot(spots)?.kind();
        return ctx
            .results
            .summary(name, kind)
            .or_else(|| ctx.results.summary(name, SpotKind::ReferenceMaterial))
            .cloned()
            .ok_or_else(|| {
                ReductionError::Evaluation(
                    eval_error("missing-result", "summary result has not been evaluated")
                        .with_context("reference", name),
                )
            });
    }
    if spots.is_empty() {
        return Err(ReductionError::Evaluation(eval_error(
            "no-spots",
            "evaluation needs at least one spot",
        )));
    }
    let rows = spots
        .iter()
        .map(|spot| {
            ctx.results
                .per_spot(name, spot.id())
                .map(<[f64]>::to_vec)
                .ok_or_else(|| {
                    ReductionError::Evaluation(
                        eval_error("missing-result", "per-spot result has not been evaluated")
                            .with_context("reference", name)
                            .with_context("spot", spot.id().as_str()),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Matrix::from_rows(rows))
}

fn broadcast_rows(operands: &[Matrix]) -> Result<usize, ReductionError> {
    let mut rows = 1;
    for operand in operands {
        match operand.nrows() {
            0 => {
                return Err(ReductionError::Evaluation(eval_error(
                    "empty-operand",
                    "operand produced no rows",
                )))
            }
            1 => {}
            n if rows == 1 || rows == n => rows = n,
            n => {
                return Err(ReductionError::Evaluation(
                    eval_error("shape-mismatch", "operands disagree on row count")
                        .with_context("left", rows.to_string())
                        .with_context("right", n.to_string()),
                ))
            }
        }
    }
    Ok(rows)
}

fn row_of(operand: &Matrix, row: usize) -> usize {
    if operand.nrows() == 1 {
        0
    } else {
        row
    }
}

fn primary(operand: &Matrix, row: usize) -> f64 {
    operand.value(row_of(operand, row)).unwrap_or(ERROR_VALUE)
}

fn rowwise(operands: &[Matrix], f: impl Fn(&[f64]) -> f64) -> Result<Matrix, ReductionError> {
    let rows = broadcast_rows(operands)?;
    let mut scratch = Vec::with_capacity(operands.len());
    let mut out = Vec::with_capacity(rows);
    for row in 0..rows {
        scratch.clear();
        scratch.extend(operands.iter().map(|operand| primary(operand, row)));
        let value = if scratch.iter().any(|value| is_error(*value)) {
            ERROR_VALUE
        } else {
            sanitize(f(&scratch))
        };
        out.push(vec![value]);
    }
    Ok(Matrix::from_rows(out))
}

fn flatten_primary(operands: &[Matrix]) -> Vec<f64> {
    operands.iter().flat_map(|operand| operand.column(0)).collect()
}

fn aggregate(operands: &[Matrix], f: impl Fn(&[f64]) -> f64) -> Matrix {
    let values = flatten_primary(operands);
    if values.is_empty() || values.iter().any(|value| is_error(*value)) {
        return Matrix::scalar(ERROR_VALUE);
    }
    Matrix::scalar(sanitize(f(&values)))
}

fn truth(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn apply_function(func: Function, operands: &[Matrix]) -> Result<Matrix, ReductionError> {
    match func {
        Function::Ln => rowwise(operands, |v| safe_ln(v[0])),
        Function::Log10 => rowwise(operands, |v| safe_log10(v[0])),
        Function::Exp => rowwise(operands, |v| v[0].exp()),
        Function::Sqrt => rowwise(operands, |v| safe_sqrt(v[0])),
        Function::Abs => rowwise(operands, |v| v[0].abs()),
        Function::Value => rowwise(operands, |v| v[0]),
        Function::Uncertainty => {
            let operand = single(operands)?;
            Ok(Matrix::from_rows(
                operand
                    .rows()
                    .iter()
                    .map(|row| {
                        let value = row.first().copied().unwrap_or(ERROR_VALUE);
                        if is_error(value) {
                            vec![ERROR_VALUE]
                        } else {
                            vec![row.get(1).copied().unwrap_or(0.0)]
                        }
                    })
                    .collect(),
            ))
        }
        Function::If => {
            let rows = broadcast_rows(operands)?;
            let out = (0..rows)
                .map(|row| {
                    let condition = primary(&operands[0], row);
                    if is_error(condition) {
                        vec![ERROR_VALUE]
                    } else if condition != 0.0 {
                        vec![primary(&operands[1], row)]
                    } else {
                        vec![primary(&operands[2], row)]
                    }
                })
                .collect();
            Ok(Matrix::from_rows(out))
        }
        Function::And => rowwise(operands, |v| truth(v.iter().all(|x| *x != 0.0))),
        Function::Or => rowwise(operands, |v| truth(v.iter().any(|x| *x != 0.0))),
        Function::Not => rowwise(operands, |v| truth(v[0] == 0.0)),
        Function::Min => Ok(aggregate(operands, |v| v.iter().copied().fold(f64::INFINITY, f64::min))),
        Function::Max => Ok(aggregate(operands, |v| {
            v.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })),
        Function::Sum => Ok(aggregate(operands, |v| v.iter().sum())),
        Function::Average => Ok(aggregate(operands, |v| {
            v.iter().sum::<f64>() / v.len() as f64
        })),
        Function::Median => Ok(aggregate(operands, |v| median(v).unwrap_or(ERROR_VALUE))),
        Function::Count => {
            let values = flatten_primary(operands);
            Ok(Matrix::scalar(
                values.iter().filter(|value| !is_error(**value)).count() as f64,
            ))
        }
        Function::WeightedMean => weighted_mean_row(operands),
        Function::Age206Pb238U | Function::Age208Pb232Th => {
            rowwise(operands, |v| safe_div(safe_ln(1.0 + v[0]), v[1]))
        }
        Function::Age207Pb206Pb => rowwise(operands, |v| age_207_206(v[0], v[1], v[2], v[3])),
    }
}

fn single(operands: &[Matrix]) -> Result<&Matrix, ReductionError> {
    operands.first().ok_or_else(|| {
        ReductionError::Evaluation(eval_error("missing-operand", "function has no operand"))
    })
}

fn weighted_mean_row(operands: &[Matrix]) -> Result<Matrix, ReductionError> {
    let values = single(operands)?;
    let mut measurements = Vec::with_capacity(values.nrows());
    for row in 0..values.nrows() {
        let value = primary(values, row);
        let sigma = match operands.get(1) {
            Some(sigmas) => {
                if sigmas.nrows() != 1 && sigmas.nrows() != values.nrows() {
                    return Err(ReductionError::Statistics(
                        eval_error("shape-mismatch", "sigmas and values disagree on row count")
                            .with_context("values", values.nrows().to_string())
                            .with_context("sigmas", sigmas.nrows().to_string()),
                    ));
                }
                primary(sigmas, row)
            }
            None => values.get(row, 1).ok_or_else(|| {
                ReductionError::Statistics(
                    eval_error("missing-uncertainty", "values carry no uncertainty column")
                        .with_context("row", row.to_string()),
                )
            })?,
        };
        if is_error(value) || is_error(sigma) {
            return Err(ReductionError::Statistics(
                eval_error("sentinel-input", "weighted mean over an undefined value")
                    .with_context("row", row.to_string()),
            ));
        }
        measurements.push(Measurement::new(value, sigma));
    }
    Ok(Matrix::row(weighted_mean(&measurements)?.to_row()))
}

/// Age in years whose radiogenic 207Pb/206Pb ratio equals `r76`, solved by
/// Newton iteration on `r76 = (e^(λ235·t) − 1) / (U·(e^(λ238·t) − 1))`.
pub fn age_207_206(r76: f64, lambda235: f64, lambda238: f64, u_ratio: f64) -> f64 {
    if [r76, lambda235, lambda238, u_ratio].iter().any(|v| is_error(*v) || !v.is_finite())
        || lambda235 <= 0.0
        || lambda238 <= 0.0
        || u_ratio <= 0.0
    {
        return ERROR_VALUE;
    }
    if r76 <= lambda235 / (u_ratio * lambda238) {
        return ERROR_VALUE;
    }
    let mut t = AGE_START_YEARS;
    for _ in 0..AGE_ITERATIONS {
        let e235 = (lambda235 * t).exp();
        let e238 = (lambda238 * t).exp();
        let numerator = e235 - 1.0;
        let denominator = u_ratio * (e238 - 1.0);
        let residual = numerator / denominator - r76;
        let slope = (lambda235 * e235 * denominator - numerator * u_ratio * lambda238 * e238)
            / (denominator * denominator);
        if !slope.is_finite() || slope == 0.0 || !residual.is_finite() {
            return ERROR_VALUE;
        }
        let step = residual / slope;
        t = (t - step).max(1.0);
        if step.abs() < AGE_TOLERANCE_YEARS {
            return sanitize(t);
        }
    }
    ERROR_VALUE
}
