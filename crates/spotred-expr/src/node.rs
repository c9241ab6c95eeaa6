//! Closed expression tree.

use std::collections::BTreeSet;

use spotred_core::errors::{ErrorInfo, ReductionError};
use spotred_core::{ModelKind, RetrievalMethod};

use crate::guard::ERROR_VALUE;
use crate::ops::{Arity, Function, Operation};

/// Literal held by a constant node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum Literal {
    /// Numeric literal.
    Number(f64),
    /// Boolean literal, evaluated as `1.0` or `0.0`.
    Boolean(bool),
    /// Text literal, evaluated by parsing it as a number.
    Text(String),
}

impl Literal {
    /// Numeric reading of the literal; unparsable text reads as the sentinel.
    pub fn as_number(&self) -> f64 {
        match self {
            Literal::Number(value) => *value,
            Literal::Boolean(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            Literal::Text(text) => text.trim().parse::<f64>().unwrap_or(ERROR_VALUE),
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "node", rename_all = "snake_case")
)]
pub enum Node {
    /// Literal constant.
    Constant {
        /// Literal value.
        value: Literal,
    },
    /// Species array lookup on the first supplied spot.
    Species {
        /// Species label (e.g. `"206"`).
        species: String,
        /// Array to read.
        method: RetrievalMethod,
    },
    /// Named ratio of the first supplied spot, `[value, 1σ]`.
    Ratio {
        /// Ratio name (e.g. `"204/206"`).
        name: String,
    },
    /// Constant input from a parameter model, `[value, 1σ]`.
    Parameter {
        /// Model holding the value.
        model: ModelKind,
        /// Value name.
        name: String,
    },
    /// Result of another named expression.
    Expression {
        /// Referenced expression.
        name: String,
    },
    /// Operator application.
    Operation {
        /// Operator.
        op: Operation,
        /// Operands.
        args: Vec<Node>,
    },
    /// Function application.
    Function {
        /// Function.
        func: Function,
        /// Arguments.
        args: Vec<Node>,
    },
    /// Horizontal concatenation of the children's columns.
    Composite {
        /// Column blocks in output order.
        columns: Vec<Node>,
    },
}

impl Node {
    /// Numeric constant.
    pub fn number(value: f64) -> Self {
        Node::Constant {
            value: Literal::Number(value),
        }
    }

    /// Constant of any literal kind.
    pub fn literal(value: Literal) -> Self {
        Node::Constant { value }
    }

    /// Species lookup with an already-typed retrieval method.
    pub fn species(species: impl Into<String>, method: RetrievalMethod) -> Self {
        Node::Species {
            species: species.into(),
            method,
        }
    }

    /// Species lookup whose retrieval method is named by its accessor
    /// (e.g. `"getTotalCps"`), resolved here once.
    pub fn species_by_accessor(
        species: impl Into<String>,
        accessor: &str,
    ) -> Result<Self, ReductionError> {
        let method = RetrievalMethod::from_accessor_name(accessor).ok_or_else(|| {
            ReductionError::Structure(
                ErrorInfo::new("unknown-retrieval-method", "no species array has this accessor")
                    .with_context("accessor", accessor),
            )
        })?;
        Ok(Node::species(species, method))
    }

    /// Spot ratio lookup.
    pub fn ratio(name: impl Into<String>) -> Self {
        Node::Ratio { name: name.into() }
    }

    /// Parameter model lookup.
    pub fn parameter(model: ModelKind, name: impl Into<String>) -> Self {
        Node::Parameter {
            model,
            name: name.into(),
        }
    }

    /// Reference to another expression.
    pub fn reference(name: impl Into<String>) -> Self {
        Node::Expression { name: name.into() }
    }

    /// Operator application.
    pub fn op(op: Operation, args: Vec<Node>) -> Self {
        Node::Operation { op, args }
    }

    /// Function application.
    pub fn func(func: Function, args: Vec<Node>) -> Self {
        Node::Function { func, args }
    }

    /// Column concatenation.
    pub fn composite(columns: Vec<Node>) -> Self {
        Node::Composite { columns }
    }

    /// Direct children of the node.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Operation { args, .. } | Node::Function { args, .. } => args,
            Node::Composite { columns } => columns,
            _ => &[],
        }
    }

    /// Whether the node never has children.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Node::Constant { .. }
                | Node::Species { .. }
                | Node::Ratio { .. }
                | Node::Parameter { .. }
                | Node::Expression { .. }
        )
    }

    /// Names of every expression referenced anywhere in the tree.
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references(&self, names: &mut BTreeSet<String>) {
        if let Node::Expression { name } = self {
            names.insert(name.clone());
        }
        for child in self.children() {
            child.collect_references(names);
        }
    }

    /// Checks that every operator and function node has an accepted
    /// argument count and that composites are not empty.
    pub fn validate(&self) -> Result<(), ReductionError> {
        let (label, arity, count) = match self {
            Node::Operation { op, args } => (op.symbol(), op.arity(), args.len()),
            Node::Function { func, args } => (func.name(), func.arity(), args.len()),
            Node::Composite { columns } => ("composite", Arity::AtLeast(1), columns.len()),
            _ => return Ok(()),
        };
        if !arity.accepts(count) {
            return Err(ReductionError::Structure(
                ErrorInfo::new("arity-mismatch", "wrong number of arguments")
                    .with_context("primitive", label)
                    .with_context("expected", arity.to_string())
                    .with_context("found", count.to_string()),
            ));
        }
        self.children().iter().try_for_each(Node::validate)
    }

    /// Whether the root of the tree is a weighted mean.
    pub fn is_weighted_mean(&self) -> bool {
        matches!(
            self,
            Node::Function {
                func: Function::WeightedMean,
                ..
            }
        )
    }
}
