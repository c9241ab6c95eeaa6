//! Catalog of arithmetic operations and named functions.

use std::fmt;

use crate::guard::{safe_div, sanitize, EPSILON};

/// Number of arguments a primitive accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments.
    Exactly(usize),
    /// `n` or more arguments.
    AtLeast(usize),
    /// Between `min` and `max` arguments, inclusive.
    Between(usize, usize),
}

impl Arity {
    /// Whether `count` arguments satisfy the arity.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Between(min, max) => (min..=max).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Between(min, max) => write!(f, "{min} to {max}"),
        }
    }
}

/// Operator primitives applied row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Operation {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`, guarded against vanishing divisors.
    Divide,
    /// `a ^ b`
    Power,
    /// `-a`
    Negate,
    /// `a < b`
    Less,
    /// `a <= b`
    LessEqual,
    /// `a > b`
    Greater,
    /// `a >= b`
    GreaterEqual,
    /// `a == b` within [`EPSILON`].
    Equal,
    /// `a != b` beyond [`EPSILON`].
    NotEqual,
}

impl Operation {
    /// Argument count of the operator.
    pub fn arity(self) -> Arity {
        match self {
            Operation::Negate => Arity::Exactly(1),
            _ => Arity::Exactly(2),
        }
    }

    /// Conventional infix symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract | Operation::Negate => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Power => "^",
            Operation::Less => "<",
            Operation::LessEqual => "<=",
            Operation::Greater => ">",
            Operation::GreaterEqual => ">=",
            Operation::Equal => "==",
            Operation::NotEqual => "!=",
        }
    }

    /// Applies the operator to one row of already-checked operands.
    pub fn apply(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(0.0);
        let b = args.get(1).copied().unwrap_or(0.0);
        let truth = |flag: bool| if flag { 1.0 } else { 0.0 };
        match self {
            Operation::Add => sanitize(a + b),
            Operation::Subtract => sanitize(a - b),
            Operation::Multiply => sanitize(a * b),
            Operation::Divide => safe_div(a, b),
            Operation::Power => sanitize(a.powf(b)),
            Operation::Negate => -a,
            Operation::Less => truth(a < b),
            Operation::LessEqual => truth(a <= b),
            Operation::Greater => truth(a > b),
            Operation::GreaterEqual => truth(a >= b),
            Operation::Equal => truth((a - b).abs() <= EPSILON),
            Operation::NotEqual => truth((a - b).abs() > EPSILON),
        }
    }
}

/// Named function primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Function {
    /// Natural logarithm.
    Ln,
    /// Base-10 logarithm.
    Log10,
    /// Exponential.
    Exp,
    /// Square root.
    Sqrt,
    /// Absolute value.
    Abs,
    /// Primary column of the argument.
    Value,
    /// Uncertainty column of the argument (zero when absent).
    Uncertainty,
    /// `If(condition, then, else)`.
    If,
    /// Logical conjunction of every argument.
    And,
    /// Logical disjunction of every argument.
    Or,
    /// Logical negation.
    Not,
    /// Smallest primary value across arguments and rows.
    Min,
    /// Largest primary value across arguments and rows.
    Max,
    /// Sum of primary values across arguments and rows.
    Sum,
    /// Arithmetic mean of primary values across arguments and rows.
    Average,
    /// Median of primary values across arguments and rows.
    Median,
    /// Number of primary values across arguments and rows.
    Count,
    /// Inverse-variance weighted mean row `[mean, 1σ, 2σ, 95%CI, n, MSWD, p]`.
    WeightedMean,
    /// `ln(1 + r) / λ238` for a radiogenic 206Pb/238U ratio.
    #[cfg_attr(feature = "serde", serde(rename = "age206_238"))]
    Age206Pb238U,
    /// `ln(1 + r) / λ232` for a radiogenic 208Pb/232Th ratio.
    #[cfg_attr(feature = "serde", serde(rename = "age208_232"))]
    Age208Pb232Th,
    /// Age solving the radiogenic 207Pb/206Pb ratio equation.
    #[cfg_attr(feature = "serde", serde(rename = "age207_206"))]
    Age207Pb206Pb,
}

impl Function {
    /// Argument count of the function.
    pub fn arity(self) -> Arity {
        match self {
            Function::Ln
            | Function::Log10
            | Function::Exp
            | Function::Sqrt
            | Function::Abs
            | Function::Value
            | Function::Uncertainty
            | Function::Not => Arity::Exactly(1),
            Function::If => Arity::Exactly(3),
            Function::And
            | Function::Or
            | Function::Min
            | Function::Max
            | Function::Sum
            | Function::Average
            | Function::Median
            | Function::Count => Arity::AtLeast(1),
            Function::WeightedMean => Arity::Between(1, 2),
            Function::Age206Pb238U | Function::Age208Pb232Th => Arity::Exactly(2),
            Function::Age207Pb206Pb => Arity::Exactly(4),
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Exp => "exp",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
            Function::Value => "value",
            Function::Uncertainty => "uncertainty",
            Function::If => "if",
            Function::And => "and",
            Function::Or => "or",
            Function::Not => "not",
            Function::Min => "min",
            Function::Max => "max",
            Function::Sum => "sum",
            Function::Average => "average",
            Function::Median => "median",
            Function::Count => "count",
            Function::WeightedMean => "wtdav",
            Function::Age206Pb238U => "age206_238",
            Function::Age208Pb232Th => "age208_232",
            Function::Age207Pb206Pb => "age207_206",
        }
    }

    /// Whether the function collapses every row of every argument into a
    /// single value.
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            Function::Min
                | Function::Max
                | Function::Sum
                | Function::Average
                | Function::Median
                | Function::Count
                | Function::WeightedMean
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_checks() {
        assert!(Operation::Negate.arity().accepts(1));
        assert!(!Operation::Add.arity().accepts(3));
        assert!(Function::WeightedMean.arity().accepts(2));
        assert!(!Function::WeightedMean.arity().accepts(3));
        assert!(Function::Sum.arity().accepts(5));
        assert_eq!(Function::If.arity().to_string(), "exactly 3");
    }

    #[test]
    fn comparisons_yield_truth_values() {
        assert_eq!(Operation::Less.apply(&[1.0, 2.0]), 1.0);
        assert_eq!(Operation::Equal.apply(&[0.1 + 0.2, 0.3]), 1.0);
        assert_eq!(Operation::Divide.apply(&[1.0, 0.0]), crate::guard::ERROR_VALUE);
    }
}
