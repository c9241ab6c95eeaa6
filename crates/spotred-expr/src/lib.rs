#![deny(missing_docs)]
#![doc = "Expression trees, their evaluation over spots and dependency-ordered execution."]

pub mod eval;
pub mod expression;
pub mod guard;
pub mod node;
pub mod ops;
pub mod registry;
pub mod results;

pub use eval::{age_207_206, evaluate, evaluate_named, EvalContext};
pub use expression::{Expression, ExpressionFlags};
pub use guard::{EPSILON, ERROR_VALUE};
pub use node::{Literal, Node};
pub use ops::{Arity, Function, Operation};
pub use registry::{ExecutionOrder, ExpressionRegistry, Stage};
pub use results::{ResultLookup, ResultStore, SpotScratch};
