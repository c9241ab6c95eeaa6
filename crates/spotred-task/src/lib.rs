#![deny(missing_docs)]
#![doc = "Task orchestration for spotred: staged batch evaluation, weighted-mean summaries and overcount correction."]

pub mod config;
pub mod engine;
pub mod overcount;
pub mod summary;
pub mod task;

pub use config::{TaskConfig, DEFAULT_MIN_PROBABILITY};
pub use engine::{Progress, ReductionHandle};
pub use overcount::{builtin_expressions, OvercountMode, CORRECTED_RATIO, OVERCOUNT_207, OVERCOUNT_208};
pub use task::{SummaryEntry, SummaryTable, Task};
