//! Task configuration.

use crate::overcount::OvercountMode;

/// Default minimum probability of fit for weighted means.
pub const DEFAULT_MIN_PROBABILITY: f64 = 0.05;

/// Settings governing a reduction task.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TaskConfig {
    /// Task label carried into reports.
    pub name: String,
    /// Probability of fit a coherent weighted-mean group must reach.
    pub min_probability_wm: f64,
    /// Whether weighted-mean summaries run the coherence filter.
    pub auto_reject: bool,
    /// Whether per-spot stages are spread across a thread pool.
    pub parallel: bool,
    /// Worker threads for parallel stages; zero lets the pool decide.
    pub threads: usize,
    /// Overcount correction applied when the task is built.
    pub overcount_mode: OvercountMode,
    /// Expressions excluded from automatic ordering and run last, in order.
    pub pinned_last: Vec<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: "untitled".to_string(),
            min_probability_wm: DEFAULT_MIN_PROBABILITY,
            auto_reject: true,
            parallel: false,
            threads: 0,
            overcount_mode: OvercountMode::None,
            pinned_last: Vec::new(),
        }
    }
}
