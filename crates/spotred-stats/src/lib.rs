#![deny(missing_docs)]
#![doc = "Weighted mean statistics and coherent-group outlier rejection for spotred."]

pub mod coherence;
pub mod robust;
pub mod summary;
pub mod wtdav;

pub use coherence::{find_coherent_group, recompute, CoherenceOutcome, CoherenceReport, SummarySource};
pub use robust::median;
pub use summary::{
    SelectionEntry, SelectionMask, SpotSummaryDetails, WeightedMeanRecord, RECORD_SCHEMA,
};
pub use wtdav::{weighted_mean, WeightedMean};
