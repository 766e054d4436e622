//! Mergeable aggregate functions for partitioned query execution.
//!
//! - [`algorithms::frequency_map`]: `map_count`, a value → count histogram
//! - [`algorithms::max_row`]: `maxrow`, the row with the largest key
//! - [`algorithms::trimmed_average`]: `fp_avg`, trimmed mean of a histogram
//!
//! All evaluators follow the lifecycle in [`protocol`]; [`local`] drives it
//! in-process.

pub mod algorithms;
pub mod local;
pub mod protocol;

pub use algorithms::frequency_map::{FrequencyMap, FrequencyMapAggregator};
pub use algorithms::max_row::{MaxRowAggregator, MaxRowBuffer};
pub use algorithms::trimmed_average::{trimmed_average, TrimmedAverageFunction};
pub use protocol::{AggregateEvaluator, PartialInput, Phase};
