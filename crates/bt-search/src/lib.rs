//! # bt-search
//!
//! Grid and randomized hyperparameter search for gradient-boosted decision
//! tree training.
//!
//! Candidate configurations are enumerated over the cartesian product of the
//! search axes with a deterministic mixed-radix walk, evaluated through a
//! training backend, and ranked under the primary metric's best-value
//! direction. Expensive feature quantization is reused across consecutive
//! candidates that share quantization parameters.

mod cartesian;
mod driver;
mod evaluate;
mod generators;
mod report;
mod space;

pub use cartesian::{
    CandidateIterator, ExhaustiveIterator, MixedRadixEnumerator, SampledIterator,
};
pub use driver::{
    grid_search, grid_search_with_report, randomized_search, randomized_search_with_report,
    SearchSettings,
};
pub use generators::{GeneratorRegistry, RANDOM_DISTRIBUTION_SENTINEL};
pub use report::{CandidateRecord, SearchKind, SearchReport};
pub use space::{GridValue, ParsedSpace, QuantizationAxesPresence};
