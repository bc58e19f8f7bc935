use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::errors::TuneResult;
use crate::options::{CrossValidationParams, QuantizationSettings, TrainTestSplitParams};
use crate::values::FlatParams;

/// Which value of a metric counts as best.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricBestValue {
    Min,
    Max,
    FixedValue(f64),
    Undefined,
}

/// Mean-over-folds trajectory of one metric across training iterations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTrace {
    pub metric: String,
    pub train_mean: Vec<f64>,
    pub test_mean: Vec<f64>,
    pub test_std: Vec<f64>,
}

/// Cross-validation result: one trace per requested metric, the primary
/// metric first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub metrics: Vec<MetricTrace>,
}

impl CvSummary {
    /// Final-iteration held-out mean of the primary metric.
    pub fn final_test_mean(&self) -> Option<f64> {
        self.metrics
            .first()
            .and_then(|trace| trace.test_mean.last())
            .copied()
    }
}

/// The seam between the search core and the gradient-boosting training
/// system: options assembly, feature quantization, splitting, training
/// evaluation, cross-validation, and the metric library.
///
/// The associated types are opaque to the search core; it only creates them
/// through this trait and hands them back.
pub trait TrainingBackend {
    type Dataset;
    type Options;
    type Quantized;
    type Split;

    /// Convert a flat option map into the trainer's typed options tree.
    fn assemble_options(&self, flat: &FlatParams) -> TuneResult<Self::Options>;

    /// Quantize raw features into binned form under the given settings.
    fn quantize(
        &self,
        data: &Self::Dataset,
        settings: &QuantizationSettings,
    ) -> TuneResult<Self::Quantized>;

    /// Carve a train/test split out of a quantized dataset.
    fn split(
        &self,
        quantized: &Self::Quantized,
        params: &TrainTestSplitParams,
    ) -> TuneResult<Self::Split>;

    /// Train on the split and return the primary metric's best value over
    /// training iterations on the test side.
    fn evaluate_split(
        &self,
        options: &Self::Options,
        split: &Self::Split,
        metric: &str,
        pool: &ThreadPool,
    ) -> TuneResult<f64>;

    /// Run cross-validation on the quantized dataset.
    fn cross_validate(
        &self,
        options: &Self::Options,
        quantized: &Self::Quantized,
        params: &CrossValidationParams,
        metric: &str,
        pool: &ThreadPool,
    ) -> TuneResult<CvSummary>;

    /// Which value of the named metric counts as best.
    fn metric_best_value(&self, metric: &str) -> TuneResult<MetricBestValue>;

    /// Whether the dataset carries an object ordering that sampling would
    /// break.
    fn dataset_has_order(&self, _data: &Self::Dataset) -> bool {
        false
    }
}
