//! Minimal end-to-end walkthrough: a toy training backend plus one grid
//! search over depth, learning rate, and border count.

use bt_search::{grid_search_with_report, SearchSettings};
use bt_types::{
    CrossValidationParams, CvSummary, FlatParams, MetricBestValue, MetricTrace,
    QuantizationSettings, TrainTestSplitParams, TrainingBackend, TuneResult,
};

/// Pretends to train a model; the "loss" is smallest at depth 6 and
/// learning rate 0.1, with a mild penalty for large bin counts.
struct ToyBackend;

impl TrainingBackend for ToyBackend {
    type Dataset = Vec<f64>;
    type Options = FlatParams;
    type Quantized = QuantizationSettings;
    type Split = QuantizationSettings;

    fn assemble_options(&self, flat: &FlatParams) -> TuneResult<FlatParams> {
        Ok(flat.clone())
    }

    fn quantize(
        &self,
        _data: &Vec<f64>,
        settings: &QuantizationSettings,
    ) -> TuneResult<QuantizationSettings> {
        Ok(settings.clone())
    }

    fn split(
        &self,
        quantized: &QuantizationSettings,
        _params: &TrainTestSplitParams,
    ) -> TuneResult<QuantizationSettings> {
        Ok(quantized.clone())
    }

    fn evaluate_split(
        &self,
        options: &FlatParams,
        split: &QuantizationSettings,
        _metric: &str,
        _pool: &rayon::ThreadPool,
    ) -> TuneResult<f64> {
        let depth = options.get("depth").and_then(|v| v.as_f64()).unwrap_or(6.0);
        let rate = options
            .get("learning_rate")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.03);
        Ok((depth - 6.0).abs() * 0.01 + (rate - 0.1).abs() + f64::from(split.border_count) * 1e-4)
    }

    fn cross_validate(
        &self,
        options: &FlatParams,
        quantized: &QuantizationSettings,
        _params: &CrossValidationParams,
        metric: &str,
        pool: &rayon::ThreadPool,
    ) -> TuneResult<CvSummary> {
        let value = self.evaluate_split(options, quantized, metric, pool)?;
        Ok(CvSummary {
            metrics: vec![MetricTrace {
                metric: metric.to_string(),
                train_mean: vec![value],
                test_mean: vec![value],
                test_std: vec![0.0],
            }],
        })
    }

    fn metric_best_value(&self, _metric: &str) -> TuneResult<MetricBestValue> {
        Ok(MetricBestValue::Min)
    }
}

fn main() -> TuneResult<()> {
    let space = serde_json::json!({
        "depth": [4, 6, 8],
        "learning_rate": [0.03, 0.1, 0.3],
        "border_count": [32, 128],
    });

    let mut base = FlatParams::new();
    base.insert("loss_function".to_string(), serde_json::json!("RMSE"));

    let data = vec![0.0; 256];
    let settings = SearchSettings::new().with_train_test(true).with_verbose(1);

    let (best, report) = grid_search_with_report(
        &ToyBackend,
        &space,
        &base,
        &TrainTestSplitParams::default(),
        &CrossValidationParams::default(),
        &data,
        &settings,
    )?;

    println!("evaluated {} candidates", report.evaluated());
    println!(
        "best: border_count = {}, depth = {}, learning_rate = {}",
        best.uint_options["border_count"],
        best.uint_options["depth"],
        best.double_options["learning_rate"],
    );
    Ok(())
}
