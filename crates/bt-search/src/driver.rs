//! Top-level search driver: grid and randomized hyperparameter search.

use std::sync::Arc;

use bt_types::{
    internal_error, BestOptionValues, CrossValidationParams, CvSummary, FlatParams,
    MetricBestValue, ParamValue, TrainTestSplitParams, TrainingBackend, TuneError, TuneResult,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::cartesian::{CandidateIterator, ExhaustiveIterator, SampledIterator};
use crate::evaluate::{CandidateEvaluator, CandidateOutcome};
use crate::generators::GeneratorRegistry;
use crate::report::{CandidateRecord, SearchKind, SearchReport};
use crate::space::ParsedSpace;

/// Scalar knobs shared by both search entry points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Training objective, consulted when no evaluation metric is set.
    pub objective: Option<String>,
    /// Metric that drives best-candidate selection.
    pub eval_metric: Option<String>,
    /// Evaluate on a train/test split instead of cross-validation.
    pub use_train_test: bool,
    /// Re-run cross-validation on the winner and attach the trace.
    pub return_cv_stats: bool,
    pub verbose: i32,
}

impl SearchSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn with_eval_metric(mut self, metric: impl Into<String>) -> Self {
        self.eval_metric = Some(metric.into());
        self
    }

    pub fn with_train_test(mut self, use_train_test: bool) -> Self {
        self.use_train_test = use_train_test;
        self
    }

    pub fn with_cv_stats(mut self, return_cv_stats: bool) -> Self {
        self.return_cv_stats = return_cv_stats;
        self
    }

    pub fn with_verbose(mut self, verbose: i32) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Exhaustively evaluates every candidate of the search space (or of each
/// grid in a list of them) and returns the winner under the primary metric.
pub fn grid_search<B: TrainingBackend>(
    backend: &B,
    search_space: &Value,
    base_options: &FlatParams,
    split_params: &TrainTestSplitParams,
    cv_params: &CrossValidationParams,
    data: &B::Dataset,
    settings: &SearchSettings,
) -> TuneResult<BestOptionValues> {
    grid_search_with_report(
        backend,
        search_space,
        base_options,
        split_params,
        cv_params,
        data,
        settings,
    )
    .map(|(best, _)| best)
}

/// [`grid_search`] plus the full per-candidate run report.
pub fn grid_search_with_report<B: TrainingBackend>(
    backend: &B,
    search_space: &Value,
    base_options: &FlatParams,
    split_params: &TrainTestSplitParams,
    cv_params: &CrossValidationParams,
    data: &B::Dataset,
    settings: &SearchSettings,
) -> TuneResult<(BestOptionValues, SearchReport)> {
    let driver = SearchDriver::new(backend, base_options, split_params, cv_params, data, settings)?;
    driver.run_grid(search_space)
}

/// Evaluates `num_tries` candidates sampled from the search space (the first
/// grid, when a list is given) and returns the winner under the primary
/// metric.
#[allow(clippy::too_many_arguments)]
pub fn randomized_search<B: TrainingBackend>(
    num_tries: u32,
    generators: GeneratorRegistry,
    backend: &B,
    search_space: &Value,
    base_options: &FlatParams,
    split_params: &TrainTestSplitParams,
    cv_params: &CrossValidationParams,
    data: &B::Dataset,
    settings: &SearchSettings,
) -> TuneResult<BestOptionValues> {
    randomized_search_with_report(
        num_tries,
        generators,
        backend,
        search_space,
        base_options,
        split_params,
        cv_params,
        data,
        settings,
    )
    .map(|(best, _)| best)
}

/// [`randomized_search`] plus the full per-candidate run report.
#[allow(clippy::too_many_arguments)]
pub fn randomized_search_with_report<B: TrainingBackend>(
    num_tries: u32,
    generators: GeneratorRegistry,
    backend: &B,
    search_space: &Value,
    base_options: &FlatParams,
    split_params: &TrainTestSplitParams,
    cv_params: &CrossValidationParams,
    data: &B::Dataset,
    settings: &SearchSettings,
) -> TuneResult<(BestOptionValues, SearchReport)> {
    let driver = SearchDriver::new(backend, base_options, split_params, cv_params, data, settings)?;
    driver.run_randomized(search_space, num_tries, generators)
}

/// Per-search logger; carries the verbosity so nothing global is mutated.
#[derive(Debug, Clone, Copy)]
struct SearchLogger {
    verbose: i32,
}

impl SearchLogger {
    fn candidate(&self, number: u64, total: u64, metric: &str, value: f64, is_best: bool) {
        if self.verbose > 0 {
            if is_best {
                info!("candidate {number}/{total}: {metric} = {value} (best so far)");
            } else {
                info!("candidate {number}/{total}: {metric} = {value}");
            }
        }
    }

    fn finished(&self, evaluated: u64, metric: &str, best: f64) {
        if self.verbose > 0 {
            info!("search finished: {evaluated} candidates evaluated, best {metric} = {best}");
        }
    }
}

/// Winning candidate of one grid, with everything needed for reporting and
/// the optional final cross-validation.
struct GridBest<B: TrainingBackend> {
    number: u64,
    metric: f64,
    resolved: Vec<(String, ParamValue)>,
    options: B::Options,
    quantized: Arc<B::Quantized>,
    cv: Option<CvSummary>,
}

impl<B: TrainingBackend> GridBest<B> {
    fn new(number: u64, outcome: CandidateOutcome<B>) -> Self {
        Self {
            number,
            metric: outcome.metric,
            resolved: outcome.resolved,
            options: outcome.options,
            quantized: outcome.quantized,
            cv: outcome.cv,
        }
    }
}

struct SearchDriver<'a, B: TrainingBackend> {
    backend: &'a B,
    base_options: &'a FlatParams,
    split_params: &'a TrainTestSplitParams,
    cv_params: &'a CrossValidationParams,
    data: &'a B::Dataset,
    settings: &'a SearchSettings,
    metric: String,
    /// `+1` when smaller metric values are better, `-1` when larger are.
    sign: f64,
    pool: ThreadPool,
    logger: SearchLogger,
}

impl<'a, B: TrainingBackend> SearchDriver<'a, B> {
    fn new(
        backend: &'a B,
        base_options: &'a FlatParams,
        split_params: &'a TrainTestSplitParams,
        cv_params: &'a CrossValidationParams,
        data: &'a B::Dataset,
        settings: &'a SearchSettings,
    ) -> TuneResult<Self> {
        if base_options
            .get("save_snapshot")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(TuneError::Config(
                "snapshots cannot be combined with hyperparameter search".to_string(),
            ));
        }

        let metric = primary_metric(settings, base_options)?;
        let sign = match backend.metric_best_value(&metric)? {
            MetricBestValue::Min => 1.0,
            MetricBestValue::Max => -1.0,
            other => {
                return Err(TuneError::Config(format!(
                    "metric '{metric}' has unsupported best-value kind {other:?}"
                )));
            }
        };

        Ok(Self {
            backend,
            base_options,
            split_params,
            cv_params,
            data,
            settings,
            metric,
            sign,
            pool: build_pool()?,
            logger: SearchLogger {
                verbose: settings.verbose,
            },
        })
    }

    fn run_grid(&self, search_space: &Value) -> TuneResult<(BestOptionValues, SearchReport)> {
        let grids = grid_list(search_space)?;
        let mut report = SearchReport::new(SearchKind::Grid);
        let mut best: Option<GridBest<B>> = None;

        for grid in &grids {
            let grid_best =
                self.run_one_grid(grid, GeneratorRegistry::new(), None, &mut report)?;
            if let Some(candidate) = grid_best {
                let improves = match &best {
                    None => true,
                    Some(current) => self.sign * candidate.metric < self.sign * current.metric,
                };
                if improves {
                    best = Some(candidate);
                }
            }
        }

        self.finish(best, report)
    }

    fn run_randomized(
        &self,
        search_space: &Value,
        num_tries: u32,
        generators: GeneratorRegistry,
    ) -> TuneResult<(BestOptionValues, SearchReport)> {
        if self.backend.dataset_has_order(self.data) {
            return Err(TuneError::Config(
                "randomized search is not supported for datasets with ordered objects".to_string(),
            ));
        }

        let grids = grid_list(search_space)?;
        // Repeating an index is legitimate when grid cells can resolve to a
        // fresh random sample each time.
        let allow_repeat = !generators.is_empty();
        let mut report = SearchReport::new(SearchKind::Randomized);
        let best = self.run_one_grid(
            grids[0],
            generators,
            Some((num_tries, allow_repeat)),
            &mut report,
        )?;

        self.finish(best, report)
    }

    fn run_one_grid(
        &self,
        grid: &serde_json::Map<String, Value>,
        generators: GeneratorRegistry,
        sampling: Option<(u32, bool)>,
        report: &mut SearchReport,
    ) -> TuneResult<Option<GridBest<B>>> {
        let ParsedSpace {
            axes,
            other_names,
            presence,
            base,
        } = ParsedSpace::parse(grid, self.base_options, &generators)?;

        let mut iterator = match sampling {
            None => CandidateIterator::Exhaustive(ExhaustiveIterator::new(axes)?),
            Some((num_tries, allow_repeat)) => {
                let mut rng = StdRng::seed_from_u64(self.sampling_seed());
                CandidateIterator::Sampled(SampledIterator::new(
                    axes,
                    num_tries,
                    allow_repeat,
                    &mut rng,
                )?)
            }
        };
        let total = iterator.total_count();

        let mut evaluator = CandidateEvaluator::new(
            self.backend,
            self.data,
            base,
            other_names,
            presence,
            generators,
            self.settings.use_train_test.then_some(self.split_params),
            self.cv_params,
            &self.metric,
            self.sign,
            &self.pool,
        );

        let mut grid_best: Option<GridBest<B>> = None;
        while let Some(tuple) = iterator.next() {
            let outcome = evaluator.evaluate(tuple)?;
            let number = report.next_number();
            self.logger
                .candidate(number, total, &self.metric, outcome.metric, outcome.is_best);
            report.push(CandidateRecord::new(
                number,
                &outcome.resolved,
                outcome.metric,
                outcome.is_best,
            ));
            if outcome.is_best {
                grid_best = Some(GridBest::new(number, outcome));
            }
        }

        Ok(grid_best)
    }

    fn finish(
        &self,
        best: Option<GridBest<B>>,
        mut report: SearchReport,
    ) -> TuneResult<(BestOptionValues, SearchReport)> {
        let best =
            best.ok_or_else(|| internal_error!("search finished without evaluating a candidate"))?;

        let mut values = BestOptionValues::from_resolved(&best.resolved);
        values.cv_trace = if self.settings.return_cv_stats {
            Some(self.backend.cross_validate(
                &best.options,
                &best.quantized,
                self.cv_params,
                &self.metric,
                &self.pool,
            )?)
        } else {
            best.cv
        };

        self.logger
            .finished(report.evaluated(), &self.metric, best.metric);
        report.complete(best.number, best.metric);
        Ok((values, report))
    }

    fn sampling_seed(&self) -> u64 {
        if self.settings.use_train_test {
            self.split_params.partition_rand_seed
        } else {
            self.cv_params.partition_rand_seed
        }
    }
}

/// The search space is either one grid or a list of grids.
fn grid_list(search_space: &Value) -> TuneResult<Vec<&serde_json::Map<String, Value>>> {
    match search_space {
        Value::Object(grid) => Ok(vec![grid]),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(TuneError::Config(
                    "search space contains no grids".to_string(),
                ));
            }
            items
                .iter()
                .map(|item| {
                    item.as_object().ok_or_else(|| {
                        TuneError::Config(
                            "each grid in a search-space list must be an object".to_string(),
                        )
                    })
                })
                .collect()
        }
        other => Err(TuneError::Config(format!(
            "search space must be an object or a list of objects, got {other}"
        ))),
    }
}

/// The first metric in the options' metric list drives best-selection.
fn primary_metric(settings: &SearchSettings, base: &FlatParams) -> TuneResult<String> {
    if let Some(metric) = &settings.eval_metric {
        return Ok(metric.clone());
    }
    if let Some(metric) = base.get("eval_metric").and_then(Value::as_str) {
        return Ok(metric.to_string());
    }
    if let Some(metric) = base
        .get("custom_metric")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(Value::as_str)
    {
        return Ok(metric.to_string());
    }
    if let Some(objective) = &settings.objective {
        return Ok(objective.clone());
    }
    if let Some(objective) = base.get("loss_function").and_then(Value::as_str) {
        return Ok(objective.to_string());
    }
    Err(TuneError::Config(
        "no objective or evaluation metric configured".to_string(),
    ))
}

/// One pool for the whole search; the calling thread acts as the final
/// worker.
fn build_pool() -> TuneResult<ThreadPool> {
    let workers = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1);
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|error| internal_error!("failed to build worker pool: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_types::{MetricTrace, QuantizationSettings};
    use std::cell::Cell;

    /// Backend whose metric is `border_count * 0.01 + learning_rate`.
    struct MockBackend {
        direction: MetricBestValue,
        ordered: bool,
        quantize_calls: Cell<u32>,
        cv_calls: Cell<u32>,
    }

    impl MockBackend {
        fn new(direction: MetricBestValue) -> Self {
            Self {
                direction,
                ordered: false,
                quantize_calls: Cell::new(0),
                cv_calls: Cell::new(0),
            }
        }

        fn metric_of(&self, options: &FlatParams, settings: &QuantizationSettings) -> f64 {
            let rate = options
                .get("learning_rate")
                .and_then(|value| value.as_f64())
                .unwrap_or(0.0);
            f64::from(settings.border_count) * 0.01 + rate
        }
    }

    impl TrainingBackend for MockBackend {
        type Dataset = ();
        type Options = FlatParams;
        type Quantized = QuantizationSettings;
        type Split = QuantizationSettings;

        fn assemble_options(&self, flat: &FlatParams) -> TuneResult<FlatParams> {
            Ok(flat.clone())
        }

        fn quantize(
            &self,
            _data: &(),
            settings: &QuantizationSettings,
        ) -> TuneResult<QuantizationSettings> {
            self.quantize_calls.set(self.quantize_calls.get() + 1);
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
            _pool: &ThreadPool,
        ) -> TuneResult<f64> {
            Ok(self.metric_of(options, split))
        }

        fn cross_validate(
            &self,
            options: &FlatParams,
            quantized: &QuantizationSettings,
            _params: &CrossValidationParams,
            metric: &str,
            _pool: &ThreadPool,
        ) -> TuneResult<CvSummary> {
            self.cv_calls.set(self.cv_calls.get() + 1);
            let value = self.metric_of(options, quantized);
            Ok(CvSummary {
                metrics: vec![MetricTrace {
                    metric: metric.to_string(),
                    train_mean: vec![value * 2.0, value],
                    test_mean: vec![value * 2.0, value],
                    test_std: vec![0.0, 0.0],
                }],
            })
        }

        fn metric_best_value(&self, _metric: &str) -> TuneResult<MetricBestValue> {
            Ok(self.direction)
        }

        fn dataset_has_order(&self, _data: &()) -> bool {
            self.ordered
        }
    }

    fn base_options() -> FlatParams {
        let mut base = FlatParams::new();
        base.insert("loss_function".to_string(), serde_json::json!("RMSE"));
        base
    }

    fn train_test_settings() -> SearchSettings {
        SearchSettings::new().with_train_test(true)
    }

    #[test]
    fn grid_search_finds_the_minimum_and_reuses_quantization() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({
            "border_count": [32, 64],
            "learning_rate": [0.03, 0.1],
        });

        let (best, report) = grid_search_with_report(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(best.uint_options["border_count"], 32);
        assert_eq!(best.double_options["learning_rate"], 0.03);
        assert_eq!(report.evaluated(), 4);
        assert!((report.best_metric.unwrap() - 0.35).abs() < 1e-12);
        // One quantization per distinct border_count.
        assert_eq!(backend.quantize_calls.get(), 2);
    }

    #[test]
    fn grid_search_finds_the_maximum_when_direction_is_max() {
        let backend = MockBackend::new(MetricBestValue::Max);
        let space = serde_json::json!({"learning_rate": [0.1, 0.9, 0.5]});

        let best = grid_search(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(best.double_options["learning_rate"], 0.9);
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"learning_rate": [0.5, 0.5]});

        let (_, report) = grid_search_with_report(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(report.best_number, Some(1));
        assert!(report.records[0].improved);
        assert!(!report.records[1].improved);
    }

    #[test]
    fn first_candidate_becomes_best_regardless_of_value() {
        let backend = MockBackend::new(MetricBestValue::Max);
        let space = serde_json::json!({"learning_rate": [0.0]});

        let (_, report) = grid_search_with_report(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert!(report.records[0].improved);
        assert_eq!(report.best_number, Some(1));
    }

    #[test]
    fn randomized_search_is_reproducible_and_ascending() {
        let space = serde_json::json!({
            "border_count": [32, 64],
            "learning_rate": [0.03, 0.1],
        });
        let settings = train_test_settings();
        let split_params = TrainTestSplitParams::default().with_seed(42);

        let run = || {
            let backend = MockBackend::new(MetricBestValue::Min);
            let (_, report) = randomized_search_with_report(
                3,
                GeneratorRegistry::new(),
                &backend,
                &space,
                &base_options(),
                &split_params,
                &CrossValidationParams::default(),
                &(),
                &settings,
            )
            .unwrap();
            report
                .records
                .iter()
                .map(|record| record.parameters.clone())
                .collect::<Vec<_>>()
        };

        let first = run();
        let second = run();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);

        // Without repetition the three candidates are distinct, and ascending
        // index order means ascending (border_count, learning_rate) pairs.
        for pair in first.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn randomized_search_clamps_tries_to_grid_size() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"border_count": [32, 64, 128]});

        let (_, report) = randomized_search_with_report(
            10,
            GeneratorRegistry::new(),
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(report.evaluated(), 3);
        let visited: Vec<u64> = report
            .records
            .iter()
            .map(|record| match &record.parameters[0].1 {
                ParamValue::UInt(value) => *value,
                other => panic!("unexpected border_count value: {other:?}"),
            })
            .collect();
        assert_eq!(visited, vec![32, 64, 128]);
    }

    #[test]
    fn randomized_search_draws_fresh_samples_from_generators() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({
            "learning_rate": ["CustomRandomDistributionGenerator_lr"],
        });
        let mut generators = GeneratorRegistry::new();
        let mut draws = vec![0.05, 0.1, 0.2].into_iter();
        generators.register("CustomRandomDistributionGenerator_lr", move || {
            draws.next().unwrap()
        });

        let (best, report) = randomized_search_with_report(
            3,
            generators,
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        let rates: Vec<f64> = report
            .records
            .iter()
            .map(|record| match &record.parameters[0].1 {
                ParamValue::Double(value) => *value,
                other => panic!("unexpected learning_rate value: {other:?}"),
            })
            .collect();
        assert_eq!(rates, vec![0.05, 0.1, 0.2]);
        assert_eq!(best.double_options["learning_rate"], 0.05);
    }

    #[test]
    fn empty_value_set_is_config_error() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"border_count": []});

        let error = grid_search(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap_err();

        assert!(matches!(error, TuneError::Config(_)));
        assert!(error.to_string().contains("empty set of values"));
    }

    #[test]
    fn grid_list_keeps_the_better_grid() {
        let backend = MockBackend::new(MetricBestValue::Min);
        // border_count is fixed at the 254 default in both grids, so the
        // metric is dominated by the learning rate.
        let space = serde_json::json!([
            {"learning_rate": [0.4]},
            {"learning_rate": [0.3]},
        ]);

        let (best, report) = grid_search_with_report(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(best.double_options["learning_rate"], 0.3);
        assert_eq!(report.best_number, Some(2));
        assert_eq!(report.evaluated(), 2);
    }

    #[test]
    fn equal_grids_keep_the_earlier_one() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!([
            {"learning_rate": [0.4]},
            {"learning_rate": [0.4]},
        ]);

        let (_, report) = grid_search_with_report(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(report.best_number, Some(1));
    }

    #[test]
    fn cv_mode_accumulates_the_winning_trace() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"learning_rate": [0.3, 0.1]});

        let best = grid_search(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &SearchSettings::new(),
        )
        .unwrap();

        // One CV run per candidate, no final re-run.
        assert_eq!(backend.cv_calls.get(), 2);
        let trace = best.cv_trace.unwrap();
        let final_value = trace.final_test_mean().unwrap();
        assert!((final_value - (254.0 * 0.01 + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn requested_cv_stats_rerun_on_the_preserved_handle() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"learning_rate": [0.3, 0.1]});

        let best = grid_search(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings().with_cv_stats(true),
        )
        .unwrap();

        // Train/test evaluation during the search, one final CV at the end,
        // and no re-quantization for it.
        assert_eq!(backend.cv_calls.get(), 1);
        assert_eq!(backend.quantize_calls.get(), 1);
        assert!(best.cv_trace.is_some());
    }

    #[test]
    fn snapshots_are_rejected() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"learning_rate": [0.1]});
        let mut base = base_options();
        base.insert("save_snapshot".to_string(), serde_json::json!(true));

        let error = grid_search(
            &backend,
            &space,
            &base,
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap_err();

        assert!(matches!(error, TuneError::Config(_)));
        assert!(error.to_string().contains("napshot"));
    }

    #[test]
    fn ordered_dataset_rejects_randomized_but_not_grid() {
        let mut backend = MockBackend::new(MetricBestValue::Min);
        backend.ordered = true;
        let space = serde_json::json!({"learning_rate": [0.1]});

        let error = randomized_search(
            1,
            GeneratorRegistry::new(),
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap_err();
        assert!(matches!(error, TuneError::Config(_)));

        assert!(grid_search(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .is_ok());
    }

    #[test]
    fn undirected_metric_is_config_error() {
        let backend = MockBackend::new(MetricBestValue::Undefined);
        let space = serde_json::json!({"learning_rate": [0.1]});

        let error = grid_search(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap_err();

        assert!(matches!(error, TuneError::Config(_)));
    }

    #[test]
    fn zero_tries_is_config_error() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"learning_rate": [0.1]});

        let error = randomized_search(
            0,
            GeneratorRegistry::new(),
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap_err();

        assert!(matches!(error, TuneError::Config(_)));
    }

    #[test]
    fn missing_metric_is_config_error() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({"learning_rate": [0.1]});

        let error = grid_search(
            &backend,
            &space,
            &FlatParams::new(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &SearchSettings::new().with_train_test(true),
        )
        .unwrap_err();

        assert!(matches!(error, TuneError::Config(_)));
    }

    #[test]
    fn empty_grid_evaluates_the_base_options_once() {
        let backend = MockBackend::new(MetricBestValue::Min);
        let space = serde_json::json!({});

        let (best, report) = grid_search_with_report(
            &backend,
            &space,
            &base_options(),
            &TrainTestSplitParams::default(),
            &CrossValidationParams::default(),
            &(),
            &train_test_settings(),
        )
        .unwrap();

        assert_eq!(report.evaluated(), 1);
        assert!(best.is_empty());
    }

    #[test]
    fn metric_resolution_prefers_eval_metric() {
        let mut base = base_options();
        base.insert("eval_metric".to_string(), serde_json::json!("AUC"));
        base.insert(
            "custom_metric".to_string(),
            serde_json::json!(["Precision", "Recall"]),
        );

        let settings = SearchSettings::new().with_eval_metric("Logloss");
        assert_eq!(primary_metric(&settings, &base).unwrap(), "Logloss");

        let settings = SearchSettings::new();
        assert_eq!(primary_metric(&settings, &base).unwrap(), "AUC");

        base.remove("eval_metric");
        assert_eq!(primary_metric(&settings, &base).unwrap(), "Precision");

        base.remove("custom_metric");
        assert_eq!(primary_metric(&settings, &base).unwrap(), "RMSE");
    }
}
