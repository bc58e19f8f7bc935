//! Per-candidate evaluation: quantization reuse, option materialization, and
//! metric-direction-aware best tracking.

use std::sync::Arc;

use bt_types::{
    internal_error, BorderSelectionType, CrossValidationParams, CvSummary, FlatParams, NanMode,
    ParamValue, QuantizationSettings, TrainTestSplitParams, TrainingBackend, TuneError,
    TuneResult, MAX_BORDER_COUNT,
};
use rayon::ThreadPool;
use tracing::debug;

use crate::generators::{resolve, GeneratorRegistry};
use crate::space::{GridValue, QuantizationAxesPresence};

/// Remembers the last applied quantization triple and its quantized dataset;
/// the quantizer runs only when the triple changes. In train/test mode the
/// splitter re-runs together with the quantizer.
///
/// `applied` starts as `None`, which no valid triple equals, so the first
/// candidate always quantizes.
struct QuantizationCache<B: TrainingBackend> {
    applied: Option<QuantizationSettings>,
    quantized: Option<Arc<B::Quantized>>,
    split: Option<B::Split>,
}

impl<B: TrainingBackend> QuantizationCache<B> {
    fn new() -> Self {
        Self {
            applied: None,
            quantized: None,
            split: None,
        }
    }

    fn ensure(
        &mut self,
        backend: &B,
        data: &B::Dataset,
        settings: &QuantizationSettings,
        split_params: Option<&TrainTestSplitParams>,
    ) -> TuneResult<()> {
        if self.applied.as_ref() == Some(settings) {
            return Ok(());
        }
        debug!(
            border_count = settings.border_count,
            border_type = %settings.border_type,
            nan_mode = %settings.nan_mode,
            "quantization parameters changed, re-quantizing"
        );
        let quantized = Arc::new(backend.quantize(data, settings)?);
        if let Some(params) = split_params {
            self.split = Some(backend.split(&quantized, params)?);
        }
        self.quantized = Some(quantized);
        self.applied = Some(settings.clone());
        Ok(())
    }

    fn quantized(&self) -> TuneResult<&Arc<B::Quantized>> {
        self.quantized
            .as_ref()
            .ok_or_else(|| internal_error!("quantization cache queried before first use"))
    }

    fn split(&self) -> TuneResult<&B::Split> {
        self.split
            .as_ref()
            .ok_or_else(|| internal_error!("train/test split queried before first use"))
    }
}

/// Everything the driver needs to know about one evaluated candidate.
pub(crate) struct CandidateOutcome<B: TrainingBackend> {
    pub metric: f64,
    pub is_best: bool,
    pub options: B::Options,
    pub quantized: Arc<B::Quantized>,
    /// Resolved grid parameters under their grid names, quantization axes
    /// first (only those that were actually in the grid).
    pub resolved: Vec<(String, ParamValue)>,
    pub cv: Option<CvSummary>,
}

impl<B: TrainingBackend> std::fmt::Debug for CandidateOutcome<B>
where
    B::Options: std::fmt::Debug,
    B::Quantized: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateOutcome")
            .field("metric", &self.metric)
            .field("is_best", &self.is_best)
            .field("options", &self.options)
            .field("quantized", &self.quantized)
            .field("resolved", &self.resolved)
            .field("cv", &self.cv)
            .finish()
    }
}

/// Evaluates candidate tuples one at a time, reusing quantization state
/// across candidates that share quantization parameters.
pub(crate) struct CandidateEvaluator<'a, B: TrainingBackend> {
    backend: &'a B,
    data: &'a B::Dataset,
    base: FlatParams,
    other_names: Vec<String>,
    presence: QuantizationAxesPresence,
    generators: GeneratorRegistry,
    cache: QuantizationCache<B>,
    split_params: Option<&'a TrainTestSplitParams>,
    cv_params: &'a CrossValidationParams,
    metric: &'a str,
    /// `+1` when smaller metric values are better, `-1` when larger are.
    sign: f64,
    pool: &'a ThreadPool,
    best_metric: f64,
    evaluated: u64,
}

#[allow(clippy::too_many_arguments)]
impl<'a, B: TrainingBackend> CandidateEvaluator<'a, B> {
    pub fn new(
        backend: &'a B,
        data: &'a B::Dataset,
        base: FlatParams,
        other_names: Vec<String>,
        presence: QuantizationAxesPresence,
        generators: GeneratorRegistry,
        split_params: Option<&'a TrainTestSplitParams>,
        cv_params: &'a CrossValidationParams,
        metric: &'a str,
        sign: f64,
        pool: &'a ThreadPool,
    ) -> Self {
        Self {
            backend,
            data,
            base,
            other_names,
            presence,
            generators,
            cache: QuantizationCache::new(),
            split_params,
            cv_params,
            metric,
            sign,
            pool,
            best_metric: 0.0,
            evaluated: 0,
        }
    }

    pub fn evaluate(&mut self, tuple: &[GridValue]) -> TuneResult<CandidateOutcome<B>> {
        let expected = 3 + self.other_names.len();
        if tuple.len() != expected {
            return Err(internal_error!(
                "candidate tuple has arity {}, expected {expected}",
                tuple.len()
            ));
        }

        let settings = self.resolve_quantization(&tuple[..3])?;

        let mut flat = self.base.clone();
        let mut resolved = Vec::with_capacity(expected);
        if let Some(alias) = &self.presence.border_count {
            resolved.push((
                alias.clone(),
                ParamValue::UInt(u64::from(settings.border_count)),
            ));
        }
        if let Some(alias) = &self.presence.border_type {
            resolved.push((
                alias.clone(),
                ParamValue::Str(settings.border_type.to_string()),
            ));
        }
        if let Some(alias) = &self.presence.nan_mode {
            resolved.push((alias.clone(), ParamValue::Str(settings.nan_mode.to_string())));
        }
        for (name, value) in self.other_names.iter().zip(&tuple[3..]) {
            let value = resolve(value, &mut self.generators)?;
            flat.insert(name.clone(), value.to_json());
            resolved.push((name.clone(), value));
        }

        let options = self.backend.assemble_options(&flat)?;
        self.cache
            .ensure(self.backend, self.data, &settings, self.split_params)?;
        let quantized = Arc::clone(self.cache.quantized()?);

        let (metric_value, cv) = if self.split_params.is_some() {
            let value = self.backend.evaluate_split(
                &options,
                self.cache.split()?,
                self.metric,
                self.pool,
            )?;
            (value, None)
        } else {
            let summary = self.backend.cross_validate(
                &options,
                &quantized,
                self.cv_params,
                self.metric,
                self.pool,
            )?;
            let value = summary
                .final_test_mean()
                .ok_or_else(|| internal_error!("cross-validation returned no metric trajectory"))?;
            (value, Some(summary))
        };

        if self.evaluated == 0 {
            // One signed step behind the first observation, so the first
            // candidate always wins the comparison below.
            self.best_metric = metric_value + self.sign;
        }
        let is_best = self.sign * metric_value < self.sign * self.best_metric;
        if is_best {
            self.best_metric = metric_value;
        }
        self.evaluated += 1;

        Ok(CandidateOutcome {
            metric: metric_value,
            is_best,
            options,
            quantized,
            resolved,
            cv,
        })
    }

    fn resolve_quantization(&mut self, coords: &[GridValue]) -> TuneResult<QuantizationSettings> {
        let border_count = match resolve(&coords[0], &mut self.generators)? {
            ParamValue::UInt(v) if (1..=u64::from(MAX_BORDER_COUNT)).contains(&v) => v as u32,
            ParamValue::Int(v) if (1..=i64::from(MAX_BORDER_COUNT)).contains(&v) => v as u32,
            ParamValue::Double(v) if (1.0..=f64::from(MAX_BORDER_COUNT)).contains(&v) => {
                v.round() as u32
            }
            other => {
                return Err(TuneError::Config(format!(
                    "border count must be an integer in 1..={MAX_BORDER_COUNT}, got {other}"
                )));
            }
        };
        let border_type = match resolve(&coords[1], &mut self.generators)? {
            ParamValue::Str(name) => name.parse::<BorderSelectionType>()?,
            other => {
                return Err(TuneError::Config(format!(
                    "feature border type must be a name, got {other}"
                )));
            }
        };
        let nan_mode = match resolve(&coords[2], &mut self.generators)? {
            ParamValue::Str(name) => name.parse::<NanMode>()?,
            other => {
                return Err(TuneError::Config(format!(
                    "nan mode must be a name, got {other}"
                )));
            }
        };
        QuantizationSettings::new(border_count, border_type, nan_mode)
    }
}
