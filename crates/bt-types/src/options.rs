use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{TuneError, TuneResult};

/// Largest representable number of feature bins.
pub const MAX_BORDER_COUNT: u32 = 65535;

/// Border selection algorithm used when quantizing float features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderSelectionType {
    Uniform,
    UniformAndQuantiles,
    GreedyLogSum,
    MaxLogSum,
    MinEntropy,
    Median,
}

impl Default for BorderSelectionType {
    fn default() -> Self {
        Self::GreedyLogSum
    }
}

impl FromStr for BorderSelectionType {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Uniform" => Ok(Self::Uniform),
            "UniformAndQuantiles" => Ok(Self::UniformAndQuantiles),
            "GreedyLogSum" => Ok(Self::GreedyLogSum),
            "MaxLogSum" => Ok(Self::MaxLogSum),
            "MinEntropy" => Ok(Self::MinEntropy),
            "Median" => Ok(Self::Median),
            other => Err(TuneError::Config(format!(
                "unknown feature border type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for BorderSelectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uniform => "Uniform",
            Self::UniformAndQuantiles => "UniformAndQuantiles",
            Self::GreedyLogSum => "GreedyLogSum",
            Self::MaxLogSum => "MaxLogSum",
            Self::MinEntropy => "MinEntropy",
            Self::Median => "Median",
        };
        f.write_str(name)
    }
}

/// How missing feature values are treated during quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NanMode {
    Forbidden,
    Min,
    Max,
}

impl Default for NanMode {
    fn default() -> Self {
        Self::Min
    }
}

impl FromStr for NanMode {
    type Err = TuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Forbidden" => Ok(Self::Forbidden),
            "Min" => Ok(Self::Min),
            "Max" => Ok(Self::Max),
            other => Err(TuneError::Config(format!("unknown nan mode: {other}"))),
        }
    }
}

impl std::fmt::Display for NanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Forbidden => "Forbidden",
            Self::Min => "Min",
            Self::Max => "Max",
        };
        f.write_str(name)
    }
}

/// Feature binarization options for one candidate.
///
/// Two candidates with equal settings can share a quantized dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantizationSettings {
    pub border_count: u32,
    pub border_type: BorderSelectionType,
    pub nan_mode: NanMode,
}

impl Default for QuantizationSettings {
    fn default() -> Self {
        Self {
            border_count: 254,
            border_type: BorderSelectionType::default(),
            nan_mode: NanMode::default(),
        }
    }
}

impl QuantizationSettings {
    pub fn new(
        border_count: u32,
        border_type: BorderSelectionType,
        nan_mode: NanMode,
    ) -> TuneResult<Self> {
        if border_count == 0 || border_count > MAX_BORDER_COUNT {
            return Err(TuneError::Config(format!(
                "border count must be in 1..={MAX_BORDER_COUNT}, got {border_count}"
            )));
        }
        Ok(Self {
            border_count,
            border_type,
            nan_mode,
        })
    }
}

/// Parameters for carving a train/test split out of the quantized data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTestSplitParams {
    /// Fraction of objects that lands on the train side.
    pub train_fraction: f64,
    pub shuffle: bool,
    pub stratified: bool,
    pub partition_rand_seed: u64,
}

impl Default for TrainTestSplitParams {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            shuffle: true,
            stratified: false,
            partition_rand_seed: 0,
        }
    }
}

impl TrainTestSplitParams {
    pub fn with_train_fraction(mut self, fraction: f64) -> Self {
        self.train_fraction = fraction;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.partition_rand_seed = seed;
        self
    }
}

/// Parameters for the cross-validation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationParams {
    pub fold_count: u32,
    pub inverted: bool,
    pub shuffle: bool,
    pub stratified: bool,
    pub partition_rand_seed: u64,
}

impl Default for CrossValidationParams {
    fn default() -> Self {
        Self {
            fold_count: 5,
            inverted: false,
            shuffle: true,
            stratified: false,
            partition_rand_seed: 0,
        }
    }
}

impl CrossValidationParams {
    pub fn with_fold_count(mut self, fold_count: u32) -> Self {
        self.fold_count = fold_count;
        self
    }

    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_stratified(mut self, stratified: bool) -> Self {
        self.stratified = stratified;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.partition_rand_seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_type_parses_known_names() {
        assert_eq!(
            "GreedyLogSum".parse::<BorderSelectionType>().unwrap(),
            BorderSelectionType::GreedyLogSum
        );
        assert_eq!(
            "Median".parse::<BorderSelectionType>().unwrap(),
            BorderSelectionType::Median
        );
        assert!("median".parse::<BorderSelectionType>().is_err());
    }

    #[test]
    fn nan_mode_round_trips_through_display() {
        for mode in [NanMode::Forbidden, NanMode::Min, NanMode::Max] {
            assert_eq!(mode.to_string().parse::<NanMode>().unwrap(), mode);
        }
    }

    #[test]
    fn quantization_settings_validate_border_count() {
        assert!(QuantizationSettings::new(
            0,
            BorderSelectionType::Uniform,
            NanMode::Min
        )
        .is_err());
        assert!(QuantizationSettings::new(
            MAX_BORDER_COUNT + 1,
            BorderSelectionType::Uniform,
            NanMode::Min
        )
        .is_err());

        let settings =
            QuantizationSettings::new(128, BorderSelectionType::Uniform, NanMode::Max).unwrap();
        assert_eq!(settings.border_count, 128);
    }

    #[test]
    fn split_params_builder_chain() {
        let params = TrainTestSplitParams::default()
            .with_train_fraction(0.75)
            .with_shuffle(false)
            .with_seed(42);
        assert_eq!(params.train_fraction, 0.75);
        assert!(!params.shuffle);
        assert_eq!(params.partition_rand_seed, 42);
    }

    #[test]
    fn cv_params_builder_chain() {
        let params = CrossValidationParams::default()
            .with_fold_count(10)
            .with_stratified(true)
            .with_seed(7);
        assert_eq!(params.fold_count, 10);
        assert!(params.stratified);
        assert_eq!(params.partition_rand_seed, 7);
    }
}
