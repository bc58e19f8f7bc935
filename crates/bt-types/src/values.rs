use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::backend::CvSummary;
use crate::errors::{TuneError, TuneResult};

/// Flat, untyped training options as handed to the options assembler.
pub type FlatParams = serde_json::Map<String, serde_json::Value>;

/// A concrete typed scalar carried through the search.
///
/// Non-negative integral JSON numbers parse as `UInt`, negative ones as
/// `Int`, everything else numeric as `Double`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Double(f64),
    Str(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl ParamValue {
    pub fn from_json(value: &serde_json::Value) -> TuneResult<Self> {
        match value {
            serde_json::Value::Bool(v) => Ok(Self::Bool(*v)),
            serde_json::Value::Number(number) => {
                if let Some(v) = number.as_u64() {
                    Ok(Self::UInt(v))
                } else if let Some(v) = number.as_i64() {
                    Ok(Self::Int(v))
                } else if let Some(v) = number.as_f64() {
                    Ok(Self::Double(v))
                } else {
                    Err(TuneError::Config(format!(
                        "unrepresentable numeric value: {number}"
                    )))
                }
            }
            serde_json::Value::String(v) => Ok(Self::Str(v.clone())),
            other => Err(TuneError::Config(format!(
                "unsupported parameter value type: {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::from(*v),
            Self::UInt(v) => serde_json::Value::from(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Double(v) => serde_json::Value::from(*v),
            Self::Str(v) => serde_json::Value::from(v.clone()),
        }
    }

    /// Numeric view, when one exists.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::UInt(v) => Some(*v as f64),
            Self::Int(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// Typed view of the winning parameter assignment, keyed by option name,
/// plus the winner's cross-validation trace when one was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestOptionValues {
    pub bool_options: HashMap<String, bool>,
    pub int_options: HashMap<String, i64>,
    pub uint_options: HashMap<String, u64>,
    pub double_options: HashMap<String, f64>,
    pub string_options: HashMap<String, String>,
    pub cv_trace: Option<CvSummary>,
}

impl BestOptionValues {
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match value {
            ParamValue::Bool(v) => {
                self.bool_options.insert(name, v);
            }
            ParamValue::Int(v) => {
                self.int_options.insert(name, v);
            }
            ParamValue::UInt(v) => {
                self.uint_options.insert(name, v);
            }
            ParamValue::Double(v) => {
                self.double_options.insert(name, v);
            }
            ParamValue::Str(v) => {
                self.string_options.insert(name, v);
            }
        }
    }

    pub fn from_resolved(resolved: &[(String, ParamValue)]) -> Self {
        let mut values = Self::default();
        for (name, value) in resolved {
            values.insert(name.clone(), value.clone());
        }
        values
    }

    /// Total number of options across all five typed maps.
    pub fn len(&self) -> usize {
        self.bool_options.len()
            + self.int_options.len()
            + self.uint_options.len()
            + self.double_options.len()
            + self.string_options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
