//! Search-space parsing: quantization-axis extraction and value validation.

use bt_types::{
    BorderSelectionType, FlatParams, NanMode, ParamValue, QuantizationSettings, TuneError,
    TuneResult, MAX_BORDER_COUNT,
};
use serde_json::Value;

use crate::generators::{is_random_ref, GeneratorRegistry};

/// One grid cell: either a concrete scalar or a deferred random draw.
#[derive(Debug, Clone, PartialEq)]
pub enum GridValue {
    Fixed(ParamValue),
    RandomRef(String),
}

/// Aliases recognized for each quantization axis, scanned left to right; the
/// first alias present in a grid supplies the axis values.
const BORDER_COUNT_ALIASES: &[&str] = &["border_count", "max_bin"];
const BORDER_TYPE_ALIASES: &[&str] = &["feature_border_type"];
const NAN_MODE_ALIASES: &[&str] = &["nan_mode"];

/// Which quantization axes the user actually put in the grid, and under what
/// alias, for result reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantizationAxesPresence {
    pub border_count: Option<String>,
    pub border_type: Option<String>,
    pub nan_mode: Option<String>,
}

/// A parsed grid: ordered value sequences with the three quantization axes
/// in front, the names of the remaining axes, and the sanitized base
/// options.
#[derive(Debug)]
pub struct ParsedSpace {
    /// `[border_count, border_type, nan_mode, other_1, ..., other_M]`.
    pub axes: Vec<Vec<GridValue>>,
    /// Names of the non-quantization axes, parallel to `axes[3..]`.
    pub other_names: Vec<String>,
    pub presence: QuantizationAxesPresence,
    /// Base options with in-grid quantization aliases removed.
    pub base: FlatParams,
}

impl ParsedSpace {
    pub fn parse(
        grid: &serde_json::Map<String, Value>,
        base_options: &FlatParams,
        generators: &GeneratorRegistry,
    ) -> TuneResult<Self> {
        let mut entries: Vec<(String, Vec<GridValue>)> = Vec::with_capacity(grid.len());
        for (name, value) in grid {
            entries.push((name.clone(), parse_value_list(name, value, generators)?));
        }

        let mut base = base_options.clone();
        let mut presence = QuantizationAxesPresence::default();

        let border_count = match extract_axis(&mut entries, &mut base, BORDER_COUNT_ALIASES) {
            Some((alias, values)) => {
                validate_border_count_axis(&alias, &values)?;
                presence.border_count = Some(alias);
                values
            }
            None => fixed_border_count(&base)?,
        };
        let border_type = match extract_axis(&mut entries, &mut base, BORDER_TYPE_ALIASES) {
            Some((alias, values)) => {
                validate_enum_axis(&alias, &values, |name| {
                    name.parse::<BorderSelectionType>().map(|_| ())
                })?;
                presence.border_type = Some(alias);
                values
            }
            None => fixed_border_type(&base)?,
        };
        let nan_mode = match extract_axis(&mut entries, &mut base, NAN_MODE_ALIASES) {
            Some((alias, values)) => {
                validate_enum_axis(&alias, &values, |name| name.parse::<NanMode>().map(|_| ()))?;
                presence.nan_mode = Some(alias);
                values
            }
            None => fixed_nan_mode(&base)?,
        };

        let mut axes = vec![border_count, border_type, nan_mode];
        let mut other_names = Vec::with_capacity(entries.len());
        for (name, values) in entries {
            other_names.push(name);
            axes.push(values);
        }

        Ok(Self {
            axes,
            other_names,
            presence,
            base,
        })
    }
}

fn parse_value_list(
    name: &str,
    value: &Value,
    generators: &GeneratorRegistry,
) -> TuneResult<Vec<GridValue>> {
    let Some(items) = value.as_array() else {
        return Err(TuneError::Config(format!(
            "values for parameter '{name}' must be an array"
        )));
    };
    if items.is_empty() {
        return Err(TuneError::Config(format!(
            "empty set of values for parameter '{name}'"
        )));
    }
    items
        .iter()
        .map(|item| parse_grid_value(name, item, generators))
        .collect()
}

fn parse_grid_value(
    name: &str,
    item: &Value,
    generators: &GeneratorRegistry,
) -> TuneResult<GridValue> {
    if let Some(text) = item.as_str() {
        if is_random_ref(text) {
            if !generators.contains(text) {
                return Err(TuneError::Config(format!(
                    "parameter '{name}' references unregistered random distribution '{text}'"
                )));
            }
            return Ok(GridValue::RandomRef(text.to_string()));
        }
    }
    ParamValue::from_json(item)
        .map(GridValue::Fixed)
        .map_err(|_| {
            TuneError::Config(format!(
                "parameter '{name}' has a value of unsupported type: {item}"
            ))
        })
}

/// Pulls one quantization axis out of the grid entries. The first alias in
/// `aliases` that is present supplies the values; every alias of the axis is
/// removed from both the grid and the base options so none of them can be
/// re-parsed as an "other" parameter.
fn extract_axis(
    entries: &mut Vec<(String, Vec<GridValue>)>,
    base: &mut FlatParams,
    aliases: &[&str],
) -> Option<(String, Vec<GridValue>)> {
    let mut found: Option<(String, Vec<GridValue>)> = None;
    for alias in aliases {
        if let Some(position) = entries.iter().position(|(name, _)| name == alias) {
            let entry = entries.remove(position);
            if found.is_none() {
                found = Some(entry);
            }
        }
    }
    if found.is_some() {
        for alias in aliases {
            base.remove(*alias);
        }
    }
    found
}

fn validate_border_count_axis(alias: &str, values: &[GridValue]) -> TuneResult<()> {
    for value in values {
        match value {
            GridValue::RandomRef(_) => {}
            GridValue::Fixed(ParamValue::UInt(v))
                if (1..=u64::from(MAX_BORDER_COUNT)).contains(v) => {}
            GridValue::Fixed(ParamValue::Int(v))
                if (1..=i64::from(MAX_BORDER_COUNT)).contains(v) => {}
            GridValue::Fixed(other) => {
                return Err(TuneError::Config(format!(
                    "'{alias}' must hold integers in 1..={MAX_BORDER_COUNT}, got {other}"
                )));
            }
        }
    }
    Ok(())
}

fn validate_enum_axis(
    alias: &str,
    values: &[GridValue],
    parse: impl Fn(&str) -> TuneResult<()>,
) -> TuneResult<()> {
    for value in values {
        match value {
            GridValue::RandomRef(_) => {}
            GridValue::Fixed(ParamValue::Str(name)) => parse(name)?,
            GridValue::Fixed(other) => {
                return Err(TuneError::Config(format!(
                    "'{alias}' must hold enumeration names, got {other}"
                )));
            }
        }
    }
    Ok(())
}

fn fixed_border_count(base: &FlatParams) -> TuneResult<Vec<GridValue>> {
    for alias in BORDER_COUNT_ALIASES {
        if let Some(value) = base.get(*alias) {
            let parsed = ParamValue::from_json(value)?;
            validate_border_count_axis(alias, &[GridValue::Fixed(parsed.clone())])?;
            return Ok(vec![GridValue::Fixed(parsed)]);
        }
    }
    let default = u64::from(QuantizationSettings::default().border_count);
    Ok(vec![GridValue::Fixed(ParamValue::UInt(default))])
}

fn fixed_border_type(base: &FlatParams) -> TuneResult<Vec<GridValue>> {
    for alias in BORDER_TYPE_ALIASES {
        if let Some(value) = base.get(*alias) {
            let name = value.as_str().ok_or_else(|| {
                TuneError::Config(format!("base option '{alias}' must be a string"))
            })?;
            name.parse::<BorderSelectionType>()?;
            return Ok(vec![GridValue::Fixed(ParamValue::Str(name.to_string()))]);
        }
    }
    let default = QuantizationSettings::default().border_type.to_string();
    Ok(vec![GridValue::Fixed(ParamValue::Str(default))])
}

fn fixed_nan_mode(base: &FlatParams) -> TuneResult<Vec<GridValue>> {
    for alias in NAN_MODE_ALIASES {
        if let Some(value) = base.get(*alias) {
            let name = value.as_str().ok_or_else(|| {
                TuneError::Config(format!("base option '{alias}' must be a string"))
            })?;
            name.parse::<NanMode>()?;
            return Ok(vec![GridValue::Fixed(ParamValue::Str(name.to_string()))]);
        }
    }
    let default = QuantizationSettings::default().nan_mode.to_string();
    Ok(vec![GridValue::Fixed(ParamValue::Str(default))])
}
