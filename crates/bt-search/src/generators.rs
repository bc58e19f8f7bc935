//! Deferred-random placeholders and the user-supplied generator registry.

use std::collections::HashMap;

use bt_types::{ParamValue, TuneError, TuneResult};

use crate::space::GridValue;

/// Reserved prefix marking a string grid value as a registry lookup key.
pub const RANDOM_DISTRIBUTION_SENTINEL: &str = "CustomRandomDistributionGenerator";

pub(crate) fn is_random_ref(value: &str) -> bool {
    value.starts_with(RANDOM_DISTRIBUTION_SENTINEL)
}

/// Named sampling closures supplied by the caller.
///
/// A grid value whose string form starts with
/// [`RANDOM_DISTRIBUTION_SENTINEL`] is resolved against this registry at
/// evaluation time, so each visit to the same grid cell can draw a fresh
/// sample.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: HashMap<String, Box<dyn FnMut() -> f64 + Send>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        generator: impl FnMut() -> f64 + Send + 'static,
    ) {
        self.generators.insert(name.into(), Box::new(generator));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Draw one sample from the named generator.
    pub fn sample(&mut self, name: &str) -> TuneResult<f64> {
        match self.generators.get_mut(name) {
            Some(generator) => Ok(generator()),
            None => Err(TuneError::Config(format!(
                "unknown random distribution generator: {name}"
            ))),
        }
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("names", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Turns one grid cell into a concrete value, drawing from the registry when
/// the cell is a deferred-random placeholder.
pub(crate) fn resolve(
    value: &GridValue,
    generators: &mut GeneratorRegistry,
) -> TuneResult<ParamValue> {
    match value {
        GridValue::Fixed(value) => Ok(value.clone()),
        GridValue::RandomRef(name) => generators.sample(name).map(ParamValue::Double),
    }
}
