use crate::data::Image;
use crate::error::{AlignError, Result};
use crate::pipeline::types::Alignment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One rigid alignment strategy.
///
/// Implementations are stateless with respect to their inputs: the same
/// instance may be called concurrently from several threads.
pub trait Aligner: Send + Sync {
    /// Registry name of the aligner
    fn name(&self) -> &str;

    /// One-line human readable summary
    fn description(&self) -> &str {
        ""
    }

    /// Align `image` to `reference`, scoring candidates with `comparison`.
    ///
    /// Returns a transformed copy of `image` together with the recovered
    /// transform; neither input is modified.
    fn align(
        &self,
        image: &Image,
        reference: Option<&Image>,
        comparison: &Comparison<'_>,
        config: &AlgorithmConfig,
    ) -> Result<Alignment>;

    /// Get the computational complexity class of this aligner
    fn estimated_complexity(&self) -> ComplexityClass {
        ComplexityClass::Medium
    }

    /// Configuration keys understood by this aligner
    fn get_parameters(&self) -> Vec<ParameterInfo> {
        Vec::new()
    }
}

/// Similarity metric between two images. Lower scores are better matches.
pub trait Comparator: Send + Sync {
    fn name(&self) -> &str;

    /// Score `candidate` against `reference`. Must not modify either image.
    fn score(&self, candidate: &Image, reference: &Image, config: &AlgorithmConfig) -> Result<f32>;

    fn get_parameters(&self) -> Vec<ParameterInfo> {
        Vec::new()
    }
}

/// A comparator bound to its configuration for the duration of one call
#[derive(Clone, Copy)]
pub struct Comparison<'a> {
    comparator: &'a dyn Comparator,
    config: &'a AlgorithmConfig,
}

impl<'a> Comparison<'a> {
    pub fn new(comparator: &'a dyn Comparator, config: &'a AlgorithmConfig) -> Self {
        Self { comparator, config }
    }

    pub fn score(&self, candidate: &Image, reference: &Image) -> Result<f32> {
        self.comparator.score(candidate, reference, self.config)
    }

    pub fn comparator_name(&self) -> &str {
        self.comparator.name()
    }
}

/// Complexity classes for aligners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplexityClass {
    Low,    // O(n log n)
    Medium, // a handful of FFTs and resamplings
    High,   // grid search over poses
}

/// Per-call configuration for aligners and comparators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmConfig {
    pub parameters: HashMap<String, Value>,
}

impl AlgorithmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn set_param<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parameters.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.parameters
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Typed lookup with a default for absent or null keys. A present value
    /// of the wrong type is an invalid configuration.
    pub fn get_or<T: serde::de::DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.parameters.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                AlignError::invalid_config(format!("parameter '{}' = {}: {}", key, value, e))
            }),
        }
    }

    /// Copy of `self` with every entry of `overrides` applied on top
    pub fn merged_with(&self, overrides: &AlgorithmConfig) -> AlgorithmConfig {
        let mut merged = self.clone();
        for (key, value) in &overrides.parameters {
            merged.parameters.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Subset of `self` restricted to `keys`
    pub fn subset(&self, keys: &[&str]) -> AlgorithmConfig {
        let mut out = AlgorithmConfig::new();
        for key in keys {
            if let Some(value) = self.parameters.get(*key) {
                out.parameters.insert(key.to_string(), value.clone());
            }
        }
        out
    }
}

/// Information about an aligner or comparator parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub description: String,
    pub default_value: Value,
    pub value_type: ParameterType,
    pub range: Option<ParameterRange>,
}

impl ParameterInfo {
    pub fn new<V: Into<Value>>(
        name: &str,
        description: &str,
        default_value: V,
        value_type: ParameterType,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default_value: default_value.into(),
            value_type,
            range: None,
        }
    }

    pub fn with_range(mut self, range: ParameterRange) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    Integer,
    Float,
    Boolean,
    String,
    Choice(Vec<String>),
    Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterRange {
    Integer { min: i64, max: i64 },
    Float { min: f64, max: f64 },
}
