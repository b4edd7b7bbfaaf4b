use crate::logging::LoggingConfig;
use crate::pipeline::AlgorithmConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub comparator: ComparatorSettings,
    /// Per-aligner parameter overrides keyed by registry name
    pub aligners: BTreeMap<String, AlgorithmConfig>,
    pub testing: TestingConfig,
}

/// Comparator used when a caller does not name one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorSettings {
    pub name: String,
    pub params: AlgorithmConfig,
}

/// Synthetic round-trip settings for the self-test and benchmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    pub image_size: usize,
    pub seed: u64,
    pub noise_sigma: f32,
    pub iterations: usize,
    pub translation_tolerance_px: f32,
    pub rotation_tolerance_deg: f32,
}

impl Default for ComparatorSettings {
    fn default() -> Self {
        Self {
            name: "ccc".to_string(),
            params: AlgorithmConfig::new(),
        }
    }
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            image_size: 64,
            seed: 42,
            noise_sigma: 0.0,
            iterations: 3,
            translation_tolerance_px: 1.5,
            rotation_tolerance_deg: 3.0,
        }
    }
}

impl Config {
    /// Load TOML, or JSON when the file starts with `{`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if self.comparator.name.trim().is_empty() {
            errors.push("Comparator name must not be empty".to_string());
        }

        if self.aligners.keys().any(|name| name.trim().is_empty()) {
            errors.push("Aligner override names must not be empty".to_string());
        }

        if self.testing.image_size < 16 {
            errors.push("Testing image_size must be at least 16".to_string());
        }

        if self.testing.noise_sigma < 0.0 {
            errors.push("Testing noise_sigma must be non-negative".to_string());
        }

        if self.testing.translation_tolerance_px < 0.0 || self.testing.rotation_tolerance_deg < 0.0 {
            errors.push("Testing tolerances must be non-negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Configured parameters for `aligner`, empty when there are none
    pub fn aligner_config(&self, aligner: &str) -> AlgorithmConfig {
        self.aligners.get(aligner).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

pub fn load_config_or_default(config_path: Option<&str>) -> Config {
    let Some(path) = config_path else {
        return Config::default();
    };

    match Config::load_from_file(path) {
        Ok(config) => match config.validate() {
            Ok(()) => config,
            Err(errors) => {
                for error in &errors {
                    tracing::warn!(path = path, error = %error, "Configuration validation error");
                }
                tracing::warn!("Using default configuration instead");
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = path, error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.comparator.name, "ccc");
        assert!(config.aligner_config("rotational").parameters.is_empty());
    }

    #[test]
    fn test_toml_and_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.aligners.insert(
            "rtf_slow_exhaustive".to_string(),
            AlgorithmConfig::new().with_param("ang_step", 2.5).with_param("max_shift", 6),
        );
        config.testing.seed = 7;

        for (name, format) in [("c.toml", ConfigFormat::Toml), ("c.json", ConfigFormat::Json)] {
            let path = dir.path().join(name);
            config.save_to_file(&path, format).unwrap();
            let loaded = Config::load_from_file(&path).unwrap();
            assert_eq!(loaded.testing.seed, 7);
            let slow = loaded.aligner_config("rtf_slow_exhaustive");
            assert_eq!(slow.get::<i64>("max_shift"), Some(6));
            assert_eq!(slow.get::<f64>("ang_step"), Some(2.5));
        }
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [comparator]
            name = "sqeuclidean"

            [aligners.refine]
            mode = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.comparator.name, "sqeuclidean");
        assert_eq!(config.testing.image_size, 64);
        assert_eq!(config.aligner_config("refine").get::<i64>("mode"), Some(2));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.comparator.name = " ".to_string();
        config.testing.image_size = 4;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let config = load_config_or_default(Some("/nonexistent/config.toml"));
        assert_eq!(config, Config::default());
    }
}
