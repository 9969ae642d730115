//! Process-wide configuration.
//!
//! `AppConfig` is built once at startup (defaults, optional JSON file, then
//! `MAILSCRIBE_*` environment overrides) and handed to each component at
//! construction. Nothing below `config` reads the process environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::condense::{Granularity, SelectionStrategy};
use crate::pipeline::reply::StyleProfile;

/// Application-level constants
pub const APP_NAME: &str = "mailscribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "MAILSCRIBE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,mailscribe_lib=debug"
    } else {
        "info"
    }
}

/// Default config file location: `<config_dir>/mailscribe/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
}

// ──────────────────────────────────────────────
// Sections
// ──────────────────────────────────────────────

/// Budgets and algorithm choice for the salience condenser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CondenseConfig {
    /// Hard cap (chars) on normalized text before condensation triggers.
    pub max_text_length: usize,
    /// Above this unit count, the head is kept verbatim and selection is skipped.
    pub max_units: usize,
    /// k for the cluster strategy, capped to the unit count.
    pub cluster_count: usize,
    /// N for the top-scored strategy.
    pub top_n: usize,
    /// Below this unit count, units are returned joined without selection.
    pub min_units_for_selection: usize,
    pub strategy: SelectionStrategy,
    pub granularity: Granularity,
}

impl Default for CondenseConfig {
    fn default() -> Self {
        Self {
            max_text_length: 10_000,
            max_units: 50,
            cluster_count: 5,
            top_n: 5,
            min_units_for_selection: 5,
            strategy: SelectionStrategy::ClusterCentroid,
            granularity: Granularity::Paragraph,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Below this many direct-text words per page, recognition is attempted.
    pub ocr_words_per_page_threshold: usize,
    /// DPI used when rendering pages to bitmaps for recognition.
    pub render_dpi: u32,
    /// Per-page deadline for the recognition capability.
    pub recognition_timeout_secs: u64,
    /// Explicit PDFium shared library. `None` searches next to the
    /// executable, then the system library paths.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_words_per_page_threshold: 100,
            render_dpi: 200,
            recognition_timeout_secs: 120,
            pdfium_library_path: None,
        }
    }
}

/// Which remote text-generation service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationBackend {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::str::FromStr for GenerationBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::Invalid(format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: GenerationBackend,
    pub base_url: String,
    pub model: String,
    /// Vision model used as the recognition capability. Recognition is
    /// disabled when absent.
    pub vision_model: Option<String>,
    /// Capability token for hosted backends.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            vision_model: None,
            api_key: None,
            timeout_secs: 300,
            temperature: 0.7,
        }
    }
}

// ──────────────────────────────────────────────
// AppConfig
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub condense: CondenseConfig,
    pub extraction: ExtractionConfig,
    pub generation: GenerationConfig,
    pub style: StyleProfile,
}

impl AppConfig {
    /// Build the startup configuration: file (if any), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())?;
        config.validate()?;

        tracing::debug!(
            backend = ?config.generation.backend,
            model = %config.generation.model,
            vision = config.generation.vision_model.is_some(),
            strategy = ?config.condense.strategy,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply overrides from a key lookup (keys without the `MAILSCRIBE_` prefix).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("MODEL") {
            self.generation.model = model;
        }
        if let Some(vision) = lookup("VISION_MODEL") {
            self.generation.vision_model = Some(vision).filter(|v| !v.trim().is_empty());
        }
        if let Some(url) = lookup("BASE_URL") {
            self.generation.base_url = url;
        }
        if let Some(backend) = lookup("BACKEND") {
            self.generation.backend = backend.parse()?;
        }
        if let Some(key) = lookup("API_KEY") {
            self.generation.api_key = Some(key);
        }
        if let Some(max) = lookup("MAX_TEXT_LENGTH") {
            self.condense.max_text_length = max.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("MAX_TEXT_LENGTH is not a number: '{max}'"))
            })?;
        }
        if let Some(lib) = lookup("PDFIUM_LIBRARY") {
            self.extraction.pdfium_library_path =
                Some(PathBuf::from(lib)).filter(|p| !p.as_os_str().is_empty());
        }
        if let Some(strategy) = lookup("CONDENSE_STRATEGY") {
            self.condense.strategy = strategy.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.condense;
        if c.max_text_length == 0 {
            return Err(ConfigError::Invalid("max_text_length must be > 0".into()));
        }
        if c.max_units == 0 {
            return Err(ConfigError::Invalid("max_units must be > 0".into()));
        }
        if c.cluster_count == 0 || c.top_n == 0 {
            return Err(ConfigError::Invalid(
                "cluster_count and top_n must be > 0".into(),
            ));
        }
        if self.generation.timeout_secs == 0 || self.extraction.recognition_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be > 0".into()));
        }
        if self.generation.backend == GenerationBackend::OpenAi
            && self.generation.api_key.is_none()
        {
            return Err(ConfigError::Invalid(
                "the openai backend requires an api_key".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_budgets() {
        let config = AppConfig::default();
        assert_eq!(config.condense.max_text_length, 10_000);
        assert_eq!(config.condense.max_units, 50);
        assert_eq!(config.condense.cluster_count, 5);
        assert_eq!(config.extraction.ocr_words_per_page_threshold, 100);
        assert_eq!(config.generation.backend, GenerationBackend::Ollama);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"condense": {"max_text_length": 2000, "strategy": "top_scored_ordered"},
                "style": {"tone": "warm", "length": "detailed", "signature": "Cheers,\nSam"}}"#,
        )
        .unwrap();

        let config = AppConfig::from_json_file(&path).unwrap();
        assert_eq!(config.condense.max_text_length, 2000);
        assert_eq!(config.condense.strategy, SelectionStrategy::TopScoredOrdered);
        assert_eq!(config.condense.max_units, 50);
        assert_eq!(config.style.tone, "warm");
        assert_eq!(config.generation.timeout_secs, 300);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::from_json_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/mailscribe.json")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn overrides_replace_generation_settings() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("MODEL", "gpt-4"),
                ("BACKEND", "openai"),
                ("API_KEY", "sk-test"),
                ("MAX_TEXT_LENGTH", "4000"),
                ("CONDENSE_STRATEGY", "top_scored_ordered"),
                ("PDFIUM_LIBRARY", "/opt/pdfium/libpdfium.so"),
            ]))
            .unwrap();

        assert_eq!(config.generation.model, "gpt-4");
        assert_eq!(config.generation.backend, GenerationBackend::OpenAi);
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.condense.max_text_length, 4000);
        assert_eq!(config.condense.strategy, SelectionStrategy::TopScoredOrdered);
        assert_eq!(
            config.extraction.pdfium_library_path.as_deref(),
            Some(Path::new("/opt/pdfium/libpdfium.so"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_vision_override_disables_recognition() {
        let mut config = AppConfig::default();
        config.generation.vision_model = Some("llava".into());
        config
            .apply_overrides(lookup_from(&[("VISION_MODEL", "  ")]))
            .unwrap();
        assert!(config.generation.vision_model.is_none());
    }

    #[test]
    fn non_numeric_length_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(lookup_from(&[("MAX_TEXT_LENGTH", "lots")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!("bard".parse::<GenerationBackend>().is_err());
        assert_eq!(
            " Ollama ".parse::<GenerationBackend>().unwrap(),
            GenerationBackend::Ollama
        );
    }

    #[test]
    fn validate_rejects_zero_budgets() {
        let mut config = AppConfig::default();
        config.condense.cluster_count = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.condense.max_text_length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn openai_backend_requires_token() {
        let mut config = AppConfig::default();
        config.generation.backend = GenerationBackend::OpenAi;
        assert!(config.validate().is_err());
        config.generation.api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_path_is_namespaced() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("mailscribe/config.json"));
        }
    }

    #[test]
    fn backend_serializes_snake_case() {
        let json = serde_json::to_string(&GenerationBackend::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let json = serde_json::to_string(&GenerationBackend::Ollama).unwrap();
        assert_eq!(json, "\"ollama\"");
    }
}
