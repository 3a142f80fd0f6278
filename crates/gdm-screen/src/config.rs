//! Screening configuration with builder pattern.
//!
//! [`ScreeningConfig`] holds the operating choices of the tool: where the
//! model artifact lives, the decision threshold, the attribution background
//! and the display language. Values come from, in increasing precedence,
//! the defaults, an optional JSON file and `GDM_*` environment variables.
//!
//! ```
//! use gdm_screen::config::ScreeningConfig;
//!
//! let config = ScreeningConfig::builder()
//!     .model_path("models/gdm.gdm")
//!     .threshold(0.25)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.threshold, 0.25);
//! ```

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::engine::{InferOptions, DEFAULT_THRESHOLD};
use crate::explain::Background;
use crate::locale::Locale;

/// Artifact path used when nothing else is configured.
pub const DEFAULT_MODEL_PATH: &str = "best_model_xgboost.gdm";

pub const ENV_MODEL_PATH: &str = "GDM_MODEL_PATH";
pub const ENV_THRESHOLD: &str = "GDM_THRESHOLD";
pub const ENV_BACKGROUND: &str = "GDM_BACKGROUND";
pub const ENV_LOCALE: &str = "GDM_LOCALE";

// =============================================================================
// ConfigError
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {var}: {reason}")]
    Env {
        var: &'static str,
        value: String,
        reason: String,
    },
}

// =============================================================================
// ScreeningConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(default, deny_unknown_fields)]
pub struct ScreeningConfig {
    /// Path of the `.gdm` model artifact.
    #[builder(into, default = PathBuf::from(DEFAULT_MODEL_PATH))]
    pub model_path: PathBuf,

    /// Class-1 probability at or above which the verdict is positive.
    #[builder(default = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    #[builder(default)]
    pub background: Background,

    #[builder(default)]
    pub locale: Locale,
}

/// Custom finishing function that validates the config.
impl<S: screening_config_builder::IsComplete> ScreeningConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidThreshold`] if the threshold is outside `[0, 1]`.
    pub fn build(self) -> Result<ScreeningConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            threshold: DEFAULT_THRESHOLD,
            background: Background::ModelDefault,
            locale: Locale::En,
        }
    }
}

impl ScreeningConfig {
    /// Defaults, overlaid with `path` if given, then with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `GDM_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Override fields from a variable lookup.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MODEL_PATH) {
            self.model_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_THRESHOLD) {
            self.threshold = value.trim().parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::Env {
                    var: ENV_THRESHOLD,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup(ENV_BACKGROUND) {
            self.background = value.parse().map_err(|e: crate::explain::BackgroundParseError| {
                ConfigError::Env {
                    var: ENV_BACKGROUND,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup(ENV_LOCALE) {
            self.locale = value.parse().map_err(|e: crate::locale::LocaleParseError| {
                ConfigError::Env {
                    var: ENV_LOCALE,
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    pub fn infer_options(&self) -> InferOptions {
        InferOptions {
            threshold: self.threshold,
            background: self.background.clone(),
        }
    }
}
