//! Host settings: file, environment and defaults.
//!
//! Precedence for the settings file: an explicit `--config` path, then
//! `TESTWRIGHT_CONFIG`, then `<config dir>/testwright/settings.json`. Only
//! the default location may be missing; an explicitly named file must load.
//! Environment overrides are applied after the file, and the merged result
//! is validated before anything touches the network or the database.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tw_core::provider::{ProviderConfig, ProviderKind};
use tw_llm::RouterSettings;

/// Environment variable naming an alternative settings file.
pub const CONFIG_ENV: &str = "TESTWRIGHT_CONFIG";

const DEFAULT_OLLAMA_MODEL: &str = "llama3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub router: RouterSettings,
    /// Replies scoring below this are turned into clarification requests.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// How many stored messages feed the context window per request.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Database location override; the default lives under the user data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_history_limit() -> usize {
    50
}

impl Default for Settings {
    /// Local-first defaults: Ollama as the only provider, no fallbacks.
    fn default() -> Self {
        Self {
            router: RouterSettings {
                primary: ProviderKind::Ollama,
                fallbacks: Vec::new(),
                providers: vec![ProviderConfig::new(
                    ProviderKind::Ollama,
                    DEFAULT_OLLAMA_MODEL,
                )],
            },
            confidence_threshold: default_confidence_threshold(),
            history_limit: default_history_limit(),
            database_path: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, apply environment overrides and validate.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(explicit_path, |name| std::env::var(name).ok())
    }

    /// Same as [`Settings::load`] with the environment supplied by the
    /// caller, so tests never have to mutate the process environment.
    pub fn load_with_env<F>(
        explicit_path: Option<&Path>,
        get: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let requested = explicit_path
            .map(Path::to_path_buf)
            .or_else(|| get(CONFIG_ENV).map(PathBuf::from));

        let mut settings = match requested {
            // An explicitly named file must exist and parse.
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        settings.apply_env_from(&get)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The SQLite file this host uses. Explicit setting wins; otherwise the
    /// platform data dir, falling back to the working directory.
    pub fn resolve_database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        data_dir().join("testwright.db")
    }

    /// Overrides recognized from the environment: `OPENAI_API_KEY`,
    /// `ANTHROPIC_API_KEY` and `OLLAMA_ENDPOINT` patch existing provider
    /// entries; `TESTWRIGHT_PRIMARY` and `TESTWRIGHT_DB` patch the host.
    fn apply_env_from<F>(&mut self, get: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = get("OPENAI_API_KEY") {
            if let Some(config) = self.provider_mut(ProviderKind::OpenAi) {
                config.api_key = Some(key);
            }
        }
        if let Some(key) = get("ANTHROPIC_API_KEY") {
            if let Some(config) = self.provider_mut(ProviderKind::Anthropic) {
                config.api_key = Some(key);
            }
        }
        if let Some(endpoint) = get("OLLAMA_ENDPOINT") {
            if let Some(config) = self.provider_mut(ProviderKind::Ollama) {
                config.endpoint = Some(endpoint);
            }
        }
        if let Some(primary) = get("TESTWRIGHT_PRIMARY") {
            self.router.primary = primary
                .parse()
                .map_err(|e: String| ConfigError::Invalid(e))?;
        }
        if let Some(path) = get("TESTWRIGHT_DB") {
            self.database_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    fn provider_mut(&mut self, kind: ProviderKind) -> Option<&mut ProviderConfig> {
        self.router.providers.iter_mut().find(|c| c.kind == kind)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.router.config_for(self.router.primary).is_none() {
            return Err(ConfigError::Invalid(format!(
                "primary provider '{}' has no entry in providers",
                self.router.primary
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within 0..=1, got {}",
                self.confidence_threshold
            )));
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("testwright").join("settings.json"))
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("testwright"))
        .unwrap_or_else(|| PathBuf::from("."))
}
