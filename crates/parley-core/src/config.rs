use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ParleyError, Result};

/// Default Answer Service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/askChat";

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. Every section falls back
/// to its defaults when absent, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// A missing file silently yields the defaults. Any other failure is
    /// returned next to the defaults instead of being logged here, because
    /// the log level itself comes from this file.
    pub fn load_or_default(path: &Path) -> (Self, Option<ParleyError>) {
        if !path.exists() {
            return (Self::default(), None);
        }
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.service.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ParleyError::Config(format!(
                "service.endpoint must be an http(s) URL, got '{}'",
                self.service.endpoint
            )));
        }
        if self.voice.language.trim().is_empty() {
            return Err(ParleyError::Config(
                "voice.language must not be empty".to_string(),
            ));
        }
        if self.general.log_level.trim().is_empty() {
            return Err(ParleyError::Config(
                "general.log_level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log filter directives, e.g. `info`, `off` or `parley_chat=debug,warn`.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Answer Service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// URL the question is POSTed to.
    pub endpoint: String,
    /// Upper bound on one request in seconds. 0 waits forever.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Voice input settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Whether the voice control is offered at all.
    pub enabled: bool,
    /// BCP-47 locale passed to the recognizer.
    pub language: String,
    /// External speech-to-text program. Empty means no recognizer.
    pub command: String,
    /// Arguments passed to `command`. `{language}` is substituted.
    pub args: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en-US".to_string(),
            command: String::new(),
            args: Vec::new(),
        }
    }
}
