//! CLI argument definitions for the Parley console.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use parley_core::config::ParleyConfig;
use std::path::PathBuf;

/// Parley: ask questions by typing or speaking and read the answers.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Answer Service URL.
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// Seconds to wait for an answer (0 waits forever).
    #[arg(short = 't', long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// Recognition language, e.g. en-US.
    #[arg(long = "language")]
    pub language: Option<String>,

    /// Command that listens once and prints the transcript.
    #[arg(long = "voice-command")]
    pub voice_command: Option<String>,

    /// Log filter: a level (trace..error, off) or directives like `parley_chat=debug`.
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the Answer Service endpoint.
    ///
    /// Priority: --endpoint flag > PARLEY_ENDPOINT env var > config file value.
    pub fn resolve_endpoint(&self, config_endpoint: &str) -> String {
        self.endpoint_with_env(config_endpoint, std::env::var("PARLEY_ENDPOINT").ok())
    }

    /// Overlay every flag that was given onto the loaded config.
    pub fn apply(&self, config: &mut ParleyConfig) {
        config.service.endpoint = self.resolve_endpoint(&config.service.endpoint);
        if let Some(secs) = self.timeout_secs {
            config.service.timeout_secs = secs;
        }
        if let Some(ref language) = self.language {
            config.voice.language = language.clone();
        }
        if let Some(ref command) = self.voice_command {
            config.voice.command = command.clone();
            config.voice.enabled = true;
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }

    fn endpoint_with_env(&self, config_endpoint: &str, env: Option<String>) -> String {
        if let Some(ref e) = self.endpoint {
            return e.clone();
        }
        if let Some(e) = env.filter(|e| !e.trim().is_empty()) {
            return e;
        }
        config_endpoint.to_string()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parley").join("config.toml");
    }
    PathBuf::from("config.toml")
}
