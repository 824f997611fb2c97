//! ==============================================================================
//! config.rs - console configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `console.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ApiConfig: where the sensor backend lives.
//!     - SessionConfig: where the bearer token is kept between runs.
//!     - ExportConfig: where csv artifacts are written.
//!     - LoggingConfig: tracing level.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub token_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8080/api".to_string() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { token_path: PathBuf::from(".sensor-console-token") }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from(".") }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl ConsoleConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: ConsoleConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("console.toml"),
            PathBuf::from("..").join("config").join("console.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::debug!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::default()
    }

    /// Configured level mapped onto tracing; unknown names fall back to info.
    pub fn tracing_level(&self) -> tracing::Level {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }

    pub fn log_summary(&self) {
        tracing::debug!("[CONFIG] API: {}", self.api.base_url);
        tracing::debug!("[CONFIG] Token file: {}", self.session.token_path.display());
        tracing::debug!("[CONFIG] Export directory: {}", self.export.directory.display());
        tracing::debug!("[CONFIG] Log level: {}", self.logging.level);
    }
}
