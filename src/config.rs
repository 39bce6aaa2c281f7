//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub limits: LimitsConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Speech model configuration.
///
/// ## Fields:
/// - `whisper_model`: Whisper variant to load at startup ("tiny", "base",
///   "small", "medium", "large"). Smaller is faster, larger is more accurate.
/// - `device`: Compute device preference ("auto", "cpu", "cuda", "metal").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub whisper_model: String,
    pub device: String,
}

/// Request size limits.
///
/// Only the transcription endpoint is capped: its payload is spooled to disk
/// and decoded, so an unbounded body would tie up the model task. The upload
/// endpoint is a pure acknowledgment echo and carries no limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_transcribe_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            models: ModelsConfig {
                whisper_model: "base".to_string(),
                device: "auto".to_string(),
            },
            limits: LimitsConfig {
                max_transcribe_bytes: 50 * 1024 * 1024, // 50MB
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// `HOST` and `PORT` are honored without the APP_ prefix because
    /// deployment platforms commonly inject them that way.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catches bad values at startup instead of failing on the first request.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.limits.max_transcribe_bytes == 0 {
            return Err(anyhow::anyhow!(
                "Max transcribe bytes must be greater than 0"
            ));
        }

        if self
            .models
            .whisper_model
            .parse::<crate::transcription::ModelSize>()
            .is_err()
        {
            return Err(anyhow::anyhow!(
                "Unknown whisper model '{}' (expected tiny, base, small, medium, or large)",
                self.models.whisper_model
            ));
        }

        Ok(())
    }
}
