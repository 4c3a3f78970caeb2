//! Configuration module for the roshi server
//!
//! This module handles server configuration from YAML files and environment
//! variables. Environment variables always override YAML values, and defaults
//! fill whatever neither source sets. Values fetched from Secret Manager are
//! passed in as a map and sit above the environment.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//! - `secrets`: Google Secret Manager bootstrap
//!
//! # Example
//! ```rust,no_run
//! use roshi::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::realtime::RealtimeConfig;

mod env;
mod merge;
pub mod secrets;
mod utils;
mod validation;
mod yaml;

pub use merge::{DEFAULT_ENVIRONMENT, DEFAULT_SECRET_PREFIX};
pub use utils::parse_bool;

/// Where published audio is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendKind {
    /// Local directory served by this server under `/audio`.
    #[default]
    Local,
    /// Firebase / Google Cloud Storage bucket.
    Gcs,
}

impl FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "fs" | "filesystem" => Ok(Self::Local),
            "gcs" | "firebase" => Ok(Self::Gcs),
            other => Err(format!(
                "Unknown storage backend '{other}'. Expected 'local' or 'gcs'"
            )),
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Gcs => write!(f, "gcs"),
        }
    }
}

/// Server configuration
///
/// Contains everything needed to run the server:
/// - Server settings (host, port, version, environment label)
/// - Realtime speech API connection and protocol variant
/// - Storage backend for published audio
/// - Google credentials and Secret Manager bootstrap
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub app_version: String,
    pub environment: String,

    // Realtime speech API
    pub openai_api_key: Option<String>,
    pub realtime_url: String,
    pub realtime_model: String,
    pub default_voice: Option<String>,
    pub warm_up_turn: bool,
    pub session_update: bool,
    pub turn_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: u64,

    // Storage
    pub storage_backend: StorageBackendKind,
    pub storage_bucket: Option<String>,
    pub storage_prefix: String,
    pub audio_dir: PathBuf,
    pub public_base_url: String,

    // Google Cloud
    pub google_credentials: Option<String>,
    pub gcp_project_id: Option<String>,
    pub secret_prefix: String,
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. YAML file values
    /// 3. Default values
    ///
    /// The `.env` file is not read here; the YAML file is the base and only
    /// real environment variables override it.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_file_with_secrets(path, &HashMap::new())
    }

    /// Like [`ServerConfig::from_file`], with Secret Manager values taking
    /// precedence over environment variables of the same name.
    pub fn from_file_with_secrets(
        path: &PathBuf,
        secrets: &HashMap<String, String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config), secrets)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether an API key for the realtime service is configured
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Connection settings for the realtime client
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            default_voice: self.default_voice.clone(),
            warm_up_turn: self.warm_up_turn,
            session_update: self.session_update,
            connect_timeout: Duration::from_secs(self.connect_timeout_seconds),
            turn_timeout: self.turn_timeout_seconds.map(Duration::from_secs),
            ..Default::default()
        }
    }

    /// Base URL for objects written by the local backend
    pub fn local_audio_base_url(&self) -> String {
        format!("{}/audio", self.public_base_url.trim_end_matches('/'))
    }
}
