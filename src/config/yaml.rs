use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional so a file can set only what it needs; environment
/// variables override anything set here.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8080
///   version: "1.4.0"
///   env: "production"
///
/// realtime:
///   api_key: "sk-..."
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-10-01"
///   voice: "alloy"
///   warm_up: true
///   session_update: false
///   turn_timeout_seconds: 60
///   connect_timeout_seconds: 10
///
/// storage:
///   backend: "gcs"
///   bucket: "my-project.appspot.com"
///   prefix: "audio/"
///   audio_dir: "./audio"
///   public_base_url: "https://tts.example.com"
///   google_credentials: "/secrets/service-account.json"
///
/// secrets:
///   project_id: "my-project"
///   prefix: "roshi-server-env-vars"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub storage: Option<StorageYaml>,
    pub secrets: Option<SecretsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub version: Option<String>,
    pub env: Option<String>,
}

/// Realtime speech API configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub warm_up: Option<bool>,
    pub session_update: Option<bool>,
    pub turn_timeout_seconds: Option<u64>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Storage configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub backend: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub audio_dir: Option<String>,
    pub public_base_url: Option<String>,
    /// Google Cloud credentials - can be:
    /// - Path to service account JSON file
    /// - Inline JSON content (for secrets management)
    /// - Empty to use Application Default Credentials
    pub google_credentials: Option<String>,
}

/// Secret Manager bootstrap from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecretsYaml {
    pub project_id: Option<String>,
    pub prefix: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the YAML is malformed, or
    /// fields have invalid types.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
