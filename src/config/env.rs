use std::collections::HashMap;

use super::ServerConfig;
use super::merge::merge_config;
use super::validation::validate;

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads configuration from environment variables, with sensible defaults.
    /// Also loads from .env file if present using dotenvy.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Environment variables are malformed
    /// - The selected storage backend is missing required settings
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Self::from_env_with_secrets(&HashMap::new())
    }

    /// Like [`ServerConfig::from_env`], with Secret Manager values taking
    /// precedence over environment variables of the same name.
    pub fn from_env_with_secrets(
        secrets: &HashMap<String, String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = merge_config(None, secrets)?;
        validate(&config)?;
        Ok(config)
    }
}
