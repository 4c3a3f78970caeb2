use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use super::utils::{parse_bool, parse_seconds};
use super::yaml::YamlConfig;
use super::{ServerConfig, StorageBackendKind};
use crate::core::realtime::RealtimeConfig;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ENVIRONMENT: &str = "??";
pub const DEFAULT_STORAGE_PREFIX: &str = "audio/";
pub const DEFAULT_AUDIO_DIR: &str = "./audio";
pub const DEFAULT_SECRET_PREFIX: &str = "roshi-server-env-vars";
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. Secret Manager values
/// 2. Environment variables
/// 3. YAML configuration values
/// 4. Default values
///
/// Values loaded from Secret Manager are layered over the process
/// environment under the same variable names. Passing `None` yields a
/// configuration built from secrets and the environment alone.
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
    secrets: &HashMap<String, String>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let var = |name: &str| secrets.get(name).cloned().or_else(|| env::var(name).ok());

    let yaml = yaml_config.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let realtime = yaml.realtime.unwrap_or_default();
    let storage = yaml.storage.unwrap_or_default();
    let secret_manager = yaml.secrets.unwrap_or_default();

    // Secrets > ENV > YAML > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            var($env_var)
                .or($yaml_value)
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // ENV > YAML; empty strings count as unset
    macro_rules! get_optional {
        ($env_var:expr, $yaml_value:expr) => {
            var($env_var)
                .or($yaml_value)
                .filter(|v| !v.trim().is_empty())
        };
    }

    // ENV (parsed) > YAML > Default
    macro_rules! get_bool {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match var($env_var) {
                Some(raw) => parse_bool(&raw)
                    .ok_or_else(|| format!("Invalid {} value '{raw}'", $env_var))?,
                None => $yaml_value.unwrap_or($default),
            }
        };
    }

    macro_rules! get_seconds {
        ($env_var:expr, $yaml_value:expr) => {
            match var($env_var) {
                Some(raw) => Some(parse_seconds($env_var, &raw)?),
                None => $yaml_value,
            }
        };
    }

    // Server
    let host = get_value!("HOST", server.host, "0.0.0.0");

    let port = match var("PORT") {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT environment variable: {e}"))?,
        None => server.port.unwrap_or(DEFAULT_PORT),
    };

    let app_version = get_value!("VERSION", server.version, env!("CARGO_PKG_VERSION"));
    let environment = get_value!("ENV", server.env, DEFAULT_ENVIRONMENT);

    // Realtime
    let openai_api_key = get_optional!("OPENAI_API_KEY", realtime.api_key);
    let realtime_url = get_value!("REALTIME_URL", realtime.url, RealtimeConfig::DEFAULT_URL);
    let realtime_model = get_value!(
        "REALTIME_MODEL",
        realtime.model,
        RealtimeConfig::DEFAULT_MODEL
    );
    let default_voice = get_optional!("REALTIME_VOICE", realtime.voice);
    let warm_up_turn = get_bool!("REALTIME_WARM_UP", realtime.warm_up, false);
    let session_update = get_bool!(
        "REALTIME_SESSION_UPDATE",
        realtime.session_update,
        false
    );
    let turn_timeout_seconds = get_seconds!(
        "REALTIME_TURN_TIMEOUT_SECONDS",
        realtime.turn_timeout_seconds
    );
    let connect_timeout_seconds = get_seconds!(
        "REALTIME_CONNECT_TIMEOUT_SECONDS",
        realtime.connect_timeout_seconds
    )
    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS);

    // Storage
    let storage_backend = match get_optional!("STORAGE_BACKEND", storage.backend) {
        Some(raw) => raw.parse::<StorageBackendKind>()?,
        None => StorageBackendKind::default(),
    };
    let storage_bucket = get_optional!("FIREBASE_STORAGE_BUCKET", storage.bucket);
    let storage_prefix = get_value!("STORAGE_PREFIX", storage.prefix, DEFAULT_STORAGE_PREFIX);
    let audio_dir = PathBuf::from(get_value!(
        "AUDIO_DIR",
        storage.audio_dir,
        DEFAULT_AUDIO_DIR
    ));
    let public_base_url = get_value!(
        "PUBLIC_BASE_URL",
        storage.public_base_url,
        format!("http://localhost:{port}")
    );
    let google_credentials = get_optional!(
        "GOOGLE_APPLICATION_CREDENTIALS",
        storage.google_credentials
    );

    // Secret Manager
    let gcp_project_id = get_optional!("GCP_PROJECT_ID", secret_manager.project_id);
    let secret_prefix = get_value!("SECRET_PREFIX", secret_manager.prefix, DEFAULT_SECRET_PREFIX);

    Ok(ServerConfig {
        host,
        port,
        app_version,
        environment,
        openai_api_key,
        realtime_url,
        realtime_model,
        default_voice,
        warm_up_turn,
        session_update,
        turn_timeout_seconds,
        connect_timeout_seconds,
        storage_backend,
        storage_bucket,
        storage_prefix,
        audio_dir,
        public_base_url,
        google_credentials,
        gcp_project_id,
        secret_prefix,
    })
}
