use super::{ServerConfig, StorageBackendKind};

/// Validate a merged configuration
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_storage(config.storage_backend, &config.storage_bucket)?;
    validate_timeouts(config.turn_timeout_seconds, config.connect_timeout_seconds)?;
    validate_realtime_url(&config.realtime_url)?;
    Ok(())
}

/// The GCS backend cannot run without a bucket.
pub fn validate_storage(
    backend: StorageBackendKind,
    bucket: &Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if backend == StorageBackendKind::Gcs && bucket.is_none() {
        return Err("FIREBASE_STORAGE_BUCKET is required when STORAGE_BACKEND=gcs".into());
    }
    Ok(())
}

/// Timeouts, when set, must be positive.
pub fn validate_timeouts(
    turn_timeout_seconds: Option<u64>,
    connect_timeout_seconds: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if turn_timeout_seconds == Some(0) {
        return Err("REALTIME_TURN_TIMEOUT_SECONDS must be greater than zero".into());
    }
    if connect_timeout_seconds == 0 {
        return Err("REALTIME_CONNECT_TIMEOUT_SECONDS must be greater than zero".into());
    }
    Ok(())
}

pub fn validate_realtime_url(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed = url::Url::parse(url).map_err(|e| format!("Invalid REALTIME_URL '{url}': {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!("REALTIME_URL must use ws or wss, got '{other}'").into()),
    }
}
