use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

#[cfg(feature = "openapi")]
use std::fs;

use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roshi::config::{
    DEFAULT_ENVIRONMENT, DEFAULT_SECRET_PREFIX, StorageBackendKind, secrets,
};
use roshi::{ServerConfig, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, defaulting to info when RUST_LOG is unset
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Handle CLI commands
    let mut config_path: Option<PathBuf> = None;
    let mut args = env::args();
    let _ = args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                config_path = Some(PathBuf::from(path));
            }
            #[cfg(feature = "openapi")]
            "openapi" => return export_openapi(args),
            other => {
                #[cfg(feature = "openapi")]
                {
                    anyhow::bail!(
                        "Unknown argument '{other}'. Supported: --config <file>, openapi"
                    );
                }
                #[cfg(not(feature = "openapi"))]
                {
                    anyhow::bail!("Unknown argument '{other}'. Supported: --config <file>");
                }
            }
        }
    }

    // Load .env, then fetch overrides from Secret Manager if configured
    let _ = dotenvy::dotenv();
    let secret_values = load_secrets().await;

    // Load configuration
    let config = match &config_path {
        Some(path) => ServerConfig::from_file_with_secrets(path, &secret_values),
        None => ServerConfig::from_env_with_secrets(&secret_values),
    }
    .map_err(|e| anyhow!(e.to_string()))?;
    let address = config.address();

    if config.storage_backend == StorageBackendKind::Local {
        tokio::fs::create_dir_all(&config.audio_dir)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to create audio directory {}: {e}",
                    config.audio_dir.display()
                )
            })?;
    }

    info!(
        env = %config.environment,
        version = %config.app_version,
        storage = %config.storage_backend,
        has_key = config.has_api_key(),
        "Starting server on {address}"
    );

    // Create application state
    let app_state = AppState::new(config)?;

    let app = routes::api::create_api_router(&app_state);
    #[cfg(feature = "openapi")]
    let app = app.merge(roshi::docs::openapi::router());
    let app = app.with_state(app_state);

    // Create listener
    let listener = TcpListener::bind(&address).await?;

    info!("Server listening on {address}");

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}

/// Fetch `<SECRET_PREFIX>--<ENV>` when `GCP_PROJECT_ID` is set.
async fn load_secrets() -> HashMap<String, String> {
    let Some(project_id) = env::var("GCP_PROJECT_ID").ok().filter(|p| !p.is_empty()) else {
        return HashMap::new();
    };
    let prefix = env::var("SECRET_PREFIX").unwrap_or_else(|_| DEFAULT_SECRET_PREFIX.to_string());
    let environment = env::var("ENV").unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string());
    let credentials = env::var("GOOGLE_APPLICATION_CREDENTIALS").ok();

    let loader = match secrets::SecretLoader::from_credentials(credentials.as_deref()) {
        Ok(loader) => loader,
        Err(e) => {
            error!("Secret Manager unavailable, continuing without secrets: {}", e);
            return HashMap::new();
        }
    };

    loader.load(&project_id, &prefix, &environment).await
}

#[cfg(feature = "openapi")]
fn export_openapi(mut args: env::Args) -> anyhow::Result<()> {
    let mut format = "yaml".to_string();
    let mut output: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-f" | "--format" => {
                format = args
                    .next()
                    .ok_or_else(|| anyhow!("--format requires a value (yaml or json)"))?;
                if format != "yaml" && format != "json" {
                    anyhow::bail!("Invalid format '{format}'. Must be 'yaml' or 'json'");
                }
            }
            "-o" | "--output" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--output requires a file path"))?;
                output = Some(PathBuf::from(path));
            }
            other => {
                anyhow::bail!(
                    "Unknown option '{other}'. Use --format (yaml|json) or --output <file>"
                );
            }
        }
    }

    let spec_content = if format == "json" {
        roshi::docs::openapi::spec_json()
            .map_err(|e| anyhow!("Failed to generate OpenAPI JSON: {e}"))?
    } else {
        roshi::docs::openapi::spec_yaml()
            .map_err(|e| anyhow!("Failed to generate OpenAPI YAML: {e}"))?
    };

    if let Some(output_path) = output {
        fs::write(&output_path, &spec_content)
            .map_err(|e| anyhow!("Failed to write to {}: {e}", output_path.display()))?;
        println!("OpenAPI spec written to {}", output_path.display());
    } else {
        println!("{spec_content}");
    }

    Ok(())
}
