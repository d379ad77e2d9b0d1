use anyhow::{Context, Result};
use reco_service::{Config, ModelRegistry};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Artifact preflight: loads every configured model exactly as the serving process would
/// and exits non-zero if any of them is missing or corrupt.
fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{},reco_service=debug", config.log_level).into()
    });
    if config.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!("Starting reco-service artifact preflight");

    config
        .validate()
        .context("Configuration validation failed")?;
    let locale = config.locale()?;
    info!(
        artifacts_dir = %config.artifacts_dir,
        k_recs = config.k_recs,
        locale = ?locale,
        "Configuration loaded and validated"
    );

    let registry = ModelRegistry::load(&config.artifacts(), locale)
        .context("Failed to load model artifacts")?;

    for model in registry.model_info() {
        info!(
            model = %model.name,
            kind = model.metadata.kind.as_str(),
            users = model.metadata.user_count,
            items = model.metadata.item_count,
            factors = model.metadata.factors,
            "Model ready"
        );
    }

    info!(
        models = registry.model_names().len(),
        "All models loaded, preflight passed"
    );
    Ok(())
}
