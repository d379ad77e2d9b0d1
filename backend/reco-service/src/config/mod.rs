use crate::artifacts::ArtifactConfig;
use crate::explain::ExplainLocale;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const MAX_K_RECS: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Artifact directory, already unpacked by the packaging layer
    pub artifacts_dir: String,

    // Artifact file names, relative to artifacts_dir (empty disables the model)
    pub popular_model_file: String,
    pub item_titles_file: String,
    pub knn_model_file: String,
    pub als_model_file: String,
    pub lightfm_model_file: String,

    // Serving
    pub k_recs: usize,
    pub explain_locale: String,

    // Observability
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("artifacts_dir", "./models")?
            .set_default("popular_model_file", "popular.json")?
            .set_default("item_titles_file", "item_titles.json")?
            .set_default("knn_model_file", "knn.json")?
            .set_default("als_model_file", "als.json")?
            .set_default("lightfm_model_file", "lightfm.json")?
            .set_default("k_recs", 10)?
            .set_default("explain_locale", "ru")?
            .set_default("log_level", "info")?
            .set_default("log_format", "text")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.artifacts_dir.trim().is_empty() {
            return Err(anyhow!("Artifacts directory is required"));
        }

        if self.popular_model_file.trim().is_empty() {
            return Err(anyhow!("Popularity model file is required"));
        }

        if self.item_titles_file.trim().is_empty() {
            return Err(anyhow!("Item titles file is required"));
        }

        if self.k_recs == 0 || self.k_recs > MAX_K_RECS {
            return Err(anyhow!("k_recs must be between 1 and {}", MAX_K_RECS));
        }

        self.locale()?;

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(anyhow!(
                "log_format must be 'text' or 'json', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }

    pub fn locale(&self) -> Result<ExplainLocale> {
        self.explain_locale.parse().map_err(|e: String| anyhow!(e))
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }

    /// Resolve artifact paths against `artifacts_dir`.
    pub fn artifacts(&self) -> ArtifactConfig {
        let dir = Path::new(&self.artifacts_dir);
        ArtifactConfig {
            popular_path: dir.join(&self.popular_model_file),
            item_titles_path: dir.join(&self.item_titles_file),
            knn_path: optional_path(dir, &self.knn_model_file),
            als_path: optional_path(dir, &self.als_model_file),
            lightfm_path: optional_path(dir, &self.lightfm_model_file),
        }
    }
}

fn optional_path(dir: &Path, file: &str) -> Option<PathBuf> {
    let file = file.trim();
    (!file.is_empty()).then(|| dir.join(file))
}
