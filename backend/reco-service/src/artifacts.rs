//! Model artifact schemas and loading.
//!
//! Artifacts are read from a directory that the packaging layer has already unpacked.
//! Supported encodings, chosen by file extension:
//!   - `.json`: serde_json
//!   - `.bin` / `.bincode`: bincode serialized form of the same schema

use crate::error::ArtifactError;
use crate::models::{ItemId, UserId};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where each artifact lives. `None` disables the corresponding model.
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub popular_path: PathBuf,
    pub item_titles_path: PathBuf,
    pub knn_path: Option<PathBuf>,
    pub als_path: Option<PathBuf>,
    pub lightfm_path: Option<PathBuf>,
}

/// Global popularity ranking, most popular first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityArtifact {
    #[serde(alias = "popular", alias = "ranking")]
    pub items: Vec<ItemId>,
}

/// item id → display title
pub type ItemTitlesArtifact = HashMap<ItemId, String>;

/// Precomputed neighbour candidates per known user.
///
/// `neighbors[i]` holds the candidates of `user_ids[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnArtifact {
    pub user_ids: Vec<UserId>,
    pub item_ids: Vec<ItemId>,
    pub neighbors: Vec<Vec<NeighborEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborEntry {
    #[serde(alias = "item_id", alias = "id")]
    pub item: ItemId,
    /// `None` when the exporter could not compute a similarity (NaN upstream).
    #[serde(alias = "similarity", default)]
    pub score: Option<f32>,
}

/// Implicit ALS factors plus the user-item confidence matrix used for filtering and
/// explanations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlsArtifact {
    pub user_ids: Vec<UserId>,
    pub item_ids: Vec<ItemId>,
    pub regularization: f32,
    pub user_factors: Vec<Vec<f32>>,
    pub item_factors: Vec<Vec<f32>>,
    #[serde(default)]
    pub interactions: HashMap<UserId, Vec<InteractionEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEntry {
    #[serde(alias = "item_id", alias = "id")]
    pub item: ItemId,
    #[serde(alias = "confidence", alias = "score")]
    pub weight: f32,
}

/// LightFM-style embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightFmArtifact {
    pub user_ids: Vec<UserId>,
    pub item_ids: Vec<ItemId>,
    pub user_embeddings: Vec<Vec<f32>>,
    pub item_embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub known_items: HashMap<UserId, Vec<ItemId>>,
}

/// Load and deserialize one artifact, picking the decoder from the file extension.
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let shown = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let value = match extension.as_str() {
        "json" => {
            let file = File::open(path).map_err(|source| ArtifactError::Io {
                path: shown.clone(),
                source,
            })?;
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Json {
                path: shown.clone(),
                source,
            })?
        }
        "bin" | "bincode" => {
            let data = std::fs::read(path).map_err(|source| ArtifactError::Io {
                path: shown.clone(),
                source,
            })?;
            bincode::deserialize(&data).map_err(|source| ArtifactError::Bincode {
                path: shown.clone(),
                source,
            })?
        }
        other => {
            return Err(ArtifactError::UnsupportedFormat(format!(
                "{} (extension '{}')",
                shown, other
            )))
        }
    };

    debug!(path = %shown, "Artifact loaded");
    Ok(value)
}

/// Build a dense row-major matrix, rejecting ragged rows and row-count mismatches.
pub fn matrix_from_rows(
    artifact: &str,
    rows: Vec<Vec<f32>>,
    expected_rows: usize,
) -> Result<Array2<f32>, ArtifactError> {
    if rows.len() != expected_rows {
        return Err(ArtifactError::invalid(
            artifact,
            format!("expected {} rows, got {}", expected_rows, rows.len()),
        ));
    }

    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(ArtifactError::invalid(
            artifact,
            format!("row {} has width {}, expected {}", idx, row.len(), width),
        ));
    }

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((expected_rows, width), flat)
        .map_err(|e| ArtifactError::invalid(artifact, e.to_string()))
}
