// ============================================
// Recommendation Backends - Module Root
// ============================================
//
// Precomputed recommender models served behind one contract:
// 1. Popularity baseline (also the shared cold-start fallback)
// 2. Nearest-neighbour candidates (KNN)
// 3. Implicit matrix factorization (ALS) with score attribution
// 4. Factorization-machine embeddings (LightFM)
//
// Architecture:
//   ModelRegistry → Backend::recommend → personalized path
//                                 ↓ (cold user / degraded)
//                          PopularModel::recommend

pub mod als;
pub mod id_map;
pub mod knn;
pub mod lightfm;
pub mod linalg;
pub mod popular;

pub use als::{ExplainError, FactorExplanation, FactorModel};
pub use id_map::IdMap;
pub use knn::{NeighborModel, NeighborSearchError};
pub use lightfm::EmbeddingModel;
pub use popular::PopularModel;

use serde::Serialize;
use std::sync::Arc;

/// External user identifier.
pub type UserId = u64;

/// External catalog item identifier.
pub type ItemId = u64;

/// Shared capability of every backend.
pub trait Recommender: Send + Sync {
    /// Top-`k` items for `user_id`, most relevant first, no duplicates.
    ///
    /// Users outside the trained population get the popularity fallback.
    fn recommend(&self, user_id: UserId, k: usize) -> Vec<ItemId>;

    fn knows_user(&self, user_id: UserId) -> bool;

    fn kind(&self) -> ModelKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Popular,
    Knn,
    Als,
    #[serde(rename = "lightfm")]
    LightFm,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Popular => "popular",
            ModelKind::Knn => "knn",
            ModelKind::Als => "als",
            ModelKind::LightFm => "lightfm",
        }
    }
}

/// Closed set of servable backends.
pub enum Backend {
    Popular(Arc<PopularModel>),
    Knn(NeighborModel),
    Als(FactorModel),
    LightFm(EmbeddingModel),
}

impl Backend {
    fn inner(&self) -> &dyn Recommender {
        match self {
            Backend::Popular(m) => m.as_ref(),
            Backend::Knn(m) => m,
            Backend::Als(m) => m,
            Backend::LightFm(m) => m,
        }
    }

    /// Explain capability, only present on the factor model.
    pub fn as_factor_model(&self) -> Option<&FactorModel> {
        match self {
            Backend::Als(m) => Some(m),
            _ => None,
        }
    }

    pub fn metadata(&self) -> BackendMetadata {
        match self {
            Backend::Popular(m) => BackendMetadata {
                kind: ModelKind::Popular,
                user_count: 0,
                item_count: m.len(),
                factors: 0,
            },
            Backend::Knn(m) => BackendMetadata {
                kind: ModelKind::Knn,
                user_count: m.user_count(),
                item_count: m.item_count(),
                factors: 0,
            },
            Backend::Als(m) => BackendMetadata {
                kind: ModelKind::Als,
                user_count: m.user_count(),
                item_count: m.item_count(),
                factors: m.factors(),
            },
            Backend::LightFm(m) => BackendMetadata {
                kind: ModelKind::LightFm,
                user_count: m.user_count(),
                item_count: m.item_count(),
                factors: m.dimension(),
            },
        }
    }
}

impl Recommender for Backend {
    fn recommend(&self, user_id: UserId, k: usize) -> Vec<ItemId> {
        self.inner().recommend(user_id, k)
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        self.inner().knows_user(user_id)
    }

    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendMetadata {
    pub kind: ModelKind,
    pub user_count: usize,
    pub item_count: usize,
    pub factors: usize,
}

/// Stable de-duplication: keeps the first occurrence of every id, then truncates to `k`.
pub(crate) fn dedup_truncate(items: impl IntoIterator<Item = ItemId>, k: usize) -> Vec<ItemId> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();

    for item in items {
        if ordered.len() >= k {
            break;
        }
        if seen.insert(item) {
            ordered.push(item);
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_truncate_keeps_first_seen_order() {
        let items = vec![5, 3, 5, 1, 3, 9, 7];
        assert_eq!(dedup_truncate(items.clone(), 10), vec![5, 3, 1, 9, 7]);
        assert_eq!(dedup_truncate(items, 3), vec![5, 3, 1]);
    }

    #[test]
    fn test_dedup_truncate_zero() {
        assert!(dedup_truncate(vec![1, 2], 0).is_empty());
    }

    #[test]
    fn test_model_kind_names() {
        for kind in [
            ModelKind::Popular,
            ModelKind::Knn,
            ModelKind::Als,
            ModelKind::LightFm,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }
}
