use super::linalg::top_k_indices;
use super::{IdMap, ItemId, ModelKind, PopularModel, Recommender, UserId};
use crate::artifacts::{matrix_from_rows, LightFmArtifact};
use crate::error::ArtifactError;
use ndarray::Array2;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// LightFM-style embedding model.
///
/// Scores are `E_user[u] · E_itemᵀ`. The selection keeps `k + |seen|` candidates so that
/// at least `k` survive when already-seen items are removed.
pub struct EmbeddingModel {
    users: IdMap,
    items: IdMap,
    user_embeddings: Array2<f32>,
    item_embeddings: Array2<f32>,
    known_items: HashMap<UserId, HashSet<ItemId>>,
    popular: Arc<PopularModel>,
}

impl EmbeddingModel {
    pub fn new(
        users: IdMap,
        items: IdMap,
        user_embeddings: Array2<f32>,
        item_embeddings: Array2<f32>,
        known_items: HashMap<UserId, HashSet<ItemId>>,
        popular: Arc<PopularModel>,
    ) -> Result<Self, ArtifactError> {
        if user_embeddings.nrows() != users.len() || item_embeddings.nrows() != items.len() {
            return Err(ArtifactError::invalid(
                "lightfm",
                "embedding rows do not match id maps",
            ));
        }
        if user_embeddings.ncols() != item_embeddings.ncols() {
            return Err(ArtifactError::invalid(
                "lightfm",
                format!(
                    "user embeddings have {} columns, item embeddings {}",
                    user_embeddings.ncols(),
                    item_embeddings.ncols()
                ),
            ));
        }

        Ok(Self {
            users,
            items,
            user_embeddings,
            item_embeddings,
            known_items,
            popular,
        })
    }

    pub fn from_artifact(
        artifact: LightFmArtifact,
        popular: Arc<PopularModel>,
    ) -> Result<Self, ArtifactError> {
        let users = IdMap::from_external_ids("lightfm user_ids", artifact.user_ids)?;
        let items = IdMap::from_external_ids("lightfm item_ids", artifact.item_ids)?;
        let user_embeddings =
            matrix_from_rows("lightfm user_embeddings", artifact.user_embeddings, users.len())?;
        let item_embeddings =
            matrix_from_rows("lightfm item_embeddings", artifact.item_embeddings, items.len())?;

        let known_items = artifact
            .known_items
            .into_iter()
            .map(|(user_id, items)| (user_id, items.into_iter().collect()))
            .collect();

        let model = Self::new(
            users,
            items,
            user_embeddings,
            item_embeddings,
            known_items,
            popular,
        )?;

        info!(
            users = model.user_count(),
            items = model.item_count(),
            dimension = model.dimension(),
            "LightFM model loaded"
        );
        Ok(model)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn dimension(&self) -> usize {
        self.item_embeddings.ncols()
    }
}

impl Recommender for EmbeddingModel {
    fn recommend(&self, user_id: UserId, k: usize) -> Vec<ItemId> {
        let Some(user_idx) = self.users.internal(user_id) else {
            return self.popular.top(k);
        };

        let scores = self.item_embeddings.dot(&self.user_embeddings.row(user_idx));
        let seen = self.known_items.get(&user_id);
        let total_k = k.saturating_add(seen.map_or(0, HashSet::len));

        top_k_indices(scores.view(), total_k, |_| true)
            .into_iter()
            .filter_map(|idx| self.items.external(idx))
            .filter(|item| seen.map_or(true, |s| !s.contains(item)))
            .take(k)
            .collect()
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        self.users.contains(user_id)
    }

    fn kind(&self) -> ModelKind {
        ModelKind::LightFm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fixture() -> EmbeddingModel {
        let popular = Arc::new(PopularModel::new(vec![5, 4, 3, 2, 1]).unwrap());
        let mut known_items = HashMap::new();
        known_items.insert(100, HashSet::from([3, 1]));

        EmbeddingModel::new(
            IdMap::from_external_ids("users", vec![100, 200]).unwrap(),
            IdMap::from_external_ids("items", vec![1, 2, 3, 4, 5]).unwrap(),
            array![[1.0, 0.0], [0.0, 1.0]],
            // user 100 scores: 1 → 0.9, 2 → 0.1, 3 → 0.8, 4 → 0.5, 5 → -0.2
            array![[0.9, 0.0], [0.1, 0.3], [0.8, 0.1], [0.5, 0.9], [-0.2, 0.4]],
            known_items,
            popular,
        )
        .unwrap()
    }

    #[test]
    fn test_seen_items_excluded_with_headroom() {
        let model = fixture();
        // ranked: 1, 3, 4, 2, 5; 1 and 3 already seen
        assert_eq!(model.recommend(100, 2), vec![4, 2]);
        assert_eq!(model.recommend(100, 3), vec![4, 2, 5]);
    }

    #[test]
    fn test_user_without_interactions() {
        let model = fixture();
        // user 200 scores: 1 → 0.0, 2 → 0.3, 3 → 0.1, 4 → 0.9, 5 → 0.4
        assert_eq!(model.recommend(200, 3), vec![4, 5, 2]);
    }

    #[test]
    fn test_k_larger_than_catalog() {
        let model = fixture();
        assert_eq!(model.recommend(100, 50), vec![4, 2, 5]);
    }

    #[test]
    fn test_cold_user_gets_popular() {
        let model = fixture();
        assert_eq!(model.recommend(300, 2), vec![5, 4]);
        assert!(!model.knows_user(300));
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let popular = Arc::new(PopularModel::new(vec![]).unwrap());
        let result = EmbeddingModel::new(
            IdMap::from_external_ids("users", vec![1]).unwrap(),
            IdMap::from_external_ids("items", vec![1]).unwrap(),
            array![[1.0, 0.0]],
            array![[1.0]],
            HashMap::new(),
            popular,
        );
        assert!(result.is_err());
    }
}
