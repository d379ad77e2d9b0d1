use super::{ItemId, ModelKind, Recommender, UserId};
use crate::artifacts::PopularityArtifact;
use crate::error::ArtifactError;
use std::collections::HashMap;
use tracing::info;

/// Global popularity ranking.
///
/// Serves the same list to everyone and doubles as the cold-start fallback of every
/// personalized backend.
#[derive(Debug, Clone)]
pub struct PopularModel {
    ranking: Vec<ItemId>,
    rank_of: HashMap<ItemId, usize>,
}

impl PopularModel {
    pub fn new(ranking: Vec<ItemId>) -> Result<Self, ArtifactError> {
        let mut rank_of = HashMap::with_capacity(ranking.len());
        for (rank, &item) in ranking.iter().enumerate() {
            if rank_of.insert(item, rank).is_some() {
                return Err(ArtifactError::invalid(
                    "popularity ranking",
                    format!("item {} ranked twice", item),
                ));
            }
        }

        Ok(Self { ranking, rank_of })
    }

    pub fn from_artifact(artifact: PopularityArtifact) -> Result<Self, ArtifactError> {
        let model = Self::new(artifact.items)?;
        info!(items = model.len(), "Popularity ranking loaded");
        Ok(model)
    }

    /// The `k` most popular items.
    pub fn top(&self, k: usize) -> Vec<ItemId> {
        self.ranking.iter().take(k).copied().collect()
    }

    /// Zero-based popularity rank, `None` for unranked items.
    pub fn rank(&self, item_id: ItemId) -> Option<usize> {
        self.rank_of.get(&item_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }
}

impl Recommender for PopularModel {
    fn recommend(&self, _user_id: UserId, k: usize) -> Vec<ItemId> {
        self.top(k)
    }

    fn knows_user(&self, _user_id: UserId) -> bool {
        false
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Popular
    }
}
