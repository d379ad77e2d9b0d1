use super::{dedup_truncate, IdMap, ItemId, ModelKind, PopularModel, Recommender, UserId};
use crate::artifacts::{KnnArtifact, NeighborEntry};
use crate::error::ArtifactError;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Neighbour search failures caused by inconsistent model state.
///
/// Never surfaced to callers: the model degrades to popularity instead.
#[derive(Debug, Error, PartialEq)]
pub enum NeighborSearchError {
    #[error("no neighbour row {row} for user {user_id}")]
    MissingRow { user_id: UserId, row: usize },

    #[error("neighbour candidate {item_id} is outside the item universe")]
    UnknownItem { item_id: ItemId },
}

/// Nearest-neighbour recommendations from precomputed candidate lists.
///
/// Algorithm:
/// 1. Cold user → popularity
/// 2. Read the user's neighbour candidates, dropping entries without a finite similarity
/// 3. Top up with popularity, de-duplicate (neighbours first), truncate to `k`
/// 4. Malformed neighbour state → popularity
pub struct NeighborModel {
    users: IdMap,
    items: HashSet<ItemId>,
    neighbors: Vec<Vec<NeighborEntry>>,
    popular: Arc<PopularModel>,
}

impl NeighborModel {
    pub fn new(
        users: IdMap,
        item_ids: impl IntoIterator<Item = ItemId>,
        neighbors: Vec<Vec<NeighborEntry>>,
        popular: Arc<PopularModel>,
    ) -> Self {
        Self {
            users,
            items: item_ids.into_iter().collect(),
            neighbors,
            popular,
        }
    }

    pub fn from_artifact(
        artifact: KnnArtifact,
        popular: Arc<PopularModel>,
    ) -> Result<Self, ArtifactError> {
        let users = IdMap::from_external_ids("knn user_ids", artifact.user_ids)?;

        if artifact.neighbors.len() != users.len() {
            return Err(ArtifactError::invalid(
                "knn",
                format!(
                    "{} neighbour rows for {} users",
                    artifact.neighbors.len(),
                    users.len()
                ),
            ));
        }

        let model = Self::new(users, artifact.item_ids, artifact.neighbors, popular);
        info!(
            users = model.user_count(),
            items = model.item_count(),
            "KNN model loaded"
        );
        Ok(model)
    }

    /// Valid neighbour candidates of a known user, in exporter order.
    pub fn neighbor_candidates(
        &self,
        user_id: UserId,
        row: usize,
    ) -> Result<Vec<ItemId>, NeighborSearchError> {
        let entries = self
            .neighbors
            .get(row)
            .ok_or(NeighborSearchError::MissingRow { user_id, row })?;

        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.score.is_some_and(f32::is_finite) {
                continue;
            }
            if !self.items.contains(&entry.item) {
                return Err(NeighborSearchError::UnknownItem {
                    item_id: entry.item,
                });
            }
            candidates.push(entry.item);
        }

        Ok(candidates)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl Recommender for NeighborModel {
    fn recommend(&self, user_id: UserId, k: usize) -> Vec<ItemId> {
        let Some(row) = self.users.internal(user_id) else {
            return self.popular.top(k);
        };

        match self.neighbor_candidates(user_id, row) {
            Ok(candidates) => {
                if candidates.len() < k {
                    debug!(
                        user_id,
                        neighbors = candidates.len(),
                        k,
                        "Topping up KNN candidates with popular items"
                    );
                }
                dedup_truncate(candidates.into_iter().chain(self.popular.top(k)), k)
            }
            Err(err) => {
                warn!(user_id, error = %err, "KNN search failed, serving popular items");
                self.popular.top(k)
            }
        }
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        self.users.contains(user_id)
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Knn
    }
}
