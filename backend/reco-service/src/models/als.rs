// ============================================
// Implicit ALS Factor Model
// ============================================
//
// Serves a trained implicit-feedback matrix factorization:
// - recommend: score = U[u] · Vᵀ, already-liked items filtered, top-K
// - explain:   attributes a (user, item) score to the user's interacted items
//
// Explain follows the implicit-ALS decomposition:
//   A = YᵀY + λI + Σ_{j ∈ I(u)} (|c_j| − 1) · y_j y_jᵀ
//   w = A⁻¹ · y_item                      (Cholesky solve)
//   contribution_j = (w · y_j) · c_j      (c_j ≥ 0)
//   score = Σ contribution_j

use super::linalg::{cholesky_solve, top_k_indices};
use super::{IdMap, ItemId, ModelKind, PopularModel, Recommender, UserId};
use crate::artifacts::{matrix_from_rows, AlsArtifact};
use crate::error::ArtifactError;
use ndarray::{Array1, Array2};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExplainError {
    #[error("user {0} is not in the factor model")]
    UnknownUser(UserId),

    #[error("item {0} is not in the factor model")]
    UnknownItem(ItemId),

    #[error("user {0} has no interactions to attribute the score to")]
    NoContribution(UserId),

    #[error("user {0} linear system is not positive definite")]
    Singular(UserId),
}

/// Personalized score of one (user, item) pair and its top-1 attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorExplanation {
    pub score: f64,
    pub contributing_item: ItemId,
    pub contribution: f64,
}

pub struct FactorModel {
    users: IdMap,
    items: IdMap,
    user_factors: Array2<f32>,
    item_factors: Array2<f32>,
    /// YᵀY, computed once at load
    gram: Array2<f64>,
    regularization: f64,
    /// user internal index → (item internal index, confidence)
    user_items: Vec<Vec<(usize, f32)>>,
    popular: Arc<PopularModel>,
}

impl FactorModel {
    pub fn new(
        users: IdMap,
        items: IdMap,
        user_factors: Array2<f32>,
        item_factors: Array2<f32>,
        regularization: f32,
        user_items: Vec<Vec<(usize, f32)>>,
        popular: Arc<PopularModel>,
    ) -> Result<Self, ArtifactError> {
        if user_factors.nrows() != users.len() || item_factors.nrows() != items.len() {
            return Err(ArtifactError::invalid(
                "als",
                format!(
                    "factor rows ({} users, {} items) do not match id maps ({} users, {} items)",
                    user_factors.nrows(),
                    item_factors.nrows(),
                    users.len(),
                    items.len()
                ),
            ));
        }
        if user_factors.ncols() != item_factors.ncols() {
            return Err(ArtifactError::invalid(
                "als",
                format!(
                    "user factors have {} columns, item factors {}",
                    user_factors.ncols(),
                    item_factors.ncols()
                ),
            ));
        }
        if user_items.len() != users.len() {
            return Err(ArtifactError::invalid(
                "als",
                format!(
                    "{} interaction rows for {} users",
                    user_items.len(),
                    users.len()
                ),
            ));
        }
        if let Some(&(idx, _)) = user_items.iter().flatten().find(|(idx, _)| *idx >= items.len()) {
            return Err(ArtifactError::invalid(
                "als",
                format!("interaction references item index {}", idx),
            ));
        }

        let item_factors_f64 = item_factors.mapv(f64::from);
        let gram = item_factors_f64.t().dot(&item_factors_f64);

        Ok(Self {
            users,
            items,
            user_factors,
            item_factors,
            gram,
            regularization: f64::from(regularization),
            user_items,
            popular,
        })
    }

    pub fn from_artifact(
        artifact: AlsArtifact,
        popular: Arc<PopularModel>,
    ) -> Result<Self, ArtifactError> {
        let users = IdMap::from_external_ids("als user_ids", artifact.user_ids)?;
        let items = IdMap::from_external_ids("als item_ids", artifact.item_ids)?;
        let user_factors = matrix_from_rows("als user_factors", artifact.user_factors, users.len())?;
        let item_factors = matrix_from_rows("als item_factors", artifact.item_factors, items.len())?;

        let mut user_items: Vec<Vec<(usize, f32)>> = vec![Vec::new(); users.len()];
        let mut skipped_users = 0usize;
        for (user_id, entries) in artifact.interactions {
            let Some(user_idx) = users.internal(user_id) else {
                skipped_users += 1;
                continue;
            };
            for entry in entries {
                let item_idx = items.internal(entry.item).ok_or_else(|| {
                    ArtifactError::invalid(
                        "als interactions",
                        format!("user {} interacted with unknown item {}", user_id, entry.item),
                    )
                })?;
                user_items[user_idx].push((item_idx, entry.weight));
            }
        }
        if skipped_users > 0 {
            warn!(
                skipped_users,
                "ALS interactions reference users outside the factor model"
            );
        }

        let model = Self::new(
            users,
            items,
            user_factors,
            item_factors,
            artifact.regularization,
            user_items,
            popular,
        )?;

        info!(
            users = model.user_count(),
            items = model.item_count(),
            factors = model.factors(),
            "ALS model loaded"
        );
        Ok(model)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn factors(&self) -> usize {
        self.item_factors.ncols()
    }

    /// Predicted affinity of `user_id` for `item_id` and the interacted item that
    /// contributed most to it.
    pub fn explain(&self, user_id: UserId, item_id: ItemId) -> Result<FactorExplanation, ExplainError> {
        let user_idx = self
            .users
            .internal(user_id)
            .ok_or(ExplainError::UnknownUser(user_id))?;
        let item_idx = self
            .items
            .internal(item_id)
            .ok_or(ExplainError::UnknownItem(item_id))?;

        let system = self.user_linear_system(user_idx);
        let seed: Array1<f64> = self.item_factors.row(item_idx).mapv(f64::from);
        let weighted = cholesky_solve(&system, &seed).ok_or(ExplainError::Singular(user_id))?;

        let mut total_score = 0.0;
        let mut best: Option<(usize, f64)> = None;
        for &(idx, confidence) in &self.user_items[user_idx] {
            if confidence < 0.0 {
                continue;
            }
            let factor = self.item_factors.row(idx).mapv(f64::from);
            let score = weighted.dot(&factor) * f64::from(confidence);
            total_score += score;

            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }

        let (idx, contribution) = best.ok_or(ExplainError::NoContribution(user_id))?;
        let contributing_item = self
            .items
            .external(idx)
            .ok_or(ExplainError::UnknownItem(item_id))?;

        Ok(FactorExplanation {
            score: total_score,
            contributing_item,
            contribution,
        })
    }

    /// YᵀY + λI + Σ (|c| − 1) y yᵀ over the user's interactions
    fn user_linear_system(&self, user_idx: usize) -> Array2<f64> {
        let factors = self.factors();
        let mut system = self.gram.clone();
        for d in 0..factors {
            system[[d, d]] += self.regularization;
        }

        for &(idx, confidence) in &self.user_items[user_idx] {
            let weight = f64::from(confidence).abs() - 1.0;
            let y = self.item_factors.row(idx);
            for p in 0..factors {
                for q in 0..factors {
                    system[[p, q]] += weight * f64::from(y[p]) * f64::from(y[q]);
                }
            }
        }

        system
    }
}

impl Recommender for FactorModel {
    fn recommend(&self, user_id: UserId, k: usize) -> Vec<ItemId> {
        let Some(user_idx) = self.users.internal(user_id) else {
            return self.popular.top(k);
        };

        let scores = self.item_factors.dot(&self.user_factors.row(user_idx));
        let liked: HashSet<usize> = self.user_items[user_idx].iter().map(|&(idx, _)| idx).collect();

        top_k_indices(scores.view(), k, |idx| !liked.contains(&idx))
            .into_iter()
            .filter_map(|idx| self.items.external(idx))
            .collect()
    }

    fn knows_user(&self, user_id: UserId) -> bool {
        self.users.contains(user_id)
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Als
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Two latent factors, four items, λ = 1.
    /// User 7 interacted with item 10 (c = 2) and item 20 (c = 3); user 8 with nothing.
    fn fixture() -> FactorModel {
        let popular = Arc::new(PopularModel::new(vec![40, 30, 20, 10]).unwrap());
        FactorModel::new(
            IdMap::from_external_ids("users", vec![7, 8]).unwrap(),
            IdMap::from_external_ids("items", vec![10, 20, 30, 40]).unwrap(),
            array![[0.5, 0.2], [0.1, 0.9]],
            array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.5, -0.5]],
            1.0,
            vec![vec![(0, 2.0), (1, 3.0)], vec![]],
            popular,
        )
        .unwrap()
    }

    #[test]
    fn test_recommend_filters_liked_items() {
        let model = fixture();
        // scores: 10 → 0.5, 20 → 0.2, 30 → 0.7, 40 → 0.15; 10 and 20 already liked
        assert_eq!(model.recommend(7, 10), vec![30, 40]);
        assert_eq!(model.recommend(7, 1), vec![30]);
    }

    #[test]
    fn test_recommend_without_history() {
        let model = fixture();
        // scores: 10 → 0.1, 20 → 0.9, 30 → 1.0, 40 → -0.4
        assert_eq!(model.recommend(8, 3), vec![30, 20, 10]);
    }

    #[test]
    fn test_cold_user_gets_popular() {
        let model = fixture();
        assert_eq!(model.recommend(999, 2), vec![40, 30]);
    }

    #[test]
    fn test_explain_golden() {
        let model = fixture();
        let explanation = model.explain(7, 30).unwrap();

        // A = [[4.25, 0.75], [0.75, 5.25]], w = A⁻¹ [1, 1] = [6/29, 14/87]
        // item 10: 2 · 6/29 = 0.41379, item 20: 3 · 14/87 = 0.48276
        assert_eq!(explanation.contributing_item, 20);
        assert!((explanation.contribution - 0.482_758_6).abs() < 1e-6);
        assert!((explanation.score - 0.896_551_7).abs() < 1e-6);
    }

    #[test]
    fn test_explain_negative_score() {
        let model = fixture();
        let explanation = model.explain(7, 40).unwrap();

        assert_eq!(explanation.contributing_item, 10);
        assert!((explanation.score + 0.068_965_5).abs() < 1e-6);
    }

    #[test]
    fn test_explain_errors() {
        let model = fixture();

        assert_eq!(model.explain(999, 30), Err(ExplainError::UnknownUser(999)));
        assert_eq!(model.explain(7, 999), Err(ExplainError::UnknownItem(999)));
        assert_eq!(model.explain(8, 30), Err(ExplainError::NoContribution(8)));
    }

    #[test]
    fn test_negative_confidence_skipped_in_attribution() {
        let popular = Arc::new(PopularModel::new(vec![]).unwrap());
        let model = FactorModel::new(
            IdMap::from_external_ids("users", vec![1]).unwrap(),
            IdMap::from_external_ids("items", vec![10, 20]).unwrap(),
            array![[1.0, 1.0]],
            array![[1.0, 0.0], [0.0, 1.0]],
            0.5,
            vec![vec![(0, -4.0), (1, 2.0)]],
            popular,
        )
        .unwrap();

        let explanation = model.explain(1, 10).unwrap();
        assert_eq!(explanation.contributing_item, 20);
    }

    #[test]
    fn test_shape_validation() {
        let popular = Arc::new(PopularModel::new(vec![]).unwrap());
        let result = FactorModel::new(
            IdMap::from_external_ids("users", vec![1]).unwrap(),
            IdMap::from_external_ids("items", vec![10, 20]).unwrap(),
            array![[1.0, 1.0]],
            array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            0.5,
            vec![vec![]],
            popular,
        );
        assert!(result.is_err());
    }
}
