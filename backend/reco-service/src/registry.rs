// ============================================
// Model Registry
// ============================================
//
// name → backend map built once at startup. The registry is the only dispatch point:
// callers look a backend up by name and never construct models themselves.
//
// Registered names:
//   popular_model  → PopularModel   (always present)
//   knn_model      → NeighborModel
//   als_model      → FactorModel    (also serves explanations)
//   lightfm_model  → EmbeddingModel

use crate::artifacts::{
    load_artifact, AlsArtifact, ArtifactConfig, ItemTitlesArtifact, KnnArtifact,
    LightFmArtifact, PopularityArtifact,
};
use crate::error::{ArtifactError, RecoError, Result};
use crate::explain::{validate_user_id, ExplainLocale, Explanation, ExplanationEngine, ItemCatalog};
use crate::models::{
    Backend, BackendMetadata, EmbeddingModel, FactorModel, ItemId, NeighborModel, PopularModel,
    Recommender, UserId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const POPULAR_MODEL: &str = "popular_model";
pub const KNN_MODEL: &str = "knn_model";
pub const ALS_MODEL: &str = "als_model";
pub const LIGHTFM_MODEL: &str = "lightfm_model";

/// Startup summary of one registered backend.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(flatten)]
    pub metadata: BackendMetadata,
    pub loaded_at: DateTime<Utc>,
}

pub struct ModelRegistry {
    backends: HashMap<String, Backend>,
    popular: Arc<PopularModel>,
    explainer: ExplanationEngine,
    loaded_at: DateTime<Utc>,
}

impl ModelRegistry {
    /// Load every enabled model eagerly. Any artifact failure aborts the whole load.
    pub fn load(config: &ArtifactConfig, locale: ExplainLocale) -> std::result::Result<Self, ArtifactError> {
        let popular_artifact: PopularityArtifact = load_artifact(&config.popular_path)?;
        let popular = Arc::new(PopularModel::from_artifact(popular_artifact)?);

        let titles: ItemTitlesArtifact = load_artifact(&config.item_titles_path)?;
        let catalog = Arc::new(ItemCatalog::new(titles));
        info!(items = catalog.len(), "Item catalog loaded");

        // Untitled ranked items can still be recommended but never explained.
        let untitled = catalog.untitled_count(popular.top(popular.len()));
        if untitled > 0 {
            warn!(
                untitled,
                ranked = popular.len(),
                "Popularity ranking references items missing from the catalog"
            );
        }

        let mut backends = Vec::new();
        backends.push((POPULAR_MODEL.to_string(), Backend::Popular(popular.clone())));

        if let Some(path) = &config.knn_path {
            let artifact: KnnArtifact = load_artifact(path)?;
            let model = NeighborModel::from_artifact(artifact, popular.clone())?;
            backends.push((KNN_MODEL.to_string(), Backend::Knn(model)));
        }

        if let Some(path) = &config.als_path {
            let artifact: AlsArtifact = load_artifact(path)?;
            let model = FactorModel::from_artifact(artifact, popular.clone())?;
            backends.push((ALS_MODEL.to_string(), Backend::Als(model)));
        }

        if let Some(path) = &config.lightfm_path {
            let artifact: LightFmArtifact = load_artifact(path)?;
            let model = EmbeddingModel::from_artifact(artifact, popular.clone())?;
            backends.push((LIGHTFM_MODEL.to_string(), Backend::LightFm(model)));
        }

        Ok(Self::from_backends(backends, popular, catalog, locale))
    }

    /// Build a registry from already constructed backends.
    pub fn from_backends(
        backends: impl IntoIterator<Item = (String, Backend)>,
        popular: Arc<PopularModel>,
        catalog: Arc<ItemCatalog>,
        locale: ExplainLocale,
    ) -> Self {
        let backends: HashMap<String, Backend> = backends.into_iter().collect();
        info!(
            models = backends.len(),
            locale = ?locale,
            "Model registry initialized"
        );

        Self {
            backends,
            explainer: ExplanationEngine::new(catalog, popular.clone(), locale),
            popular,
            loaded_at: Utc::now(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&Backend> {
        self.backends
            .get(name)
            .ok_or_else(|| RecoError::ModelNotFound(name.to_string()))
    }

    pub fn popular(&self) -> &PopularModel {
        &self.popular
    }

    /// Registered names, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Request-level recommendation: user id policy, then model lookup, then `k`.
    pub fn recommend(&self, model_name: &str, user_id: UserId, k: usize) -> Result<Vec<ItemId>> {
        validate_user_id(user_id)?;
        let backend = self.get(model_name)?;
        if k == 0 {
            return Err(RecoError::InvalidRequest("k must be at least 1".to_string()));
        }

        let items = backend.recommend(user_id, k);
        debug!(
            model = model_name,
            user_id,
            k,
            returned = items.len(),
            known_user = backend.knows_user(user_id),
            "Recommendations served"
        );
        Ok(items)
    }

    /// Request-level explanation. Only models with the explain capability answer;
    /// any other name is reported as not found.
    pub fn explain(&self, model_name: &str, user_id: UserId, item_id: ItemId) -> Result<Explanation> {
        validate_user_id(user_id)?;
        let model = self
            .get(model_name)?
            .as_factor_model()
            .ok_or_else(|| RecoError::ModelNotFound(model_name.to_string()))?;

        let explanation = self.explainer.explain(model, user_id, item_id)?;
        debug!(
            model = model_name,
            user_id,
            item_id,
            p = explanation.p,
            "Explanation served"
        );
        Ok(explanation)
    }

    pub fn model_info(&self) -> Vec<ModelInfo> {
        self.model_names()
            .into_iter()
            .filter_map(|name| {
                self.backends.get(name).map(|backend| ModelInfo {
                    name: name.to_string(),
                    metadata: backend.metadata(),
                    loaded_at: self.loaded_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::NeighborEntry;
    use crate::error::ErrorKey;
    use crate::models::{IdMap, ModelKind};
    use std::thread;

    fn registry() -> ModelRegistry {
        let popular = Arc::new(PopularModel::new((1..=20).collect()).unwrap());
        let knn = NeighborModel::new(
            IdMap::from_external_ids("users", vec![1]).unwrap(),
            1..=30,
            vec![vec![NeighborEntry {
                item: 25,
                score: Some(0.9),
            }]],
            popular.clone(),
        );
        let mut titles = HashMap::new();
        titles.insert(3, "Three".to_string());

        ModelRegistry::from_backends(
            vec![
                (POPULAR_MODEL.to_string(), Backend::Popular(popular.clone())),
                (KNN_MODEL.to_string(), Backend::Knn(knn)),
            ],
            popular,
            Arc::new(ItemCatalog::new(titles)),
            ExplainLocale::En,
        )
    }

    #[test]
    fn test_unknown_user_on_knn_gets_popular_top_10() {
        let registry = registry();
        let recs = registry.recommend(KNN_MODEL, 4242, 10).unwrap();
        assert_eq!(recs, registry.popular().top(10));
        assert_eq!(recs, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_known_user_on_knn() {
        let registry = registry();
        assert_eq!(registry.recommend(KNN_MODEL, 1, 3).unwrap(), vec![25, 1, 2]);
    }

    #[test]
    fn test_unregistered_model() {
        let registry = registry();

        let err = registry.recommend("svd_model", 1, 10).unwrap_err();
        assert_eq!(err, RecoError::ModelNotFound("svd_model".to_string()));
        assert_eq!(err.error_key(), ErrorKey::ModelNotFound);
        assert!(registry.get(ALS_MODEL).is_err());
    }

    #[test]
    fn test_user_id_checked_before_model() {
        let registry = registry();

        for name in [KNN_MODEL, "svd_model"] {
            assert_eq!(
                registry.recommend(name, 1_000_000_001, 10).unwrap_err(),
                RecoError::UserNotFound(1_000_000_001)
            );
            assert_eq!(
                registry.explain(name, 1_000_000_001, 3).unwrap_err(),
                RecoError::UserNotFound(1_000_000_001)
            );
        }
    }

    #[test]
    fn test_zero_k_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.recommend(POPULAR_MODEL, 1, 0),
            Err(RecoError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_explain_requires_factor_model() {
        let registry = registry();
        assert_eq!(
            registry.explain(KNN_MODEL, 1, 3).unwrap_err(),
            RecoError::ModelNotFound(KNN_MODEL.to_string())
        );
    }

    #[test]
    fn test_popular_backend_shares_ranking() {
        let registry = registry();
        match registry.get(POPULAR_MODEL).unwrap() {
            Backend::Popular(model) => assert!(std::ptr::eq(model.as_ref(), registry.popular())),
            _ => panic!("popular_model must be the popularity backend"),
        }
    }

    #[test]
    fn test_model_info_sorted() {
        let registry = registry();
        let info = registry.model_info();

        assert_eq!(registry.model_names(), vec![KNN_MODEL, POPULAR_MODEL]);
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].metadata.kind, ModelKind::Knn);
        assert_eq!(info[0].metadata.user_count, 1);
        assert_eq!(info[1].metadata.item_count, 20);
    }

    #[test]
    fn test_shared_across_threads() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || registry.recommend(KNN_MODEL, 1000 + i, 5).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![1, 2, 3, 4, 5]);
        }
    }
}
