//! Single-item explanations.
//!
//! Decision order (first match wins):
//! 1. user id above [`MAX_USER_ID`] → `UserNotFound`
//! 2. item missing from the catalog → `ItemNotFound`
//! 3. user and item known to the factor model with a contributing interaction
//!    → "similar taste" explanation, percentile = score × 100
//! 4. otherwise → popularity explanation, percentile from the popularity rank

use crate::error::{RecoError, Result};
use crate::models::{ExplainError, FactorModel, ItemId, PopularModel, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Largest user id accepted by the service.
pub const MAX_USER_ID: UserId = 1_000_000_000;

pub fn validate_user_id(user_id: UserId) -> Result<()> {
    if user_id > MAX_USER_ID {
        return Err(RecoError::UserNotFound(user_id));
    }
    Ok(())
}

/// item id → display title
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    titles: HashMap<ItemId, String>,
}

impl ItemCatalog {
    pub fn new(titles: HashMap<ItemId, String>) -> Self {
        Self { titles }
    }

    pub fn title(&self, item_id: ItemId) -> Option<&str> {
        self.titles.get(&item_id).map(String::as_str)
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.titles.contains_key(&item_id)
    }

    /// Number of `items` that have no title.
    pub fn untitled_count(&self, items: impl IntoIterator<Item = ItemId>) -> usize {
        items.into_iter().filter(|item| !self.contains(*item)).count()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainLocale {
    #[default]
    Ru,
    En,
}

impl ExplainLocale {
    fn similar_taste(&self, title: &str) -> String {
        match self {
            ExplainLocale::Ru => format!("Рекомендуем тем, кому нравится «{}»", title),
            ExplainLocale::En => format!("Recommended because you like «{}»", title),
        }
    }

    fn popular(&self, title: &str, top_percent: u8) -> String {
        match self {
            ExplainLocale::Ru => format!(
                "«{}» входит в топ {}% самых просматриваемых фильмов",
                title, top_percent
            ),
            ExplainLocale::En => format!(
                "«{}» is in the top {}% most-viewed items",
                title, top_percent
            ),
        }
    }
}

impl FromStr for ExplainLocale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(ExplainLocale::Ru),
            "en" => Ok(ExplainLocale::En),
            other => Err(format!("unsupported explanation locale: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationSource {
    SimilarTaste { contributor: ItemId },
    Popularity { rank: Option<usize> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    /// Confidence percentile
    pub p: u8,
    pub explanation: String,
    #[serde(skip)]
    pub source: ExplanationSource,
}

/// `round(score * 100)` clamped to `[0, 100]`.
pub fn personalized_percentile(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

/// `round((1 - (rank + 1) / len) * 99)` clamped to `[0, 99]`.
pub fn popularity_percentile(rank: usize, len: usize) -> u8 {
    if len == 0 {
        return 0;
    }
    let value = (1.0 - (rank as f64 + 1.0) / len as f64) * 99.0;
    value.round().clamp(0.0, 99.0) as u8
}

pub struct ExplanationEngine {
    catalog: Arc<ItemCatalog>,
    popular: Arc<PopularModel>,
    locale: ExplainLocale,
}

impl ExplanationEngine {
    pub fn new(catalog: Arc<ItemCatalog>, popular: Arc<PopularModel>, locale: ExplainLocale) -> Self {
        Self {
            catalog,
            popular,
            locale,
        }
    }

    pub fn explain(&self, model: &FactorModel, user_id: UserId, item_id: ItemId) -> Result<Explanation> {
        validate_user_id(user_id)?;

        let title = self
            .catalog
            .title(item_id)
            .ok_or(RecoError::ItemNotFound(item_id))?;

        match model.explain(user_id, item_id) {
            Ok(factor) => {
                let contributor_title = self
                    .catalog
                    .title(factor.contributing_item)
                    .map(str::to_string)
                    .unwrap_or_else(|| factor.contributing_item.to_string());

                return Ok(Explanation {
                    p: personalized_percentile(factor.score),
                    explanation: self.locale.similar_taste(&contributor_title),
                    source: ExplanationSource::SimilarTaste {
                        contributor: factor.contributing_item,
                    },
                });
            }
            Err(ExplainError::UnknownUser(_)) | Err(ExplainError::UnknownItem(_)) => {}
            Err(err) => {
                debug!(user_id, item_id, error = %err, "Falling back to popularity explanation");
            }
        }

        // Catalog items without a popularity rank get the worst-case rank.
        let rank = self.popular.rank(item_id);
        let p = popularity_percentile(rank.unwrap_or(self.popular.len()), self.popular.len());

        Ok(Explanation {
            p,
            explanation: self.locale.popular(title, 100 - p),
            source: ExplanationSource::Popularity { rank },
        })
    }
}
