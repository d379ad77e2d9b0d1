pub mod artifacts;
pub mod config;
pub mod error;
pub mod explain;
pub mod models;
pub mod registry;

pub use artifacts::ArtifactConfig;
pub use config::Config;
pub use error::{ArtifactError, ErrorBody, ErrorKey, RecoError};
pub use explain::{ExplainLocale, Explanation, ExplanationEngine, ItemCatalog};
pub use models::{Backend, ItemId, ModelKind, Recommender, UserId};
pub use registry::{ModelInfo, ModelRegistry};
