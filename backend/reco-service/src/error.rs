use crate::models::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecoError>;

/// Request-level errors surfaced to the routing layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoError {
    #[error("Model {0} not found")]
    ModelNotFound(String),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RecoError {
    pub fn error_key(&self) -> ErrorKey {
        match self {
            RecoError::ModelNotFound(_) => ErrorKey::ModelNotFound,
            RecoError::UserNotFound(_) => ErrorKey::UserNotFound,
            RecoError::ItemNotFound(_) => ErrorKey::ItemNotFound,
            RecoError::InvalidRequest(_) => ErrorKey::InvalidRequest,
        }
    }

    /// Payload shape the routing layer renders for this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error_key: self.error_key(),
            error_message: self.to_string(),
            error_loc: None,
        }
    }
}

/// Caller-facing error identifiers.
///
/// `NotAuthorized` is produced by the auth layer in front of this crate; it lives here so
/// every identifier of the taxonomy serializes from one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKey {
    UserNotFound,
    ItemNotFound,
    ModelNotFound,
    NotAuthorized,
    InvalidRequest,
}

impl ErrorKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKey::UserNotFound => "user_not_found",
            ErrorKey::ItemNotFound => "item_not_found",
            ErrorKey::ModelNotFound => "model_not_found",
            ErrorKey::NotAuthorized => "not_authorized",
            ErrorKey::InvalidRequest => "invalid_request",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_key: ErrorKey,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_loc: Option<String>,
}

/// Failures while reading model artifacts. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON artifact {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode bincode artifact {path}: {source}")]
    Bincode {
        path: String,
        #[source]
        source: bincode::Error,
    },

    #[error("Unsupported artifact format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid artifact {artifact}: {reason}")]
    Invalid { artifact: String, reason: String },
}

impl ArtifactError {
    pub fn invalid(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_keys() {
        assert_eq!(
            RecoError::ModelNotFound("some_model".into()).error_key().as_str(),
            "model_not_found"
        );
        assert_eq!(RecoError::UserNotFound(1).error_key().as_str(), "user_not_found");
        assert_eq!(RecoError::ItemNotFound(1).error_key().as_str(), "item_not_found");
        assert_eq!(ErrorKey::NotAuthorized.as_str(), "not_authorized");
    }

    #[test]
    fn test_error_body_serialization() {
        let body = RecoError::UserNotFound(10_000_000_000).to_body();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["error_key"], "user_not_found");
        assert_eq!(json["error_message"], "User 10000000000 not found");
        assert!(json.get("error_loc").is_none());
    }

    #[test]
    fn test_serde_key_matches_as_str() {
        for key in [
            ErrorKey::UserNotFound,
            ErrorKey::ItemNotFound,
            ErrorKey::ModelNotFound,
            ErrorKey::NotAuthorized,
            ErrorKey::InvalidRequest,
        ] {
            let json = serde_json::to_value(key).unwrap();
            assert_eq!(json, key.as_str());
        }
    }
}
