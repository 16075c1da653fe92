//! Model errors - failures materializing resource models from raw payloads

use thiserror::Error;

/// Errors raised while building a resource model from gateway data
#[derive(Debug, Error)]
pub enum ModelError {
    /// The payload did not match the model's shape
    #[error("Invalid {entity} payload: {source}")]
    InvalidPayload {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A field held a value the model rejects
    #[error("Invalid {entity} field `{field}`: {reason}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl ModelError {
    /// Name of the model that failed to materialize
    pub fn entity(&self) -> &'static str {
        match self {
            Self::InvalidPayload { entity, .. } | Self::InvalidField { entity, .. } => entity,
        }
    }

    pub fn payload(entity: &'static str, source: serde_json::Error) -> Self {
        Self::InvalidPayload { entity, source }
    }
}
