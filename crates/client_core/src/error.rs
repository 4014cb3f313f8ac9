use shared::{domain::ActivityId, error::ApiError};
use thiserror::Error;

use crate::form::ActivityField;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server rejected request: {0}")]
    Rejected(#[from] ApiError),
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("activity has no id")]
    MissingId,
    #[error("activity {0} is not loaded")]
    NotFound(ActivityId),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("missing required fields: {}", join_fields(.0))]
    Validation(Vec<ActivityField>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_fields(fields: &[ActivityField]) -> String {
    fields
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(", ")
}
