//! Error type shared by the estimator, the catalog and the model resolvers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A model description violates its invariants (e.g. zero parameters).
    #[error("Invalid model description: {field} {reason}")]
    InvalidModelDescription { field: &'static str, reason: String },

    #[error("Invalid model identifier: '{0}'")]
    InvalidModelId(String),

    #[error("Model not found on hub: {0}")]
    ModelNotFound(String),

    /// Gated or private model, or a rejected token.
    #[error("Hub rejected the request for {0} (check HUGGING_FACE_TOKEN)")]
    Unauthorized(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Could not parse {what}: '{input}'")]
    Parse { what: &'static str, input: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidModelDescription {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the failure came from talking to the hub rather than from the
    /// model itself. Resolvers use this to decide on an offline fallback.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Io(_))
    }
}
