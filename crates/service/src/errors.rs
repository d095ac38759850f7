use models::errors::ModelError;
use serde_json::json;
use thiserror::Error;

use crate::references::ValidationError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    /// A category or tag reference did not pass validation; nothing was written.
    #[error("rejected: {0}")]
    Rejected(#[from] ValidationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("model error: {0}")]
    Model(ModelError),
}

impl From<ModelError> for ServiceError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) => ServiceError::Validation(msg),
            other => ServiceError::Model(other),
        }
    }
}

impl ServiceError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }

    /// HTTP status a write/read endpoint would answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) | ServiceError::Rejected(_) | ServiceError::Model(_) => 400,
            ServiceError::NotFound(_) => 404,
            ServiceError::Storage(_) => 500,
        }
    }

    /// Structured error body. Reference rejections name the offending id.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            ServiceError::Rejected(rejection) => json!({
                "error": "rejected",
                "message": rejection.to_string(),
                "detail": rejection,
            }),
            ServiceError::Validation(msg) => json!({"error": "validation", "message": msg}),
            ServiceError::Model(e) => json!({"error": "validation", "message": e.to_string()}),
            ServiceError::NotFound(msg) => json!({"error": "not_found", "message": msg}),
            ServiceError::Storage(msg) => json!({"error": "storage", "message": msg}),
        }
    }
}
