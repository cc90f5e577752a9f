use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflows::ReconcileReport;

// ============= API Request/Response Types =============

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateWorkflowConfigRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WorkflowConfigResponse {
    pub id: String,
    pub description: Option<String>,
    pub latest_history_id: Option<String>,
    /// The last applied configuration, if any reconciliation has succeeded
    #[schema(value_type = Option<Object>)]
    pub latest_config: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: String,
    pub workflow_config_id: String,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
    pub created_at: i64,
}

/// Result of applying a YAML workflow configuration.
///
/// Failures never produce this body; they surface as an error response even
/// when some of the operations were already committed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileResponse {
    pub success: bool,
    pub history_id: String,
    #[schema(value_type = Object)]
    pub report: ReconcileReport,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterVectorDatabaseRequest {
    /// Provider tag, e.g. `PINECONE`, `QDRANT`, `WEAVIATE`
    pub provider: String,
    /// Connection options forwarded to the retrieval backend
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VectorDatabaseResponse {
    pub id: String,
    pub provider: String,
    pub created_at: i64,
}

// ============= Authentication Types =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// API user id
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Identity of the API user on whose behalf a reconciliation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub api_user_id: String,
}

impl Caller {
    pub fn new(api_user_id: impl Into<String>) -> Self {
        Self {
            api_user_id: api_user_id.into(),
        }
    }
}

impl From<&Claims> for Caller {
    fn from(claims: &Claims) -> Self {
        Caller::new(claims.sub.clone())
    }
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Error parsing YAML: {0}")]
    Parse(String),

    #[error("Invalid workflow configuration: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No compatible vector database found: {0}")]
    MissingVectorDatabaseProvider(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Parse(_)
            | AppError::Validation(_)
            | AppError::InvalidInput(_)
            | AppError::MissingVectorDatabaseProvider(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Gateway(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (AppError::Parse("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (
                AppError::MissingVectorDatabaseProvider("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (
                AppError::Gateway("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_caller_from_claims() {
        let claims = Claims {
            sub: "api-user-1".to_string(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(Caller::from(&claims), Caller::new("api-user-1"));
    }
}
