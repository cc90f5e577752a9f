use crate::{
    auth::middleware::AuthUser,
    types::{AppError, RegisterVectorDatabaseRequest, Result, VectorDatabaseResponse},
    AppState,
};
use axum::{extract::State, http::StatusCode, Json};

/// Providers a datasource can be bound to
const SUPPORTED_PROVIDERS: &[&str] = &["PINECONE", "QDRANT", "ASTRA_DB", "WEAVIATE", "SUPABASE"];

/// Register a vector database for the caller
///
/// The first database a user registers is their default for datasources
/// that do not name a `database_provider`.
#[utoipa::path(
    post,
    path = "/api/vector-databases",
    request_body = RegisterVectorDatabaseRequest,
    responses(
        (status = 201, description = "Vector database registered", body = VectorDatabaseResponse),
        (status = 400, description = "Unsupported provider"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "vector-databases",
    security(("bearer" = []))
)]
pub async fn register_vector_database(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RegisterVectorDatabaseRequest>,
) -> Result<(StatusCode, Json<VectorDatabaseResponse>)> {
    let provider = payload.provider.trim().to_uppercase();
    if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
        return Err(AppError::InvalidInput(format!(
            "Unsupported vector database provider '{}'",
            payload.provider
        )));
    }

    let database = state
        .gateway
        .create_vector_database(&user.caller().api_user_id, &provider, &payload.options)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(VectorDatabaseResponse {
            id: database.id,
            provider: database.provider,
            created_at: database.created_at,
        }),
    ))
}
