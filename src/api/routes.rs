use crate::api::handlers::{health, vector_databases, workflow_configs};
use crate::auth::{jwt::AuthService, middleware::auth_middleware};
use crate::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Upper bound for a posted YAML document
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_router(auth_service: Arc<AuthService>) -> Router<AppState> {
    let public_routes = Router::new()
        // Public routes (no auth required)
        .route("/health", get(health::health));

    let protected_routes = Router::new()
        // Workflow config routes
        .route(
            "/workflow-configs",
            post(workflow_configs::create_workflow_config),
        )
        .route(
            "/workflow-configs/{id}",
            get(workflow_configs::get_workflow_config)
                .post(workflow_configs::reconcile_workflow_config),
        )
        .route(
            "/workflow-configs/{id}/history",
            get(workflow_configs::list_history),
        )
        // Vector database routes
        .route(
            "/vector-databases",
            post(vector_databases::register_vector_database),
        )
        .layer(middleware::from_fn_with_state(auth_service, auth_middleware));

    public_routes.merge(protected_routes)
}

/// Assemble the full application: API routes under `/api`, docs, and layers
pub fn build_app(state: AppState) -> Router {
    let api = create_router(Arc::clone(&state.auth_service));

    let app = Router::new().nest("/api", api);

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", crate::api::ApiDoc::openapi()),
        )
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
    )
    .with_state(state)
}
