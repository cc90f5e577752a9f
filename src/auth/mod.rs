//! JWT Authentication and Middleware
//!
//! Every workflow configuration belongs to an API user. Requests identify
//! that user with an HS256 bearer token whose `sub` claim is the API user id.
//!
//! # Module Structure
//!
//! - [`auth::jwt`](crate::auth::jwt) - token issuing and verification
//! - [`auth::middleware`](crate::auth::middleware) - Axum middleware and the `AuthUser` extractor
//!
//! # Usage
//!
//! ```ignore
//! use agentforge::auth::middleware::{auth_middleware, AuthUser};
//!
//! let app = Router::new()
//!     .route("/protected", get(handler))
//!     .layer(middleware::from_fn_with_state(auth_service, auth_middleware));
//!
//! async fn handler(user: AuthUser) -> String {
//!     user.caller().api_user_id
//! }
//! ```
//!
//! Tokens are minted out of band with `agentforge-server token --user <ID>`.

/// JWT token generation and validation.
pub mod jwt;
/// Authentication middleware and extractors for protected routes.
pub mod middleware;
