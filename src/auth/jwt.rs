use crate::types::{AppError, Claims, Result, TokenResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Issues and verifies HS256 bearer tokens.
///
/// The `sub` claim carries the API user id on whose behalf requests run.
pub struct AuthService {
    jwt_secret: String,
    expiry: i64,
}

impl AuthService {
    /// # Arguments
    /// * `jwt_secret` - Secret key for signing JWTs
    /// * `expiry` - Token validity in seconds
    pub fn new(jwt_secret: String, expiry: i64) -> Self {
        Self { jwt_secret, expiry }
    }

    /// Generates a token for an API user.
    pub fn generate_token(&self, api_user_id: &str) -> Result<TokenResponse> {
        let now = Utc::now();
        let claims = Claims {
            sub: api_user_id.to_string(),
            exp: (now + Duration::seconds(self.expiry)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Auth(format!("Failed to generate token: {}", e)))?;

        Ok(TokenResponse {
            access_token,
            expires_in: self.expiry,
        })
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))
    }
}
