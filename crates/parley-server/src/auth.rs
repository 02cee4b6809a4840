//! Connection tokens: HS256 JWTs whose subject is the user's email.

use axum::http::StatusCode;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parley_db::{find_user_by_email, DbPool};
use parley_types::Identity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User email.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("unknown or inactive user {0}")]
    UnknownUser(String),
    #[error(transparent)]
    Db(#[from] parley_db::DbError),
    #[error("pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken(_) | Self::UnknownUser(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Db(_) | Self::Pool(_) | Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Issues and verifies connection tokens, and resolves them to users.
pub struct Authenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    pool: DbPool,
}

impl Authenticator {
    pub fn new(secret: &str, pool: DbPool) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            pool,
        }
    }

    /// Mints a token for `email` valid for `ttl_secs`.
    pub fn issue_token(&self, email: &str, ttl_secs: i64) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }

    /// Verifies `token` and looks up the active user it names.
    pub async fn resolve(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::MissingToken)?;
        let email = self.verify(token)?.sub;

        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            match find_user_by_email(&conn, &email)? {
                Some(user) => Ok(Identity {
                    user_id: user.id,
                    email: user.email,
                }),
                None => Err(AuthError::UnknownUser(email)),
            }
        })
        .await
        .map_err(|e| AuthError::Join(e.to_string()))?
    }
}
