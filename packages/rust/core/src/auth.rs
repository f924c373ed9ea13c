//! Accounts and bearer tokens.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quizbank_shared::{AccessToken, AppConfig, QuizbankError, Result, User, validate_secret};
use quizbank_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// JWT payload. `sub` is the username.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

pub struct AuthService {
    storage: Arc<Storage>,
    secret: String,
    ttl: Duration,
}

impl AuthService {
    pub fn new(storage: Arc<Storage>, secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            storage,
            secret: secret.into(),
            ttl,
        }
    }

    /// Build from config; the signing secret comes from the configured env var.
    pub fn from_config(storage: Arc<Storage>, config: &AppConfig) -> Result<Self> {
        let secret = validate_secret(config)?;
        Ok(Self::new(
            storage,
            secret,
            Duration::minutes(config.auth.token_ttl_minutes),
        ))
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(QuizbankError::invalid_input(
                "Username and password must not be empty",
            ));
        }
        if self.storage.find_user_by_username(username).await?.is_some() {
            return Err(QuizbankError::DuplicateUsername);
        }

        let hashed = hash_password(password).await?;
        let user = self.storage.create_user(username, &hashed).await?;
        info!(user_id = user.id, "registered user");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken> {
        let Some(credentials) = self.storage.find_user_by_username(username).await? else {
            debug!("login for unknown user");
            return Err(QuizbankError::InvalidCredentials);
        };
        if !verify_password(password, &credentials.hashed_password).await? {
            debug!("login with wrong password");
            return Err(QuizbankError::InvalidCredentials);
        }
        Ok(AccessToken::bearer(self.issue_token(username)?))
    }

    /// Signed HS256 token for `username`, valid for the configured lifetime.
    pub fn issue_token(&self, username: &str) -> Result<String> {
        let claims = Claims {
            sub: username.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| QuizbankError::Internal(format!("failed to sign token: {e}")))
    }

    /// Resolve a bearer token to its user. Every failure is `Unauthorized`.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "rejected token");
            QuizbankError::Unauthorized
        })?
        .claims;

        match self.storage.find_user_by_username(&claims.sub).await {
            Ok(Some(credentials)) => Ok(credentials.user),
            Ok(None) => Err(QuizbankError::Unauthorized),
            Err(e) => {
                debug!(error = %e, "user lookup failed during authentication");
                Err(QuizbankError::Unauthorized)
            }
        }
    }
}

/// Hashing is CPU-bound, so it runs on the blocking pool.
async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| QuizbankError::Internal(format!("failed to hash password: {e}")))
    })
    .await
    .map_err(|e| QuizbankError::Internal(format!("hash task failed: {e}")))?
}

async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .map_err(|e| QuizbankError::Internal(format!("verify task failed: {e}")))
}
