use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use quizbank_shared::{QuizbankError, User};

use crate::{AppState, error::AppError};

/// The caller identified by an `Authorization: Bearer <token>` header.
/// Rejects with 401 when the header is missing or the token does not check out.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(QuizbankError::Unauthorized)?;

        let user = state.auth.authenticate(token).await?;
        Ok(AuthUser(user))
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
