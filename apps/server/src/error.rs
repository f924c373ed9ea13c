//! Mapping of domain errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quizbank_shared::{ErrorKind, QuizbankError};
use serde_json::json;

/// Handler error. Renders as `{"detail": "..."}` with a status picked from
/// the error's [`ErrorKind`].
#[derive(Debug)]
pub struct AppError(pub QuizbankError);

impl From<QuizbankError> for AppError {
    fn from(err: QuizbankError) -> Self {
        Self(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Storage | ErrorKind::Persistence | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }

        let mut response = (status, Json(json!({ "detail": self.0.to_string() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
