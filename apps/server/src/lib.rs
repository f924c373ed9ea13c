//! HTTP API for quizbank.
//!
//! Exposes registration, login, archive upload, listing, and deletion over
//! axum. [`router`] is shared by the `quizbank serve` binary and the
//! integration tests.

#![recursion_limit = "256"]

pub mod error;
pub mod extractors;
pub mod handlers;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use quizbank_core::{AuthService, ImageBackend, Ingestor};
use quizbank_storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub auth: Arc<AuthService>,
    pub ingestor: Arc<Ingestor<ImageBackend>>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    handlers::routes()
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}
