//! Route handlers.

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartError},
    routing::{delete, get, post},
};
use quizbank_core::{ArchiveUpload, UploadedFile, pair_uploads};
use quizbank_shared::{AccessToken, QuizbankError};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{AppState, error::AppError, extractors::AuthUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register))
        .route("/login/", post(login))
        .route("/upload/", post(upload_files))
        .route("/upload/zip/", post(upload_zip))
        .route("/questions/", get(questions_by_category))
        .route("/questions/by-user/", get(questions_by_user))
        .route("/delete-all-questions/", delete(delete_all_questions))
        .route("/delete-my-questions/", delete(delete_my_questions))
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Value>, AppError> {
    state.auth.register(&body.username, &body.password).await?;
    Ok(Json(json!({ "message": "User registered successfully" })))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<AccessToken>, AppError> {
    let token = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(token))
}

/// Several archives with parallel `categories` and `subjects` lists.
async fn upload_files(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = UploadForm::read(multipart).await?;
    let uploads = pair_uploads(form.files, form.categories, form.subjects)?;
    info!(user = %user.username, archives = uploads.len(), "upload received");

    let questions = state
        .ingestor
        .upload_and_store(&uploads, user.id, state.storage.as_ref())
        .await?;

    Ok(Json(json!({
        "message": "Files uploaded successfully",
        "questions": questions,
    })))
}

/// A single archive with one `category` and one `subject`.
async fn upload_zip(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let form = UploadForm::read(multipart).await?;
    let upload = ArchiveUpload {
        file: single(form.files, "file")?,
        category: single(form.categories, "category")?,
        subject: single(form.subjects, "subject")?,
    };
    info!(user = %user.username, archive = %upload.file.file_name, "upload received");

    let questions = state
        .ingestor
        .upload_and_store(std::slice::from_ref(&upload), user.id, state.storage.as_ref())
        .await?;

    Ok(Json(json!({ "questions": questions })))
}

async fn questions_by_category(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let grouped = state.storage.questions_grouped_by_category().await?;
    Ok(Json(json!({ "data": grouped })))
}

async fn questions_by_user(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let grouped = state.storage.questions_grouped_by_owner().await?;
    Ok(Json(json!(grouped)))
}

async fn delete_all_questions(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let deleted = state.storage.delete_all_questions().await?;
    info!(deleted, "deleted all questions");
    Ok(Json(json!({
        "message": "All questions have been deleted successfully",
        "deleted": deleted,
    })))
}

async fn delete_my_questions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.storage.delete_questions_by_user(user.id).await?;
    info!(user = %user.username, deleted, "deleted own questions");
    Ok(Json(json!({
        "message": format!("{deleted} questions deleted successfully"),
        "username": user.username,
    })))
}

// ---------------------------------------------------------------------------
// Multipart
// ---------------------------------------------------------------------------

/// Upload form fields, accepting both the plural and singular field names.
#[derive(Default)]
struct UploadForm {
    files: Vec<UploadedFile>,
    categories: Vec<String>,
    subjects: Vec<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "files" | "file" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(bad_multipart)?;
                    form.files.push(UploadedFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                "categories" | "category" => {
                    form.categories.push(field.text().await.map_err(bad_multipart)?);
                }
                "subjects" | "subject" => {
                    form.subjects.push(field.text().await.map_err(bad_multipart)?);
                }
                other => debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

fn bad_multipart(err: MultipartError) -> AppError {
    QuizbankError::invalid_input(format!("failed to read upload form: {}", err.body_text())).into()
}

/// The only value of a form field that must appear exactly once.
fn single<T>(values: Vec<T>, field: &str) -> Result<T, AppError> {
    let count = values.len();
    let mut values = values.into_iter();
    match (values.next(), count) {
        (Some(value), 1) => Ok(value),
        (None, _) => Err(QuizbankError::invalid_input(format!("missing form field: {field}")).into()),
        _ => Err(QuizbankError::invalid_input(format!(
            "form field {field} must appear exactly once, got {count}"
        ))
        .into()),
    }
}
