use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use quizbank_core::{AuthService, ImageBackend, Ingestor, LocalImageStore};
use quizbank_server::{AppState, router};
use quizbank_shared::ExtractorConfig;
use quizbank_storage::Storage;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

const QUIZ_HTML: &str = include_str!("../../../fixtures/html/quiz.fixture.html");
const BOUNDARY: &str = "quizbank-test-boundary";

struct TestApp {
    router: Router,
    storage: Arc<Storage>,
    root: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

async fn app() -> TestApp {
    let root = std::env::temp_dir().join(format!("quizbank_api_test_{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("create test root");

    let storage = Arc::new(
        Storage::open(&root.join("quizbank.db"))
            .await
            .expect("open test database"),
    );
    let auth = AuthService::new(storage.clone(), "test-secret", chrono::Duration::minutes(30));
    let store = ImageBackend::Local(LocalImageStore::new(
        root.join("served"),
        Url::parse("http://localhost:8000/static/").expect("valid url"),
    ));
    let ingestor = Ingestor::new(store, root.join("work"), ExtractorConfig::default(), "images");

    let router = router(AppState {
        storage: storage.clone(),
        auth: Arc::new(auth),
        ingestor: Arc::new(ingestor),
        max_upload_bytes: 10 * 1024 * 1024,
    });
    TestApp {
        router,
        storage,
        root,
    }
}

fn quiz_zip(with_image: bool) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("quiz/quiz.html", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(QUIZ_HTML.as_bytes()).unwrap();
    if with_image {
        writer
            .start_file("quiz/images/image1.png", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"\x89PNG fake").unwrap();
    }
    writer.finish().unwrap().into_inner()
}

enum Part {
    Text(&'static str, &'static str),
    File(&'static str, &'static str, Vec<u8>),
}

fn multipart(parts: Vec<Part>) -> Body {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/zip\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request build should succeed")
}

fn upload_request(uri: &str, token: Option<&str>, parts: Vec<Part>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(multipart(parts))
        .expect("request build should succeed")
}

fn bare_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::empty())
        .expect("request build should succeed")
}

async fn register_and_login(app: &TestApp, username: &str) -> String {
    let creds = json!({ "username": username, "password": "pw-123" });
    let (status, _) = send(app, json_request(Method::POST, "/register/", creds.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(app, json_request(Method::POST, "/login/", creds)).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"]
        .as_str()
        .expect("token in login response")
        .to_string()
}

#[tokio::test]
async fn register_twice_is_rejected() {
    let app = app().await;
    let creds = json!({ "username": "alice", "password": "pw" });

    let (status, body) = send(&app, json_request(Method::POST, "/register/", creds.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User registered successfully");

    let (status, body) = send(&app, json_request(Method::POST, "/register/", creds)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Username already registered");
}

#[tokio::test]
async fn login_failures_share_one_message() {
    let app = app().await;
    register_and_login(&app, "bob").await;

    let wrong = json!({ "username": "bob", "password": "nope" });
    let (status, body) = send(&app, json_request(Method::POST, "/login/", wrong)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid credentials");

    let unknown = json!({ "username": "nobody", "password": "pw-123" });
    let (status, body) = send(&app, json_request(Method::POST, "/login/", unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid credentials");
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app().await;

    let cases = [
        upload_request("/upload/", None, vec![]),
        upload_request("/upload/zip/", Some("garbage"), vec![]),
        bare_request(Method::DELETE, "/delete-my-questions/", None),
        bare_request(Method::DELETE, "/delete-my-questions/", Some("not.a.jwt")),
    ];
    for request in cases {
        let uri = request.uri().to_string();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "expected 401 for {uri}");
        assert_eq!(body["detail"], "Invalid authentication credentials");
    }
}

#[tokio::test]
async fn batch_upload_then_list_and_delete() {
    let app = app().await;
    let token = register_and_login(&app, "carol").await;

    let request = upload_request(
        "/upload/",
        Some(&token),
        vec![
            Part::File("files", "math.zip", quiz_zip(true)),
            Part::File("files", "geometry.zip", quiz_zip(true)),
            Part::Text("categories", "math"),
            Part::Text("categories", "geometry"),
            Part::Text("subjects", "unit 1"),
            Part::Text("subjects", "unit 2"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Files uploaded successfully");
    let questions = body["questions"].as_array().expect("questions array");
    assert_eq!(questions.len(), 6);
    assert_eq!(questions[0]["text"], "1. What is 2+2?");
    assert_eq!(questions[0]["true_answer"], "B");
    assert_eq!(
        questions[1]["image"],
        "http://localhost:8000/static/images/image1.png"
    );
    assert!(app.root.join("served/images/image1.png").is_file());

    let (status, body) = send(&app, bare_request(Method::GET, "/questions/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["math"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["geometry"][0]["subject"], "unit 2");
    assert!(body["data"]["math"][0].get("user_id").is_none());

    let (status, body) = send(&app, bare_request(Method::GET, "/questions/by-user/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["carol"].as_array().unwrap().len(), 6);

    let (status, body) = send(
        &app,
        bare_request(Method::DELETE, "/delete-my-questions/", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "6 questions deleted successfully");
    assert_eq!(body["username"], "carol");
    assert!(app.storage.list_questions().await.unwrap().is_empty());

    let work = std::fs::read_dir(app.root.join("work")).unwrap().count();
    assert_eq!(work, 0, "scratch files must be cleaned up");
}

#[tokio::test]
async fn single_zip_upload_is_stored() {
    let app = app().await;
    let token = register_and_login(&app, "dave").await;

    let request = upload_request(
        "/upload/zip/",
        Some(&token),
        vec![
            Part::File("file", "quiz.zip", quiz_zip(true)),
            Part::Text("category", "math"),
            Part::Text("subject", "arithmetic"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["questions"].as_array().unwrap().len(), 3);

    let stored = app.storage.list_questions().await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|q| q.category == "math" && q.subject == "arithmetic"));

    let (status, body) = send(&app, bare_request(Method::DELETE, "/delete-all-questions/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 3);
}

#[tokio::test]
async fn single_zip_upload_rejects_repeated_fields() {
    let app = app().await;
    let token = register_and_login(&app, "dora").await;

    let cases = [
        (
            vec![
                Part::File("file", "a.zip", quiz_zip(true)),
                Part::File("file", "b.zip", quiz_zip(true)),
                Part::Text("category", "math"),
                Part::Text("subject", "arithmetic"),
            ],
            "form field file must appear exactly once, got 2",
        ),
        (
            vec![
                Part::File("file", "a.zip", quiz_zip(true)),
                Part::Text("category", "math"),
                Part::Text("category", "history"),
                Part::Text("subject", "arithmetic"),
            ],
            "form field category must appear exactly once, got 2",
        ),
        (
            vec![
                Part::File("file", "a.zip", quiz_zip(true)),
                Part::Text("category", "math"),
            ],
            "missing form field: subject",
        ),
    ];

    for (parts, detail) in cases {
        let (status, body) = send(&app, upload_request("/upload/zip/", Some(&token), parts)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], detail);
    }
    assert!(app.storage.list_questions().await.unwrap().is_empty());
}

#[tokio::test]
async fn mismatched_lists_are_rejected_before_processing() {
    let app = app().await;
    let token = register_and_login(&app, "erin").await;

    let request = upload_request(
        "/upload/",
        Some(&token),
        vec![
            Part::File("files", "a.zip", quiz_zip(true)),
            Part::File("files", "b.zip", quiz_zip(true)),
            Part::Text("categories", "math"),
            Part::Text("subjects", "unit 1"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        "The number of files, categories, and subjects must match."
    );
    assert!(app.storage.list_questions().await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_file_type_is_rejected() {
    let app = app().await;
    let token = register_and_login(&app, "frank").await;

    let request = upload_request(
        "/upload/zip/",
        Some(&token),
        vec![
            Part::File("file", "quiz.tar", quiz_zip(true)),
            Part::Text("category", "math"),
            Part::Text("subject", "arithmetic"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid file type: quiz.tar. Please upload ZIP files.");
}

#[tokio::test]
async fn missing_image_fails_without_persisting() {
    let app = app().await;
    let token = register_and_login(&app, "grace").await;

    let request = upload_request(
        "/upload/",
        Some(&token),
        vec![
            Part::File("files", "good.zip", quiz_zip(true)),
            Part::File("files", "broken.zip", quiz_zip(false)),
            Part::Text("categories", "math"),
            Part::Text("categories", "math"),
            Part::Text("subjects", "s"),
            Part::Text("subjects", "s"),
        ],
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Image file not found: images/image1.png");
    assert!(app.storage.list_questions().await.unwrap().is_empty());

    let work = std::fs::read_dir(app.root.join("work")).unwrap().count();
    assert_eq!(work, 0, "scratch files must be cleaned up on failure");
}
