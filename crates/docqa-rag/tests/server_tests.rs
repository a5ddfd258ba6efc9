//! HTTP API tests against the router with deterministic providers

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::Harness;
use docqa_rag::server::{state::AppState, RagServer};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "docqa-test-boundary";

fn app(harness: &Harness) -> Router {
    let state = AppState::with_providers(
        harness.config.clone(),
        harness.embedder.clone(),
        harness.llm.clone(),
    );
    RagServer::with_state(state).router()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

fn upload_request(uri: &str, files: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send(app, empty_request(Method::POST, "/api/sessions")).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_info() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&Harness::new(dir.path()));

    let (status, body) = send(&app, empty_request(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));

    let (status, body) = send(&app, empty_request(Method::GET, "/api/info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "docqa-rag");
}

#[tokio::test]
async fn test_question_answer_flow() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let app = app(&harness);

    let id = create_session(&app).await;
    let (_, body) = send(&app, empty_request(Method::GET, &format!("/api/sessions/{id}"))).await;
    assert_eq!(body["state"], "uninitialized");

    let (status, body) = send(
        &app,
        upload_request(
            &format!("/api/sessions/{id}/ingest"),
            &[("refunds.txt", "Refunds are issued within thirty days.")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["state"], "indexed");
    assert_eq!(body["total_chunks"], 1);
    assert_eq!(body["documents"][0]["source_name"], "refunds.txt");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/initialize"),
            json!({ "temperature": 0.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["state"], "ready");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/ask"),
            json!({ "question": "When are refunds issued?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["answer"], "Answer from gpt-4o-mini [1]");
    assert_eq!(body["sources"][0]["index"], 1);
    assert_eq!(body["sources"][0]["source_name"], "refunds.txt");
    assert_eq!(body["sources"][0]["page"], 1);

    let (_, body) = send(&app, empty_request(Method::GET, &format!("/api/sessions/{id}/history"))).await;
    let turns = body["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[1]["role"], "assistant");
    assert_eq!(turns[1]["sources"][0]["source_name"], "refunds.txt");

    let (status, body) =
        send(&app, empty_request(Method::DELETE, &format!("/api/sessions/{id}/memory"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["turns"], 0);
    assert_eq!(body["state"], "ready");
}

#[tokio::test]
async fn test_ask_before_initialize_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let app = app(&harness);
    let id = create_session(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/ask"),
            json!({ "question": "Anything?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "not_ready");
    assert_eq!(body["error"]["stage"], "session");
    assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn test_initialize_without_any_index_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&Harness::new(&dir.path().join("empty")));
    let id = create_session(&app).await;

    let (status, body) = send(
        &app,
        json_request(Method::POST, &format!("/api/sessions/{id}/initialize"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_request_validation() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&Harness::new(dir.path()));
    let id = create_session(&app).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/ask"),
            json!({ "question": "   " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "config_error");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/initialize"),
            json!({ "temperature": 5.0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&Harness::new(dir.path()));

    let missing = uuid::Uuid::new_v4();
    let (status, body) =
        send(&app, empty_request(Method::GET, &format!("/api/sessions/{missing}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "unknown_session");

    let id = create_session(&app).await;
    let (status, _) = send(&app, empty_request(Method::DELETE, &format!("/api/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, empty_request(Method::GET, &format!("/api/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn folder_request(id: &str, path: &str) -> Request<Body> {
    json_request(
        Method::POST,
        &format!("/api/sessions/{id}/ingest/folder"),
        json!({ "path": path }),
    )
}

#[tokio::test]
async fn test_folder_ingestion_reports_missing_folder() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::new(&dir.path().join("index"));
    harness.config.ingestion.folder_root = Some(dir.path().to_path_buf());
    let app = app(&harness);
    let id = create_session(&app).await;

    let (status, body) = send(&app, folder_request(&id, "nowhere")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["stage"], "load");
}

#[tokio::test]
async fn test_folder_ingestion_stays_inside_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("shared");
    std::fs::create_dir_all(root.join("policies")).unwrap();
    std::fs::write(root.join("policies/refunds.txt"), "Refunds are issued within thirty days.").unwrap();
    std::fs::create_dir(dir.path().join("private")).unwrap();
    std::fs::write(dir.path().join("private/salaries.txt"), "Confidential figures.").unwrap();

    let mut harness = Harness::new(&dir.path().join("index"));
    harness.config.ingestion.folder_root = Some(root.clone());
    let app = app(&harness);
    let id = create_session(&app).await;

    for escape in [
        "../private".to_string(),
        dir.path().join("private").display().to_string(),
        "/".to_string(),
    ] {
        let (status, body) = send(&app, folder_request(&id, &escape)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{escape}");
        assert_eq!(body["error"]["type"], "forbidden");
    }
    assert!(!harness.store().exists());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/ingest/folder"),
            json!({ "path": "policies", "extensions": ["txt"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["documents"][0]["source_name"], "refunds.txt");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/sessions/{id}/ingest/folder"),
            json!({ "path": "policies", "extensions": ["sh"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_folder_ingestion_disabled_without_root() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&Harness::new(dir.path()));
    let id = create_session(&app).await;

    let (status, body) = send(&app, folder_request(&id, &dir.path().display().to_string())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["stage"], "config");
}

#[tokio::test]
async fn test_models_listing() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let app = app(&harness);

    let (status, body) = send(&app, empty_request(Method::GET, "/api/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "scripted");
    assert_eq!(body["default_model"], "gpt-4o-mini");
    assert_eq!(body["models"], json!(["gpt-4o", "gpt-4o-mini"]));

    harness.llm.set_failing(true);
    let (status, body) = send(&app, empty_request(Method::GET, "/api/models")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "synthesis_error");
}
