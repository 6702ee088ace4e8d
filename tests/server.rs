//! HTTP sessions API, driven in-process through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use pdfchat::config::Config;
use pdfchat::pipeline::Pipeline;
use pdfchat::server::{router, AppState};
use pdfchat_core::embedding::Embedder;
use pdfchat_core::generation::{GenerateRequest, GenerateResponse, Generator};
use pdfchat_core::store::memory::InMemoryStore;
use pdfchat_core::store::VectorStore;

struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters-test"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                vec![
                    lower.matches("paris").count() as f32,
                    lower.matches("france").count() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

/// Echoes back the retrieved context as the answer.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo-test"
    }
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let text = if request.prompt.contains("Original question:") {
            "Where is the capital of France?".to_string()
        } else {
            request
                .prompt
                .split("Context:\n")
                .nth(1)
                .and_then(|rest| rest.split("\n\nQuestion:").next())
                .unwrap_or_default()
                .to_string()
        };
        Ok(GenerateResponse { text })
    }
}

fn app_with_store() -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::with_backends(
        Config::minimal(),
        store.clone(),
        Arc::new(LetterEmbedder),
        Arc::new(EchoGenerator),
    );
    (router(AppState::new(pipeline)), store)
}

fn app() -> Router {
    app_with_store().0
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_session(app: &Router) -> String {
    let (status, body) = call(app, Method::POST, "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "uninitialized");
    body["id"].as_str().unwrap().to_string()
}

fn upload(name: &str, text: &str) -> Value {
    json!({
        "name": name,
        "data_base64": base64::engine::general_purpose::STANDARD.encode(text),
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = app();
    let id = create_session(&app).await;

    // Not indexed yet.
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/ask", id),
        Some(json!({ "question": "What is the capital of France?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "index_not_ready");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/index", id),
        Some(json!({ "documents": [
            upload("france.txt", "The capital of France is Paris."),
            upload("cooking.md", "Boil the pasta for nine minutes."),
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["documents"], 2);
    assert_eq!(body["reused"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/ask", id),
        Some(json!({ "question": "What is the capital of France?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().contains("Paris"));

    let (status, body) = call(&app, Method::GET, &format!("/sessions/{}/messages", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["role"], "user");

    let (status, body) = call(&app, Method::DELETE, &format!("/sessions/{}/index", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "cleared");

    let (_, body) = call(&app, Method::GET, &format!("/sessions/{}/messages", id), None).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_question_is_bad_request() {
    let app = app();
    let id = create_session(&app).await;
    call(
        &app,
        Method::POST,
        &format!("/sessions/{}/index", id),
        Some(json!({ "documents": [upload("a.txt", "Paris")] })),
    )
    .await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/ask", id),
        Some(json!({ "question": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_index_without_documents_is_bad_request() {
    let app = app();
    let id = create_session(&app).await;
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/index", id),
        Some(json!({ "documents": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("at least one"));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::GET,
        "/sessions/00000000-0000-0000-0000-000000000000/messages",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_delete_session_forgets_it_and_its_collection() {
    let (app, store) = app_with_store();
    let id = create_session(&app).await;
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/sessions/{}/index", id),
        Some(json!({ "documents": [upload("france.txt", "The capital of France is Paris.")] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.list_collections().await.unwrap().len(), 1);

    let (status, _) = call(&app, Method::DELETE, &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(store.list_collections().await.unwrap().is_empty());

    let (status, _) = call(&app, Method::GET, &format!("/sessions/{}/messages", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::DELETE, &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_delete_unindexed_session() {
    let app = app();
    let id = create_session(&app).await;
    let (status, _) = call(&app, Method::DELETE, &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
