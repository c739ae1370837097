//! HTTP tests against a spawned server with a scripted chat backend.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use study_harness::assistant::Assistant;
use study_harness::config::Config;
use study_harness::embedding::DisabledEmbedder;
use study_harness::error::PipelineError;
use study_harness::index::IndexHandle;
use study_harness::llm::{ChatCompletion, FragmentReceiver};
use study_harness::models::Message;
use study_harness::retriever::Retriever;
use study_harness::server;

// ─── Test chat backends ─────────────────────────────────────────────

/// Streams a fixed reply in two fragments.
struct CannedChat(&'static str);

#[async_trait]
impl ChatCompletion for CannedChat {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn stream(&self, _messages: &[Message]) -> Result<FragmentReceiver, PipelineError> {
        let (tx, rx) = mpsc::channel(4);
        let (head, tail) = self.0.split_at(self.0.len() / 2);
        tx.send(Ok(head.to_string())).await.unwrap();
        tx.send(Ok(tail.to_string())).await.unwrap();
        Ok(rx)
    }
}

struct DownChat;

#[async_trait]
impl ChatCompletion for DownChat {
    fn model_name(&self) -> &str {
        "down"
    }

    async fn stream(&self, _messages: &[Message]) -> Result<FragmentReceiver, PipelineError> {
        Err(PipelineError::Provider("connection refused".into()))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Start a server backed by `chat` and return its base URL.
async fn spawn_server(chat: Arc<dyn ChatCompletion>) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let mut cfg = Config::minimal();
    cfg.server.bind = format!("127.0.0.1:{}", port);

    let retriever = Retriever::new(Arc::new(DisabledEmbedder), IndexHandle::default(), 3);
    let assistant = Arc::new(Assistant::new(retriever, chat, Duration::from_secs(5)));

    let handle = tokio::spawn(async move {
        let _ = server::run_server(&cfg, assistant).await;
    });
    wait_for_server(port).await;
    (format!("http://127.0.0.1:{}", port), handle)
}

const QUIZ_REPLY: &str = r#"Preamble {"questions":[{"question":"Q1?","options":{"A":"x","B":"y","C":"z","D":"w"},"answer":"B"}]} trailing"#;

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("ok"))).await;
    let body: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    handle.abort();
}

#[tokio::test]
async fn test_chat_returns_br_formatted_response() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("first line\nsecond line"))).await;
    let client = reqwest::Client::new();

    for route in ["chat", "stochastic_chat"] {
        let resp = client
            .post(format!("{}/{}", base, route))
            .json(&serde_json::json!({ "message": "What is a warp?" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["response"], "first line<br>second line");
    }
    handle.abort();
}

#[tokio::test]
async fn test_missing_message_is_bad_request() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("unused"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/quiz", base))
        .json(&serde_json::json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    handle.abort();
}

#[tokio::test]
async fn test_non_json_body_uses_error_contract() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("unused"))).await;
    let client = reqwest::Client::new();

    for route in ["chat", "stochastic_chat", "quiz", "generate_course"] {
        let resp = client
            .post(format!("{}/{}", base, route))
            .header("content-type", "text/plain")
            .body("What is a warp?")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "route {}", route);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].as_str().is_some());
    }

    let resp = client
        .post(format!("{}/chat", base))
        .header("content-type", "application/json")
        .body("{\"message\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    handle.abort();
}

#[tokio::test]
async fn test_provider_failure_returns_sentinel_on_chat_routes() {
    let (base, handle) = spawn_server(Arc::new(DownChat)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({ "message": "hello" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["response"], "ERROR");

    let resp = client.get(format!("{}/ask/hello", base)).send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["response"], "ERROR");

    let resp = client
        .post(format!("{}/quiz", base))
        .json(&serde_json::json!({ "message": "GPUs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "provider_error");
    handle.abort();
}

#[tokio::test]
async fn test_quiz_returns_html_form() {
    let (base, handle) = spawn_server(Arc::new(CannedChat(QUIZ_REPLY))).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/quiz", base))
        .json(&serde_json::json!({ "message": "GPUs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert_eq!(html.matches("<fieldset>").count(), 1);
    assert_eq!(html.matches("type=\"radio\"").count(), 4);
    assert_eq!(html.matches("type=\"submit\"").count(), 1);
    handle.abort();
}

#[tokio::test]
async fn test_malformed_quiz_is_unprocessable() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("I'd rather not."))).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/quiz", base))
        .json(&serde_json::json!({ "message": "GPUs" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "malformed_quiz");
    handle.abort();
}

#[tokio::test]
async fn test_generate_course_returns_rendered_markdown() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("## Lesson 1\n\n**CUDA** basics"))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/generate_course", base))
        .json(&serde_json::json!({ "topic": "CUDA", "level": "beginner" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    let mark = body["mark"].as_str().unwrap();
    assert!(mark.contains("<h2>Lesson 1</h2>"));
    assert!(mark.contains("<strong>CUDA</strong>"));

    let resp = client
        .post(format!("{}/generate_course", base))
        .json(&serde_json::json!({ "level": "beginner" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    handle.abort();
}

#[tokio::test]
async fn test_ask_route() {
    let (base, handle) = spawn_server(Arc::new(CannedChat("Paris"))).await;
    let body: serde_json::Value = reqwest::get(format!("{}/ask/capital%20of%20France", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["response"], "Paris");
    handle.abort();
}
