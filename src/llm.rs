//! Streaming chat-completion client.
//!
//! [`ChatCompletion`] is the seam between a conversation and the language
//! model. The production implementation, [`OpenAiCompatibleChat`], talks to
//! any `/chat/completions` endpoint that speaks the OpenAI streaming format
//! (server-sent events with `data: {...}` lines and a `data: [DONE]`
//! terminator). Fragments are delivered through an mpsc channel in arrival
//! order; an `Err` item means the stream broke part-way. An in-band error
//! event and a body that ends before `[DONE]` both count as broken.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::config::{ChatConfig, SamplingOverride};
use crate::error::PipelineError;
use crate::models::Message;

pub type FragmentReceiver = mpsc::Receiver<Result<String, PipelineError>>;

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    fn model_name(&self) -> &str;

    /// Start a streaming completion for `messages`.
    async fn stream(&self, messages: &[Message]) -> Result<FragmentReceiver, PipelineError>;

    /// Like [`ChatCompletion::stream`], with per-request sampling overrides.
    /// Backends without tunable sampling ignore them.
    async fn stream_with(
        &self,
        messages: &[Message],
        sampling: SamplingOverride,
    ) -> Result<FragmentReceiver, PipelineError> {
        let _ = sampling;
        self.stream(messages).await
    }
}

pub struct OpenAiCompatibleChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    temperature: f64,
    top_p: f64,
    max_tokens: u32,
}

impl OpenAiCompatibleChat {
    /// Build a client from config. The API key is read once from the
    /// environment variable named by `api_key_env`; a missing key is reported
    /// on the first request, not here.
    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; chat requests will fail until it is",
                config.api_key_env
            );
        }
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body(&self, messages: &[Message], sampling: SamplingOverride) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": sampling.temperature.unwrap_or(self.temperature),
            "top_p": sampling.top_p.unwrap_or(self.top_p),
            "max_tokens": self.max_tokens,
            "stream": true,
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompatibleChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, messages: &[Message]) -> Result<FragmentReceiver, PipelineError> {
        self.stream_with(messages, SamplingOverride::default()).await
    }

    async fn stream_with(
        &self,
        messages: &[Message],
        sampling: SamplingOverride,
    ) -> Result<FragmentReceiver, PipelineError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::Provider(format!("{} is not set", self.api_key_env))
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, sampling);

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::provider)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(PipelineError::Provider(format!(
                "chat completion error {}: {}",
                status, text
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut lines = SseLineBuffer::default();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        if !forward(&tx, lines.push(&bytes)).await {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(PipelineError::provider(e))).await;
                        return;
                    }
                }
            }
            if forward(&tx, lines.finish()).await {
                let _ = tx
                    .send(Err(PipelineError::Provider(
                        "stream ended before [DONE]".to_string(),
                    )))
                    .await;
            }
        });

        Ok(rx)
    }
}

/// Send parsed events to the receiver. Returns `false` once the stream is
/// finished: terminated, failed, or abandoned by the receiver.
async fn forward(
    tx: &mpsc::Sender<Result<String, PipelineError>>,
    events: Vec<SseEvent>,
) -> bool {
    for event in events {
        match event {
            SseEvent::Done => return false,
            SseEvent::Fragment(content) => {
                if tx.send(Ok(content)).await.is_err() {
                    return false;
                }
            }
            SseEvent::Error(message) => {
                let _ = tx.send(Err(PipelineError::Provider(message))).await;
                return false;
            }
        }
    }
    true
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Fragment(String),
    /// An in-band `{"error": ...}` payload.
    Error(String),
    Done,
}

/// Reassembles SSE lines that may be split across network chunks.
#[derive(Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(event) = parse_sse_line(String::from_utf8_lossy(&line).trim()) {
                let last = !matches!(event, SseEvent::Fragment(_));
                events.push(event);
                if last {
                    self.pending.clear();
                    break;
                }
            }
        }
        events
    }

    /// Parse whatever is left once the body ends without a final newline.
    fn finish(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.pending);
        parse_sse_line(String::from_utf8_lossy(&rest).trim())
            .into_iter()
            .collect()
    }
}

fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let json: Value = serde_json::from_str(data).ok()?;
    if let Some(error) = json.get("error") {
        let message = error["message"]
            .as_str()
            .or_else(|| error.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(SseEvent::Error(format!("provider error: {}", message)));
    }
    let content = json["choices"][0]["delta"]["content"].as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(SseEvent::Fragment(content.to_string()))
}
