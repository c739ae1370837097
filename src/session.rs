//! One conversation with the language model.
//!
//! A session owns its history. The history starts with the policy's system
//! message and only grows by whole user/assistant pairs: a failed or
//! interrupted completion leaves it exactly as it was.

use std::time::Duration;

use uuid::Uuid;

use crate::config::SamplingOverride;
use crate::error::PipelineError;
use crate::llm::ChatCompletion;
use crate::models::Message;
use crate::prompt::PromptPolicy;

/// Response text the HTTP layer returns in place of a failed chat reply.
pub const FAILURE_SENTINEL: &str = "ERROR";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ConversationSession {
    id: Uuid,
    policy: PromptPolicy,
    history: Vec<Message>,
    timeout: Duration,
    sampling: SamplingOverride,
}

impl ConversationSession {
    pub fn new(policy: PromptPolicy) -> Self {
        let history = vec![Message::system(policy.system_prompt())];
        Self {
            id: Uuid::new_v4(),
            policy,
            history,
            timeout: DEFAULT_TIMEOUT,
            sampling: SamplingOverride::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingOverride) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn policy(&self) -> &PromptPolicy {
        &self.policy
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Stream `outgoing` through `chat` and return the concatenated reply.
    ///
    /// On success the last message of `outgoing` (the composed user message)
    /// and the reply are appended to history together.
    pub async fn send(
        &mut self,
        chat: &dyn ChatCompletion,
        outgoing: Vec<Message>,
    ) -> Result<String, PipelineError> {
        let user_message = outgoing
            .last()
            .cloned()
            .ok_or_else(|| PipelineError::InputMissing("no message to send".to_string()))?;

        let pending = collect_reply(chat, &outgoing, self.sampling);
        let reply = tokio::time::timeout(self.timeout, pending)
            .await
            .map_err(|_| {
                PipelineError::Provider(format!(
                    "timed out after {}s waiting for {}",
                    self.timeout.as_secs(),
                    chat.model_name()
                ))
            })??;

        tracing::debug!(
            session = %self.id,
            policy = self.policy.name(),
            "received {} chars",
            reply.len()
        );

        self.history.push(user_message);
        self.history.push(Message::assistant(reply.clone()));
        Ok(reply)
    }
}

async fn collect_reply(
    chat: &dyn ChatCompletion,
    outgoing: &[Message],
    sampling: SamplingOverride,
) -> Result<String, PipelineError> {
    let mut rx = chat.stream_with(outgoing, sampling).await?;
    let mut reply = String::new();
    while let Some(fragment) = rx.recv().await {
        reply.push_str(&fragment?);
    }
    Ok(reply)
}
