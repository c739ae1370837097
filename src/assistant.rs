//! The per-request pipeline: retrieve, compose, complete, format.
//!
//! An [`Assistant`] is built once at startup and shared by every request.
//! Each call opens a fresh [`ConversationSession`], so no history is carried
//! between requests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::Instrument;

use crate::config::SamplingOverride;
use crate::error::PipelineError;
use crate::format;
use crate::llm::ChatCompletion;
use crate::prompt::{self, CourseParams, PromptPolicy};
use crate::retriever::Retriever;
use crate::session::ConversationSession;

#[derive(Clone)]
pub struct Assistant {
    retriever: Retriever,
    chat: Arc<dyn ChatCompletion>,
    timeout: Duration,
    sampling: BTreeMap<String, SamplingOverride>,
}

impl Assistant {
    pub fn new(retriever: Retriever, chat: Arc<dyn ChatCompletion>, timeout: Duration) -> Self {
        Self {
            retriever,
            chat,
            timeout,
            sampling: BTreeMap::new(),
        }
    }

    /// Per-policy sampling overrides, keyed by [`PromptPolicy::name`].
    pub fn with_sampling(mut self, sampling: BTreeMap<String, SamplingOverride>) -> Self {
        self.sampling = sampling;
        self
    }

    /// Raw completion text for one user turn under `policy`.
    pub async fn reply(&self, policy: PromptPolicy, user_text: &str) -> Result<String, PipelineError> {
        let mut rng = StdRng::from_os_rng();
        self.reply_with_rng(policy, user_text, &mut rng).await
    }

    pub async fn reply_with_rng<R>(
        &self,
        policy: PromptPolicy,
        user_text: &str,
        rng: &mut R,
    ) -> Result<String, PipelineError>
    where
        R: Rng + Send + ?Sized,
    {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(PipelineError::InputMissing(
                "no message provided".to_string(),
            ));
        }

        let context = if policy.uses_context() {
            self.retriever.retrieve(user_text).await
        } else {
            Vec::new()
        };

        let sampling = self.sampling.get(policy.name()).copied().unwrap_or_default();
        let mut session = ConversationSession::new(policy)
            .with_timeout(self.timeout)
            .with_sampling(sampling);
        let span = tracing::info_span!(
            "turn",
            session = %session.id(),
            policy = session.policy().name()
        );
        span.in_scope(|| tracing::debug!("{} context chunks", context.len()));

        let outgoing = prompt::compose(
            session.policy(),
            session.history(),
            user_text,
            &context,
            rng,
        );
        session
            .send(self.chat.as_ref(), outgoing)
            .instrument(span)
            .await
    }

    /// Document-grounded answer with `<br>` line breaks.
    pub async fn chat(&self, message: &str) -> Result<String, PipelineError> {
        let reply = self.reply(PromptPolicy::General, message).await?;
        Ok(format::html_line_breaks(&reply))
    }

    /// Socratic guidance with `<br>` line breaks.
    pub async fn socratic(&self, message: &str) -> Result<String, PipelineError> {
        let reply = self.reply(PromptPolicy::Socratic, message).await?;
        Ok(format::html_line_breaks(&reply))
    }

    /// One-shot answer with no document context.
    pub async fn ask(&self, prompt: &str) -> Result<String, PipelineError> {
        let reply = self.reply(PromptPolicy::Plain, prompt).await?;
        Ok(format::html_line_breaks(&reply))
    }

    /// A ten-question quiz on `topic`, rendered as an HTML form.
    pub async fn quiz(&self, topic: &str) -> Result<String, PipelineError> {
        let reply = self.reply(PromptPolicy::Quiz, topic).await?;
        let doc = format::parse_quiz(&reply)?;
        tracing::info!("generated quiz with {} questions", doc.questions.len());
        Ok(format::render_quiz_form(&doc))
    }

    /// A course outline on `topic`, rendered from markdown to HTML.
    pub async fn course(&self, topic: &str, params: CourseParams) -> Result<String, PipelineError> {
        let reply = self.reply(PromptPolicy::Course(params), topic).await?;
        Ok(format::render_markdown(&reply))
    }
}
