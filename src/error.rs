//! Error taxonomy for the retrieval and chat pipeline.
//!
//! Only [`PipelineError::InputMissing`], [`PipelineError::Provider`] and
//! [`PipelineError::MalformedQuizOutput`] ever reach an HTTP caller. Loading
//! and indexing failures are logged where they happen and degrade retrieval
//! to an empty context instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No prompt or message was supplied.
    #[error("input missing: {0}")]
    InputMissing(String),

    /// A single source file could not be read or extracted.
    #[error("failed to load {}: {reason}", path.display())]
    DocumentLoad { path: PathBuf, reason: String },

    /// No documents have been indexed yet.
    #[error("no document index is available")]
    IndexUnavailable,

    /// The embedding or chat-completion service failed or was unreachable.
    #[error("provider failure: {0}")]
    Provider(String),

    /// The completion did not contain a parseable quiz document.
    #[error("malformed quiz output: {reason}")]
    MalformedQuizOutput { reason: String, raw: String },
}

impl PipelineError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Provider(err.to_string())
    }
}
