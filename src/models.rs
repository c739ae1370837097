//! Core data models that flow through the pipeline.
//!
//! Documents are loaded into [`DocumentUnit`]s, split into [`Chunk`]s, and
//! retrieved as [`ScoredChunk`]s. Conversations are ordered lists of
//! [`Message`]s.

use serde::{Deserialize, Serialize};

/// Raw text read from one source file. Discarded after chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUnit {
    pub source_path: String,
    pub raw_text: String,
}

/// A bounded text segment of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source_path: String,
    /// Character offset of the first character within the source document.
    pub offset: usize,
}

/// A chunk returned from the index along with its cosine distance to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Speaker of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in a conversation. Serializes to the OpenAI chat message shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
