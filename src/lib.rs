//! # Study Harness
//!
//! A retrieval-augmented study assistant over a local folder of course
//! material.
//!
//! Documents (PDF, markdown, plain text) are loaded, split into overlapping
//! chunks, embedded, and kept in an in-memory vector index. Each question is
//! answered by retrieving the closest chunks, composing a prompt for one of
//! several assistant policies (general, Socratic tutor, quiz generator,
//! course generator, plain), and streaming a completion from an
//! OpenAI-compatible chat endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker │──▶│ Vector index │   (startup / `study index`)
//! │ pdf/md/… │   │         │   │  + embedder  │
//! └──────────┘   └─────────┘   └──────┬───────┘
//!                                     │
//!     query ──▶ Retriever ──▶ Prompt ──▶ Session ──▶ Formatter ──▶ reply
//!                                        (chat completion, streamed)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export NVIDIA_API_KEY=...
//! study index                        # load, chunk and embed ./docs
//! study chat "What is a tensor core?"
//! study quiz "GPU memory hierarchy"
//! study serve                        # HTTP API on 127.0.0.1:5000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF and text extraction |
//! | [`loader`] | Document directory loading |
//! | [`chunk`] | Sliding-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index build, search and persistence |
//! | [`ingest`] | Index rebuild orchestration |
//! | [`retriever`] | Top-k context retrieval |
//! | [`prompt`] | Assistant policies and prompt composition |
//! | [`llm`] | Streaming chat-completion client |
//! | [`session`] | Conversation history |
//! | [`format`] | Reply formatting (HTML, quiz forms, markdown) |
//! | [`assistant`] | Per-request pipeline |
//! | [`server`] | HTTP server |

pub mod assistant;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod format;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod server;
pub mod session;
