//! Embedding provider abstraction and backend implementations.
//!
//! The indexing pipeline only ever needs text → vector conversion, so every
//! backend here implements [`EmbeddingProvider`] and nothing else.

pub mod any;
pub mod error;
pub mod http;
pub mod huggingface;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub(crate) mod retry;

pub use error::LlmError;
pub use provider::EmbeddingProvider;
