//! LLM inference
//!
//! This module owns the model lifecycle and turns user messages into responses.

pub mod backend;
pub mod engine;
pub mod executor;
pub mod facade;
pub mod fallback;
pub mod llama;
pub mod model;
pub mod prompt;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use backend::{InferenceError, LanguageModel, LoadError, ModelLoader, TokenId};
pub use engine::ModelService;
pub use facade::{InferenceEngine, ServingFacade};
pub use llama::LlamaLoader;
pub use model::{validate_gguf, GgufMetadata, ModelError, GGUF_MAGIC};
