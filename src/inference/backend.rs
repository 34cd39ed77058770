//! Backend abstraction
//!
//! The executor drives a model through [`LanguageModel`]; the worker thread builds one
//! through a [`ModelLoader`]. llama.cpp implements both in [`crate::inference::llama`].

use thiserror::Error;

use crate::inference::model::ModelError;
use crate::storage::huggingface::DownloadError;
use crate::types::config::DecodingParams;
use crate::types::model::LoadedModelInfo;

/// Vocabulary id of a single token
pub type TokenId = i32;

/// Errors that leave the model unloaded
#[derive(Debug, Error, Clone)]
pub enum LoadError {
    #[error("Failed to fetch model artifact: {0}")]
    Fetch(String),

    #[error("Incompatible model artifact: {0}")]
    Incompatible(String),

    #[error("Failed to initialize backend: {0}")]
    BackendInit(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Worker thread error: {0}")]
    Worker(String),
}

impl From<ModelError> for LoadError {
    fn from(e: ModelError) -> Self {
        LoadError::Incompatible(e.to_string())
    }
}

impl From<DownloadError> for LoadError {
    fn from(e: DownloadError) -> Self {
        LoadError::Fetch(e.to_string())
    }
}

/// Errors from a single inference call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("No model loaded")]
    NotReady,

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Decoding failed: {0}")]
    Decoding(String),

    #[error("Model produced an empty response")]
    EmptyOutput,

    #[error("Backend panicked: {0}")]
    Panicked(String),

    #[error("Worker thread error: {0}")]
    Worker(String),
}

/// Tokenized prompt after truncation and padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPrompt {
    pub input_ids: Vec<TokenId>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<u8>,
}

impl EncodedPrompt {
    /// Truncates to `max_len` keeping the head, then pads to `pad_to` with `pad_token`
    pub fn new(mut ids: Vec<TokenId>, max_len: usize, pad_to: usize, pad_token: TokenId) -> Self {
        ids.truncate(max_len);
        let real = ids.len();
        let target = pad_to.min(max_len).max(real);

        let mut attention_mask = vec![1u8; real];
        ids.resize(target, pad_token);
        attention_mask.resize(target, 0);

        Self {
            input_ids: ids,
            attention_mask,
        }
    }

    /// Number of positions, padding included
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Tokens the model should attend to
    pub fn attended_tokens(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.input_ids
            .iter()
            .zip(&self.attention_mask)
            .filter(|(_, mask)| **mask == 1)
            .map(|(id, _)| *id)
    }
}

/// Everything a single `generate` call needs besides the prompt
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Cap on newly generated tokens
    pub max_new_tokens: u32,
    /// Sampling policy; a zero temperature means greedy decoding
    pub decoding: DecodingParams,
    pub eos_token: TokenId,
    pub pad_token: TokenId,
}

/// A loaded generative model and its tokenizer
///
/// Implementations are driven from the worker thread only and need not be `Send`.
pub trait LanguageModel {
    /// Metadata captured at load time
    fn info(&self) -> LoadedModelInfo;

    fn eos_token(&self) -> TokenId;

    /// Configured padding token, if any
    fn pad_token(&self) -> Option<TokenId>;

    fn set_pad_token(&mut self, token: TokenId);

    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, InferenceError>;

    /// Runs autoregressive generation
    ///
    /// Returns the prompt positions followed by the newly generated tokens.
    fn generate(
        &mut self,
        prompt: &EncodedPrompt,
        params: &GenerationParams,
    ) -> Result<Vec<TokenId>, InferenceError>;

    fn decode(&self, tokens: &[TokenId], skip_special_tokens: bool)
        -> Result<String, InferenceError>;
}

/// Builds a [`LanguageModel`] on the worker thread
pub trait ModelLoader: Send + 'static {
    /// Name reported while the model is loaded
    fn display_name(&self) -> String;

    fn load(&self) -> Result<Box<dyn LanguageModel>, LoadError>;
}
