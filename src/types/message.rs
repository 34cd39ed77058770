//! Message types
//!
//! Per-call inference request and result structures.

use serde::{Deserialize, Serialize};

use crate::types::config::DecodingParams;

/// Default cap on newly generated tokens
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

/// Which path produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Text generated by the model
    Model,
    /// Canned placeholder
    Fallback,
}

/// A single inference call
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Trimmed user message
    pub user_message: String,
    /// Cap on generated tokens (prompt tokens are not counted)
    pub max_new_tokens: u32,
    /// Sampling policy
    pub decoding: DecodingParams,
}

impl InferenceRequest {
    /// Create a request with the default token cap and decoding policy
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            decoding: DecodingParams::MEDGEMMA,
        }
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }
}

/// Response returned by the serving facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub text: String,
    pub source: ResponseSource,
}

impl InferenceResult {
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ResponseSource::Model,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ResponseSource::Fallback,
        }
    }
}
