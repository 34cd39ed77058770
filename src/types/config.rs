//! Configuration types
//!
//! Decoding policy and tokenizer limits shared by the inference path.

use serde::{Deserialize, Serialize};

/// Tokenizer truncation limit for prompts
pub const MAX_CONTEXT_TOKENS: usize = 2048;

/// Sampling parameters for text generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    /// Temperature for sampling (0.0 = greedy, higher = more random)
    pub temperature: f32,
    /// Top-p (nucleus) sampling parameter
    pub top_p: f32,
    /// Top-k sampling parameter
    pub top_k: u32,
    /// Repetition penalty
    pub repetition_penalty: f32,
}

impl DecodingParams {
    /// Fixed policy used for every chat request
    pub const MEDGEMMA: DecodingParams = DecodingParams {
        temperature: 0.7,
        top_p: 0.9,
        top_k: 40,
        repetition_penalty: 1.15,
    };
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self::MEDGEMMA
    }
}
