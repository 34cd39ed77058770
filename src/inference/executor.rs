//! Inference executor
//!
//! Runs one prompt through a [`LanguageModel`]: tokenizer setup, tokenization, sampling,
//! decoding of the new span and marker cleanup. Only the model worker calls into this
//! module, so at most one `run` is active at a time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::inference::backend::{
    EncodedPrompt, GenerationParams, InferenceError, LanguageModel, TokenId,
};
use crate::inference::prompt::{END_OF_TURN, EOS_MARKER};
use crate::types::config::{DecodingParams, MAX_CONTEXT_TOKENS};

/// Runs generation for `prompt`, capped at `max_new_tokens` new tokens
///
/// A panic inside the backend is caught and reported as [`InferenceError::Panicked`].
pub fn run(
    model: &mut dyn LanguageModel,
    prompt: &str,
    max_new_tokens: u32,
    decoding: DecodingParams,
) -> Result<String, InferenceError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        run_inner(model, prompt, max_new_tokens, decoding)
    }))
        .unwrap_or_else(|payload| Err(InferenceError::Panicked(panic_message(payload.as_ref()))))
}

fn run_inner(
    model: &mut dyn LanguageModel,
    prompt: &str,
    max_new_tokens: u32,
    decoding: DecodingParams,
) -> Result<String, InferenceError> {
    let pad_token = ensure_pad_token(model);

    let ids = model.tokenize(prompt)?;
    // Single sequence: padding to the longest is a no-op beyond building the mask
    let encoded = EncodedPrompt::new(ids, MAX_CONTEXT_TOKENS, 0, pad_token);
    if encoded.is_empty() {
        return Err(InferenceError::Tokenization("prompt produced no tokens".to_string()));
    }
    let input_len = encoded.len();

    let params = GenerationParams {
        max_new_tokens,
        decoding,
        eos_token: model.eos_token(),
        pad_token,
    };

    let output = model.generate(&encoded, &params)?;
    let generated = output.get(input_len..).unwrap_or(&[]);
    tracing::debug!(
        "Generated {} new tokens from {} prompt tokens",
        generated.len(),
        input_len
    );

    let text = model.decode(generated, true)?;
    let text = strip_markers(&text);
    tracing::info!("Generated response length: {}", text.chars().count());

    if text.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }
    Ok(text)
}

/// Defaults the pad token to EOS when the tokenizer has none
pub fn ensure_pad_token(model: &mut dyn LanguageModel) -> TokenId {
    match model.pad_token() {
        Some(pad) => pad,
        None => {
            let eos = model.eos_token();
            model.set_pad_token(eos);
            tracing::debug!("Tokenizer has no pad token, using EOS ({})", eos);
            eos
        }
    }
}

/// Removes residual turn and sequence markers plus surrounding whitespace
pub fn strip_markers(text: &str) -> String {
    let text = text.replace(END_OF_TURN, "");
    let text = text.trim().replace(EOS_MARKER, "");
    text.trim().to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
