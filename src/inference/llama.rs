//! llama.cpp backend
//!
//! Loads the GGUF artifact through `llama-cpp-2` with every layer on the CPU and runs
//! sampling with the fixed decoding policy.
//!
//! llama-cpp-2 contexts hold raw pointers and are not `Send`. The model lives on the
//! worker thread that created it and a fresh context is built for every generation.

use std::num::NonZeroU32;
use std::path::PathBuf;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;

use crate::inference::backend::{
    EncodedPrompt, GenerationParams, InferenceError, LanguageModel, LoadError, ModelLoader,
    TokenId,
};
use crate::inference::model::validate_gguf;
use crate::storage::huggingface::fetch_artifact;
use crate::storage::settings::ServerSettings;
use crate::types::config::DecodingParams;
use crate::types::model::{LoadedModelInfo, ModelArtifact, MODEL_DISPLAY_NAME};

/// Smallest decode batch handed to llama.cpp
const MIN_BATCH: usize = 512;

/// Loader for the fixed GGUF artifact
pub struct LlamaLoader {
    artifact: ModelArtifact,
    models_dir: PathBuf,
    context_size: u32,
    threads: u32,
}

impl LlamaLoader {
    pub fn new(settings: &ServerSettings) -> Self {
        Self {
            artifact: settings.model.clone(),
            models_dir: settings.models_directory.clone(),
            context_size: settings.context_size,
            threads: settings.threads,
        }
    }

    /// Fetches the artifact on a private runtime; the worker thread has none
    fn fetch(&self) -> Result<PathBuf, LoadError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LoadError::Fetch(e.to_string()))?;
        Ok(runtime.block_on(fetch_artifact(&self.artifact, &self.models_dir))?)
    }
}

impl ModelLoader for LlamaLoader {
    fn display_name(&self) -> String {
        MODEL_DISPLAY_NAME.to_string()
    }

    fn load(&self) -> Result<Box<dyn LanguageModel>, LoadError> {
        tracing::info!(
            "Loading {} ({})... This may take a few minutes.",
            MODEL_DISPLAY_NAME,
            self.artifact.identifier()
        );

        let path = self.fetch()?;
        let metadata = validate_gguf(&path)?;
        tracing::debug!(
            "GGUF v{} with {} tensors at {:?}",
            metadata.version,
            metadata.tensor_count,
            path
        );

        let backend = LlamaBackend::init().map_err(|e| LoadError::BackendInit(e.to_string()))?;

        // Accelerator offload is unstable for this artifact: keep every layer on the CPU
        tracing::info!("Using CPU for stable inference");
        let model_params = LlamaModelParams::default().with_n_gpu_layers(0);
        let model = LlamaModel::load_from_file(&backend, &path, &model_params)
            .map_err(|e| LoadError::ModelLoad(e.to_string()))?;

        let info = LoadedModelInfo {
            name: MODEL_DISPLAY_NAME.to_string(),
            path: path.to_string_lossy().to_string(),
            vocab_size: model.n_vocab(),
            context_length: model.n_ctx_train(),
            param_count: model.n_params() as u64,
            size_bytes: model.size() as u64,
        };

        tracing::info!(
            "Model info extracted: {} ({} params, {} vocab, {} ctx)",
            info.path,
            info.param_count,
            info.vocab_size,
            info.context_length
        );

        Ok(Box::new(LlamaLanguageModel {
            model,
            backend,
            info,
            pad_token: None,
            context_size: self.context_size,
            threads: self.threads,
        }))
    }
}

/// A GGUF model loaded into llama.cpp
///
/// `model` is declared before `backend` so it is dropped first.
pub struct LlamaLanguageModel {
    model: LlamaModel,
    backend: LlamaBackend,
    info: LoadedModelInfo,
    pad_token: Option<TokenId>,
    context_size: u32,
    threads: u32,
}

impl LlamaLanguageModel {
    fn context_params(&self, n_ctx: u32, n_batch: u32) -> LlamaContextParams {
        let mut params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(n_ctx))
            .with_n_batch(n_batch);
        if self.threads > 0 {
            params = params
                .with_n_threads(self.threads as i32)
                .with_n_threads_batch(self.threads as i32);
        }
        params
    }

}

/// One step of the sampler chain
#[derive(Debug, Clone, PartialEq)]
enum SamplerStage {
    Penalties { last_n: i32, repeat: f32 },
    Temperature(f32),
    TopK(i32),
    TopP(f32),
    Distribution,
    Greedy,
}

/// Sampler chain for `decoding`
///
/// The penalty window spans the whole context so prompt tokens are penalized too.
/// Temperature scales the logits before the top-k and top-p cuts.
fn sampling_plan(decoding: &DecodingParams, penalty_window: u32) -> Vec<SamplerStage> {
    let mut plan = vec![SamplerStage::Penalties {
        last_n: i32::try_from(penalty_window).unwrap_or(i32::MAX),
        repeat: decoding.repetition_penalty,
    }];
    if decoding.temperature <= 0.0 {
        plan.push(SamplerStage::Greedy);
        return plan;
    }
    plan.extend([
        SamplerStage::Temperature(decoding.temperature),
        SamplerStage::TopK(decoding.top_k as i32),
        SamplerStage::TopP(decoding.top_p),
        SamplerStage::Distribution,
    ]);
    plan
}

fn build_sampler(plan: &[SamplerStage]) -> LlamaSampler {
    LlamaSampler::chain_simple(plan.iter().map(|stage| match *stage {
        SamplerStage::Penalties { last_n, repeat } => LlamaSampler::penalties(last_n, repeat, 0.0, 0.0),
        SamplerStage::Temperature(t) => LlamaSampler::temp(t),
        SamplerStage::TopK(k) => LlamaSampler::top_k(k),
        SamplerStage::TopP(p) => LlamaSampler::top_p(p, 1),
        SamplerStage::Distribution => LlamaSampler::dist(rand::random::<u32>()),
        SamplerStage::Greedy => LlamaSampler::greedy(),
    }))
}

impl LanguageModel for LlamaLanguageModel {
    fn info(&self) -> LoadedModelInfo {
        self.info.clone()
    }

    fn eos_token(&self) -> TokenId {
        self.model.token_eos().0
    }

    fn pad_token(&self) -> Option<TokenId> {
        self.pad_token
    }

    fn set_pad_token(&mut self, token: TokenId) {
        self.pad_token = Some(token);
    }

    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, InferenceError> {
        // The prompt carries its own <bos>
        let tokens = self
            .model
            .str_to_token(text, AddBos::Never)
            .map_err(|e| InferenceError::Tokenization(e.to_string()))?;
        Ok(tokens.into_iter().map(|t| t.0).collect())
    }

    fn generate(
        &mut self,
        prompt: &EncodedPrompt,
        params: &GenerationParams,
    ) -> Result<Vec<TokenId>, InferenceError> {
        let input: Vec<LlamaToken> = prompt.attended_tokens().map(LlamaToken::new).collect();
        if input.is_empty() {
            return Err(InferenceError::Tokenization("empty prompt".to_string()));
        }

        let needed = (input.len() + params.max_new_tokens as usize) as u32;
        let n_ctx = self.context_size.max(needed);
        let n_batch = input.len().max(MIN_BATCH);

        let mut ctx = self
            .model
            .new_context(&self.backend, self.context_params(n_ctx, n_batch as u32))
            .map_err(|e| InferenceError::Generation(format!("Failed to create context: {e}")))?;

        let mut batch = LlamaBatch::new(n_batch, 1);
        let last = input.len() - 1;
        for (i, token) in input.iter().enumerate() {
            batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(|e| InferenceError::Generation(format!("Failed to add token: {e}")))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| InferenceError::Generation(format!("Failed to decode prompt: {e}")))?;

        let mut sampler = build_sampler(&sampling_plan(&params.decoding, n_ctx));
        // The repetition penalty sees the prompt as well as the reply
        for token in &input {
            sampler.accept(*token);
        }
        let eos = LlamaToken::new(params.eos_token);

        // Positions mirror the prompt exactly so callers can slice off the input
        let mut output: Vec<TokenId> = prompt.input_ids.clone();
        let mut n_cur = input.len() as i32;

        for _ in 0..params.max_new_tokens {
            // `sample` also accepts the token into the penalty history
            let token = sampler.sample(&ctx, batch.n_tokens() - 1);

            if token == eos || self.model.is_eog_token(token) {
                tracing::debug!("End of generation token encountered");
                break;
            }
            output.push(token.0);

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| InferenceError::Generation(format!("Failed to add token: {e}")))?;
            ctx.decode(&mut batch)
                .map_err(|e| InferenceError::Generation(format!("Failed to decode: {e}")))?;
            n_cur += 1;
        }

        Ok(output)
    }

    fn decode(&self, tokens: &[TokenId], skip_special_tokens: bool) -> Result<String, InferenceError> {
        let special = if skip_special_tokens {
            Special::Plaintext
        } else {
            Special::Tokenize
        };

        // Multi-byte characters may span tokens, so collect bytes first
        let mut bytes = Vec::new();
        for token in tokens {
            let piece = self
                .model
                .token_to_bytes(LlamaToken::new(*token), special)
                .map_err(|e| InferenceError::Decoding(e.to_string()))?;
            bytes.extend_from_slice(&piece);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
