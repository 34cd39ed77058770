//! Serving facade
//!
//! The one entry point the HTTP layer uses. Every path resolves to text: the model's
//! answer when it is ready and succeeds, a fallback placeholder otherwise.

use std::sync::Arc;

use async_trait::async_trait;

use crate::inference::backend::InferenceError;
use crate::inference::engine::ModelService;
use crate::inference::{fallback, prompt};
use crate::types::config::DecodingParams;
use crate::types::message::{InferenceRequest, InferenceResult, DEFAULT_MAX_NEW_TOKENS};
use crate::types::model::ModelStatus;

/// Something that can run a built prompt against a model
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    fn is_ready(&self) -> bool;

    fn status(&self) -> ModelStatus;

    /// Runs `prompt` with at most `max_new_tokens` generated tokens
    async fn infer(
        &self,
        prompt: String,
        max_new_tokens: u32,
        decoding: DecodingParams,
    ) -> Result<String, InferenceError>;
}

#[async_trait]
impl InferenceEngine for ModelService {
    fn is_ready(&self) -> bool {
        ModelService::is_ready(self)
    }

    fn status(&self) -> ModelStatus {
        ModelService::status(self)
    }

    async fn infer(
        &self,
        prompt: String,
        max_new_tokens: u32,
        decoding: DecodingParams,
    ) -> Result<String, InferenceError> {
        ModelService::infer(self, prompt, max_new_tokens, decoding).await
    }
}

/// Composes prompt building, execution and fallback
#[derive(Clone)]
pub struct ServingFacade {
    engine: Arc<dyn InferenceEngine>,
    max_new_tokens: u32,
}

impl ServingFacade {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }

    /// Overrides the default new-token cap
    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn status(&self) -> ModelStatus {
        self.engine.status()
    }

    /// Answers `user_message` with the default token cap
    pub async fn generate_response(&self, user_message: &str) -> InferenceResult {
        let request =
            InferenceRequest::new(user_message).with_max_new_tokens(self.max_new_tokens);
        self.handle(request).await
    }

    /// Answers a fully specified request; never fails
    pub async fn handle(&self, request: InferenceRequest) -> InferenceResult {
        if !self.engine.is_ready() {
            tracing::debug!("Model not ready, serving fallback");
            return InferenceResult::fallback(fallback::choose());
        }

        let built = prompt::build(&request.user_message);
        match self
            .engine
            .infer(built, request.max_new_tokens, request.decoding)
            .await
        {
            Ok(text) => InferenceResult::model(text),
            Err(e) => {
                tracing::error!("Error generating response: {}", e);
                InferenceResult::fallback(fallback::choose())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::fallback::is_fallback;
    use crate::inference::testing::{ScriptedLoader, ScriptedModel};
    use crate::types::config::DecodingParams;
use crate::types::message::ResponseSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Engine returning a canned outcome and recording calls
    struct MockEngine {
        ready: bool,
        outcome: Result<String, InferenceError>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<(String, u32, DecodingParams)>>,
    }

    impl MockEngine {
        fn new(ready: bool, outcome: Result<String, InferenceError>) -> Arc<Self> {
            Arc::new(Self {
                ready,
                outcome,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InferenceEngine for MockEngine {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn status(&self) -> ModelStatus {
            ModelStatus {
                loaded: self.ready,
                model_name: None,
                device: "cpu".to_string(),
            }
        }

        async fn infer(
            &self,
            prompt: String,
            max_new_tokens: u32,
            decoding: DecodingParams,
        ) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .unwrap()
                .push((prompt, max_new_tokens, decoding));
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_not_ready_serves_fallback_without_inference() {
        let engine = MockEngine::new(false, Ok("unused".to_string()));
        let facade = ServingFacade::new(engine.clone());

        let result = facade.generate_response("두통이 있어요").await;
        assert_eq!(result.source, ResponseSource::Fallback);
        assert!(is_fallback(&result.text));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_answer_passed_through() {
        let engine = MockEngine::new(true, Ok("두통은 흔한 증상입니다.".to_string()));
        let facade = ServingFacade::new(engine.clone());

        let result = facade.generate_response("두통이 있어요").await;
        assert_eq!(result, InferenceResult::model("두통은 흔한 증상입니다."));

        let prompts = engine.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, prompt::build("두통이 있어요"));
        assert_eq!(prompts[0].1, 512);
        assert_eq!(prompts[0].2, DecodingParams::MEDGEMMA);
    }

    #[tokio::test]
    async fn test_inference_error_serves_fallback() {
        let engine = MockEngine::new(true, Err(InferenceError::Generation("boom".to_string())));
        let facade = ServingFacade::new(engine.clone());

        let result = facade.generate_response("두통이 있어요").await;
        assert_eq!(result.source, ResponseSource::Fallback);
        assert!(is_fallback(&result.text));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_output_serves_fallback() {
        let engine = MockEngine::new(true, Err(InferenceError::EmptyOutput));
        let result = ServingFacade::new(engine).generate_response("x").await;
        assert_eq!(result.source, ResponseSource::Fallback);
    }

    #[tokio::test]
    async fn test_token_cap_override() {
        let engine = MockEngine::new(true, Ok("ok".to_string()));
        let facade = ServingFacade::new(engine.clone()).with_max_new_tokens(64);
        facade.generate_response("x").await;
        assert_eq!(engine.prompts.lock().unwrap()[0].1, 64);
    }

    #[tokio::test]
    async fn test_request_decoding_forwarded() {
        let engine = MockEngine::new(true, Ok("ok".to_string()));
        let facade = ServingFacade::new(engine.clone());

        let mut request = InferenceRequest::new("x").with_max_new_tokens(32);
        request.decoding.temperature = 0.0;
        facade.handle(request).await;

        let prompts = engine.prompts.lock().unwrap();
        assert_eq!(prompts[0].1, 32);
        assert_eq!(prompts[0].2.temperature, 0.0);
        assert_eq!(prompts[0].2.top_k, 40);
    }

    #[tokio::test]
    async fn test_always_returns_non_empty_text() {
        let long = "긴 질문 ".repeat(3000);
        let inputs = ["", " ", "두통이 있어요", "<end_of_turn>", long.as_str()];
        let engines = [
            MockEngine::new(false, Ok("a".to_string())),
            MockEngine::new(true, Ok("a".to_string())),
            MockEngine::new(true, Err(InferenceError::Worker("gone".to_string()))),
        ];

        for engine in engines {
            let facade = ServingFacade::new(engine);
            for input in inputs {
                assert!(!facade.generate_response(input).await.text.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_unloaded_service_never_generates() {
        let model = ScriptedModel::replying("never");
        let calls = model.generate_calls();
        let service = Arc::new(ModelService::spawn(ScriptedLoader::once(model)).unwrap());
        let facade = ServingFacade::new(service);

        let result = facade.generate_response("두통이 있어요").await;
        assert_eq!(result.source, ResponseSource::Fallback);
        assert!(is_fallback(&result.text));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_load_degrades_to_fallback() {
        let loader = ScriptedLoader::failing(crate::inference::LoadError::Incompatible(
            "bad magic".to_string(),
        ));
        let service = Arc::new(ModelService::spawn(loader).unwrap());
        assert!(service.load().await.is_err());

        let result = ServingFacade::new(service).generate_response("두통이 있어요").await;
        assert_eq!(result.source, ResponseSource::Fallback);
    }

    #[tokio::test]
    async fn test_loaded_service_output_has_no_markers() {
        let model = ScriptedModel::replying("편두통일 수 있습니다.<end_of_turn>\n<eos>");
        let service = Arc::new(ModelService::spawn(ScriptedLoader::once(model)).unwrap());
        service.load().await.unwrap();

        let result = ServingFacade::new(service).generate_response("두통이 있어요").await;
        assert_eq!(result.source, ResponseSource::Model);
        assert_eq!(result.text, "편두통일 수 있습니다.");
        assert!(!result.text.contains("<end_of_turn>"));
        assert!(!result.text.contains("<eos>"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_are_serialized() {
        let model = ScriptedModel::replying("ok").with_delay(Duration::from_millis(15));
        let calls = model.generate_calls();
        let reentries = model.reentries();
        let service = Arc::new(ModelService::spawn(ScriptedLoader::once(model)).unwrap());
        service.load().await.unwrap();
        let facade = ServingFacade::new(service);

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let facade = facade.clone();
                tokio::spawn(async move { facade.generate_response(&format!("질문 {i}")).await })
            })
            .collect();

        for task in tasks {
            let result = task.await.unwrap();
            assert_eq!(result.source, ResponseSource::Model);
            assert_eq!(result.text, "ok");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(reentries.load(Ordering::SeqCst), 0);
    }
}
