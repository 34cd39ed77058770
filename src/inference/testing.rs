//! Scripted models and loaders for tests

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::inference::backend::{
    EncodedPrompt, GenerationParams, InferenceError, LanguageModel, LoadError, ModelLoader,
    TokenId,
};
use crate::types::model::LoadedModelInfo;

/// First id used for reply tokens; reply char `i` is token `REPLY_BASE + i`
const REPLY_BASE: TokenId = 1000;

enum Behaviour {
    Reply(String),
    Fail(String),
    Panic,
}

/// Model that replies with a fixed text, one token per character
pub(crate) struct ScriptedModel {
    behaviour: Behaviour,
    pad: Option<TokenId>,
    delay: Duration,
    generate_calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
    reentries: Arc<AtomicUsize>,
    pub pad_assignments: u32,
    pub last_params: Option<GenerationParams>,
    pub last_decoded: RefCell<Option<Vec<TokenId>>>,
    pub last_prompt_len: Option<usize>,
}

impl ScriptedModel {
    pub const EOS: TokenId = 1;

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            pad: None,
            delay: Duration::ZERO,
            generate_calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicBool::new(false)),
            reentries: Arc::new(AtomicUsize::new(0)),
            pad_assignments: 0,
            last_params: None,
            last_decoded: RefCell::new(None),
            last_prompt_len: None,
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::with_behaviour(Behaviour::Reply(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_behaviour(Behaviour::Fail(message.to_string()))
    }

    pub fn panicking() -> Self {
        Self::with_behaviour(Behaviour::Panic)
    }

    /// Makes every `generate` call take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Counter of `generate` invocations
    pub fn generate_calls(&self) -> Arc<AtomicUsize> {
        self.generate_calls.clone()
    }

    /// Counter of `generate` calls that started while another was running
    pub fn reentries(&self) -> Arc<AtomicUsize> {
        self.reentries.clone()
    }

    fn reply(&self) -> &str {
        match &self.behaviour {
            Behaviour::Reply(text) => text,
            _ => "",
        }
    }

    pub fn reply_tokens(&self) -> Vec<TokenId> {
        (0..self.reply().chars().count())
            .map(|i| REPLY_BASE + i as TokenId)
            .collect()
    }
}

impl LanguageModel for ScriptedModel {
    fn info(&self) -> LoadedModelInfo {
        LoadedModelInfo {
            name: "scripted".to_string(),
            path: "memory".to_string(),
            vocab_size: 4096,
            context_length: 8192,
            param_count: 0,
            size_bytes: 0,
        }
    }

    fn eos_token(&self) -> TokenId {
        Self::EOS
    }

    fn pad_token(&self) -> Option<TokenId> {
        self.pad
    }

    fn set_pad_token(&mut self, token: TokenId) {
        self.pad = Some(token);
        self.pad_assignments += 1;
    }

    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, InferenceError> {
        Ok(text
            .split_whitespace()
            .enumerate()
            .map(|(i, _)| 10 + (i % 900) as TokenId)
            .collect())
    }

    fn generate(
        &mut self,
        prompt: &EncodedPrompt,
        params: &GenerationParams,
    ) -> Result<Vec<TokenId>, InferenceError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.reentries.fetch_add(1, Ordering::SeqCst);
        }
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.last_params = Some(params.clone());
        self.last_prompt_len = Some(prompt.len());

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = match &self.behaviour {
            Behaviour::Reply(_) => {
                let mut output = prompt.input_ids.clone();
                output.extend(
                    self.reply_tokens()
                        .into_iter()
                        .take(params.max_new_tokens as usize),
                );
                Ok(output)
            }
            Behaviour::Fail(message) => Err(InferenceError::Generation(message.clone())),
            Behaviour::Panic => {
                self.in_flight.store(false, Ordering::SeqCst);
                panic!("scripted panic");
            }
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn decode(
        &self,
        tokens: &[TokenId],
        _skip_special_tokens: bool,
    ) -> Result<String, InferenceError> {
        *self.last_decoded.borrow_mut() = Some(tokens.to_vec());
        let chars: Vec<char> = self.reply().chars().collect();
        let mut text = String::new();
        for token in tokens {
            let index = usize::try_from(token - REPLY_BASE)
                .map_err(|_| InferenceError::Decoding(format!("unknown token {token}")))?;
            let ch = chars
                .get(index)
                .ok_or_else(|| InferenceError::Decoding(format!("unknown token {token}")))?;
            text.push(*ch);
        }
        Ok(text)
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn LanguageModel>, LoadError> + Send>;

/// Loader backed by a closure, counting load attempts
pub(crate) struct ScriptedLoader {
    factory: Factory,
    loads: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn new(
        factory: impl Fn() -> Result<Box<dyn LanguageModel>, LoadError> + Send + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Loader whose model replies with `text`
    pub fn replying(text: &'static str) -> Self {
        Self::new(move || Ok(Box::new(ScriptedModel::replying(text)) as Box<dyn LanguageModel>))
    }

    /// Loader handing out `model` on the first load only
    pub fn once(model: ScriptedModel) -> Self {
        let slot = Mutex::new(Some(model));
        Self::new(move || {
            slot.lock()
                .ok()
                .and_then(|mut slot| slot.take())
                .map(|model| Box::new(model) as Box<dyn LanguageModel>)
                .ok_or_else(|| LoadError::ModelLoad("scripted model already taken".to_string()))
        })
    }

    pub fn failing(error: LoadError) -> Self {
        Self::new(move || Err(error.clone()))
    }

    pub fn loads(&self) -> Arc<AtomicUsize> {
        self.loads.clone()
    }
}

impl ModelLoader for ScriptedLoader {
    fn display_name(&self) -> String {
        "Scripted".to_string()
    }

    fn load(&self) -> Result<Box<dyn LanguageModel>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        (self.factory)()
    }
}
