//! Model service
//!
//! Owns the model on a dedicated worker thread. Every load, unload and generation is a
//! command on one channel, so the worker runs them strictly one at a time in arrival
//! order. Async callers await a oneshot reply and never block the runtime.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use crate::inference::backend::{InferenceError, LanguageModel, LoadError, ModelLoader};
use crate::inference::executor;
use crate::types::config::DecodingParams;
use crate::types::model::{LoadedModelInfo, ModelStatus};

/// Commands sent to the worker thread
enum WorkerCommand {
    Load {
        reply: oneshot::Sender<Result<LoadedModelInfo, LoadError>>,
    },
    Unload,
    Generate {
        prompt: String,
        max_new_tokens: u32,
        decoding: DecodingParams,
        reply: oneshot::Sender<Result<String, InferenceError>>,
    },
    Shutdown,
}

/// Readiness and metadata, written by the worker and read by anyone
#[derive(Default)]
struct SharedState {
    ready: AtomicBool,
    info: RwLock<Option<LoadedModelInfo>>,
}

impl SharedState {
    fn publish(&self, info: Option<LoadedModelInfo>) {
        let ready = info.is_some();
        if let Ok(mut slot) = self.info.write() {
            *slot = info;
        }
        self.ready.store(ready, Ordering::Release);
    }
}

/// Handle to the single in-process model
pub struct ModelService {
    /// Channel to send commands to the worker thread
    command_tx: Sender<WorkerCommand>,
    /// Handle to the worker thread
    worker_handle: Option<JoinHandle<()>>,
    shared: Arc<SharedState>,
    display_name: String,
}

impl ModelService {
    /// Starts the worker thread; no model is loaded yet
    pub fn spawn(loader: impl ModelLoader) -> Result<Self, LoadError> {
        let display_name = loader.display_name();
        let shared = Arc::new(SharedState::default());
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("model-worker".to_string())
            .spawn(move || worker_thread_main(Box::new(loader), command_rx, worker_shared))
            .map_err(|e| LoadError::Worker(e.to_string()))?;

        tracing::info!("Model worker thread started");
        Ok(Self {
            command_tx,
            worker_handle: Some(handle),
            shared,
            display_name,
        })
    }

    /// Loads the model, once
    ///
    /// Failures are logged here and leave the service in fallback mode; the error is
    /// returned for the caller's information only.
    pub async fn load(&self) -> Result<LoadedModelInfo, LoadError> {
        let (reply, reply_rx) = oneshot::channel();
        let result = match self.command_tx.send(WorkerCommand::Load { reply }) {
            Ok(()) => reply_rx
                .await
                .unwrap_or_else(|e| Err(LoadError::Worker(e.to_string()))),
            Err(e) => Err(LoadError::Worker(e.to_string())),
        };

        match &result {
            Ok(info) => tracing::info!("{} loaded successfully on CPU ({})", self.display_name, info.path),
            Err(e) => {
                tracing::error!("Failed to load {}: {}", self.display_name, e);
                tracing::warn!("The chatbot will use fallback responses.");
            }
        }
        result
    }

    /// Drops the model and clears readiness
    pub fn unload(&self) {
        if self.command_tx.send(WorkerCommand::Unload).is_err() {
            tracing::warn!("Model worker is gone, nothing to unload");
        }
        tracing::info!("Model unload requested");
    }

    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// Information about the currently loaded model
    pub fn model_info(&self) -> Option<LoadedModelInfo> {
        self.shared.info.read().ok().and_then(|info| info.clone())
    }

    pub fn status(&self) -> ModelStatus {
        let loaded = self.is_ready();
        ModelStatus {
            loaded,
            model_name: loaded.then(|| self.display_name.clone()),
            device: "cpu".to_string(),
        }
    }

    /// Queues `prompt` for generation and waits for the text
    pub async fn infer(
        &self,
        prompt: String,
        max_new_tokens: u32,
        decoding: DecodingParams,
    ) -> Result<String, InferenceError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(WorkerCommand::Generate {
                prompt,
                max_new_tokens,
                decoding,
                reply,
            })
            .map_err(|e| InferenceError::Worker(e.to_string()))?;

        reply_rx
            .await
            .map_err(|e| InferenceError::Worker(e.to_string()))?
    }
}

impl Drop for ModelService {
    fn drop(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        let Some(handle) = self.worker_handle.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            // An in-flight generation must not stall an async worker thread
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    let _ = handle.join();
                });
            }
            Err(_) => {
                let _ = handle.join();
            }
        }
    }
}

/// Worker thread main loop
///
/// Owns the model; the only place it is ever touched.
fn worker_thread_main(
    loader: Box<dyn ModelLoader>,
    command_rx: Receiver<WorkerCommand>,
    shared: Arc<SharedState>,
) {
    let mut model: Option<Box<dyn LanguageModel>> = None;

    loop {
        match command_rx.recv() {
            Ok(WorkerCommand::Load { reply }) => {
                let result = match &model {
                    Some(loaded) => Ok(loaded.info()),
                    None => load_guarded(loader.as_ref()).map(|loaded| {
                        let info = loaded.info();
                        model = Some(loaded);
                        info
                    }),
                };
                shared.publish(result.as_ref().ok().cloned());
                let _ = reply.send(result);
            }
            Ok(WorkerCommand::Unload) => {
                model = None;
                shared.publish(None);
                tracing::info!("Model unloaded in worker thread");
            }
            Ok(WorkerCommand::Generate {
                prompt,
                max_new_tokens,
                decoding,
                reply,
            }) => {
                let result = match model.as_deref_mut() {
                    Some(loaded) => executor::run(loaded, &prompt, max_new_tokens, decoding),
                    None => Err(InferenceError::NotReady),
                };
                if reply.send(result).is_err() {
                    tracing::debug!("Caller went away before generation finished");
                }
            }
            Ok(WorkerCommand::Shutdown) => {
                tracing::info!("Worker thread shutting down");
                break;
            }
            Err(_) => {
                tracing::debug!("Command channel closed, worker exiting");
                break;
            }
        }
    }
}

fn load_guarded(loader: &dyn ModelLoader) -> Result<Box<dyn LanguageModel>, LoadError> {
    panic::catch_unwind(AssertUnwindSafe(|| loader.load()))
        .unwrap_or_else(|_| Err(LoadError::ModelLoad("loader panicked".to_string())))
}
