//! Model types
//!
//! Defines the model artifact identifier and metadata reported after loading.

use serde::{Deserialize, Serialize};

/// Display name reported by the status endpoint
pub const MODEL_DISPLAY_NAME: &str = "MedGemma-4B";

/// Fixed identifier of the model artifact on the Hugging Face Hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Repository id, e.g. `owner/name`
    pub repo_id: String,
    /// GGUF file inside the repository
    pub filename: String,
    /// Branch, tag or commit
    pub revision: String,
}

impl Default for ModelArtifact {
    fn default() -> Self {
        Self {
            repo_id: "unsloth/medgemma-4b-it-GGUF".to_string(),
            filename: "medgemma-4b-it-F32.gguf".to_string(),
            revision: "main".to_string(),
        }
    }
}

impl ModelArtifact {
    /// Short `repo/file` form used in logs
    pub fn identifier(&self) -> String {
        format!("{}/{}", self.repo_id, self.filename)
    }
}

/// Information about a loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModelInfo {
    /// Display name of the model
    pub name: String,
    /// Path to the GGUF file
    pub path: String,
    /// Vocabulary size
    pub vocab_size: i32,
    /// Training context length
    pub context_length: u32,
    /// Total parameter count
    pub param_count: u64,
    /// Model size in bytes
    pub size_bytes: u64,
}

/// Readiness snapshot served by `/api/model-status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub model_name: Option<String>,
    pub device: String,
}
