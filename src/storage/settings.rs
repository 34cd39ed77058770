//! Settings storage
//!
//! Manages persistence of server configuration.

use crate::storage::{get_data_dir, read_json, write_json_atomic, StorageError};
use crate::types::model::ModelArtifact;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Socket address the HTTP listener binds to
    pub bind_address: String,
    /// Model artifact to fetch at startup
    #[serde(default)]
    pub model: ModelArtifact,
    /// Directory where model files (.gguf) are stored
    pub models_directory: PathBuf,
    /// Context window size handed to the backend
    pub context_size: u32,
    /// CPU threads for inference (0 = backend default)
    #[serde(default)]
    pub threads: u32,
    /// Default cap on newly generated tokens per chat request
    pub max_new_tokens: u32,
    /// Session lifetime in hours
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
}

fn default_session_ttl_hours() -> u32 {
    24
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            model: ModelArtifact::default(),
            models_directory: get_data_dir()
                .ok()
                .map(|d| d.join("models"))
                .unwrap_or_else(|| PathBuf::from("./models")),
            context_size: 4096,
            threads: 0,
            max_new_tokens: 512,
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

impl ServerSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges.
    pub fn validate(&mut self) {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            tracing::warn!(
                "Invalid bind address {:?}, using 127.0.0.1:5000",
                self.bind_address
            );
            self.bind_address = "127.0.0.1:5000".to_string();
        }

        let defaults = ModelArtifact::default();
        if self.model.repo_id.trim().is_empty() {
            self.model.repo_id = defaults.repo_id;
        }
        if !self.model.filename.ends_with(".gguf") {
            self.model.filename = defaults.filename;
        }
        if self.model.revision.trim().is_empty() {
            self.model.revision = defaults.revision;
        }

        // The prompt alone may take 2048 tokens
        self.context_size = self.context_size.clamp(2048, 131072);
        self.max_new_tokens = self.max_new_tokens.clamp(1, 4096);
        self.session_ttl_hours = self.session_ttl_hours.clamp(1, 24 * 30);
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Returns default settings if the file doesn't exist or is corrupted
pub fn load_settings() -> ServerSettings {
    match get_settings_path().and_then(|path| load_settings_from(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            ServerSettings::default()
        }
    }
}

/// Settings loading with error propagation
pub fn load_settings_from(path: &Path) -> Result<ServerSettings, StorageError> {
    let Some(mut settings) = read_json::<ServerSettings>(path)? else {
        tracing::info!("Settings file not found, using defaults");
        return Ok(ServerSettings::default());
    };

    settings.validate();

    tracing::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &ServerSettings) -> Result<(), StorageError> {
    write_json_atomic(path, settings)?;
    tracing::debug!("Saved settings to {:?}", path);
    Ok(())
}

/// Writes `settings` only when no settings file exists yet
///
/// An existing file is never touched, even when it failed to parse.
pub fn ensure_settings_file(settings: &ServerSettings) -> Result<bool, StorageError> {
    ensure_settings_file_at(&get_settings_path()?, settings)
}

pub fn ensure_settings_file_at(path: &Path, settings: &ServerSettings) -> Result<bool, StorageError> {
    if path.exists() {
        return Ok(false);
    }
    save_settings_to(path, settings)?;
    tracing::info!("Wrote default settings to {:?}", path);
    Ok(true)
}
