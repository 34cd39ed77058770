//! HuggingFace artifact fetcher
//!
//! Downloads the GGUF model artifact from the HuggingFace Hub into the local models
//! directory, reusing an already-downloaded copy.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::types::model::ModelArtifact;

/// Errors raised while fetching a model artifact
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid model filename: {0:?}")]
    InvalidFilename(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Download incomplete: got {got} bytes, expected {expected}")]
    Incomplete { got: u64, expected: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn sanitize_local_filename(filename: &str) -> Result<String, DownloadError> {
    let trimmed = filename.trim();
    let no_leading = trimmed.trim_start_matches('/');
    let flattened = no_leading.replace('\\', "/").replace('/', "__");

    let mut sanitized = String::with_capacity(flattened.len());
    for ch in flattened.chars() {
        let invalid = matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*');
        if invalid || ch.is_control() {
            sanitized.push('_');
        } else {
            sanitized.push(ch);
        }
    }

    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }

    if sanitized.is_empty() {
        return Err(DownloadError::InvalidFilename(filename.to_string()));
    }

    Ok(sanitized)
}

/// Build the download URL for an artifact
pub fn download_url(artifact: &ModelArtifact) -> String {
    format!(
        "https://huggingface.co/{}/resolve/{}/{}",
        artifact.repo_id, artifact.revision, artifact.filename
    )
}

/// Local path an artifact is stored at inside `models_dir`
pub fn local_path(artifact: &ModelArtifact, models_dir: &Path) -> Result<PathBuf, DownloadError> {
    Ok(models_dir.join(sanitize_local_filename(&artifact.filename)?))
}

/// Ensure the artifact exists locally, downloading it when missing
pub async fn fetch_artifact(
    artifact: &ModelArtifact,
    models_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let output_path = local_path(artifact, models_dir)?;

    if let Ok(metadata) = fs::metadata(&output_path) {
        if metadata.len() > 0 {
            tracing::info!("Model already present: {:?}", output_path);
            return Ok(output_path);
        }
    }

    fs::create_dir_all(models_dir)?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3600)) // 1 hour timeout for large models
        .build()?;
    download_to(&client, &download_url(artifact), &output_path).await?;
    Ok(output_path)
}

/// Streams `url` into `output_path` through a `.tmp` sibling
///
/// A failed transfer leaves neither the temp file nor `output_path` behind.
pub(crate) async fn download_to(
    client: &reqwest::Client,
    url: &str,
    output_path: &Path,
) -> Result<(), DownloadError> {
    let temp_path = output_path.with_extension("gguf.tmp");
    tracing::info!("Downloading from: {}", url);

    if let Err(e) = stream_to_file(client, url, &temp_path).await {
        if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove partial download {:?}: {}", temp_path, cleanup);
            }
        }
        tracing::error!("Download failed: {}", e);
        return Err(e);
    }

    fs::rename(&temp_path, output_path)?;
    tracing::info!("Download complete: {:?}", output_path);
    Ok(())
}

async fn stream_to_file(
    client: &reqwest::Client,
    url: &str,
    temp_path: &Path,
) -> Result<(), DownloadError> {
    let mut request = client
        .get(url)
        .header("User-Agent", concat!("medresearch/", env!("CARGO_PKG_VERSION")));
    // Gated repositories need a token
    if let Ok(token) = std::env::var("HF_TOKEN") {
        request = request.bearer_auth(token);
    }

    let mut response = request.send().await?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let total_size = response.content_length();
    if let Some(total) = total_size {
        tracing::info!("File size: {}", format_size(total));
    }

    let mut temp_file = File::create(temp_path).await?;
    let mut downloaded: u64 = 0;
    let mut next_report: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        temp_file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        if downloaded >= next_report {
            tracing::debug!("Downloaded {}", format_size(downloaded));
            next_report = downloaded + 256 * 1024 * 1024;
        }
    }
    temp_file.flush().await?;

    if let Some(expected) = total_size {
        if downloaded != expected {
            return Err(DownloadError::Incomplete {
                got: downloaded,
                expected,
            });
        }
    }
    Ok(())
}

/// Get a human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}
