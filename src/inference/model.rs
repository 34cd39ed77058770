//! GGUF artifact validation
//!
//! Cheap header checks run before the artifact is handed to llama.cpp.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;

/// File magic at offset 0 of every GGUF file
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// GGUF container versions llama.cpp still reads
const SUPPORTED_VERSIONS: [u32; 2] = [2, 3];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a GGUF file (magic {0:?})")]
    InvalidMagic([u8; 4]),

    #[error("Unsupported GGUF version {0}")]
    UnsupportedVersion(u32),

    #[error("GGUF header declares no tensors")]
    NoTensors,
}

/// Header fields of a GGUF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufMetadata {
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
}

/// Validates the GGUF header of `path`
pub fn validate_gguf(path: &Path) -> Result<GgufMetadata, ModelError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_header(&mut reader)
}

fn read_header(reader: &mut impl Read) -> Result<GgufMetadata, ModelError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != GGUF_MAGIC {
        return Err(ModelError::InvalidMagic(magic));
    }

    let mut word = [0u8; 4];
    reader.read_exact(&mut word)?;
    let version = u32::from_le_bytes(word);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let mut long = [0u8; 8];
    reader.read_exact(&mut long)?;
    let tensor_count = u64::from_le_bytes(long);
    reader.read_exact(&mut long)?;
    let metadata_kv_count = u64::from_le_bytes(long);

    if tensor_count == 0 {
        return Err(ModelError::NoTensors);
    }

    Ok(GgufMetadata {
        version,
        tensor_count,
        metadata_kv_count,
    })
}
