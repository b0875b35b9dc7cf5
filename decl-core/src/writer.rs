use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::TranslationResult;

/// Errors that can occur while writing a translation result.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize the result.
    #[error("failed to serialize translation result: {0}")]
    Json(#[from] serde_json::Error),
    /// Failed to write output file.
    #[error("failed to write translation result file: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a translation result into pretty JSON bytes.
pub fn write(result: &TranslationResult) -> Result<Vec<u8>, WriteError> {
    let mut bytes = serde_json::to_vec_pretty(result)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Serialize a translation result and write it to `path`.
pub fn write_file(result: &TranslationResult, path: &Path) -> Result<(), WriteError> {
    let bytes = write(result)?;
    fs::write(path, bytes)?;
    Ok(())
}
