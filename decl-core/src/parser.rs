use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::tree::Declaration;

/// Errors that can occur while loading a declaration.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input looked like JSON but could not be decoded.
    #[error("failed to parse declaration JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Input was not JSON and could not be decoded as YAML either.
    #[error("failed to parse declaration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Failed to read input file.
    #[error("failed to read declaration file: {0}")]
    Io(#[from] std::io::Error),
    /// Structural issue in the declaration root.
    #[error("malformed declaration: {0}")]
    Malformed(String),
}

/// Parse declaration bytes into a [`Declaration`].
///
/// Documents whose first non-whitespace byte is `{` are read as JSON,
/// anything else as YAML.
pub fn parse(bytes: &[u8]) -> Result<Declaration, ParseError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace()).copied();
    let value: Value = match first {
        Some(b'{') => serde_json::from_slice(bytes)?,
        Some(_) => serde_yaml::from_slice(bytes)?,
        None => return Err(ParseError::Malformed("empty document".to_string())),
    };
    Declaration::from_value(value)
}

/// Read and parse a declaration file from disk.
pub fn parse_file(path: &Path) -> Result<Declaration, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}
