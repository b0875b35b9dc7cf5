//! Generic declaration-tree primitives used by higher-level translation tools.
//!
//! A declaration is a nested JSON (or YAML) document grouped into tenants and
//! applications. This crate knows how to load one, walk it without mutating
//! it, and how to represent and render the flat batch of config objects a
//! translator produces from it. Nothing here knows about individual object
//! classes; that lives in `adc-translate`.

pub mod config;
pub mod format;
pub mod parser;
pub mod tree;
pub mod writer;

pub use config::{ConfigObject, PathUpdate, TranslationResult};
pub use format::{format_json, format_summary, format_text};
pub use parser::{parse, parse_file, ParseError};
pub use tree::{class_of, DeclValue, Declaration};
pub use writer::{write, write_file, WriteError};
