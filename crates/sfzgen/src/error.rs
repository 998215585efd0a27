//! Error types for sfzgen

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sfzgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating an instrument
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration document is structurally valid TOML but semantically wrong
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A filter, split or substitution pattern failed to compile
    #[error("Invalid regex '{pattern}': {source}")]
    Regex {
        /// The offending pattern as written in the config
        pattern: String,
        /// Compilation error reported by the regex crate
        #[source]
        source: regex::Error,
    },

    /// A layer source directory could not be listed
    #[error("Failed to open layer directory {}: {source}", path.display())]
    SourceDir {
        /// The directory from the layer's `source` key
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A sample file could not be decoded
    #[error("Failed to decode sample {}: {message}", path.display())]
    Decode {
        /// Sample file path
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// Decoded audio was unusable for analysis (silent, too short, ...)
    #[error("Analysis error: {0}")]
    Analysis(String),
}
