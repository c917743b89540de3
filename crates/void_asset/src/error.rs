//! Error types for the asset pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::id::{AssetId, TypeTag};

/// Result type for asset operations
pub type AssetResult<T> = std::result::Result<T, AssetError>;

/// Boxed error produced by a format decoder
pub type DecoderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while importing, saving or loading assets
#[derive(Debug, Error)]
pub enum AssetError {
    /// No registered importer recognized the bytes
    #[error("No importer found for '{}'", .path.display())]
    NoImporterFound { path: PathBuf },

    /// Compiled asset carries a type tag nobody registered a constructor for
    #[error("No loader registered for type tag '{0}'")]
    NoLoaderFound(TypeTag),

    /// Malformed meta file
    #[error("Failed to parse '{}': {source}", .path.display())]
    ParsingError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed UUID string in a meta file
    #[error("Invalid UUID '{value}'")]
    InvalidUuid {
        value: String,
        #[source]
        source: uuid::Error,
    },

    /// Importer settings do not match what the importer expects
    #[error("Invalid settings for importer '{importer}': {message}")]
    InvalidSettings {
        importer: &'static str,
        message: String,
    },

    /// The decoder behind an importer failed
    #[error("Importer '{importer}' failed: {source}")]
    Import {
        importer: &'static str,
        #[source]
        source: DecoderError,
    },

    /// Dependency chain loops back on itself
    #[error("Dependency cycle: {}", format_chain(.0))]
    DependencyCycle(Vec<AssetId>),

    /// Asset is neither live nor present in the compiled store
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Importer named a main asset it never produced
    #[error("Importer for '{}' returned {id} but did not produce it", .path.display())]
    MissingMainAsset { path: PathBuf, id: AssetId },

    /// Compiled file holds a different asset than requested
    #[error("Compiled file for {expected} contains {found}")]
    IdMismatch { expected: AssetId, found: AssetId },

    /// Live asset is not of the requested concrete type
    #[error("Asset {id} is not a {expected}")]
    TypeMismatch { id: AssetId, expected: &'static str },

    /// Resource path is not tracked by the database
    #[error("Unknown resource '{}'", .path.display())]
    UnknownResource { path: PathBuf },

    /// Importer registry is full
    #[error("Importer registry is full ({0} importers)")]
    RegistryFull(usize),

    /// Binary payload ended before all fields were read
    #[error("Unexpected end of data: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// File system failure
    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Field encoding failure
    #[error("Serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    /// Meta file could not be encoded
    #[error("Failed to write JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// Configuration file is malformed
    #[error("Invalid configuration '{}': {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// File watcher failure
    #[error("Watch error: {0}")]
    Watch(String),
}

impl AssetError {
    /// Wrap an IO error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssetError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a decoder error for the named importer
    pub fn import(importer: &'static str, source: impl Into<DecoderError>) -> Self {
        AssetError::Import {
            importer,
            source: source.into(),
        }
    }
}

fn format_chain(chain: &[AssetId]) -> String {
    chain
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
