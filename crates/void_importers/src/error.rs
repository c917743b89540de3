//! Decoder errors shared by the importers

use std::path::PathBuf;

use thiserror::Error;

/// Failures inside a format decoder. Surfaced to the asset manager as
/// `AssetError::Import` with the importer's name attached.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("glTF parse failed: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("Invalid glTF: {0}")]
    InvalidGltf(String),

    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Cannot read '{}': {source}", .path.display())]
    External {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("KTX2 data truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Unsupported KTX2 vkFormat {0}")]
    UnsupportedFormat(u32),

    #[error("Unsupported KTX2 supercompression scheme {0}")]
    Supercompressed(u32),

    #[error("Unsupported KTX2 layout: {0}")]
    UnsupportedLayout(String),
}
