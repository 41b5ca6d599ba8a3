//! LC-3 object image format.
//!
//! An image is a flat sequence of big-endian 16-bit words:
//! - word 0: the origin, the address the program is loaded at
//! - words 1..: program contents, placed at consecutive addresses

use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

/// A parsed program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Load address of the first word.
    pub origin: u16,
    /// Program words, in machine byte order.
    pub words: Vec<u16>,
}

impl Image {
    /// Parse an image from raw file contents.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        let mut chunks = bytes.chunks_exact(2);
        let origin = chunks
            .next()
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .ok_or(ImageError::MissingOrigin)?;

        let words = chunks
            .by_ref()
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        if !chunks.remainder().is_empty() {
            warn!("ignoring trailing odd byte in image");
        }

        Ok(Self { origin, words })
    }

    /// Read and parse an image file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Errors that can occur while reading an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image is too short to contain an origin")]
    MissingOrigin,

    #[error("failed to read image {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
