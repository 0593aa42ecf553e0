// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the columnar store.
//!
//! Malformed entity records are never errors: the pipeline skips them and
//! produces a best-effort partial store. `Error` is reserved for caller
//! misuse, invalid input buffers and cache-blob failures.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conditions surfaced by the parse and codec layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error at line {line}: {message}")]
    Parse { line: u32, message: String },

    #[error("input buffer is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("entity #{0} not found")]
    EntityNotFound(u32),

    #[error("invalid cache blob magic")]
    InvalidMagic,

    #[error("unsupported cache format version {0}")]
    UnsupportedVersion(u8),

    #[error("cache blob truncated: got {got} bytes, need {min}")]
    Truncated { got: usize, min: usize },

    #[error("cache blob contains invalid string data")]
    InvalidStringData,

    #[error("cache blob is inconsistent: {0}")]
    CorruptBlob(String),
}

impl Error {
    /// Create a parse error with line context.
    pub fn parse(line: u32, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}
