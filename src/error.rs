// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum DebArchiveError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("cannot produce content for {path}: {source:?}")]
    ContentUnavailable {
        path: String,
        source: std::io::Error,
    },

    #[error("content for {path} yielded {actual} bytes but declared length is {expected}")]
    SourceLengthMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid package metadata: {0}")]
    MetadataInvalid(String),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, DebArchiveError>;
