// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds for the conversion path.
//!
//! Every kind maps to exactly one HTTP status; the mapping itself lives
//! with the HTTP surface. Supervisors absorb backend crashes internally —
//! these kinds are only what a client can observe.

use crate::media::BackendKind;
use thiserror::Error;

/// Errors surfaced to a single conversion request.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Malformed request shape: missing/duplicate fields, over-limit counts.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Media type undetermined, unknown, or contradicting the file evidence.
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),
    /// Admission rejected: the queue is at capacity.
    #[error("job queue is full")]
    QueueFull,
    /// The render deadline elapsed and the backend process was killed.
    #[error("{backend} conversion timed out")]
    Timeout { backend: BackendKind },
    /// The backend exited non-zero or violated its protocol.
    #[error("{backend} conversion failed (exit {code:?}): {stderr}")]
    Backend {
        backend: BackendKind,
        code: Option<i32>,
        stderr: String,
    },
    /// Admitted, but no office worker was available to claim.
    #[error("no office worker available")]
    Overload,
    /// Upload exceeded the configured size limit.
    #[error("upload too large")]
    TooLarge,
    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand for an internal error from any displayable cause.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}
