// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Lectern.

use thiserror::Error;

/// Top-level error type for all Lectern operations.
#[derive(Debug, Error)]
pub enum LecternError {
    // -- Language assets --
    #[error("language model missing: {0}")]
    AssetMissing(String),

    #[error("language model {code} is corrupt ({size} bytes, need at least {minimum})")]
    AssetCorrupt { code: String, size: u64, minimum: u64 },

    // -- Recognition engine --
    #[error("recognition engine failed to start: {0}")]
    EngineInit(String),

    #[error("text recognition failed: {0}")]
    Recognition(String),

    #[error("recognition engine is not initialised")]
    NotInitialized,

    // -- Image / document input --
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("operation cancelled")]
    Cancelled,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LecternError>;
