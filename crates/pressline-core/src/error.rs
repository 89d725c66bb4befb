// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pressline.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all Pressline operations.
#[derive(Debug, Error)]
pub enum PresslineError {
    // -- Dispatcher errors --
    #[error("print ledger is no longer running")]
    LedgerUnavailable,

    #[error("no reply from the print ledger within {0:?}")]
    QueryTimeout(Duration),

    #[error("dispatcher runtime error: {0}")]
    Runtime(String),

    // -- Document errors --
    #[error("invalid document specification: {0}")]
    InvalidDocument(String),

    #[error("unknown paper size: {0}")]
    UnknownPaperSize(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PresslineError>;
