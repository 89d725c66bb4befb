// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressline: core types, error definitions, and configuration shared across
// all crates.

pub mod config;
pub mod engine;
pub mod error;
pub mod order;
pub mod paper;
pub mod types;

pub use config::DispatchConfig;
pub use engine::{PrintEngine, PrintError};
pub use error::PresslineError;
pub use paper::{IsoPaperSize, MediaSize};
pub use types::*;
