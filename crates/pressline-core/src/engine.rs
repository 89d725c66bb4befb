// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Boundary to the physical (or simulated) printer.
//
// The dispatcher only ever talks to a printer through this trait. Rendering
// and transmission are the engine's business.

use thiserror::Error;

use crate::types::Printable;

/// Why a call to [`PrintEngine::print`] did not finish the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    /// A concurrent [`PrintEngine::stop`] aborted the print.
    #[error("print interrupted")]
    Interrupted,

    /// The printer failed on its own.
    #[error("print fault: {0}")]
    Fault(String),
}

/// A printer that prints one document at a time.
///
/// `print` blocks the calling thread for the whole print. `stop` is called
/// from another thread while `print` is running and must make it return
/// [`PrintError::Interrupted`] as soon as practical. Calling `stop` while
/// idle must be harmless.
///
/// A `stop` that lands before the engine can act on it may be lost; the
/// dispatcher still reports such a print as cancelled.
pub trait PrintEngine: Send + Sync {
    /// Print `document`, blocking until it is done.
    fn print(&self, document: &dyn Printable) -> Result<(), PrintError>;

    /// Abort the in-flight print, if any.
    fn stop(&self);
}
