// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressline: job ledger, single-flight print worker, and the blocking
// dispatcher facade.

pub mod breaker;
pub mod facade;
pub mod ledger;
pub mod simulated;
mod watcher;
pub mod worker;

#[cfg(test)]
mod testing;

pub use breaker::{BreakerState, FaultBreaker};
pub use facade::PrintDispatcher;
pub use ledger::{CompletionHandle, LedgerHandle};
pub use simulated::SimulatedPrinter;
pub use worker::{PrintEvent, PrintJob};
