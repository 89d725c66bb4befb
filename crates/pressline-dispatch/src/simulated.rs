// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A print engine with no printer behind it.
//
// "Printing" a document means sleeping for its print duration (optionally
// sped up). `stop` wakes the sleeping print thread early. Faults can be
// injected per document name, which makes the dispatcher's fault handling
// observable without hardware.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::{debug, warn};

use pressline_core::engine::{PrintEngine, PrintError};
use pressline_core::types::Printable;

#[derive(Debug, Default)]
struct PrinterState {
    printing: bool,
    stop_requested: bool,
    printed: usize,
}

/// Print engine that waits out each document's print duration.
#[derive(Debug)]
pub struct SimulatedPrinter {
    speedup: u32,
    faults: HashMap<String, String>,
    state: Mutex<PrinterState>,
    changed: Condvar,
}

impl Default for SimulatedPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPrinter {
    pub fn new() -> Self {
        Self {
            speedup: 1,
            faults: HashMap::new(),
            state: Mutex::new(PrinterState::default()),
            changed: Condvar::new(),
        }
    }

    /// Divide every print duration by `speedup`.
    pub fn with_speedup(mut self, speedup: u32) -> Self {
        self.speedup = speedup.max(1);
        self
    }

    /// Fail every print of the document called `name` with `reason`.
    pub fn with_fault(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.faults.insert(name.into(), reason.into());
        self
    }

    /// Documents printed to completion so far.
    pub fn printed_count(&self) -> usize {
        self.lock().map(|state| state.printed).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PrinterState>, PrintError> {
        self.state
            .lock()
            .map_err(|_| PrintError::Fault("printer state poisoned".into()))
    }
}

impl PrintEngine for SimulatedPrinter {
    fn print(&self, document: &dyn Printable) -> Result<(), PrintError> {
        if let Some(reason) = self.faults.get(document.name()) {
            return Err(PrintError::Fault(reason.clone()));
        }

        let duration = document.print_duration() / self.speedup;
        let mut state = self.lock()?;
        state.printing = true;
        state.stop_requested = false;
        debug!(
            name = %document.name(),
            ?duration,
            size = %document.size(),
            "simulated print started"
        );

        let (mut state, _) = self
            .changed
            .wait_timeout_while(state, duration, |s| !s.stop_requested)
            .map_err(|_| PrintError::Fault("printer state poisoned".into()))?;
        state.printing = false;

        if std::mem::take(&mut state.stop_requested) {
            return Err(PrintError::Interrupted);
        }
        state.printed += 1;
        Ok(())
    }

    fn stop(&self) {
        match self.state.lock() {
            Ok(mut state) if state.printing => {
                state.stop_requested = true;
                self.changed.notify_all();
            }
            Ok(_) => {}
            Err(_) => warn!("printer state poisoned; stop ignored"),
        }
    }
}
