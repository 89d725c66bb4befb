// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-cranked print engine for tests.
//
// `MockPrinter::print` blocks until the test releases the current document
// with `complete_next` / `fail_next`, or until `stop` interrupts it.
// `SlowStartPrinter` spends a setup phase inside `print` during which
// `stop` has no effect.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use pressline_core::engine::{PrintEngine, PrintError};
use pressline_core::types::Printable;

enum Release {
    Done,
    Fault(String),
    Interrupt,
}

#[derive(Default)]
struct MockState {
    current: Option<String>,
    release: Option<Release>,
    printing_now: usize,
    max_concurrent: usize,
    interrupts: usize,
    printed: Vec<String>,
    closed: bool,
}

impl MockState {
    /// A print is running and nobody has decided its fate yet.
    fn awaiting_release(&self) -> bool {
        self.current.is_some() && self.release.is_none()
    }
}

#[derive(Default)]
pub(crate) struct MockPrinter {
    state: Mutex<MockState>,
    changed: Condvar,
}

impl MockPrinter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock printer lock poisoned")
    }

    /// Wait until a document is being printed and return its name.
    pub(crate) fn wait_for_start(&self, timeout: Duration) -> Option<String> {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| !s.awaiting_release())
            .expect("mock printer lock poisoned");
        guard.current.clone().filter(|_| guard.release.is_none())
    }

    /// Let the current print finish successfully.
    pub(crate) fn complete_next(&self, timeout: Duration) -> Option<String> {
        self.release_next(Release::Done, timeout)
    }

    /// Make the current print fail with a printer fault.
    pub(crate) fn fail_next(&self, reason: &str, timeout: Duration) -> Option<String> {
        self.release_next(Release::Fault(reason.to_string()), timeout)
    }

    fn release_next(&self, release: Release, timeout: Duration) -> Option<String> {
        let guard = self.lock();
        let (mut guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |s| !s.awaiting_release())
            .expect("mock printer lock poisoned");
        if !guard.awaiting_release() {
            return None;
        }
        guard.release = Some(release);
        self.changed.notify_all();
        guard.current.clone()
    }

    pub(crate) fn interrupts(&self) -> usize {
        self.lock().interrupts
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.lock().max_concurrent
    }

    pub(crate) fn printed(&self) -> Vec<String> {
        self.lock().printed.clone()
    }

    /// Fail every current and future print so no blocking thread outlives
    /// the test.
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.changed.notify_all();
    }
}

impl PrintEngine for MockPrinter {
    fn print(&self, document: &dyn Printable) -> Result<(), PrintError> {
        let name = document.name().to_string();
        let mut state = self.lock();
        if state.closed {
            return Err(PrintError::Interrupted);
        }
        state.printing_now += 1;
        state.max_concurrent = state.max_concurrent.max(state.printing_now);
        state.current = Some(name.clone());
        state.release = None;
        self.changed.notify_all();

        let mut state = self
            .changed
            .wait_while(state, |s| s.release.is_none() && !s.closed)
            .expect("mock printer lock poisoned");

        let release = state.release.take().unwrap_or(Release::Interrupt);
        state.current = None;
        state.printing_now -= 1;
        self.changed.notify_all();

        match release {
            Release::Done => {
                state.printed.push(name);
                Ok(())
            }
            Release::Fault(reason) => Err(PrintError::Fault(reason)),
            Release::Interrupt => Err(PrintError::Interrupted),
        }
    }

    fn stop(&self) {
        let mut state = self.lock();
        if state.awaiting_release() {
            state.release = Some(Release::Interrupt);
            state.interrupts += 1;
            self.changed.notify_all();
        }
    }
}

/// Engine that warms up before printing and ignores `stop` until then.
/// Every print succeeds.
pub(crate) struct SlowStartPrinter {
    setup: Duration,
    entered: AtomicBool,
    stops: AtomicUsize,
}

impl SlowStartPrinter {
    pub(crate) fn new(setup: Duration) -> Self {
        Self {
            setup,
            entered: AtomicBool::new(false),
            stops: AtomicUsize::new(0),
        }
    }

    /// Wait until `print` has been called.
    pub(crate) fn wait_for_entry(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.entered.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl PrintEngine for SlowStartPrinter {
    fn print(&self, _document: &dyn Printable) -> Result<(), PrintError> {
        self.entered.store(true, Ordering::SeqCst);
        std::thread::sleep(self.setup);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
