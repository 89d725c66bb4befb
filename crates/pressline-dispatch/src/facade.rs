// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blocking front end for callers that do not run an async runtime.
//
// `PrintDispatcher` owns a private tokio runtime hosting the ledger, the
// worker and the job watchers. Every query is sent to the ledger and the
// calling thread waits for the reply, for at most the configured ask
// timeout. A query that times out (or finds the ledger gone) logs a warning
// and returns an empty answer, so a slow ledger looks exactly like an empty
// one to the caller.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, instrument, warn};

use pressline_core::config::DispatchConfig;
use pressline_core::engine::PrintEngine;
use pressline_core::error::{PresslineError, Result};
use pressline_core::types::{LedgerSnapshot, SharedDocument};

use crate::ledger::{CompletionHandle, LedgerHandle};

/// Synchronous print dispatcher.
///
/// None of its methods may be called from inside an async context; async
/// callers should use [`PrintDispatcher::ledger`] instead.
pub struct PrintDispatcher {
    runtime: Option<Runtime>,
    ledger: LedgerHandle,
    ask_timeout: Duration,
}

impl PrintDispatcher {
    /// Start a dispatcher printing to `engine`.
    #[instrument(skip_all, fields(threads = config.runtime_threads))]
    pub fn start(engine: Arc<dyn PrintEngine>, config: &DispatchConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.runtime_threads)
            .thread_name("pressline-dispatch")
            .enable_all()
            .build()
            .map_err(|e| PresslineError::Runtime(format!("build runtime: {e}")))?;

        let ledger = {
            let _guard = runtime.enter();
            LedgerHandle::start(engine, config)?
        };

        info!(ask_timeout_ms = config.ask_timeout_ms, "print dispatcher started");
        Ok(Self {
            runtime: Some(runtime),
            ledger,
            ask_timeout: config.ask_timeout(),
        })
    }

    /// Queue `document` for printing.
    pub fn submit(&self, document: SharedDocument) {
        if let Err(e) = self.ledger.submit(document) {
            warn!(error = %e, "submission dropped");
        }
    }

    /// Queue `document`; the returned handle resolves once it is printed or
    /// cancelled.
    pub fn submit_and_await(&self, document: SharedDocument) -> CompletionHandle {
        self.ledger.submit_and_await(document)
    }

    /// Abandon the document being printed, if any. Queued documents are
    /// unaffected.
    pub fn cancel_current(&self) {
        if let Err(e) = self.ledger.cancel_current() {
            warn!(error = %e, "cancel dropped");
        }
    }

    /// Stop dispatching and return the documents that were never printed,
    /// sorted by name. Calling it again returns the same list.
    pub fn stop(&self) -> Vec<SharedDocument> {
        self.ask_blocking("stop", self.ledger.stop())
    }

    /// Printed documents, by name.
    pub fn list_printed(&self) -> Vec<SharedDocument> {
        self.ask_blocking("list_printed", self.ledger.list_printed())
    }

    /// Printed documents, in the order defined by `order`.
    pub fn list_printed_by<F>(&self, order: F) -> Vec<SharedDocument>
    where
        F: Fn(&SharedDocument, &SharedDocument) -> Ordering + Send + 'static,
    {
        self.ask_blocking("list_printed", self.ledger.list_printed_by(order))
    }

    /// Mean print duration of the printed documents, to the millisecond.
    pub fn average_print_time(&self) -> Duration {
        self.ask_blocking("average_print_time", self.ledger.average_print_time())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ask_blocking("snapshot", self.ledger.snapshot())
    }

    /// Call `listener` once nothing is waiting, queued or printing.
    pub fn notify_when_drained<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(e) = self.ledger.notify_when_drained(listener) {
            warn!(error = %e, "drain listener dropped");
        }
    }

    /// Block until the ledger is drained. False if that did not happen
    /// within the ask timeout.
    pub fn wait_until_drained(&self) -> bool {
        self.ask_blocking("wait_until_drained", async {
            self.ledger.drained().await.map(|()| true)
        })
    }

    /// The async handle behind this dispatcher.
    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    /// Stop dispatching and release the runtime. An engine call that is
    /// still unwinding is left to finish on its own thread.
    pub fn shutdown(mut self) -> Vec<SharedDocument> {
        let pending = self.stop();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("print dispatcher runtime released");
        }
        pending
    }

    fn ask_blocking<T, F>(&self, query: &'static str, request: F) -> T
    where
        T: Default,
        F: Future<Output = Result<T>>,
    {
        let Some(runtime) = &self.runtime else {
            warn!(query, "print dispatcher already shut down");
            return T::default();
        };

        let timeout = self.ask_timeout;
        let answer = runtime.block_on(async move { tokio::time::timeout(timeout, request).await });
        let error = match answer {
            Ok(Ok(answer)) => return answer,
            Ok(Err(e)) => e,
            Err(_) => PresslineError::QueryTimeout(timeout),
        };
        warn!(query, error = %error, "ledger query failed; returning empty answer");
        T::default()
    }
}

impl Drop for PrintDispatcher {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if Handle::try_current().is_ok() {
            warn!("print dispatcher dropped inside an async context; skipping graceful stop");
        } else {
            let ledger = self.ledger.clone();
            let timeout = self.ask_timeout;
            let stopped =
                runtime.block_on(async move { tokio::time::timeout(timeout, ledger.stop()).await });
            if !matches!(stopped, Ok(Ok(_))) {
                warn!("print ledger did not confirm stop before shutdown");
            }
        }
        runtime.shutdown_background();
        debug!("print dispatcher runtime released");
    }
}
