// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The print ledger: every job the dispatcher knows about, and where it is.
//
// The ledger is a single task owning four disjoint partitions (waiting,
// queued, in progress, complete). Callers talk to it through a
// `LedgerHandle`; job watchers feed it lifecycle updates on a separate
// channel. Both streams are handled one message at a time, so the
// partitions need no locking.
//
// After `stop` the ledger keeps answering queries against the frozen
// complete set, but accepts no new work and ignores lifecycle updates.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use pressline_core::config::DispatchConfig;
use pressline_core::engine::PrintEngine;
use pressline_core::error::{PresslineError, Result};
use pressline_core::order::{self, DocumentOrder};
use pressline_core::types::{
    CancelCause, JobId, LedgerSnapshot, PrintOutcome, Printable, SharedDocument,
};

use crate::breaker::FaultBreaker;
use crate::watcher;
use crate::worker::{PrintEvent, PrintJob, WorkerHandle};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Ledger-side view of a worker event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JobTransition {
    Queued,
    Started,
    Completed,
    Cancelled(CancelCause),
}

impl From<PrintEvent> for JobTransition {
    fn from(event: PrintEvent) -> Self {
        match event {
            PrintEvent::AddedToQueue => Self::Queued,
            PrintEvent::Starting => Self::Started,
            PrintEvent::Complete => Self::Completed,
            PrintEvent::Cancelled(cause) => Self::Cancelled(cause),
        }
    }
}

/// A transition for one job, relayed by that job's watcher.
#[derive(Debug)]
pub(crate) struct LifecycleUpdate {
    pub(crate) id: JobId,
    pub(crate) transition: JobTransition,
}

type DrainListener = Box<dyn FnOnce() + Send>;

enum LedgerCommand {
    Submit {
        document: SharedDocument,
        listener: Option<oneshot::Sender<PrintOutcome>>,
    },
    CancelCurrent,
    Stop {
        respond_to: oneshot::Sender<Vec<SharedDocument>>,
    },
    ListPrinted {
        order: DocumentOrder,
        respond_to: oneshot::Sender<Vec<SharedDocument>>,
    },
    AveragePrintTime {
        respond_to: oneshot::Sender<Duration>,
    },
    NotifyWhenDrained {
        listener: DrainListener,
    },
    Snapshot {
        respond_to: oneshot::Sender<LedgerSnapshot>,
    },
}

// ---------------------------------------------------------------------------
// Ledger task
// ---------------------------------------------------------------------------

struct Ledger {
    next_id: JobId,
    waiting: BTreeMap<JobId, SharedDocument>,
    queued: BTreeMap<JobId, SharedDocument>,
    in_progress: BTreeMap<JobId, SharedDocument>,
    complete: BTreeMap<JobId, SharedDocument>,
    completion_listeners: HashMap<JobId, oneshot::Sender<PrintOutcome>>,
    drain_listeners: Vec<DrainListener>,
    worker: WorkerHandle,
    lifecycle_tx: mpsc::UnboundedSender<LifecycleUpdate>,
    /// Documents that were still pending when the ledger stopped.
    stopped: Option<Vec<SharedDocument>>,
}

impl Ledger {
    fn new(worker: WorkerHandle, lifecycle_tx: mpsc::UnboundedSender<LifecycleUpdate>) -> Self {
        Self {
            next_id: JobId::FIRST,
            waiting: BTreeMap::new(),
            queued: BTreeMap::new(),
            in_progress: BTreeMap::new(),
            complete: BTreeMap::new(),
            completion_listeners: HashMap::new(),
            drain_listeners: Vec::new(),
            worker,
            lifecycle_tx,
            stopped: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<LedgerCommand>,
        mut lifecycle: mpsc::UnboundedReceiver<LifecycleUpdate>,
    ) {
        debug!("print ledger started");
        loop {
            tokio::select! {
                biased;
                Some(update) = lifecycle.recv() => self.apply(update),
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        // Every handle is gone; nobody can observe the remaining jobs.
        self.worker.shutdown();
        debug!("print ledger stopped");
    }

    fn handle(&mut self, command: LedgerCommand) {
        match command {
            LedgerCommand::Submit { document, listener } => self.submit(document, listener),
            LedgerCommand::CancelCurrent => self.cancel_current(),
            LedgerCommand::Stop { respond_to } => {
                let pending = self.stop();
                let _ = respond_to.send(pending);
            }
            LedgerCommand::ListPrinted { order, respond_to } => {
                let _ = respond_to.send(self.list_printed(order));
            }
            LedgerCommand::AveragePrintTime { respond_to } => {
                let _ = respond_to.send(self.average_print_time());
            }
            LedgerCommand::NotifyWhenDrained { listener } => self.notify_when_drained(listener),
            LedgerCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn submit(
        &mut self,
        document: SharedDocument,
        listener: Option<oneshot::Sender<PrintOutcome>>,
    ) {
        if self.stopped.is_some() {
            debug!(name = %document.name(), "ledger stopped; submission ignored");
            return;
        }

        let id = self.next_id;
        self.next_id = id.next();
        info!(job_id = %id, name = %document.name(), "add to print");

        self.waiting.insert(id, Arc::clone(&document));
        if let Some(listener) = listener {
            self.completion_listeners.insert(id, listener);
        }
        let sink = watcher::spawn(id, self.lifecycle_tx.clone());
        self.worker.print(PrintJob { id, document }, sink);
    }

    fn cancel_current(&self) {
        if self.stopped.is_some() {
            debug!("ledger stopped; cancel ignored");
            return;
        }
        self.worker.cancel();
    }

    fn apply(&mut self, LifecycleUpdate { id, transition }: LifecycleUpdate) {
        if self.stopped.is_some() {
            debug!(job_id = %id, ?transition, "ledger stopped; lifecycle update ignored");
            return;
        }

        let known = match &transition {
            JobTransition::Queued => advance(&mut self.waiting, &mut self.queued, id),
            JobTransition::Started => advance(&mut self.queued, &mut self.in_progress, id),
            JobTransition::Completed => {
                let known = advance(&mut self.in_progress, &mut self.complete, id);
                if known {
                    self.resolve(id, PrintOutcome::Completed);
                    self.check_drained();
                }
                known
            }
            JobTransition::Cancelled(cause) => {
                let removed = self
                    .in_progress
                    .remove(&id)
                    .or_else(|| self.queued.remove(&id))
                    .or_else(|| self.waiting.remove(&id));
                if let Some(document) = &removed {
                    info!(job_id = %id, name = %document.name(), %cause, "job cancelled");
                    self.resolve(id, PrintOutcome::Cancelled);
                    self.check_drained();
                }
                removed.is_some()
            }
        };

        if !known {
            error!(job_id = %id, ?transition, "lifecycle update for a job in the wrong state");
        }
        debug_assert!(known, "lifecycle update {transition:?} for job {id} in the wrong state");
    }

    fn resolve(&mut self, id: JobId, outcome: PrintOutcome) {
        if let Some(listener) = self.completion_listeners.remove(&id) {
            let _ = listener.send(outcome);
        }
    }

    fn is_drained(&self) -> bool {
        self.waiting.is_empty() && self.queued.is_empty() && self.in_progress.is_empty()
    }

    fn check_drained(&mut self) {
        if !self.is_drained() || self.drain_listeners.is_empty() {
            return;
        }
        debug!(listeners = self.drain_listeners.len(), "ledger drained");
        for listener in self.drain_listeners.drain(..) {
            listener();
        }
    }

    fn stop(&mut self) -> Vec<SharedDocument> {
        if let Some(pending) = &self.stopped {
            debug!("ledger already stopped");
            return pending.clone();
        }

        self.worker.shutdown();

        let mut pending: Vec<SharedDocument> = std::mem::take(&mut self.waiting)
            .into_values()
            .chain(std::mem::take(&mut self.queued).into_values())
            .chain(std::mem::take(&mut self.in_progress).into_values())
            .collect();
        pending.sort_by(order::by_name);

        // Anything still listening belongs to a job that will never finish.
        for (_, listener) in self.completion_listeners.drain() {
            let _ = listener.send(PrintOutcome::Cancelled);
        }

        info!(
            abandoned = pending.len(),
            printed = self.complete.len(),
            "print ledger stopped"
        );
        self.stopped = Some(pending.clone());
        self.check_drained();
        pending
    }

    fn list_printed(&self, order: DocumentOrder) -> Vec<SharedDocument> {
        let mut printed: Vec<SharedDocument> = self.complete.values().cloned().collect();
        printed.sort_by(|a, b| order(a, b));
        printed
    }

    /// Mean over whole milliseconds, rounded to the nearest millisecond.
    fn average_print_time(&self) -> Duration {
        if self.complete.is_empty() {
            return Duration::ZERO;
        }
        let total_ms: u128 = self
            .complete
            .values()
            .map(|document| document.print_duration().as_millis())
            .sum();
        let mean_ms = total_ms as f64 / self.complete.len() as f64;
        Duration::from_millis(mean_ms.round() as u64)
    }

    fn notify_when_drained(&mut self, listener: DrainListener) {
        if self.is_drained() {
            listener();
        } else {
            self.drain_listeners.push(listener);
        }
    }

    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            waiting: self.waiting.len(),
            queued: self.queued.len(),
            in_progress: self.in_progress.len(),
            completed: self.complete.len(),
            stopped: self.stopped.is_some(),
        }
    }
}

/// Move `id` from one partition to the next. False if it was not in `from`.
fn advance(
    from: &mut BTreeMap<JobId, SharedDocument>,
    to: &mut BTreeMap<JobId, SharedDocument>,
    id: JobId,
) -> bool {
    match from.remove(&id) {
        Some(document) => {
            to.insert(id, document);
            true
        }
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// Async front door to a running ledger.
///
/// Cheap to clone. The ledger (and its worker) shut down once every clone
/// has been dropped.
#[derive(Clone)]
pub struct LedgerHandle {
    commands: mpsc::UnboundedSender<LedgerCommand>,
    runtime: Handle,
}

impl LedgerHandle {
    /// Start a ledger and its worker on the current tokio runtime.
    pub fn start(engine: Arc<dyn PrintEngine>, config: &DispatchConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| PresslineError::Runtime(e.to_string()))?;
        let _guard = runtime.enter();
        let breaker = FaultBreaker::new(config.fault_threshold, config.fault_cooldown());
        Ok(Self::with_worker(WorkerHandle::spawn(engine, breaker)))
    }

    pub(crate) fn with_worker(worker: WorkerHandle) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        let ledger = Ledger::new(worker, lifecycle_tx);
        tokio::spawn(ledger.run(commands_rx, lifecycle_rx));
        Self {
            commands: commands_tx,
            runtime: Handle::current(),
        }
    }

    /// Queue `document` for printing.
    pub fn submit(&self, document: SharedDocument) -> Result<()> {
        self.send(LedgerCommand::Submit {
            document,
            listener: None,
        })
    }

    /// Queue `document` and get a handle that resolves with its outcome.
    pub fn submit_and_await(&self, document: SharedDocument) -> CompletionHandle {
        let (listener, outcome) = oneshot::channel();
        // A dead ledger drops the listener, which the handle reports as `None`.
        let _ = self.send(LedgerCommand::Submit {
            document,
            listener: Some(listener),
        });
        CompletionHandle {
            outcome,
            runtime: self.runtime.clone(),
        }
    }

    /// Ask the worker to abandon the document it is printing, if any.
    pub fn cancel_current(&self) -> Result<()> {
        self.send(LedgerCommand::CancelCurrent)
    }

    /// Stop the ledger and return the documents that were never printed,
    /// sorted by name. Later calls return the same list.
    pub async fn stop(&self) -> Result<Vec<SharedDocument>> {
        self.ask(|respond_to| LedgerCommand::Stop { respond_to }).await
    }

    /// Printed documents, by name.
    pub async fn list_printed(&self) -> Result<Vec<SharedDocument>> {
        self.list_printed_by(order::by_name).await
    }

    /// Printed documents, in the order defined by `order`.
    pub async fn list_printed_by<F>(&self, order: F) -> Result<Vec<SharedDocument>>
    where
        F: Fn(&SharedDocument, &SharedDocument) -> Ordering + Send + 'static,
    {
        self.ask(|respond_to| LedgerCommand::ListPrinted {
            order: Box::new(order),
            respond_to,
        })
        .await
    }

    /// Mean print duration of the printed documents; zero if there are none.
    pub async fn average_print_time(&self) -> Result<Duration> {
        self.ask(|respond_to| LedgerCommand::AveragePrintTime { respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot> {
        self.ask(|respond_to| LedgerCommand::Snapshot { respond_to }).await
    }

    /// Call `listener` once nothing is waiting, queued or printing. Runs
    /// immediately if that is already the case.
    ///
    /// The listener runs on the ledger task and must not block.
    pub fn notify_when_drained<F>(&self, listener: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(LedgerCommand::NotifyWhenDrained {
            listener: Box::new(listener),
        })
    }

    /// Resolves once the ledger is drained.
    pub async fn drained(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.notify_when_drained(move || {
            let _ = tx.send(());
        })?;
        rx.await.map_err(|_| PresslineError::LedgerUnavailable)
    }

    async fn ask<T>(&self, request: impl FnOnce(oneshot::Sender<T>) -> LedgerCommand) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.send(request(respond_to))?;
        response.await.map_err(|_| PresslineError::LedgerUnavailable)
    }

    fn send(&self, command: LedgerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PresslineError::LedgerUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Completion handle
// ---------------------------------------------------------------------------

/// Outcome of a job submitted with [`LedgerHandle::submit_and_await`].
///
/// Resolves to `None` only when the ledger dropped the job without an
/// outcome, which happens for submissions made after `stop`.
#[derive(Debug)]
pub struct CompletionHandle {
    outcome: oneshot::Receiver<PrintOutcome>,
    runtime: Handle,
}

impl CompletionHandle {
    /// Block until the job finishes. Must not be called from async code.
    pub fn wait(self) -> Option<PrintOutcome> {
        self.outcome.blocking_recv().ok()
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Option<PrintOutcome> {
        let runtime = self.runtime.clone();
        runtime.block_on(async move { tokio::time::timeout(timeout, self).await.ok().flatten() })
    }
}

impl Future for CompletionHandle {
    type Output = Option<PrintOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx).map(|outcome| outcome.ok())
    }
}
