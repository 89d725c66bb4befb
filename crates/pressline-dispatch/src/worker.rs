// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-flight print worker.
//
// The worker owns the print engine and feeds it one document at a time in
// submission order. The engine's `print` call blocks for the whole print, so
// it runs on a blocking thread; the worker's own loop stays free to accept
// new jobs and cancellation requests while a print is underway.
//
// Every job gets its own event sink. The sink always sees `AddedToQueue`
// first, then `Starting`, then exactly one of `Complete` / `Cancelled`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pressline_core::engine::{PrintEngine, PrintError};
use pressline_core::types::{CancelCause, JobId, Printable, SharedDocument};

use crate::breaker::FaultBreaker;

/// Lifecycle notifications emitted for a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintEvent {
    /// The worker accepted the job.
    AddedToQueue,
    /// The job now owns the printer.
    Starting,
    /// The document was printed.
    Complete,
    /// The job ended without being printed.
    Cancelled(CancelCause),
}

impl PrintEvent {
    /// Whether this event ends the job's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled(_))
    }
}

/// Where the worker reports a job's events.
pub type EventSink = mpsc::UnboundedSender<PrintEvent>;

/// A document together with the id the ledger gave it.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub id: JobId,
    pub document: SharedDocument,
}

pub(crate) enum WorkerCommand {
    Print { job: PrintJob, sink: EventSink },
    Cancel,
    Shutdown,
}

/// Result of one engine call, reported back from the blocking thread.
struct Finished {
    id: JobId,
    result: Result<(), PrintError>,
}

struct QueuedJob {
    job: PrintJob,
    sink: EventSink,
}

struct ActiveJob {
    job: PrintJob,
    sink: EventSink,
    cancel_requested: Arc<AtomicBool>,
}

/// Sending side of a running worker.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    commands: mpsc::UnboundedSender<WorkerCommand>,
}

impl WorkerHandle {
    /// Start a worker task on the current runtime.
    pub(crate) fn spawn(engine: Arc<dyn PrintEngine>, breaker: FaultBreaker) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            engine,
            queue: VecDeque::new(),
            active: None,
            breaker,
            finished_tx,
        };
        tokio::spawn(worker.run(commands_rx, finished_rx));
        Self {
            commands: commands_tx,
        }
    }

    /// A handle whose commands land in the returned receiver instead of a
    /// running worker.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<WorkerCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }

    pub(crate) fn print(&self, job: PrintJob, sink: EventSink) {
        self.send(WorkerCommand::Print { job, sink });
    }

    pub(crate) fn cancel(&self) {
        self.send(WorkerCommand::Cancel);
    }

    pub(crate) fn shutdown(&self) {
        self.send(WorkerCommand::Shutdown);
    }

    fn send(&self, command: WorkerCommand) {
        if self.commands.send(command).is_err() {
            debug!("print worker already stopped; command dropped");
        }
    }
}

struct Worker {
    engine: Arc<dyn PrintEngine>,
    queue: VecDeque<QueuedJob>,
    active: Option<ActiveJob>,
    breaker: FaultBreaker,
    finished_tx: mpsc::UnboundedSender<Finished>,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
        mut finished: mpsc::UnboundedReceiver<Finished>,
    ) {
        debug!("print worker started");
        loop {
            // Only an idle worker with a held queue has anything to wake up for.
            let wake_at = match (&self.active, self.queue.is_empty()) {
                (None, false) => self.breaker.retry_at().map(tokio::time::Instant::from_std),
                _ => None,
            };

            tokio::select! {
                command = commands.recv() => match command {
                    Some(WorkerCommand::Print { job, sink }) => self.on_print(job, sink),
                    Some(WorkerCommand::Cancel) => self.on_cancel(),
                    Some(WorkerCommand::Shutdown) | None => {
                        self.on_shutdown();
                        break;
                    }
                },
                Some(done) = finished.recv() => self.on_finished(done),
                _ = tokio::time::sleep_until(wake_at.unwrap_or_else(tokio::time::Instant::now)),
                    if wake_at.is_some() => self.promote_next(),
            }
        }
        debug!("print worker stopped");
    }

    fn on_print(&mut self, job: PrintJob, sink: EventSink) {
        let _ = sink.send(PrintEvent::AddedToQueue);
        debug!(job_id = %job.id, name = %job.document.name(), "add document to queue");
        self.queue.push_back(QueuedJob { job, sink });
        self.promote_next();
    }

    /// Start the queue head if the printer is free and the breaker allows it.
    fn promote_next(&mut self) {
        if self.active.is_some() || self.queue.is_empty() {
            return;
        }
        if !self.breaker.allow_start(Instant::now()) {
            return;
        }
        if let Some(next) = self.queue.pop_front() {
            self.start(next);
        }
    }

    fn start(&mut self, QueuedJob { job, sink }: QueuedJob) {
        info!(job_id = %job.id, name = %job.document.name(), "start printing document");
        let _ = sink.send(PrintEvent::Starting);

        let cancel_requested = Arc::new(AtomicBool::new(false));
        let engine = Arc::clone(&self.engine);
        let document = Arc::clone(&job.document);
        let cancelled = Arc::clone(&cancel_requested);
        let print = tokio::task::spawn_blocking(move || {
            // A cancel may land before this thread reaches the engine.
            if cancelled.load(Ordering::SeqCst) {
                return Err(PrintError::Interrupted);
            }
            engine.print(document.as_ref())
        });

        let finished = self.finished_tx.clone();
        let id = job.id;
        tokio::spawn(async move {
            let result = match print.await {
                Ok(result) => result,
                Err(e) => Err(PrintError::Fault(format!("print thread died: {e}"))),
            };
            let _ = finished.send(Finished { id, result });
        });

        self.active = Some(ActiveJob {
            job,
            sink,
            cancel_requested,
        });
    }

    fn on_finished(&mut self, Finished { id, result }: Finished) {
        let Some(active) = self.active.take_if(|active| active.job.id == id) else {
            debug!(job_id = %id, "late result for a job that is no longer active");
            return;
        };
        let cancel_requested = active.cancel_requested.load(Ordering::SeqCst);
        let name = active.job.document.name();

        let event = match result {
            // The cancel reached the engine before it could be stopped.
            Ok(()) if cancel_requested => {
                info!(
                    job_id = %id,
                    name = %name,
                    "print finished after cancel; reporting cancelled"
                );
                self.breaker.record_success();
                PrintEvent::Cancelled(CancelCause::Requested)
            }
            Ok(()) => {
                info!(job_id = %id, name = %name, "print complete");
                self.breaker.record_success();
                PrintEvent::Complete
            }
            Err(PrintError::Interrupted) => {
                if !cancel_requested {
                    warn!(
                        job_id = %id,
                        name = %name,
                        "engine interrupted a print nobody cancelled"
                    );
                }
                info!(job_id = %id, name = %name, "print cancelled");
                self.breaker.abandon_probe();
                PrintEvent::Cancelled(CancelCause::Requested)
            }
            Err(PrintError::Fault(reason)) if cancel_requested => {
                info!(job_id = %id, name = %name, %reason, "print cancelled");
                self.breaker.abandon_probe();
                PrintEvent::Cancelled(CancelCause::Requested)
            }
            Err(PrintError::Fault(reason)) => {
                self.breaker.record_fault(&reason, Instant::now());
                error!(
                    job_id = %id,
                    name = %name,
                    %reason,
                    consecutive_faults = self.breaker.consecutive_faults(),
                    breaker = ?self.breaker.state(),
                    "print failed"
                );
                PrintEvent::Cancelled(CancelCause::Fault(reason))
            }
        };

        let _ = active.sink.send(event);
        self.promote_next();
    }

    fn on_cancel(&mut self) {
        let Some(active) = &self.active else {
            debug!("no active print; cancel ignored");
            return;
        };
        if active.cancel_requested.swap(true, Ordering::SeqCst) {
            debug!(job_id = %active.job.id, "cancel already in progress");
            return;
        }
        info!(job_id = %active.job.id, name = %active.job.document.name(), "cancel printing");
        self.engine.stop();
    }

    fn on_shutdown(&mut self) {
        if let Some(active) = &self.active {
            info!(job_id = %active.job.id, "abandoning active print");
            active.cancel_requested.store(true, Ordering::SeqCst);
            self.engine.stop();
        }
        if !self.queue.is_empty() {
            debug!(discarded = self.queue.len(), "discarding queued jobs");
        }
        self.queue.clear();
        self.active = None;
    }
}
