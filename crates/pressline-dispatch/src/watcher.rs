// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-job event relay between the worker and the ledger.
//
// Each submitted job gets its own watcher task. Because a watcher only ever
// sees one job's events, and forwards them in the order received, the
// ledger observes every job's lifecycle in the order the worker emitted it.

use tokio::sync::mpsc;
use tracing::trace;

use pressline_core::types::JobId;

use crate::ledger::{JobTransition, LifecycleUpdate};
use crate::worker::{EventSink, PrintEvent};

struct JobWatcher {
    id: JobId,
    ledger: mpsc::UnboundedSender<LifecycleUpdate>,
}

/// Spawn a watcher for job `id` and return the sink the worker should
/// report that job's events to.
pub(crate) fn spawn(id: JobId, ledger: mpsc::UnboundedSender<LifecycleUpdate>) -> EventSink {
    let (sink, events) = mpsc::unbounded_channel();
    tokio::spawn(JobWatcher { id, ledger }.run(events));
    sink
}

impl JobWatcher {
    async fn run(self, mut events: mpsc::UnboundedReceiver<PrintEvent>) {
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            let update = LifecycleUpdate {
                id: self.id,
                transition: JobTransition::from(event),
            };
            if self.ledger.send(update).is_err() {
                trace!(job_id = %self.id, "ledger gone; watcher exiting");
                return;
            }
            if terminal {
                break;
            }
        }
        trace!(job_id = %self.id, "watcher finished");
    }
}
