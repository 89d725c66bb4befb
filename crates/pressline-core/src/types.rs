// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pressline dispatcher.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PresslineError;
use crate::paper::{IsoPaperSize, MediaSize};

/// Identifier assigned to a print job by the ledger.
///
/// Ids are handed out in submission order starting from [`JobId::FIRST`] and
/// are never reused, so comparing two ids compares their submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub i64);

impl JobId {
    /// The first id a fresh ledger assigns.
    pub const FIRST: JobId = JobId(i64::MIN);

    /// The id assigned to the submission after this one.
    pub fn next(self) -> JobId {
        JobId(self.0.wrapping_add(1))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything the dispatcher can print.
///
/// The dispatcher never looks at document content, only at these three facets.
pub trait Printable: fmt::Debug + Send + Sync {
    /// Display name, also the default sort key.
    fn name(&self) -> &str;

    /// Medium the document is printed on.
    fn size(&self) -> MediaSize;

    /// Recorded (or expected) time the printer needs for this document.
    fn print_duration(&self) -> Duration;
}

/// Documents are shared between the caller, the ledger, and the worker.
pub type SharedDocument = Arc<dyn Printable>;

/// A plain in-memory document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub size: MediaSize,
    pub print_duration: Duration,
}

impl Document {
    /// An A4 document named `name` that prints instantly.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: IsoPaperSize::A4.size(),
            print_duration: Duration::ZERO,
        }
    }

    pub fn with_size(mut self, size: impl Into<MediaSize>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_print_duration(mut self, print_duration: Duration) -> Self {
        self.print_duration = print_duration;
        self
    }

    /// Wrap in an `Arc` ready for submission.
    pub fn shared(self) -> SharedDocument {
        Arc::new(self)
    }
}

impl Printable for Document {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> MediaSize {
        self.size
    }

    fn print_duration(&self) -> Duration {
        self.print_duration
    }
}

/// Parses `name[:SIZE[:MILLIS]]`, e.g. `report:A3:1500`.
impl FromStr for Document {
    type Err = PresslineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let name = parts.next().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(PresslineError::InvalidDocument(format!(
                "missing document name in {s:?}"
            )));
        }

        let mut document = Document::new(name);
        if let Some(size) = parts.next() {
            document = document.with_size(size.parse::<IsoPaperSize>()?);
        }
        if let Some(millis) = parts.next() {
            let millis: u64 = millis.trim().parse().map_err(|e| {
                PresslineError::InvalidDocument(format!("bad print duration {millis:?}: {e}"))
            })?;
            document = document.with_print_duration(Duration::from_millis(millis));
        }
        if parts.next().is_some() {
            return Err(PresslineError::InvalidDocument(format!(
                "too many fields in {s:?}"
            )));
        }
        Ok(document)
    }
}

/// Final result of a job, reported to completion listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintOutcome {
    Completed,
    Cancelled,
}

/// Why a job ended without being printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelCause {
    /// The caller cancelled the active job, or the worker was shut down.
    Requested,
    /// The print engine failed for a reason unrelated to cancellation.
    Fault(String),
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("cancellation requested"),
            Self::Fault(reason) => write!(f, "print fault: {reason}"),
        }
    }
}

/// Point-in-time counts of the ledger's partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub waiting: usize,
    pub queued: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub stopped: bool,
}

impl LedgerSnapshot {
    /// Jobs that are not yet finished.
    pub fn pending(&self) -> usize {
        self.waiting + self.queued + self.in_progress
    }

    /// True when no job is waiting, queued, or in progress.
    pub fn is_drained(&self) -> bool {
        self.pending() == 0
    }
}
