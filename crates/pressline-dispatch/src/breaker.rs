// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fault breaker for the print engine.
//
// A printer that keeps faulting should not be fed the whole queue, one
// failing document after another. After enough consecutive faults the
// breaker opens and the worker stops starting jobs. Once the cooldown has
// passed a single probe job is let through; its result decides whether
// printing resumes.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation; jobs start as soon as the printer is free.
    Closed,
    /// Too many faults; no job may start until the cooldown expires.
    Open,
    /// Cooldown expired; one probe job may start.
    HalfOpen,
}

/// Consecutive-fault tracker for a single print engine.
#[derive(Debug)]
pub struct FaultBreaker {
    state: BreakerState,
    consecutive_faults: u32,
    opened_at: Option<Instant>,
    last_fault: Option<String>,
    threshold: u32,
    base_cooldown: Duration,
}

impl FaultBreaker {
    pub fn new(threshold: u32, base_cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_faults: 0,
            opened_at: None,
            last_fault: None,
            threshold: threshold.max(1),
            base_cooldown,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_faults(&self) -> u32 {
        self.consecutive_faults
    }

    /// Whether a job may be started now.
    ///
    /// Moves an open breaker to half-open when its cooldown has expired; the
    /// caller is then expected to start exactly one probe job.
    pub fn allow_start(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => match self.retry_at() {
                Some(at) if now >= at => {
                    info!(
                        faults = self.consecutive_faults,
                        last_fault = self.last_fault.as_deref().unwrap_or_default(),
                        "breaker half-open; probing printer"
                    );
                    self.state = BreakerState::HalfOpen;
                    true
                }
                Some(at) => {
                    debug!(
                        remaining_ms = at.saturating_duration_since(now).as_millis(),
                        "breaker open; holding queue"
                    );
                    false
                }
                None => {
                    // Open without a timestamp cannot happen; recover rather than stall.
                    self.state = BreakerState::Closed;
                    true
                }
            },
            // The probe is already running.
            BreakerState::HalfOpen => false,
        }
    }

    /// When an open breaker lets the next probe through.
    pub fn retry_at(&self) -> Option<Instant> {
        match self.state {
            BreakerState::Open => {
                let cooldown = cooldown_duration(self.base_cooldown, self.consecutive_faults);
                self.opened_at.map(|opened| opened + cooldown)
            }
            _ => None,
        }
    }

    pub fn record_success(&mut self) {
        if self.state != BreakerState::Closed {
            info!(prev_state = ?self.state, "printer recovered; closing breaker");
        }
        self.state = BreakerState::Closed;
        self.consecutive_faults = 0;
        self.opened_at = None;
        self.last_fault = None;
    }

    /// The probe ended without telling us anything (it was cancelled).
    /// The next start attempt becomes the probe instead.
    pub fn abandon_probe(&mut self) {
        if self.state == BreakerState::HalfOpen {
            debug!("probe cancelled; next job will probe");
            self.state = BreakerState::Open;
        }
    }

    pub fn record_fault(&mut self, reason: &str, now: Instant) {
        self.consecutive_faults += 1;
        self.last_fault = Some(reason.to_string());

        if self.state == BreakerState::HalfOpen {
            warn!(faults = self.consecutive_faults, "probe failed; reopening breaker");
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
        } else if self.consecutive_faults >= self.threshold && self.state == BreakerState::Closed {
            warn!(faults = self.consecutive_faults, "opening fault breaker");
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
        }
    }
}

/// Cooldown grows with the number of consecutive faults.
///
/// below 5 faults: base
/// 5 faults: 4 × base
/// 10+ faults: 10 × base
fn cooldown_duration(base: Duration, faults: u32) -> Duration {
    if faults >= 10 {
        base.saturating_mul(10)
    } else if faults >= 5 {
        base.saturating_mul(4)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(30);

    #[test]
    fn fresh_breaker_allows_starts() {
        let mut breaker = FaultBreaker::new(3, COOLDOWN);
        assert!(breaker.allow_start(Instant::now()));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn opens_after_threshold() {
        let mut breaker = FaultBreaker::new(3, COOLDOWN);
        let now = Instant::now();

        breaker.record_fault("jam", now);
        breaker.record_fault("jam", now);
        assert!(breaker.allow_start(now));

        breaker.record_fault("jam", now);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_start(now));
        assert_eq!(breaker.retry_at(), Some(now + COOLDOWN));
        assert_eq!(breaker.last_fault.as_deref(), Some("jam"));
    }

    #[test]
    fn half_open_after_cooldown_allows_one_probe() {
        let mut breaker = FaultBreaker::new(1, COOLDOWN);
        let now = Instant::now();
        breaker.record_fault("jam", now);

        let later = now + COOLDOWN;
        assert!(breaker.allow_start(later));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(!breaker.allow_start(later));
    }

    #[test]
    fn failed_probe_reopens() {
        let mut breaker = FaultBreaker::new(1, COOLDOWN);
        let now = Instant::now();
        breaker.record_fault("jam", now);
        let later = now + COOLDOWN;
        assert!(breaker.allow_start(later));

        breaker.record_fault("still jammed", later);
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.retry_at(), Some(later + COOLDOWN));
    }

    #[test]
    fn abandoned_probe_lets_the_next_job_probe() {
        let mut breaker = FaultBreaker::new(1, COOLDOWN);
        let now = Instant::now();
        breaker.record_fault("jam", now);
        let later = now + COOLDOWN;
        assert!(breaker.allow_start(later));

        breaker.abandon_probe();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.allow_start(later));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn success_resets() {
        let mut breaker = FaultBreaker::new(2, COOLDOWN);
        let now = Instant::now();
        breaker.record_fault("jam", now);
        breaker.record_fault("jam", now);
        assert!(!breaker.allow_start(now));

        breaker.record_success();
        assert!(breaker.allow_start(now));
        assert_eq!(breaker.consecutive_faults(), 0);
        assert_eq!(breaker.retry_at(), None);
    }

    #[test]
    fn cooldown_escalates() {
        assert_eq!(cooldown_duration(COOLDOWN, 3), COOLDOWN);
        assert_eq!(cooldown_duration(COOLDOWN, 5), COOLDOWN * 4);
        assert_eq!(cooldown_duration(COOLDOWN, 12), COOLDOWN * 10);
    }
}
