//! Readiness polling for stack services.
//!
//! Each service gets one `ReadinessCheck`: a pluggable probe, an attempt
//! budget, a fixed interval, and a criticality. Polling is sequential and
//! fixed-interval. The database is the one hard dependency; the log and
//! metrics stack is advisory, so its checks are Degraded and a timeout
//! there only produces a warning.
//!
//! An optional overall deadline bounds the whole readiness phase: a sleep
//! never crosses the deadline, and once it passes the remaining budget of
//! the current check is forfeited.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of a single probe invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Ready,
    /// Not usable yet; the reason is shown at debug level only
    NotReady(String),
}

impl ProbeStatus {
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady(reason.into())
    }
}

/// A single check of whether a dependent service can accept work.
///
/// Implementations must treat their own transport failures (connection
/// refused, bad body) as `NotReady`, not as panics; the poller retries
/// either way.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> ProbeStatus;
}

/// How a timed-out check affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Exhausted budget aborts the whole run
    Critical,
    /// Exhausted budget is tolerated with a warning
    Degraded,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Degraded => "degraded",
        }
    }
}

/// One service's readiness check, scoped to a single orchestration run.
pub struct ReadinessCheck {
    pub name: String,
    pub probe: Box<dyn Probe>,
    pub max_attempts: u32,
    pub interval: Duration,
    pub criticality: Criticality,
}

impl ReadinessCheck {
    pub fn new(
        name: impl Into<String>,
        probe: Box<dyn Probe>,
        max_attempts: u32,
        interval: Duration,
        criticality: Criticality,
    ) -> Self {
        Self {
            name: name.into(),
            probe,
            // A check that may never run is a configuration bug
            max_attempts: max_attempts.max(1),
            interval,
            criticality,
        }
    }
}

/// Outcome of polling one check to resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready { attempts: u32 },
    TimedOutCritical,
    TimedOutDegraded,
}

impl PollOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn is_critical_timeout(&self) -> bool {
        matches!(self, Self::TimedOutCritical)
    }
}

/// Polls checks to resolution, one at a time.
pub struct ReadinessPoller {
    deadline: Option<Instant>,
}

impl ReadinessPoller {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Bound the total time this poller may spend across all checks.
    pub fn with_deadline(overall: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + overall),
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn timeout_outcome(check: &ReadinessCheck) -> PollOutcome {
        match check.criticality {
            Criticality::Critical => PollOutcome::TimedOutCritical,
            Criticality::Degraded => PollOutcome::TimedOutDegraded,
        }
    }

    /// Poll one check until it is ready or its budget runs out.
    ///
    /// Returns `Ready` on the first successful probe regardless of
    /// remaining budget; invokes the probe at most `max_attempts` times.
    pub async fn await_ready(&self, check: &ReadinessCheck) -> PollOutcome {
        for attempt in 1..=check.max_attempts {
            if self.deadline_passed() {
                warn!(
                    "[READY] {}: overall deadline reached before attempt {}",
                    check.name, attempt
                );
                return Self::timeout_outcome(check);
            }

            match check.probe.check().await {
                ProbeStatus::Ready => {
                    info!(
                        "[READY] {} ready after {} attempt(s)",
                        check.name, attempt
                    );
                    return PollOutcome::Ready { attempts: attempt };
                }
                ProbeStatus::NotReady(reason) => {
                    debug!(
                        "[READY] {} attempt {}/{}: {}",
                        check.name, attempt, check.max_attempts, reason
                    );
                }
            }

            if attempt < check.max_attempts {
                self.sleep_within_deadline(check.interval).await;
            }
        }

        match check.criticality {
            Criticality::Critical => {
                warn!(
                    "[READY] {} not ready after {} attempts (critical)",
                    check.name, check.max_attempts
                );
            }
            Criticality::Degraded => {
                warn!(
                    "[READY] {} not ready after {} attempts, continuing degraded",
                    check.name, check.max_attempts
                );
            }
        }
        Self::timeout_outcome(check)
    }

    /// Sleep for `interval`, truncated so it never crosses the deadline.
    async fn sleep_within_deadline(&self, interval: Duration) {
        match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::time::sleep(interval.min(remaining)).await;
            }
            None => tokio::time::sleep(interval).await,
        }
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new()
    }
}
