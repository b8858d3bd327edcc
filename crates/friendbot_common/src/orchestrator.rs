//! Deployment orchestration.
//!
//! One `run()` drives the whole sequence: bring containers up, poll every
//! readiness check in order, then provision dashboard resources. A
//! critical service timing out aborts before any provisioning; degraded
//! timeouts and failed provisioning steps are carried into the summary
//! instead of aborting anything. The run never restarts an
//! already-running service; the only mutation of a live service goes
//! through the provisioner.

use crate::docker::ContainerRuntime;
use crate::errors::DeployError;
use crate::kibana::DashboardApi;
use crate::provision::{Provisioner, StepOutcome};
use crate::readiness::{PollOutcome, ReadinessCheck, ReadinessPoller};
use tracing::{info, warn};

/// Terminal state of one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Success,
    /// A critical service never became ready; provisioning was skipped
    FailedCritical(String),
    /// Deployed, but these services were still down when their budget ran
    /// out
    SucceededWithWarnings(Vec<String>),
}

impl RunState {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunState::Success => 0,
            RunState::FailedCritical(_) => 1,
            RunState::SucceededWithWarnings(_) => 2,
        }
    }
}

/// One check's resolved outcome within a run.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    pub outcome: PollOutcome,
}

/// Everything that happened in one invocation, for the operator's
/// post-mortem: every check outcome and every provisioning step outcome.
#[derive(Debug, Clone)]
pub struct OrchestrationRun {
    pub checks: Vec<CheckOutcome>,
    pub steps: Vec<StepOutcome>,
    pub state: RunState,
}

/// Sequences containers → readiness → provisioning.
pub struct Orchestrator<'a> {
    runtime: &'a dyn ContainerRuntime,
    api: &'a dyn DashboardApi,
    poller: ReadinessPoller,
    provisioner: Provisioner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        api: &'a dyn DashboardApi,
        poller: ReadinessPoller,
        provisioner: Provisioner,
    ) -> Self {
        Self {
            runtime,
            api,
            poller,
            provisioner,
        }
    }

    /// Run a full deployment. Consumes the checks; they are scoped to this
    /// one run.
    pub async fn run(&self, checks: Vec<ReadinessCheck>) -> Result<OrchestrationRun, DeployError> {
        info!("[DEPLOY] starting stack");
        self.runtime.up().await?;

        let mut outcomes: Vec<CheckOutcome> = Vec::with_capacity(checks.len());
        let mut degraded: Vec<String> = Vec::new();

        for check in &checks {
            let outcome = self.poller.await_ready(check).await;
            let critical_timeout = outcome.is_critical_timeout();

            if outcome == PollOutcome::TimedOutDegraded {
                degraded.push(check.name.clone());
            }
            outcomes.push(CheckOutcome {
                name: check.name.clone(),
                outcome,
            });

            if critical_timeout {
                warn!("[DEPLOY] aborting: {} is a hard dependency", check.name);
                return Ok(OrchestrationRun {
                    checks: outcomes,
                    steps: Vec::new(),
                    state: RunState::FailedCritical(check.name.clone()),
                });
            }
        }

        info!("[DEPLOY] readiness phase done, provisioning dashboard");
        let steps = self.provisioner.provision_dashboard(self.api).await;

        let state = if degraded.is_empty() {
            RunState::Success
        } else {
            RunState::SucceededWithWarnings(degraded)
        };

        Ok(OrchestrationRun {
            checks: outcomes,
            steps,
            state,
        })
    }
}
