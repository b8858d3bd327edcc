//! End-to-end orchestration scenarios against scripted collaborators.
//!
//! Covers the run-level semantics: critical aborts before provisioning,
//! degraded services only produce warnings, and the dashboard
//! provisioning sequence is idempotent across repeated runs.

use async_trait::async_trait;
use friendbot_common::docker::ContainerRuntime;
use friendbot_common::errors::DeployError;
use friendbot_common::kibana::{ApiResponse, DashboardApi};
use friendbot_common::orchestrator::{Orchestrator, RunState};
use friendbot_common::provision::{ProvisionOutcome, Provisioner};
use friendbot_common::readiness::{
    Criticality, PollOutcome, Probe, ProbeStatus, ReadinessCheck, ReadinessPoller,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Probe that becomes ready on the nth invocation; `0` means never.
struct ScriptedProbe {
    ready_at: u32,
    calls: Arc<AtomicU32>,
}

impl ScriptedProbe {
    fn boxed(ready_at: u32) -> Box<dyn Probe> {
        Box::new(Self {
            ready_at,
            calls: Arc::new(AtomicU32::new(0)),
        })
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self) -> ProbeStatus {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.ready_at != 0 && n >= self.ready_at {
            ProbeStatus::Ready
        } else {
            ProbeStatus::not_ready("not yet")
        }
    }
}

/// Container runtime that records calls and always succeeds.
#[derive(Default)]
struct FakeRuntime {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn up(&self) -> Result<(), DeployError> {
        self.events.lock().unwrap().push("up".to_string());
        Ok(())
    }

    async fn start(&self, service: &str) -> Result<(), DeployError> {
        self.events.lock().unwrap().push(format!("start {}", service));
        Ok(())
    }

    async fn stop(&self, service: &str) -> Result<(), DeployError> {
        self.events.lock().unwrap().push(format!("stop {}", service));
        Ok(())
    }

    async fn is_running(&self, _service: &str) -> Result<bool, DeployError> {
        Ok(true)
    }
}

/// In-memory dashboard service with real duplicate semantics.
#[derive(Default)]
struct FakeDashboard {
    data_views: Mutex<BTreeMap<String, String>>,
    field_formats: Mutex<BTreeMap<String, Value>>,
    saved_searches: Mutex<BTreeMap<String, String>>,
    calls: AtomicU32,
}

impl FakeDashboard {
    fn snapshot(&self) -> (BTreeMap<String, String>, BTreeMap<String, Value>, BTreeMap<String, String>) {
        (
            self.data_views.lock().unwrap().clone(),
            self.field_formats.lock().unwrap().clone(),
            self.saved_searches.lock().unwrap().clone(),
        )
    }

    fn total_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DashboardApi for FakeDashboard {
    async fn create_data_view(
        &self,
        title: &str,
        _time_field: &str,
    ) -> Result<ApiResponse, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut views = self.data_views.lock().unwrap();
        if views.contains_key(title) {
            return Ok(ApiResponse {
                status: 400,
                body: json!({ "message": format!("Duplicate data view: {}", title) }),
            });
        }
        let id = format!("view-{}", views.len() + 1);
        views.insert(title.to_string(), id.clone());
        Ok(ApiResponse {
            status: 200,
            body: json!({ "data_view": { "id": id } }),
        })
    }

    async fn find_data_view_id(&self, title: &str) -> Result<Option<String>, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.data_views.lock().unwrap().get(title).cloned())
    }

    async fn set_field_format(
        &self,
        view_id: &str,
        field: &str,
        format: Value,
    ) -> Result<ApiResponse, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.field_formats
            .lock()
            .unwrap()
            .insert(format!("{}/{}", view_id, field), format);
        Ok(ApiResponse {
            status: 200,
            body: Value::Null,
        })
    }

    async fn create_saved_search(
        &self,
        object_id: &str,
        title: &str,
        _query: &str,
        _view_id: &str,
    ) -> Result<ApiResponse, DeployError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut searches = self.saved_searches.lock().unwrap();
        if searches.contains_key(object_id) {
            return Ok(ApiResponse {
                status: 409,
                body: json!({ "message": "version conflict, document already exists" }),
            });
        }
        searches.insert(object_id.to_string(), title.to_string());
        Ok(ApiResponse {
            status: 200,
            body: json!({ "id": object_id }),
        })
    }
}

fn check(name: &str, ready_at: u32, max_attempts: u32, criticality: Criticality) -> ReadinessCheck {
    ReadinessCheck::new(
        name,
        ScriptedProbe::boxed(ready_at),
        max_attempts,
        Duration::from_millis(1),
        criticality,
    )
}

fn fast_provisioner() -> Provisioner {
    Provisioner {
        attempts: 3,
        retry_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_degraded_service_produces_warning_not_abort() {
    let runtime = FakeRuntime::default();
    let dashboard = FakeDashboard::default();
    let orchestrator = Orchestrator::new(
        &runtime,
        &dashboard,
        ReadinessPoller::new(),
        fast_provisioner(),
    );

    // db ready immediately, search never recovers, dashboard on attempt 2
    let checks = vec![
        check("db", 1, 3, Criticality::Critical),
        check("search", 0, 2, Criticality::Degraded),
        check("dashboard", 2, 2, Criticality::Degraded),
    ];

    let run = orchestrator.run(checks).await.unwrap();
    assert_eq!(
        run.state,
        RunState::SucceededWithWarnings(vec!["search".to_string()])
    );

    // Provisioning still executed
    assert_eq!(run.steps.len(), 3);
    assert!(dashboard.total_calls() > 0);

    // All three checks resolved and are in the summary
    assert_eq!(run.checks.len(), 3);
    assert_eq!(run.checks[0].outcome, PollOutcome::Ready { attempts: 1 });
    assert_eq!(run.checks[1].outcome, PollOutcome::TimedOutDegraded);
    assert_eq!(run.checks[2].outcome, PollOutcome::Ready { attempts: 2 });
}

#[tokio::test]
async fn test_critical_timeout_aborts_before_provisioning() {
    let runtime = FakeRuntime::default();
    let dashboard = FakeDashboard::default();
    let orchestrator = Orchestrator::new(
        &runtime,
        &dashboard,
        ReadinessPoller::new(),
        fast_provisioner(),
    );

    let checks = vec![
        check("db", 0, 3, Criticality::Critical),
        check("search", 1, 2, Criticality::Degraded),
        check("dashboard", 1, 2, Criticality::Degraded),
    ];

    let run = orchestrator.run(checks).await.unwrap();
    assert_eq!(run.state, RunState::FailedCritical("db".to_string()));
    assert!(run.steps.is_empty());
    assert_eq!(dashboard.total_calls(), 0);

    // Later checks were never polled
    assert_eq!(run.checks.len(), 1);
}

#[tokio::test]
async fn test_exit_codes_per_run_state() {
    assert_eq!(RunState::Success.exit_code(), 0);
    assert_eq!(RunState::FailedCritical("db".to_string()).exit_code(), 1);
    assert_eq!(
        RunState::SucceededWithWarnings(vec!["search".to_string()]).exit_code(),
        2
    );
}

#[tokio::test]
async fn test_provisioning_sequence_is_idempotent() {
    let dashboard = FakeDashboard::default();
    let provisioner = fast_provisioner();

    let first = provisioner.provision_dashboard(&dashboard).await;
    let state_after_first = dashboard.snapshot();

    assert_eq!(first[0].outcome, ProvisionOutcome::Created);
    assert!(first.iter().all(|s| !s.outcome.is_failure()));

    let second = provisioner.provision_dashboard(&dashboard).await;
    let state_after_second = dashboard.snapshot();

    // Same final resource set, and no failure attributable to duplication
    assert_eq!(state_after_first, state_after_second);
    assert_eq!(second[0].outcome, ProvisionOutcome::AlreadyExists);
    assert_eq!(second[2].outcome, ProvisionOutcome::AlreadyExists);
    assert!(second.iter().all(|s| !s.outcome.is_failure()));
}

#[tokio::test]
async fn test_data_view_created_then_already_exists() {
    let dashboard = FakeDashboard::default();
    let provisioner = fast_provisioner();

    let first = provisioner.provision_dashboard(&dashboard).await;
    let second = provisioner.provision_dashboard(&dashboard).await;

    assert_eq!(first[0].step, "data view");
    assert_eq!(first[0].outcome, ProvisionOutcome::Created);
    assert_eq!(second[0].outcome, ProvisionOutcome::AlreadyExists);
}

/// Dashboard stand-in whose field-format endpoint is broken; the saved
/// search must still go through.
struct BrokenFormats {
    inner: FakeDashboard,
}

#[async_trait]
impl DashboardApi for BrokenFormats {
    async fn create_data_view(
        &self,
        title: &str,
        time_field: &str,
    ) -> Result<ApiResponse, DeployError> {
        self.inner.create_data_view(title, time_field).await
    }

    async fn find_data_view_id(&self, title: &str) -> Result<Option<String>, DeployError> {
        self.inner.find_data_view_id(title).await
    }

    async fn set_field_format(
        &self,
        _view_id: &str,
        _field: &str,
        _format: Value,
    ) -> Result<ApiResponse, DeployError> {
        Ok(ApiResponse {
            status: 500,
            body: json!({ "message": "internal error" }),
        })
    }

    async fn create_saved_search(
        &self,
        object_id: &str,
        title: &str,
        query: &str,
        view_id: &str,
    ) -> Result<ApiResponse, DeployError> {
        self.inner
            .create_saved_search(object_id, title, query, view_id)
            .await
    }
}

#[tokio::test]
async fn test_failed_step_does_not_block_siblings() {
    let dashboard = BrokenFormats {
        inner: FakeDashboard::default(),
    };
    let provisioner = fast_provisioner();

    let outcomes = provisioner.provision_dashboard(&dashboard).await;
    assert_eq!(outcomes[0].outcome, ProvisionOutcome::Created);
    assert!(outcomes[1].outcome.is_failure());
    assert_eq!(outcomes[2].outcome, ProvisionOutcome::Created);
}
