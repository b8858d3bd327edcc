//! Deploy command: the full orchestration run.

use friendbot_common::config::StackConfig;
use friendbot_common::display::{Section, StatusLevel};
use friendbot_common::docker::DockerCompose;
use friendbot_common::errors::DeployError;
use friendbot_common::kibana::KibanaClient;
use friendbot_common::orchestrator::{OrchestrationRun, Orchestrator, RunState};
use friendbot_common::probes;
use friendbot_common::provision::{ProvisionOutcome, Provisioner};
use friendbot_common::readiness::{PollOutcome, ReadinessPoller};
use indicatif::ProgressBar;
use std::fs;
use std::time::Duration;

pub async fn execute_deploy(config: &StackConfig) -> Result<i32, DeployError> {
    config.ensure_required(true)?;

    // Prerequisites the rest of the run assumes
    fs::create_dir_all(&config.backup.dir)?;

    let compose = DockerCompose::new(&config.compose.file);
    let client = probes::http_client()?;
    let checks = probes::standard_checks(config, &compose, &client);
    let kibana = KibanaClient::new(client.clone(), config.endpoints.kibana.clone());

    let poller = match config.readiness.run_deadline() {
        Some(overall) => ReadinessPoller::with_deadline(overall),
        None => ReadinessPoller::new(),
    };
    let orchestrator = Orchestrator::new(&compose, &kibana, poller, Provisioner::new());

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Deploying stack, waiting for services...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let run = orchestrator.run(checks).await;
    spinner.finish_and_clear();

    let run = run?;
    print_run_summary(&run);
    Ok(run.state.exit_code())
}

fn print_run_summary(run: &OrchestrationRun) {
    let use_color = console::colors_enabled();

    let mut readiness = Section::new("Readiness", use_color);
    for check in &run.checks {
        match &check.outcome {
            PollOutcome::Ready { attempts } => readiness.add(
                StatusLevel::Success,
                format!("{} ready after {} attempt(s)", check.name, attempts),
            ),
            PollOutcome::TimedOutDegraded => readiness.add(
                StatusLevel::Warning,
                format!("{} not ready, continuing without it", check.name),
            ),
            PollOutcome::TimedOutCritical => readiness.add(
                StatusLevel::Critical,
                format!("{} never became ready", check.name),
            ),
        }
    }
    readiness.print();

    if !run.steps.is_empty() {
        let mut provisioning = Section::new("Dashboard provisioning", use_color);
        for step in &run.steps {
            match &step.outcome {
                ProvisionOutcome::Created => {
                    provisioning.add(StatusLevel::Success, format!("{}: created", step.step))
                }
                ProvisionOutcome::AlreadyExists => {
                    provisioning.add(StatusLevel::Info, format!("{}: already exists", step.step))
                }
                ProvisionOutcome::Failed(reason) => provisioning.add(
                    StatusLevel::Warning,
                    format!("{}: failed ({})", step.step, reason),
                ),
            }
        }
        provisioning.print();
    }

    let mut summary = Section::new("Result", use_color);
    match &run.state {
        RunState::Success => summary.add(StatusLevel::Success, "stack deployed"),
        RunState::FailedCritical(service) => summary.add(
            StatusLevel::Critical,
            format!("deployment aborted: {} unavailable", service),
        ),
        RunState::SucceededWithWarnings(services) => summary.add(
            StatusLevel::Warning,
            format!("stack deployed, degraded: {}", services.join(", ")),
        ),
    }
    summary.print();
}
