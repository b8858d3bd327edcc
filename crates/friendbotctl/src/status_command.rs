//! Status command: one probe round, no waiting.

use friendbot_common::config::StackConfig;
use friendbot_common::display::{Section, StatusLevel};
use friendbot_common::docker::DockerCompose;
use friendbot_common::errors::DeployError;
use friendbot_common::probes;
use friendbot_common::readiness::{Criticality, ReadinessPoller};

// Read-only: no secrets required, pg_isready authenticates nothing
pub async fn execute_status(config: &StackConfig, json: bool) -> Result<i32, DeployError> {
    let compose = DockerCompose::new(&config.compose.file);
    let client = probes::http_client()?;

    // Single-shot probes: status never blocks on a slow service
    let mut checks = probes::standard_checks(config, &compose, &client);
    for check in &mut checks {
        check.max_attempts = 1;
    }

    let poller = ReadinessPoller::new();
    let mut results: Vec<(String, Criticality, bool)> = Vec::with_capacity(checks.len());
    for check in &checks {
        let ready = poller.await_ready(check).await.is_ready();
        results.push((check.name.clone(), check.criticality, ready));
    }

    if json {
        let map: serde_json::Map<String, serde_json::Value> = results
            .iter()
            .map(|(name, _, ready)| {
                let status = if *ready { "ready" } else { "down" };
                (name.clone(), serde_json::Value::String(status.to_string()))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        let mut section = Section::new("Service health", console::colors_enabled());
        for (name, criticality, ready) in &results {
            match (ready, criticality) {
                (true, _) => section.add(StatusLevel::Success, format!("{} ready", name)),
                (false, Criticality::Critical) => {
                    section.add(StatusLevel::Critical, format!("{} down", name))
                }
                (false, Criticality::Degraded) => {
                    section.add(StatusLevel::Warning, format!("{} down", name))
                }
            }
        }
        section.print();
    }

    let critical_down = results
        .iter()
        .any(|(_, criticality, ready)| !ready && *criticality == Criticality::Critical);
    let any_down = results.iter().any(|(_, _, ready)| !ready);

    Ok(if critical_down {
        1
    } else if any_down {
        2
    } else {
        0
    })
}
