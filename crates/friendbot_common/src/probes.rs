//! Service-specific readiness probes.
//!
//! One probe per stack service, each with a typed decoder for the
//! service's health response:
//! - postgres: `pg_isready` inside the db container
//! - elasticsearch: cluster health `green` OR `yellow` (yellow is a usable
//!   single-node cluster, not a failure)
//! - kibana: status endpoint overall level `available`
//! - prometheus / grafana: any 2xx from their health paths

use crate::config::StackConfig;
use crate::docker::DockerCompose;
use crate::readiness::{Criticality, Probe, ProbeStatus, ReadinessCheck};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Per-request timeout for HTTP probes; keeps one hung endpoint from
/// eating the whole attempt budget's worth of wall time.
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client for all probes and provisioning calls.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_PROBE_TIMEOUT)
        .build()
}

/// `pg_isready` inside the database container.
pub struct PostgresProbe {
    compose: DockerCompose,
    service: String,
    user: String,
    database: String,
}

impl PostgresProbe {
    pub fn new(compose: DockerCompose, service: String, user: String, database: String) -> Self {
        Self {
            compose,
            service,
            user,
            database,
        }
    }
}

#[async_trait]
impl Probe for PostgresProbe {
    async fn check(&self) -> ProbeStatus {
        let result = self
            .compose
            .exec(
                &self.service,
                &[],
                &["pg_isready", "-U", &self.user, "-d", &self.database],
                None,
            )
            .await;

        match result {
            Ok(output) if output.status.success() => ProbeStatus::Ready,
            Ok(output) => ProbeStatus::not_ready(format!(
                "pg_isready exited with {}",
                output.status
            )),
            Err(e) => ProbeStatus::not_ready(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    status: String,
}

/// Elasticsearch cluster health probe.
pub struct ElasticsearchProbe {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticsearchProbe {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn status_is_usable(status: &str) -> bool {
        status == "green" || status == "yellow"
    }
}

#[async_trait]
impl Probe for ElasticsearchProbe {
    async fn check(&self) -> ProbeStatus {
        let url = format!("{}/_cluster/health", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return ProbeStatus::not_ready(e.to_string()),
        };
        if !response.status().is_success() {
            return ProbeStatus::not_ready(format!("HTTP {}", response.status()));
        }
        match response.json::<ClusterHealth>().await {
            Ok(health) if Self::status_is_usable(&health.status) => ProbeStatus::Ready,
            Ok(health) => ProbeStatus::not_ready(format!("cluster status {}", health.status)),
            Err(e) => ProbeStatus::not_ready(format!("malformed health body: {}", e)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KibanaStatusBody {
    status: KibanaStatus,
}

#[derive(Debug, Deserialize)]
struct KibanaStatus {
    overall: KibanaOverall,
}

#[derive(Debug, Deserialize)]
struct KibanaOverall {
    level: String,
}

/// Kibana status endpoint probe.
pub struct KibanaProbe {
    client: reqwest::Client,
    base_url: String,
}

impl KibanaProbe {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl Probe for KibanaProbe {
    async fn check(&self) -> ProbeStatus {
        let url = format!("{}/api/status", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return ProbeStatus::not_ready(e.to_string()),
        };
        if !response.status().is_success() {
            return ProbeStatus::not_ready(format!("HTTP {}", response.status()));
        }
        match response.json::<KibanaStatusBody>().await {
            Ok(body) if body.status.overall.level == "available" => ProbeStatus::Ready,
            Ok(body) => {
                ProbeStatus::not_ready(format!("overall level {}", body.status.overall.level))
            }
            Err(e) => ProbeStatus::not_ready(format!("malformed status body: {}", e)),
        }
    }
}

/// Plain health-path probe: ready on any 2xx.
pub struct HealthPathProbe {
    client: reqwest::Client,
    url: String,
}

impl HealthPathProbe {
    pub fn new(client: reqwest::Client, base_url: &str, path: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url, path),
        }
    }
}

#[async_trait]
impl Probe for HealthPathProbe {
    async fn check(&self) -> ProbeStatus {
        match self.client.get(&self.url).send().await {
            Ok(r) if r.status().is_success() => ProbeStatus::Ready,
            Ok(r) => ProbeStatus::not_ready(format!("HTTP {}", r.status())),
            Err(e) => ProbeStatus::not_ready(e.to_string()),
        }
    }
}

/// The standard check set for a deploy, in polling order.
///
/// The database is the one critical dependency; the log pipeline and the
/// metrics stack are degraded-tolerant.
pub fn standard_checks(
    config: &StackConfig,
    compose: &DockerCompose,
    client: &reqwest::Client,
) -> Vec<ReadinessCheck> {
    let interval = config.readiness.effective_poll_interval();
    let endpoints = &config.endpoints;

    vec![
        ReadinessCheck::new(
            "postgres",
            Box::new(PostgresProbe::new(
                compose.clone(),
                config.compose.db_service.clone(),
                config.postgres.user.clone(),
                config.postgres.database.clone(),
            )),
            config.readiness.postgres_attempts,
            interval,
            Criticality::Critical,
        ),
        ReadinessCheck::new(
            "elasticsearch",
            Box::new(ElasticsearchProbe::new(
                client.clone(),
                endpoints.elasticsearch.clone(),
            )),
            config.readiness.elasticsearch_attempts,
            interval,
            Criticality::Degraded,
        ),
        ReadinessCheck::new(
            "kibana",
            Box::new(KibanaProbe::new(client.clone(), endpoints.kibana.clone())),
            config.readiness.kibana_attempts,
            interval,
            Criticality::Degraded,
        ),
        ReadinessCheck::new(
            "prometheus",
            Box::new(HealthPathProbe::new(
                client.clone(),
                &endpoints.prometheus,
                "/-/healthy",
            )),
            config.readiness.metrics_attempts,
            interval,
            Criticality::Degraded,
        ),
        ReadinessCheck::new(
            "grafana",
            Box::new(HealthPathProbe::new(
                client.clone(),
                &endpoints.grafana,
                "/api/health",
            )),
            config.readiness.metrics_attempts,
            interval,
            Criticality::Degraded,
        ),
    ]
}
