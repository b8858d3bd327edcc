//! Stack configuration for the deployment tool.
//!
//! Configuration is assembled exactly once at startup: defaults, then an
//! optional `deploy.toml`, then environment overrides. The resulting
//! `StackConfig` is passed by reference into every component constructor;
//! nothing reads the environment after this point.
//!
//! Secrets (the database password, the bot token) are never written to
//! `deploy.toml` and only enter through the environment.

use crate::errors::DeployError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "deploy.toml";

/// Top-level configuration for the whole stack.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StackConfig {
    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    /// Bot token presence is checked before deploy; the value itself is
    /// only ever handed to the compose environment, never logged.
    #[serde(skip)]
    pub bot_token: Option<String>,
}

/// Container runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Compose file driving the stack
    #[serde(default = "default_compose_file")]
    pub file: PathBuf,

    /// Service name of the bot application
    #[serde(default = "default_bot_service")]
    pub bot_service: String,

    /// Service name of the database container
    #[serde(default = "default_db_service")]
    pub db_service: String,
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_bot_service() -> String {
    "bot".to_string()
}

fn default_db_service() -> String {
    "postgres".to_string()
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            file: default_compose_file(),
            bot_service: default_bot_service(),
            db_service: default_db_service(),
        }
    }
}

/// Database connection settings used through the container's own tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Canonical database name, always lowercase
    #[serde(default = "default_db_name")]
    pub database: String,

    /// Only from the environment, never from the config file
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_db_user() -> String {
    "friendbot".to_string()
}

fn default_db_name() -> String {
    "friendbot".to_string()
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            user: default_db_user(),
            database: default_db_name(),
            password: None,
        }
    }
}

/// Base URLs of the services probed and provisioned over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_elasticsearch_url")]
    pub elasticsearch: String,

    #[serde(default = "default_kibana_url")]
    pub kibana: String,

    #[serde(default = "default_prometheus_url")]
    pub prometheus: String,

    #[serde(default = "default_grafana_url")]
    pub grafana: String,
}

fn default_elasticsearch_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_kibana_url() -> String {
    "http://localhost:5601".to_string()
}

fn default_prometheus_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_grafana_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            elasticsearch: default_elasticsearch_url(),
            kibana: default_kibana_url(),
            prometheus: default_prometheus_url(),
            grafana: default_grafana_url(),
        }
    }
}

/// Polling budgets for service startup.
///
/// Fixed-interval polling: startup latency of the slowest dependency
/// (Elasticsearch) is bounded and roughly constant, so a constant interval
/// gives the best worst-case detection latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Seconds between probe attempts (valid: 1-60)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Attempts for the database check
    #[serde(default = "default_postgres_attempts")]
    pub postgres_attempts: u32,

    /// Attempts for the Elasticsearch cluster check
    #[serde(default = "default_elasticsearch_attempts")]
    pub elasticsearch_attempts: u32,

    /// Attempts for the Kibana status check
    #[serde(default = "default_kibana_attempts")]
    pub kibana_attempts: u32,

    /// Attempts for each metrics service check
    #[serde(default = "default_metrics_attempts")]
    pub metrics_attempts: u32,

    /// Optional cap on the whole readiness phase, in seconds.
    /// A stuck dependency cannot hang the run past this.
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_postgres_attempts() -> u32 {
    24
}

fn default_elasticsearch_attempts() -> u32 {
    36
}

fn default_kibana_attempts() -> u32 {
    36
}

fn default_metrics_attempts() -> u32 {
    12
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            postgres_attempts: default_postgres_attempts(),
            elasticsearch_attempts: default_elasticsearch_attempts(),
            kibana_attempts: default_kibana_attempts(),
            metrics_attempts: default_metrics_attempts(),
            run_timeout_secs: None,
        }
    }
}

impl ReadinessConfig {
    /// Validate and clamp poll_interval_secs to valid range (1-60)
    pub fn effective_poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, 60))
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// Backup artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Directory holding dump artifacts
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// Gzip artifacts after a verified dump
    #[serde(default = "default_compress")]
    pub compress: bool,

    /// Keep at most this many artifacts
    #[serde(default = "default_retention_count")]
    pub retention_count: usize,

    /// When set, age wins over count: keep artifacts newer than this many
    /// days instead
    #[serde(default)]
    pub retention_days: Option<u32>,
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_compress() -> bool {
    true
}

fn default_retention_count() -> usize {
    7
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            compress: default_compress(),
            retention_count: default_retention_count(),
            retention_days: None,
        }
    }
}

impl StackConfig {
    /// Load configuration: file (if present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, DeployError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        let mut config = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str::<StackConfig>(&contents).map_err(|e| {
                DeployError::ConfigurationMissing(vec![format!(
                    "{} (parse error: {})",
                    path.display(),
                    e
                )])
            })?
        } else {
            StackConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull secrets and endpoint overrides from the environment.
    fn apply_env_overrides(&mut self) {
        if let Ok(password) = env::var("POSTGRES_PASSWORD") {
            self.postgres.password = Some(password);
        }
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if let Ok(user) = env::var("POSTGRES_USER") {
            self.postgres.user = user;
        }
        if let Ok(name) = env::var("DB_NAME") {
            // Canonical lowercase name; mixed-case values caused restore
            // mismatches in earlier tooling.
            self.postgres.database = name.to_lowercase();
        }
        if let Ok(url) = env::var("ELASTICSEARCH_URL") {
            self.endpoints.elasticsearch = url;
        }
        if let Ok(url) = env::var("KIBANA_URL") {
            self.endpoints.kibana = url;
        }
        if let Ok(url) = env::var("PROMETHEUS_URL") {
            self.endpoints.prometheus = url;
        }
        if let Ok(url) = env::var("GRAFANA_URL") {
            self.endpoints.grafana = url;
        }
        if let Ok(dir) = env::var("BACKUP_DIR") {
            self.backup.dir = PathBuf::from(dir);
        }
    }

    /// Names of required settings that are absent.
    ///
    /// The bot token is only required for operations that (re)start the
    /// application; backup and status work without it.
    pub fn missing_required(&self, require_bot_token: bool) -> Vec<String> {
        let mut missing = Vec::new();
        if self.postgres.password.is_none() {
            missing.push("POSTGRES_PASSWORD".to_string());
        }
        if require_bot_token && self.bot_token.is_none() {
            missing.push("TELEGRAM_BOT_TOKEN".to_string());
        }
        missing
    }

    /// Pre-flight gate: fail with every missing name at once, so the
    /// operator fixes the environment in one pass.
    pub fn ensure_required(&self, require_bot_token: bool) -> Result<(), DeployError> {
        let missing = self.missing_required(require_bot_token);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DeployError::ConfigurationMissing(missing))
        }
    }
}
