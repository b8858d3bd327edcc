//! Database collaborator.
//!
//! The database is operated through its own tooling (`pg_dump`, `psql`)
//! exec-ed inside the database container; this tool never speaks SQL wire
//! protocol itself. `pg_dump` produces a consistent point-in-time snapshot
//! on its own, so dumps take no lock on the live database.

use crate::config::{ComposeConfig, PostgresConfig};
use crate::docker::DockerCompose;
use crate::errors::DeployError;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

/// Dump/drop/recreate/reload operations against the stack database.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Dump the database to `path`, returning the artifact size in bytes.
    async fn dump_to(&self, path: &Path) -> Result<u64, DeployError>;

    /// Drop and recreate the database, severing any lingering sessions
    /// first. Destroys all contents.
    async fn drop_and_recreate(&self) -> Result<(), DeployError>;

    /// Reload the database from a plain-SQL artifact.
    async fn restore_from(&self, path: &Path) -> Result<(), DeployError>;
}

/// `DatabaseAdmin` implementation exec-ing pg tooling in the db container.
pub struct PostgresAdmin {
    compose: DockerCompose,
    service: String,
    user: String,
    database: String,
    password: Option<String>,
}

impl PostgresAdmin {
    pub fn new(compose: DockerCompose, compose_config: &ComposeConfig, pg: &PostgresConfig) -> Self {
        Self {
            compose,
            service: compose_config.db_service.clone(),
            user: pg.user.clone(),
            database: pg.database.clone(),
            password: pg.password.clone(),
        }
    }

    fn env(&self) -> Vec<(&str, &str)> {
        match self.password.as_deref() {
            Some(password) => vec![("PGPASSWORD", password)],
            None => Vec::new(),
        }
    }

    async fn psql(&self, database: &str, sql: &str) -> Result<(), DeployError> {
        let output = self
            .compose
            .exec(
                &self.service,
                &self.env(),
                &[
                    "psql",
                    "-U",
                    &self.user,
                    "-d",
                    database,
                    "-v",
                    "ON_ERROR_STOP=1",
                    "-c",
                    sql,
                ],
                None,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Runtime(format!(
                "psql failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseAdmin for PostgresAdmin {
    async fn dump_to(&self, path: &Path) -> Result<u64, DeployError> {
        info!("[PG] dumping {} to {}", self.database, path.display());
        let output = self
            .compose
            .exec(
                &self.service,
                &self.env(),
                &["pg_dump", "-U", &self.user, self.database.as_str()],
                None,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::BackupFailed(format!(
                "pg_dump exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tokio::fs::write(path, &output.stdout).await?;
        Ok(output.stdout.len() as u64)
    }

    async fn drop_and_recreate(&self) -> Result<(), DeployError> {
        warn!("[PG] dropping and recreating {}", self.database);

        // Sever sessions the pause did not take down with it, otherwise
        // DROP DATABASE blocks forever.
        let terminate = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid();",
            self.database
        );
        self.psql("postgres", &terminate).await?;

        self.psql(
            "postgres",
            &format!("DROP DATABASE IF EXISTS {};", self.database),
        )
        .await?;
        self.psql(
            "postgres",
            &format!(
                "CREATE DATABASE {} OWNER {};",
                self.database, self.user
            ),
        )
        .await?;
        Ok(())
    }

    async fn restore_from(&self, path: &Path) -> Result<(), DeployError> {
        info!("[PG] reloading {} from {}", self.database, path.display());
        let file = std::fs::File::open(path)?;
        let output = self
            .compose
            .exec(
                &self.service,
                &self.env(),
                &[
                    "psql",
                    "-U",
                    &self.user,
                    "-d",
                    &self.database,
                    "-v",
                    "ON_ERROR_STOP=1",
                ],
                Some(file),
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::Runtime(format!(
                "psql reload failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}
