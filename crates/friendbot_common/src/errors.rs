//! Error types for the deployment tool.
//!
//! Only conditions that abort an operation live here. Recoverable
//! conditions are typed outcomes instead: a service timing out is a
//! `PollOutcome`, a provisioning conflict or failed step is a
//! `ProvisionOutcome` (a conflict is a success path), and a declined
//! restore is a `RestoreOutcome`. Those are reported in summaries, never
//! raised as errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("missing required configuration: {}", .0.join(", "))]
    ConfigurationMissing(Vec<String>),

    #[error("database dump produced an empty artifact")]
    BackupEmpty,

    #[error("backup failed: {0}")]
    BackupFailed(String),

    #[error("'{0}' does not select exactly one backup")]
    InvalidSelection(String),

    #[error("no backup artifacts found in {}", .0.display())]
    NoBackups(PathBuf),

    #[error("restore failed during {stage}: {reason} (application left paused)")]
    RestoreFailedMidway { stage: String, reason: String },

    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    /// Process exit code for this error when it terminates a command.
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::ConfigurationMissing(_) => 64,
            DeployError::InvalidSelection(_) | DeployError::NoBackups(_) => 65,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_missing_lists_all_names() {
        let err = DeployError::ConfigurationMissing(vec![
            "POSTGRES_PASSWORD".to_string(),
            "TELEGRAM_BOT_TOKEN".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("POSTGRES_PASSWORD"));
        assert!(msg.contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            DeployError::ConfigurationMissing(vec!["X".to_string()]).exit_code(),
            64
        );
        assert_eq!(
            DeployError::InvalidSelection("nope".to_string()).exit_code(),
            65
        );
        assert_eq!(DeployError::BackupEmpty.exit_code(), 1);
        assert_eq!(
            DeployError::RestoreFailedMidway {
                stage: "reload".to_string(),
                reason: "broken pipe".to_string(),
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_midway_failure_says_application_stays_paused() {
        let err = DeployError::RestoreFailedMidway {
            stage: "drop/recreate".to_string(),
            reason: "session held a lock".to_string(),
        };
        assert!(err.to_string().contains("left paused"));
    }
}
