//! Database restore with an explicit confirmation gate.
//!
//! Restoring replaces the database wholesale and is irreversible without
//! another backup, so the flow is list → confirm → act, with no path that
//! skips confirmation. The bot is paused for the whole destructive window
//! so it never observes a database mid-replacement; it is the only writer,
//! which is what makes pausing it sufficient exclusivity.
//!
//! If the drop/recreate or reload step fails the bot is deliberately LEFT
//! PAUSED: resuming it against a partially-restored database would be
//! worse than downtime.

use crate::backup::{decompress_artifact, BackupRecord};
use crate::docker::ContainerRuntime;
use crate::errors::DeployError;
use crate::postgres::DatabaseAdmin;
use std::fs;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

/// The one token that approves a restore. Anything else declines; absence
/// of a decline is not approval.
pub const CONFIRM_TOKEN: &str = "yes";

/// Supplies the operator's yes/no decision. Injected so the restore flow
/// is testable without a terminal.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// Reads the confirmation token from stdin.
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        print!("{} ", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(is_affirmative(&input))
    }
}

/// Always affirms; backs the `--yes` flag.
pub struct PreApproved;

impl Confirmer for PreApproved {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// Exact-token check: trimmed, case-insensitive `yes`. A bare `y` is not
/// enough for a destructive operation.
pub fn is_affirmative(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(CONFIRM_TOKEN)
}

/// How a restore concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Database replaced and application resumed
    Completed,
    /// Operator declined; nothing was touched
    Declined,
}

/// Resolve an operator's selection against the newest-first listing.
/// Accepts a 1-based index or an exact timestamp id; anything else is
/// rejected rather than guessed at.
pub fn select_record<'a>(
    records: &'a [BackupRecord],
    selection: &str,
) -> Result<&'a BackupRecord, DeployError> {
    let selection = selection.trim();

    if let Ok(index) = selection.parse::<usize>() {
        if index >= 1 && index <= records.len() {
            return Ok(&records[index - 1]);
        }
        return Err(DeployError::InvalidSelection(selection.to_string()));
    }

    let mut matches = records.iter().filter(|r| r.timestamp_id == selection);
    match (matches.next(), matches.next()) {
        (Some(record), None) => Ok(record),
        _ => Err(DeployError::InvalidSelection(selection.to_string())),
    }
}

/// Runs the pause → replace → resume pipeline.
pub struct RestoreManager<'a> {
    runtime: &'a dyn ContainerRuntime,
    db: &'a dyn DatabaseAdmin,
    bot_service: &'a str,
}

impl<'a> RestoreManager<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        db: &'a dyn DatabaseAdmin,
        bot_service: &'a str,
    ) -> Self {
        Self {
            runtime,
            db,
            bot_service,
        }
    }

    /// Restore from one artifact, gated on confirmation.
    pub async fn restore(
        &self,
        record: &BackupRecord,
        confirmer: &dyn Confirmer,
    ) -> Result<RestoreOutcome, DeployError> {
        let prompt = format!(
            "Restore will ERASE the current database and reload it from {} \
             ({} bytes). Type '{}' to continue:",
            record.file_path.display(),
            record.size_bytes,
            CONFIRM_TOKEN
        );

        if !confirmer.confirm(&prompt)? {
            info!("[RESTORE] declined by operator, nothing changed");
            return Ok(RestoreOutcome::Declined);
        }

        info!("[RESTORE] pausing {}", self.bot_service);
        self.runtime.stop(self.bot_service).await?;

        let sql_path = decompress_artifact(record)?;
        let cleanup_decompressed = record.compressed;

        if let Err(e) = self.db.drop_and_recreate().await {
            warn!("[RESTORE] drop/recreate failed, {} stays paused", self.bot_service);
            return Err(DeployError::RestoreFailedMidway {
                stage: "drop/recreate".to_string(),
                reason: e.to_string(),
            });
        }

        if let Err(e) = self.db.restore_from(&sql_path).await {
            warn!("[RESTORE] reload failed, {} stays paused", self.bot_service);
            return Err(DeployError::RestoreFailedMidway {
                stage: "reload".to_string(),
                reason: e.to_string(),
            });
        }

        if cleanup_decompressed {
            let _ = fs::remove_file(&sql_path);
        }

        info!("[RESTORE] resuming {}", self.bot_service);
        self.runtime.start(self.bot_service).await?;

        info!("[RESTORE] completed from {}", record.timestamp_id);
        Ok(RestoreOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(id: &str) -> BackupRecord {
        BackupRecord {
            timestamp_id: id.to_string(),
            file_path: PathBuf::from(format!("backups/friendbot_{}.sql", id)),
            size_bytes: 100,
            compressed: false,
        }
    }

    #[test]
    fn test_affirmative_token_exact() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("  YES \n"));
        assert!(is_affirmative("Yes"));
    }

    #[test]
    fn test_everything_else_declines() {
        for input in ["", "y", "no", "yess", "yes please", "ok", "sure", "\n"] {
            assert!(!is_affirmative(input), "{:?} must decline", input);
        }
    }

    #[test]
    fn test_select_by_index() {
        let records = vec![record("20260805_000000"), record("20260804_000000")];
        let selected = select_record(&records, "2").unwrap();
        assert_eq!(selected.timestamp_id, "20260804_000000");
    }

    #[test]
    fn test_select_by_timestamp_id() {
        let records = vec![record("20260805_000000"), record("20260804_000000")];
        let selected = select_record(&records, "20260805_000000").unwrap();
        assert_eq!(selected.timestamp_id, "20260805_000000");
    }

    #[test]
    fn test_select_rejects_out_of_range_and_unknown() {
        let records = vec![record("20260805_000000")];
        assert!(select_record(&records, "0").is_err());
        assert!(select_record(&records, "2").is_err());
        assert!(select_record(&records, "20190101_000000").is_err());
        assert!(select_record(&records, "latest").is_err());
    }
}
