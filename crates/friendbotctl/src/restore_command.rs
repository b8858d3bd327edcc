//! Restore command: list → select → confirm → replace.

use friendbot_common::backup::{BackupManager, BackupRecord};
use friendbot_common::config::StackConfig;
use friendbot_common::docker::DockerCompose;
use friendbot_common::errors::DeployError;
use friendbot_common::postgres::PostgresAdmin;
use friendbot_common::restore::{
    select_record, Confirmer, PreApproved, RestoreManager, RestoreOutcome, StdinConfirmer,
};
use std::io::{self, BufRead, Write};

pub async fn execute_restore(
    config: &StackConfig,
    preselected: Option<String>,
    assume_yes: bool,
) -> Result<i32, DeployError> {
    config.ensure_required(false)?;

    let compose = DockerCompose::new(&config.compose.file);
    let admin = PostgresAdmin::new(compose.clone(), &config.compose, &config.postgres);
    let manager = BackupManager::new(&admin, &config.backup);

    let records = manager.list_backups()?;
    if records.is_empty() {
        return Err(DeployError::NoBackups(config.backup.dir.clone()));
    }

    let record = match preselected {
        Some(selection) => select_record(&records, &selection)?,
        None => {
            let selection = prompt_selection(&records)?;
            select_record(&records, &selection)?
        }
    };

    let confirmer: Box<dyn Confirmer> = if assume_yes {
        Box::new(PreApproved)
    } else {
        Box::new(StdinConfirmer)
    };

    let restore = RestoreManager::new(&compose, &admin, &config.compose.bot_service);
    match restore.restore(record, confirmer.as_ref()).await? {
        RestoreOutcome::Completed => {
            println!("Restore from {} completed.", record.timestamp_id);
            Ok(0)
        }
        RestoreOutcome::Declined => {
            println!("Restore declined. Nothing was changed.");
            Ok(0)
        }
    }
}

/// Enumerate artifacts newest-first and read the operator's pick.
fn prompt_selection(records: &[BackupRecord]) -> Result<String, DeployError> {
    println!("Available backups (newest first):");
    for (index, record) in records.iter().enumerate() {
        println!(
            "  {:>2}) {}  {:>12} bytes{}",
            index + 1,
            record.timestamp_id,
            record.size_bytes,
            if record.compressed { "  gzip" } else { "" }
        );
    }
    print!("Select a backup [1-{}]: ", records.len());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
