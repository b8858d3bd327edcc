//! Backup commands: create and list.

use friendbot_common::backup::BackupManager;
use friendbot_common::config::StackConfig;
use friendbot_common::display::{Section, StatusLevel};
use friendbot_common::docker::DockerCompose;
use friendbot_common::errors::DeployError;
use friendbot_common::postgres::PostgresAdmin;

pub async fn execute_backup_create(config: &StackConfig) -> Result<i32, DeployError> {
    config.ensure_required(false)?;

    let compose = DockerCompose::new(&config.compose.file);
    let admin = PostgresAdmin::new(compose, &config.compose, &config.postgres);
    let manager = BackupManager::new(&admin, &config.backup);

    let record = manager.create_backup().await?;

    let mut section = Section::new("Backup", console::colors_enabled());
    section.add(
        StatusLevel::Success,
        format!(
            "{} ({} bytes{})",
            record.file_path.display(),
            record.size_bytes,
            if record.compressed { ", gzip" } else { "" }
        ),
    );
    section.print();
    Ok(0)
}

pub async fn execute_backup_list(config: &StackConfig) -> Result<i32, DeployError> {
    let compose = DockerCompose::new(&config.compose.file);
    let admin = PostgresAdmin::new(compose, &config.compose, &config.postgres);
    let manager = BackupManager::new(&admin, &config.backup);

    let records = manager.list_backups()?;
    if records.is_empty() {
        println!("No backups in {}", config.backup.dir.display());
        return Ok(0);
    }

    println!("Backups in {} (newest first):", config.backup.dir.display());
    for (index, record) in records.iter().enumerate() {
        println!(
            "  {:>2}) {}  {:>12} bytes{}",
            index + 1,
            record.timestamp_id,
            record.size_bytes,
            if record.compressed { "  gzip" } else { "" }
        );
    }
    Ok(0)
}
