//! friendbotctl entry point.
//!
//! Exit codes: 0 success (including an operator-declined restore),
//! 1 critical failure, 2 success with warnings, 64 missing configuration,
//! 65 invalid backup selection.

use clap::Parser;
use friendbot_common::config::StackConfig;
use friendbotctl::cli::{BackupCommands, Cli, Commands};
use friendbotctl::{backup_commands, deploy_command, logging, restore_command, status_command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init();

    let config = match StackConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let result = match cli.command {
        Commands::Deploy => deploy_command::execute_deploy(&config).await,
        Commands::Status { json } => status_command::execute_status(&config, json).await,
        Commands::Backup { action } => match action {
            BackupCommands::Create => backup_commands::execute_backup_create(&config).await,
            BackupCommands::List => backup_commands::execute_backup_list(&config).await,
        },
        Commands::Restore { backup, yes } => {
            restore_command::execute_restore(&config, backup, yes).await
        }
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}
