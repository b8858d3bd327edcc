//! CLI parsing checks.

use clap::Parser;
use friendbotctl::cli::{BackupCommands, Cli, Commands};

#[test]
fn test_deploy_parses() {
    let cli = Cli::try_parse_from(["friendbotctl", "deploy"]).unwrap();
    assert!(matches!(cli.command, Commands::Deploy));
}

#[test]
fn test_status_json_flag() {
    let cli = Cli::try_parse_from(["friendbotctl", "status", "--json"]).unwrap();
    match cli.command {
        Commands::Status { json } => assert!(json),
        _ => panic!("expected status"),
    }
}

#[test]
fn test_backup_subcommands() {
    let cli = Cli::try_parse_from(["friendbotctl", "backup", "create"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Backup {
            action: BackupCommands::Create
        }
    ));

    let cli = Cli::try_parse_from(["friendbotctl", "backup", "list"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Backup {
            action: BackupCommands::List
        }
    ));
}

#[test]
fn test_restore_with_preselection_and_yes() {
    let cli = Cli::try_parse_from([
        "friendbotctl",
        "restore",
        "--backup",
        "20260805_120000",
        "--yes",
    ])
    .unwrap();
    match cli.command {
        Commands::Restore { backup, yes } => {
            assert_eq!(backup.as_deref(), Some("20260805_120000"));
            assert!(yes);
        }
        _ => panic!("expected restore"),
    }
}

#[test]
fn test_global_config_flag() {
    let cli = Cli::try_parse_from(["friendbotctl", "--config", "ops/deploy.toml", "status"]).unwrap();
    assert_eq!(
        cli.config.as_deref().map(|p| p.to_str().unwrap()),
        Some("ops/deploy.toml")
    );
}

#[test]
fn test_missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["friendbotctl"]).is_err());
}
