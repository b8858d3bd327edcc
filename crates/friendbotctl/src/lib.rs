//! friendbotctl - operator CLI for the FriendBot stack.

pub mod backup_commands;
pub mod cli;
pub mod deploy_command;
pub mod logging;
pub mod restore_command;
pub mod status_command;
