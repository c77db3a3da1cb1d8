//! Command execution seam
//!
//! Batch runs do not care whether a command is dispatched in-process or sent
//! to a remote worker; both sides implement `CommandExecutor`.

use async_trait::async_trait;
use types::{Command, CommandResult};

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute one command and return its final result
    async fn execute(&self, command: Command) -> anyhow::Result<CommandResult>;
}
