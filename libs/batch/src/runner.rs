//! Batch runner
//!
//! Executes a loaded command sequence in order and stops at the first result
//! that is not `ok`.

use anyhow::Context;
use dispatch::CommandExecutor;
use tracing::{info, warn};
use types::{Command, CommandResult, StatusCode};

/// What a batch run produced
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// Final result of every command that ran, in order
    pub results: Vec<CommandResult>,
    /// Number of commands that were loaded
    pub total: usize,
    /// Set when a non-`ok` result stopped the batch early
    pub halted: bool,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        !self.halted && self.results.len() == self.total
    }
}

/// Run `commands` through `executor`, calling `on_result` after each one
///
/// Transport-level failures of the executor abort the run with an error; a
/// non-`ok` result halts it and is reported in the outcome.
pub async fn run_batch<F>(
    executor: &dyn CommandExecutor,
    commands: Vec<Command>,
    mut on_result: F,
) -> anyhow::Result<BatchOutcome>
where
    F: FnMut(&Command, &CommandResult),
{
    let total = commands.len();
    let mut results = Vec::with_capacity(total);

    for (index, command) in commands.into_iter().enumerate() {
        let opcode = command.opcode;
        let result = executor
            .execute(command.clone())
            .await
            .with_context(|| format!("executing {opcode} ({}/{total})", index + 1))?;
        on_result(&command, &result);

        let status = result.status;
        results.push(result);
        if status != StatusCode::Ok {
            warn!(%opcode, %status, executed = index + 1, total, "Halting batch");
            return Ok(BatchOutcome {
                results,
                total,
                halted: true,
            });
        }
    }

    info!(total, "Batch completed");
    Ok(BatchOutcome {
        results,
        total,
        halted: false,
    })
}
