//! Command dispatcher
//!
//! Resolves a command's opcode through the routing table, binds its positional
//! and keyword arguments to the declared parameters, invokes the handler and
//! wraps the outcome. Every command produces exactly one result: binding
//! failures and handler failures become `error` results instead of
//! propagating.

use crate::error::{DispatchError, Result};
use crate::executor::CommandExecutor;
use crate::handler::CommandHandler;
use crate::progress::ProgressReporter;
use crate::table::{standard_table, BoundArgs, OpcodeEntry, OpcodeTable};
use async_trait::async_trait;
use codec::{encode_value, Fields, Value};
use std::sync::Arc;
use tracing::{info, warn};
use types::{Command, CommandResult, Opcode};

pub struct Dispatcher {
    handler: Arc<dyn CommandHandler>,
    table: OpcodeTable,
    progress: Option<ProgressReporter>,
}

impl Dispatcher {
    /// Dispatcher routing through the standard opcode table
    pub fn new(handler: Arc<dyn CommandHandler>) -> Self {
        Self::with_table(handler, standard_table())
    }

    /// Dispatcher over a custom table
    ///
    /// Opcodes without an entry are reported once here and answered with an
    /// `error` result when they arrive.
    pub fn with_table(handler: Arc<dyn CommandHandler>, table: OpcodeTable) -> Self {
        for opcode in table.missing() {
            warn!(
                %opcode,
                "Opcode not found in the opcode table, commands using it will be rejected"
            );
        }
        Self {
            handler,
            table,
            progress: None,
        }
    }

    /// Mirror the audit trail and failures to a progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn table(&self) -> &OpcodeTable {
        &self.table
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    /// Execute a command, always producing exactly one result
    pub async fn dispatch(&self, command: Command) -> CommandResult {
        let opcode = command.opcode;
        match self.try_dispatch(command).await {
            Ok(result) => result,
            Err(err) => {
                let result = CommandResult::exception(err.kind(), &err);
                warn!(%opcode, error = %err, "Command failed");
                self.report(format!("{}: {}", err.kind(), err));
                result
            }
        }
    }

    /// Execute a command, surfacing dispatch failures as typed errors
    pub async fn try_dispatch(&self, command: Command) -> Result<CommandResult> {
        let Command {
            opcode,
            args,
            kwargs,
        } = command;

        // Audit trail: always logged before anything can fail
        let args_text = encode_value(&Value::List(args.clone()));
        let kwargs_text = encode_value(&Value::Map(kwargs.clone()));
        info!(%opcode, args = %args_text, kwargs = %kwargs_text, "Opcode called");
        self.report(format!(
            "Opcode {opcode} called with arguments: {args_text}, {kwargs_text}"
        ));

        if opcode == Opcode::Noop {
            return Ok(CommandResult::ok());
        }
        let entry = self
            .table
            .get(opcode)
            .ok_or_else(|| DispatchError::unknown_opcode(opcode))?;

        let bound = bind(entry, args, kwargs)?;
        let call = (entry.invoke)(self.handler.as_ref(), bound)?;
        call.await
            .map_err(|err| DispatchError::handler(opcode, &err))
    }

    /// Run the handler's cleanup, logging instead of failing
    pub async fn cleanup(&self) {
        info!("Cleaning up command handler");
        if let Err(err) = self.handler.cleanup().await {
            warn!(error = %format!("{err:#}"), "Handler cleanup failed");
        }
    }

    fn report(&self, line: String) {
        if let Some(progress) = &self.progress {
            progress.report(line);
        }
    }
}

/// Bind positional arguments in declared order, then keywords by name, then
/// fill remaining parameters from their defaults
pub fn bind(
    entry: &OpcodeEntry,
    args: Vec<Value>,
    kwargs: std::collections::BTreeMap<String, Value>,
) -> Result<BoundArgs> {
    let opcode = entry.opcode;
    if args.len() > entry.params.len() {
        return Err(DispatchError::TooManyArguments {
            opcode,
            expected: entry.params.len(),
            found: args.len(),
        });
    }

    let mut values = Fields::new();
    for (param, value) in entry.params.iter().zip(args) {
        values.insert(param.name.to_string(), value);
    }

    for (name, value) in kwargs {
        if entry.param(&name).is_none() {
            return Err(DispatchError::UnexpectedArgument {
                opcode,
                parameter: name,
            });
        }
        if values.contains_key(&name) {
            return Err(DispatchError::DuplicateArgument {
                opcode,
                parameter: name,
            });
        }
        values.insert(name, value);
    }

    for param in &entry.params {
        if values.contains_key(param.name) {
            continue;
        }
        match param.default {
            Some(default) => {
                values.insert(param.name.to_string(), default());
            }
            None => {
                return Err(DispatchError::MissingArgument {
                    opcode,
                    parameter: param.name,
                })
            }
        }
    }

    Ok(BoundArgs::new(opcode, values))
}

#[async_trait]
impl CommandExecutor for Dispatcher {
    async fn execute(&self, command: Command) -> anyhow::Result<CommandResult> {
        Ok(self.dispatch(command).await)
    }
}
