//! # Opcode Dispatch
//!
//! ## Purpose
//!
//! Turns an untyped `Command` (received over the wire or loaded from a batch)
//! into a strongly typed call on a [`CommandHandler`], guided by a static
//! table of per-opcode parameter schemas, and guarantees exactly one
//! `Result` per command.
//!
//! ## Architecture Role
//!
//! ```text
//! network / batch ──Command──→ Dispatcher ──typed call──→ CommandHandler
//!                                  │                         │
//!                              OpcodeTable              ProgressReporter
//!                           (schema + invoker)        (in_progress results)
//! ```
//!
//! The same opcode table feeds the batch loader, which reconstructs declared
//! record parameters from plain JSON.

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod handler;
pub mod progress;
pub mod table;

pub use dispatcher::{bind, Dispatcher};
pub use error::{DispatchError, Result};
pub use executor::CommandExecutor;
pub use handler::CommandHandler;
pub use progress::{ProgressReporter, ResultSink};
pub use table::{standard_table, BoundArgs, Invocation, Invoker, OpcodeEntry, OpcodeTable};
