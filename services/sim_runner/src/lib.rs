//! # Simulation Runner
//!
//! ## Purpose
//!
//! The process hosting a dispatcher. In `wss` mode it is a worker: it greets
//! its controller, optionally accepts local tooling on a second port, and
//! answers every command with exactly one result. In `cli` mode it executes a
//! batch of JSON opcodes, either in-process (`--new`) or on a running worker.
//!
//! ## Architecture Role
//!
//! ```text
//! runner-config ──► args / modes ──► network (WorkerCommunicator, RemoteExecutor)
//!                        │
//!                        ├──► batch (BatchLoader, run_batch)
//!                        └──► dispatch (Dispatcher) ──► LoggingHandler
//! ```

pub mod args;
pub mod handler;
pub mod modes;

pub use args::{Cli, CliArgs, Mode, WssArgs};
pub use handler::LoggingHandler;
pub use modes::{run_local_batch, run_opcodes, run_remote_batch, run_worker, LOCAL_NAME, LOCAL_UUID};
