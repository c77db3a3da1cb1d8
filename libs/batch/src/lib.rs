//! # Batch Commands
//!
//! ## Purpose
//!
//! Expands CLI-supplied or file-supplied JSON opcode invocations into an
//! ordered sequence of typed `Command`s, and runs such a sequence against any
//! `CommandExecutor`, halting on the first non-`ok` result.
//!
//! ## Input Format
//!
//! ```text
//! --opcodes '{"start_sim": {"mode": "sitl_innosim"}}' '{"include_file": "mission.json"}'
//!
//! mission.json:
//! [
//!     // comment lines are stripped
//!     {"load_scene": {"scene_name": "MainScene"}},
//!     {"stop_sim": {}}
//! ]
//! ```
//!
//! The loader is independent of delivery: the same commands run in-process
//! through a `Dispatcher` or remotely through a network executor.

pub mod error;
pub mod loader;
pub mod runner;

pub use error::{BatchError, Result};
pub use loader::{strip_comments, BatchLoader, COMMENT_MARKER};
pub use runner::{run_batch, BatchOutcome};
