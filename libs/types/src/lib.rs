//! # Simulation Runner Types
//!
//! ## Purpose
//!
//! The record set both ends of a runner connection agree on: geometry
//! (`Vector3`, `Transform`, `Pose`), the `Greeting` handshake, `Command` and
//! its `Result`, plus the closed enumerations carried inside them.
//!
//! ## Architecture Role
//!
//! ```text
//! codec ──→ types ──→ dispatch / batch / network / sim-runner
//!             │
//!             └─ registry(): process-wide name → constructor table
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{registry, Command, Opcode};
//!
//! let command = Command::new(Opcode::Noop);
//! let wire = codec::encode(&command);
//! let decoded = registry().unwrap().decode_as::<Command>(&wire).unwrap();
//! assert_eq!(decoded, command);
//! ```

pub mod enums;
pub mod messages;

pub use enums::{AgentName, Opcode, SceneName, SimMode, StatusCode, INCLUDE_FILE_OPCODE};
pub use messages::{
    Command, CommandResult, Greeting, Pose, Transform, Vector3, EXCEPTION_KEY, LOGGED_MESSAGE_KEY,
};

use codec::{CodecError, Registry};
use once_cell::sync::OnceCell;

static REGISTRY: OnceCell<Registry> = OnceCell::new();

/// The process-wide registry holding every record type in this crate
///
/// Built on first use. A duplicate type name is a startup bug and is returned
/// as an error on every call.
pub fn registry() -> Result<&'static Registry, CodecError> {
    REGISTRY.get_or_try_init(build_registry)
}

fn build_registry() -> Result<Registry, CodecError> {
    let mut registry = Registry::new();
    registry
        .register::<Vector3>()?
        .register::<Transform>()?
        .register::<Pose>()?
        .register::<Greeting>()?
        .register::<Command>()?
        .register::<CommandResult>()?;
    tracing::debug!(types = ?registry.type_names(), "Record registry initialised");
    Ok(registry)
}
