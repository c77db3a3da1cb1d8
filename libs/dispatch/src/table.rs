//! Opcode routing table
//!
//! Each entry pairs an opcode with the ordered parameter schema of its handler
//! operation and a typed invoker. The schema drives argument binding in the
//! dispatcher and declared-type reconstruction in the batch loader; the
//! invoker converts bound values to the declared Rust types and calls the
//! handler.

use crate::error::{DispatchError, Result};
use crate::handler::CommandHandler;
use codec::{FieldSpec, FieldValue, Fields};
use futures::future::BoxFuture;
use std::collections::HashMap;
use strum::IntoEnumIterator;
use types::{CommandResult, Opcode, Pose, SimMode};

/// A started handler call, or the reason the bound arguments did not convert
pub type Invocation<'a> = Result<BoxFuture<'a, anyhow::Result<CommandResult>>>;

pub type Invoker = for<'a> fn(&'a dyn CommandHandler, BoundArgs) -> Invocation<'a>;

/// Arguments bound to parameter names, not yet converted to their types
#[derive(Debug)]
pub struct BoundArgs {
    opcode: Opcode,
    values: Fields,
}

impl BoundArgs {
    pub fn new(opcode: Opcode, values: Fields) -> Self {
        Self { opcode, values }
    }

    /// Remove one parameter and convert it to its declared type
    pub fn take<T: FieldValue>(&mut self, parameter: &'static str) -> Result<T> {
        let value = self
            .values
            .remove(parameter)
            .ok_or(DispatchError::MissingArgument {
                opcode: self.opcode,
                parameter,
            })?;
        T::from_value(value).map_err(|reason| DispatchError::InvalidArgument {
            opcode: self.opcode,
            parameter,
            reason,
        })
    }
}

/// Routing entry for one opcode
#[derive(Clone)]
pub struct OpcodeEntry {
    pub opcode: Opcode,
    /// Declared parameters in positional order
    pub params: Vec<FieldSpec>,
    pub invoke: Invoker,
}

impl OpcodeEntry {
    pub fn param(&self, name: &str) -> Option<&FieldSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl std::fmt::Debug for OpcodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeEntry")
            .field("opcode", &self.opcode)
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpcodeTable {
    entries: HashMap<Opcode, OpcodeEntry>,
}

impl OpcodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: OpcodeEntry) -> Option<OpcodeEntry> {
        self.entries.insert(entry.opcode, entry)
    }

    pub fn remove(&mut self, opcode: Opcode) -> Option<OpcodeEntry> {
        self.entries.remove(&opcode)
    }

    pub fn get(&self, opcode: Opcode) -> Option<&OpcodeEntry> {
        self.entries.get(&opcode)
    }

    /// Look an entry up by its wire name
    pub fn by_name(&self, name: &str) -> Result<&OpcodeEntry> {
        name.parse::<Opcode>()
            .ok()
            .and_then(|opcode| self.get(opcode))
            .ok_or_else(|| DispatchError::unknown_opcode(name))
    }

    pub fn contains(&self, opcode: Opcode) -> bool {
        self.entries.contains_key(&opcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Defined opcodes that have no entry, in declaration order
    pub fn missing(&self) -> Vec<Opcode> {
        Opcode::iter().filter(|op| !self.contains(*op)).collect()
    }
}

/// Declare handler operations and generate their table entries
///
/// Each line names the opcode, the handler method and its parameters in
/// positional order; `= expr` declares a default.
macro_rules! opcode_table {
    (
        $(
            $opcode:ident => $method:ident ( $( $param:ident : $ty:ty $(= $default:expr)? ),* )
        ),* $(,)?
    ) => {
        mod invokers {
            use super::*;

            $(
                #[allow(unused_mut, unused_variables)]
                pub(super) fn $method<'a>(
                    handler: &'a dyn CommandHandler,
                    mut args: BoundArgs,
                ) -> Invocation<'a> {
                    $( let $param: $ty = args.take(stringify!($param))?; )*
                    Ok(handler.$method($($param),*))
                }
            )*
        }

        /// Table routing every opcode to its `CommandHandler` operation
        pub fn standard_table() -> OpcodeTable {
            let mut table = OpcodeTable::new();
            $(
                table.insert(OpcodeEntry {
                    opcode: Opcode::$opcode,
                    params: vec![
                        $(
                            FieldSpec {
                                name: stringify!($param),
                                kind: <$ty as FieldValue>::kind(),
                                default: codec::field_default!($ty $(, $default)?),
                            }
                        ),*
                    ],
                    invoke: invokers::$method,
                });
            )*
            table.insert(OpcodeEntry {
                opcode: Opcode::Noop,
                params: Vec::new(),
                invoke: noop,
            });
            table
        }
    };
}

opcode_table! {
    StartSim => start_sim(mode: SimMode, start_3d_sim: bool = true),
    StopSim => stop_sim(),
    LoadScene => load_scene(scene_name: String),
    SpawnAgent => spawn_agent(agent_name: String, position: Pose),
    RemoveAgent => remove_agent(agent_id: String),
    ConfigureAutopilot => configure_autopilot(firmware: Option<String>, config: Vec<String>),
    UploadMission => upload_mission(mission: String),
    RebootAutopilot => reboot_autopilot(),
    StartMission => start_mission(),
    AbortMission => abort_mission(),
}

fn noop<'a>(_handler: &'a dyn CommandHandler, _args: BoundArgs) -> Invocation<'a> {
    Ok(Box::pin(async { Ok::<_, anyhow::Error>(CommandResult::ok()) }))
}
