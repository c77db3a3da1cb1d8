//! Closed enumerations carried on the wire as their string value

use codec::{CodecError, FieldKind, FieldValue, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Bridge a string-valued enum into the codec value model
macro_rules! string_enum_field {
    ($name:ident) => {
        impl FieldValue for $name {
            fn to_value(&self) -> Value {
                Value::Str(self.as_ref().to_string())
            }

            fn from_value(value: Value) -> codec::Result<Self> {
                match value {
                    Value::Str(s) => s.parse().map_err(|_| CodecError::UnknownVariant {
                        enumeration: stringify!($name),
                        value: s,
                    }),
                    other => Err(CodecError::TypeMismatch {
                        expected: "string",
                        found: other.kind_name(),
                    }),
                }
            }

            fn kind() -> FieldKind {
                FieldKind::Str
            }
        }
    };
}

/// Operations a worker can be asked to perform
///
/// When adding an opcode, add its entry to the dispatch opcode table as well;
/// the dispatcher warns at startup about opcodes it cannot route.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    StartSim,
    StopSim,
    LoadScene,
    SpawnAgent,
    RemoveAgent,
    ConfigureAutopilot,
    UploadMission,
    RebootAutopilot,
    StartMission,
    AbortMission,
    /// Liveness check; always succeeds without touching the handler
    Noop,
}

/// Pseudo-opcode understood by the batch loader only
pub const INCLUDE_FILE_OPCODE: &str = "include_file";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StatusCode {
    Ok,
    Error,
    /// Progress or log notification, never a final outcome
    InProgress,
    PermissionDenied,
}

impl StatusCode {
    /// Whether a result with this status ends the command it answers
    pub fn is_final(self) -> bool {
        self != StatusCode::InProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
pub enum SimMode {
    #[strum(serialize = "hitl_innosim")]
    HitlWithInnosim,
    #[strum(serialize = "sitl_innosim")]
    SitlWithInnosim,
}

impl SimMode {
    pub fn is_hardware_in_the_loop(self) -> bool {
        self == SimMode::HitlWithInnosim
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
pub enum SceneName {
    #[strum(serialize = "MainScene")]
    Innopolis,
    #[strum(serialize = "ConstructionScene")]
    Construction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, EnumString)]
pub enum AgentName {
    #[strum(serialize = "Octocopter-Amazon")]
    OctoAmazon,
    #[strum(serialize = "Vtol-Seeker")]
    VtolSeeker,
    #[strum(serialize = "Octocopter-Amazon01")]
    OctoAmazon01,
    #[strum(serialize = "Vtol-T300")]
    VtolT300,
    #[strum(serialize = "Quadcopter-M690")]
    QuadM690,
    #[strum(serialize = "Vtol-TFM15")]
    VtolTfm15,
}

string_enum_field!(Opcode);
string_enum_field!(StatusCode);
string_enum_field!(SimMode);
string_enum_field!(SceneName);
string_enum_field!(AgentName);
