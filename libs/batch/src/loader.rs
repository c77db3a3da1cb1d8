//! Batch loader
//!
//! Expands JSON opcode invocations of the form `{"<opcode>": {<arg>: <value>}}`
//! into typed `Command`s, in input order. The reserved `include_file`
//! invocation names a file holding a JSON array of further invocations; lines
//! starting with `//` are stripped before parsing and includes nest.
//!
//! Plain JSON carries no type tags, so record arguments are rebuilt from the
//! parameter schemas in the opcode table: a declared record parameter is read
//! field by field from its JSON object, and declared lists and maps of records
//! element by element.

use crate::error::{BatchError, Result};
use codec::{CodecError, FieldKind, Fields, RecordSchema, Registry, Value};
use dispatch::{OpcodeEntry, OpcodeTable};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use types::{Command, INCLUDE_FILE_OPCODE};

/// Lines whose trimmed text starts with this marker are dropped from include files
pub const COMMENT_MARKER: &str = "//";

pub struct BatchLoader<'a> {
    table: &'a OpcodeTable,
    registry: &'a Registry,
    /// Canonical paths of the include files currently being expanded
    include_stack: Vec<PathBuf>,
}

impl<'a> BatchLoader<'a> {
    pub fn new(table: &'a OpcodeTable, registry: &'a Registry) -> Self {
        Self {
            table,
            registry,
            include_stack: Vec::new(),
        }
    }

    /// Expand CLI-supplied opcode lists, one JSON invocation per string
    pub fn load<S: AsRef<str>>(&mut self, opcode_lists: &[Vec<S>]) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        for (index, text) in opcode_lists.iter().flatten().enumerate() {
            let origin = format!("--opcodes #{}", index + 1);
            let json: Json =
                serde_json::from_str(text.as_ref()).map_err(|source| BatchError::Json {
                    origin: origin.clone(),
                    source,
                })?;
            commands.extend(self.expand(&json, &origin)?);
        }
        debug!(count = commands.len(), "Batch loaded");
        Ok(commands)
    }

    /// Expand one invocation into the commands it stands for
    pub fn expand(&mut self, invocation: &Json, origin: &str) -> Result<Vec<Command>> {
        let object = invocation
            .as_object()
            .ok_or_else(|| BatchError::malformed(origin, "invocation is not a JSON object"))?;

        let mut entries = object.iter();
        let (name, args) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => return Err(BatchError::malformed(origin, "invocation names no opcode")),
            (Some(_), Some(_)) => {
                return Err(BatchError::malformed(
                    origin,
                    "invocation must name exactly one opcode",
                ))
            }
        };

        if name == INCLUDE_FILE_OPCODE {
            let path = args.as_str().ok_or_else(|| {
                BatchError::malformed(origin, "include_file expects a path string")
            })?;
            return self.include(Path::new(path));
        }

        let entry = self
            .table
            .by_name(name)
            .map_err(|_| BatchError::UnknownOpcode {
                opcode: name.clone(),
            })?;
        self.command(entry, args, origin).map(|command| vec![command])
    }

    fn include(&mut self, path: &Path) -> Result<Vec<Command>> {
        let io_error = |source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = path.canonicalize().map_err(io_error)?;
        if self.include_stack.contains(&canonical) {
            return Err(BatchError::IncludeCycle { path: canonical });
        }

        let text = std::fs::read_to_string(&canonical).map_err(io_error)?;
        let origin = path.display().to_string();
        let json: Json =
            serde_json::from_str(&strip_comments(&text)).map_err(|source| BatchError::Json {
                origin: origin.clone(),
                source,
            })?;
        let invocations = json
            .as_array()
            .ok_or_else(|| BatchError::malformed(&origin, "include file is not a JSON array"))?;
        debug!(path = %origin, invocations = invocations.len(), "Expanding include file");

        self.include_stack.push(canonical);
        let expanded = self.expand_all(invocations, &origin);
        self.include_stack.pop();
        expanded
    }

    fn expand_all(&mut self, invocations: &[Json], origin: &str) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        for invocation in invocations {
            commands.extend(self.expand(invocation, origin)?);
        }
        Ok(commands)
    }

    fn command(&self, entry: &OpcodeEntry, args: &Json, origin: &str) -> Result<Command> {
        let opcode = entry.opcode.to_string();
        let empty = Map::new();
        let args = match args {
            Json::Object(map) => map,
            Json::Null => &empty,
            _ => {
                return Err(BatchError::malformed(
                    origin,
                    format!("arguments of {opcode} must be a JSON object"),
                ))
            }
        };

        for key in args.keys() {
            if entry.param(key).is_none() {
                warn!(%opcode, argument = %key, "Ignoring unknown argument");
            }
        }

        let mut kwargs = BTreeMap::new();
        for param in &entry.params {
            match args.get(param.name) {
                Some(json) => {
                    let value = self
                        .reconstruct(&param.kind, json)
                        .map_err(|err| err.locate(&opcode, param.name))?;
                    kwargs.insert(param.name.to_string(), value);
                }
                // Filled by the dispatcher
                None if param.has_default() => {}
                None => {
                    return Err(BatchError::MissingArgument {
                        opcode,
                        parameter: param.name,
                    })
                }
            }
        }

        Ok(Command {
            opcode: entry.opcode,
            args: Vec::new(),
            kwargs,
        })
    }

    /// Rebuild a value of the declared kind from untagged JSON
    fn reconstruct(&self, kind: &FieldKind, json: &Json) -> std::result::Result<Value, Rebuild> {
        match kind {
            FieldKind::Record(schema) => {
                let schema = schema();
                match json {
                    Json::Object(object) => self.record(&schema, object),
                    other => Err(Rebuild::Codec(CodecError::TypeMismatch {
                        expected: schema.type_name,
                        found: json_kind(other),
                    })),
                }
            }
            FieldKind::Optional(inner) if !json.is_null() => self.reconstruct(inner, json),
            FieldKind::List(inner) if inner.involves_record() => {
                let items = json.as_array().ok_or(Rebuild::Codec(CodecError::TypeMismatch {
                    expected: "list",
                    found: json_kind(json),
                }))?;
                items
                    .iter()
                    .map(|item| self.element(inner, item))
                    .collect::<std::result::Result<_, _>>()
                    .map(Value::List)
            }
            FieldKind::Map(inner) if inner.involves_record() => {
                let entries = json.as_object().ok_or(Rebuild::Codec(CodecError::TypeMismatch {
                    expected: "map",
                    found: json_kind(json),
                }))?;
                entries
                    .iter()
                    .map(|(key, item)| self.element(inner, item).map(|v| (key.clone(), v)))
                    .collect::<std::result::Result<_, _>>()
                    .map(Value::Map)
            }
            _ => self.registry.decode_value(json).map_err(Rebuild::Codec),
        }
    }

    /// One element of a declared container of records
    fn element(&self, kind: &FieldKind, json: &Json) -> std::result::Result<Value, Rebuild> {
        if matches!(kind, FieldKind::Record(_)) && !json.is_object() {
            return Err(Rebuild::Mixed);
        }
        self.reconstruct(kind, json)
    }

    /// Build a record from its JSON object; declared defaults take precedence
    fn record(
        &self,
        schema: &RecordSchema,
        object: &Map<String, Json>,
    ) -> std::result::Result<Value, Rebuild> {
        let mut fields = Fields::new();
        for field in &schema.fields {
            let value = match (field.default, object.get(field.name)) {
                (Some(default), _) => default(),
                (None, Some(json)) => self.reconstruct(&field.kind, json)?,
                (None, None) => {
                    return Err(Rebuild::MissingField(format!(
                        "{}.{}",
                        schema.type_name, field.name
                    )))
                }
            };
            fields.insert(field.name.to_string(), value);
        }

        for key in object.keys() {
            if schema.field(key).is_none() {
                warn!(record = schema.type_name, field = %key, "Ignoring unknown field");
            }
        }

        (schema.construct)(fields)
            .map(Value::Record)
            .map_err(Rebuild::Codec)
    }
}

/// Reconstruction failure before the opcode and parameter are known
enum Rebuild {
    Codec(CodecError),
    MissingField(String),
    Mixed,
}

impl Rebuild {
    fn locate(self, opcode: &str, parameter: &'static str) -> BatchError {
        let opcode = opcode.to_string();
        match self {
            Rebuild::Codec(source) => BatchError::Record {
                opcode,
                parameter,
                source,
            },
            Rebuild::MissingField(field) => BatchError::MissingField {
                opcode,
                parameter,
                field,
            },
            Rebuild::Mixed => BatchError::MixedContainer { opcode, parameter },
        }
    }
}

/// Drop every line whose trimmed text starts with the comment marker
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with(COMMENT_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "list",
        Json::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch::standard_table;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use types::{Opcode, Pose, Vector3};

    fn load(lists: &[Vec<String>]) -> Result<Vec<Command>> {
        let table = standard_table();
        let registry = types::registry().unwrap();
        BatchLoader::new(&table, registry).load(lists)
    }

    fn include_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn invocation(value: Json) -> Vec<String> {
        vec![value.to_string()]
    }

    #[test]
    fn test_strip_comments() {
        let text = "[\n  // first\n{\"stop_sim\": {}}\n    //indented\n]";
        assert_eq!(strip_comments(text), "[\n{\"stop_sim\": {}}\n]");
    }

    #[test]
    fn test_primitive_arguments_pass_through() {
        let commands = load(&[invocation(json!({ "start_sim": { "mode": "sitl" } }))]).unwrap();
        assert_eq!(
            commands,
            vec![Command::new(Opcode::StartSim).with_kwarg("mode", "sitl")]
        );
    }

    #[test]
    fn test_record_argument_rebuilt_from_declared_type() {
        let position = json!({
            "transform": {
                "position": { "x": 12, "y": 3, "z": 4 },
                "rotation": { "x": 0, "y": 0, "z": 0 }
            },
            "velocity": { "x": 0, "y": 0, "z": 0 },
            "angular_velocity": { "x": 0, "y": 0, "z": 0 },
            "comment": "ignored"
        });
        let commands = load(&[invocation(json!({
            "spawn_agent": { "agent_name": "Octocopter-Amazon", "position": position }
        }))])
        .unwrap();

        let expected = Command::new(Opcode::SpawnAgent)
            .with_kwarg("agent_name", "Octocopter-Amazon")
            .with_kwarg("position", Pose::at(Vector3::new(12.0, 3.0, 4.0)));
        assert_eq!(commands, vec![expected]);
    }

    #[test]
    fn test_list_parameter_of_primitives() {
        let commands = load(&[invocation(json!({
            "configure_autopilot": { "firmware": null, "config": ["a.params", "b.params"] }
        }))])
        .unwrap();
        assert_eq!(commands[0].kwargs["firmware"], Value::Null);
        assert_eq!(
            commands[0].kwargs["config"],
            Value::List(vec![Value::from("a.params"), Value::from("b.params")])
        );
    }

    #[test]
    fn test_missing_and_defaulted_parameters() {
        let err = load(&[invocation(json!({ "load_scene": {} }))]).unwrap_err();
        assert!(matches!(
            err,
            BatchError::MissingArgument { parameter: "scene_name", .. }
        ));

        // start_3d_sim has a default and may be omitted
        let start = json!({ "start_sim": { "mode": "hitl_innosim" } });
        let commands = load(&[invocation(start)]).unwrap();
        assert!(!commands[0].kwargs.contains_key("start_3d_sim"));
    }

    #[test]
    fn test_missing_record_field() {
        let err = load(&[invocation(json!({
            "spawn_agent": { "agent_name": "Vtol-Seeker", "position": { "velocity": {} } }
        }))])
        .unwrap_err();
        assert!(matches!(err, BatchError::MissingField { parameter: "position", .. }));
    }

    #[test]
    fn test_unknown_opcode_and_bad_shapes() {
        assert!(matches!(
            load(&[invocation(json!({ "fly_to_moon": {} }))]).unwrap_err(),
            BatchError::UnknownOpcode { .. }
        ));
        assert!(matches!(
            load(&[invocation(json!({ "stop_sim": {}, "noop": {} }))]).unwrap_err(),
            BatchError::MalformedInvocation { .. }
        ));
        assert!(matches!(
            load(&[vec!["{not json".to_string()]]).unwrap_err(),
            BatchError::Json { .. }
        ));
        assert!(matches!(
            load(&[invocation(json!({ "include_file": 7 }))]).unwrap_err(),
            BatchError::MalformedInvocation { .. }
        ));
    }

    #[test]
    fn test_nested_includes_keep_order() {
        let inner = include_file(r#"[{"reboot_autopilot": {}}, {"start_mission": {}}]"#);
        let outer = include_file(&format!(
            "[\n// setup\n{}\n]",
            [
                r#"{"stop_sim": {}}"#.to_string(),
                json!({ "include_file": inner.path().to_str().unwrap() }).to_string(),
                r#"{"abort_mission": {}}"#.to_string(),
            ]
            .join(",\n")
        ));

        let commands = load(&[
            invocation(json!({ "noop": {} })),
            invocation(json!({ "include_file": outer.path().to_str().unwrap() })),
        ])
        .unwrap();
        let opcodes: Vec<_> = commands.iter().map(|c| c.opcode).collect();
        assert_eq!(
            opcodes,
            [
                Opcode::Noop,
                Opcode::StopSim,
                Opcode::RebootAutopilot,
                Opcode::StartMission,
                Opcode::AbortMission
            ]
        );
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        let own_path = json!(file.path().to_str().unwrap());
        write!(file, "[{{\"include_file\": {own_path}}}]").unwrap();

        let err = load(&[invocation(json!({ "include_file": file.path().to_str().unwrap() }))])
            .unwrap_err();
        assert!(matches!(err, BatchError::IncludeCycle { .. }));
    }

    #[test]
    fn test_missing_include_file() {
        let err = load(&[invocation(json!({ "include_file": "/nonexistent/opcodes.json" }))])
            .unwrap_err();
        assert!(matches!(err, BatchError::Io { .. }));
    }
}
