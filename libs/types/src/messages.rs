//! Records exchanged between controllers and workers
//!
//! Every type here is registered in the process registry under the name given
//! in its `define_record!` declaration; both ends of a connection must agree
//! on that set.

use crate::enums::{Opcode, StatusCode};
use codec::{define_record, Value};
use std::collections::BTreeMap;

define_record! {
    /// Point or direction in 3D space
    pub struct Vector3 as "Vector3" {
        pub x: f64,
        pub y: f64,
        pub z: f64,
    }
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

define_record! {
    pub struct Transform as "Transform" {
        pub position: Vector3,
        pub rotation: Vector3,
    }
}

define_record! {
    /// Placement and motion state of an agent
    pub struct Pose as "Pose" {
        pub transform: Transform,
        pub velocity: Vector3,
        pub angular_velocity: Vector3,
    }
}

impl Pose {
    /// Stationary pose at `position` with no rotation
    pub fn at(position: Vector3) -> Self {
        Self {
            transform: Transform {
                position,
                rotation: Vector3::zero(),
            },
            velocity: Vector3::zero(),
            angular_velocity: Vector3::zero(),
        }
    }
}

define_record! {
    /// First frame on every connection, identifying the connecting party
    pub struct Greeting as "Greeting" {
        pub name: String,
        /// Unique identity of the connecting party; names may collide, ids may not
        pub uuid: String,
    }
}

impl Greeting {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
        }
    }
}

define_record! {
    /// One requested operation
    pub struct Command as "Command" {
        pub opcode: Opcode,
        pub args: Vec<Value> = Vec::new(),
        pub kwargs: BTreeMap<String, Value> = BTreeMap::new(),
    }
}

impl Command {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }
}

define_record! {
    /// Outcome of a command, or an out-of-band progress notification
    pub struct CommandResult as "Result" {
        pub status: StatusCode,
        pub message: BTreeMap<String, Value> = BTreeMap::new(),
    }
}

/// Message key holding a handler failure description
pub const EXCEPTION_KEY: &str = "exception";

/// Message key holding a forwarded log line in progress results
pub const LOGGED_MESSAGE_KEY: &str = "logged_message";

impl CommandResult {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: BTreeMap::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::Ok)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.message.insert(key.into(), value.into());
        self
    }

    /// Error result describing a failure as `<kind>: <description>`
    pub fn exception(kind: &str, description: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::Error).with(EXCEPTION_KEY, format!("{kind}: {description}"))
    }

    pub fn in_progress(logged_message: impl Into<String>) -> Self {
        Self::new(StatusCode::InProgress).with(LOGGED_MESSAGE_KEY, logged_message.into())
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::Ok
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }
}

impl From<Vector3> for Value {
    fn from(value: Vector3) -> Self {
        Value::record(value)
    }
}

impl From<Pose> for Value {
    fn from(value: Pose) -> Self {
        Value::record(value)
    }
}

impl std::fmt::Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Result({})", self.status)?;
        if !self.message.is_empty() {
            write!(f, " {}", codec::encode_value(&Value::Map(self.message.clone())))?;
        }
        Ok(())
    }
}
