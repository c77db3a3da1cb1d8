//! # Record Codec
//!
//! ## Purpose
//!
//! Polymorphic serialization of structured records to a transport-neutral
//! envelope and back. The sender and receiver share no object identity and no
//! schema exchanged over the wire; the only shared knowledge is the set of
//! registered type names.
//!
//! ## Wire Format
//!
//! ```text
//! {"type": "Pose", "data": {"transform": {"type": "Transform", "data": {...}},
//!                           "velocity":  {"type": "Vector3",   "data": {...}}, ...}}
//! ```
//!
//! Every nested record carries its own `type`, so decoding never needs the
//! declared type of the enclosing field. Plain mappings and sequences decode
//! structurally; scalars pass through unchanged.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/codec → libs/types → libs/dispatch, libs/batch, libs/network
//!   ↑              ↑
//! Value model   Domain records
//! Registry      (Vector3, Pose, Command, Result, Greeting)
//! Envelope
//! ```
//!
//! ## Invariant
//!
//! For every registered record graph `r`, `registry.decode(&encode(&r))`
//! equals `r`: field order is irrelevant, field completeness and nested type
//! fidelity are preserved.

pub mod envelope;
pub mod error;
pub mod macros;
pub mod record;
pub mod registry;
pub mod schema;
pub mod value;

pub use envelope::{encode, encode_value, to_text, Envelope, DATA_KEY, TYPE_KEY};
pub use error::{CodecError, Result};
pub use record::{Packable, Record};
pub use registry::Registry;
pub use schema::{FieldKind, FieldSpec, RecordSchema};
pub use value::{FieldValue, Fields, Value};
