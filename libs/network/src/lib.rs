//! # Runner Network Layer
//!
//! ## Purpose
//!
//! Record-carrying WebSocket links between a simulation runner, the
//! controller it serves, and local command-line workers. Every frame is one
//! JSON envelope produced by the record codec.
//!
//! ## Architecture Role
//!
//! ```text
//! controller ◄──WsClient──┐
//!                         ├── WorkerCommunicator ──► Dispatcher
//! local CLI ──►WsServer───┘        (serve_commands)
//!                 │
//!           WorkerRegistry (greeting-gated, keyed by id)
//! ```
//!
//! ## Connection Rules
//!
//! - The first frame of every link is a `Greeting`; the server drops peers
//!   that open with anything else.
//! - Worker ids are unique among live workers; names are not, and sends by
//!   name reach the most recent registration.
//! - A frame that does not decode closes its link.

pub mod client;
pub mod communicator;
pub mod connection;
pub mod error;
pub mod race;
pub mod remote;
pub mod server;
pub mod service;
pub mod tls;
pub mod workers;

pub use client::{ClientHandle, ClientSettings, WsClient};
pub use communicator::{Incoming, Origin, WorkerCommunicator};
pub use connection::{decode_frame, encode_frame, Frame};
pub use error::{Result, TransportError};
pub use race::race_receive;
pub use remote::RemoteExecutor;
pub use server::{Received, ServerSettings, WsServer, HANDSHAKE_TIMEOUT};
pub use service::serve_commands;
pub use workers::{Registration, Worker, WorkerRegistry};
