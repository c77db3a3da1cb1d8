//! Combined transport of a runner in worker mode
//!
//! A runner holds one upstream link to its controller and optionally serves
//! local workers (command-line tools) on a second port. Commands from either
//! side are received through one call; results always go upstream, and
//! results for a local command also go back to the worker that sent it.

use crate::client::{ClientHandle, ClientSettings, WsClient};
use crate::error::{Result, TransportError};
use crate::server::{Received, ServerSettings, WsServer};
use crate::workers::WorkerRegistry;
use codec::{Record, Registry};
use dispatch::ResultSink;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};
use types::CommandResult;

/// Where a received record came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Upstream,
    Local { name: String, uuid: String },
}

#[derive(Debug)]
pub struct Incoming {
    pub origin: Origin,
    pub record: Box<dyn Record>,
}

pub struct WorkerCommunicator {
    upstream: Option<WsClient>,
    local: Option<WsServer>,
    /// Local worker whose command is currently executing
    current_local: Arc<Mutex<Option<String>>>,
}

impl WorkerCommunicator {
    pub fn new(upstream: Option<WsClient>, local: Option<WsServer>) -> Self {
        Self {
            upstream,
            local,
            current_local: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the local server (if configured), then connect upstream
    pub async fn connect(
        upstream: &ClientSettings,
        local: Option<&ServerSettings>,
        registry: &'static Registry,
    ) -> Result<Self> {
        let local = match local {
            Some(settings) => Some(WsServer::bind(settings, registry).await?),
            None => None,
        };
        let upstream = WsClient::connect(upstream, registry).await?;
        Ok(Self::new(Some(upstream), local))
    }

    pub fn upstream(&self) -> Option<&WsClient> {
        self.upstream.as_ref()
    }

    pub fn local(&self) -> Option<&WsServer> {
        self.local.as_ref()
    }

    /// Next record from upstream or from any local worker
    ///
    /// A closed upstream link surfaces as [`TransportError::Closed`].
    pub async fn receive(&mut self) -> Result<Incoming> {
        let incoming = match (self.upstream.as_mut(), self.local.as_ref()) {
            (Some(client), Some(server)) => tokio::select! {
                record = client.receive() => upstream_incoming(record?),
                received = server.receive() => local_incoming(received),
            },
            (Some(client), None) => upstream_incoming(client.receive().await?),
            (None, Some(server)) => local_incoming(server.receive().await),
            (None, None) => {
                return Err(TransportError::not_connected(
                    "neither an upstream link nor a local server",
                ))
            }
        };

        *self.current_local.lock() = match &incoming.origin {
            Origin::Local { uuid, .. } => Some(uuid.clone()),
            Origin::Upstream => None,
        };
        Ok(incoming)
    }

    /// Send upstream; without an upstream link the record is dropped with a warning
    pub fn send(&self, record: &dyn Record) -> Result<()> {
        match &self.upstream {
            Some(client) => client.send(record),
            None => {
                warn!(type_name = record.type_name(), "No upstream connection, dropping record");
                Ok(())
            }
        }
    }

    /// Deliver the result of a command received from `origin`
    ///
    /// The local worker is answered even when the upstream send fails; the
    /// upstream error is returned afterwards.
    pub fn reply(&self, origin: &Origin, result: &CommandResult) -> Result<()> {
        self.current_local.lock().take();
        let upstream = self.send(result);
        if let (Origin::Local { name, uuid }, Some(server)) = (origin, &self.local) {
            if let Err(e) = server.send_to_id(uuid, result) {
                warn!(%name, error = %e, "Local worker left before its result was ready");
            }
        }
        upstream
    }

    /// Sink relaying progress upstream and to the local worker being served
    pub fn progress_sink(&self) -> Arc<dyn ResultSink> {
        Arc::new(ProgressRelay {
            upstream: self.upstream.as_ref().map(WsClient::handle),
            local: self.local.as_ref().map(|server| server.workers().clone()),
            current_local: self.current_local.clone(),
        })
    }

    /// Close the upstream link and stop serving local workers
    pub async fn close(self) {
        if let Some(server) = &self.local {
            server.shutdown();
        }
        if let Some(client) = self.upstream {
            client.close().await;
        }
    }
}

fn upstream_incoming(record: Box<dyn Record>) -> Incoming {
    Incoming {
        origin: Origin::Upstream,
        record,
    }
}

fn local_incoming(received: Received) -> Incoming {
    Incoming {
        origin: Origin::Local {
            name: received.name,
            uuid: received.uuid,
        },
        record: received.record,
    }
}

struct ProgressRelay {
    upstream: Option<ClientHandle>,
    local: Option<WorkerRegistry>,
    current_local: Arc<Mutex<Option<String>>>,
}

impl ResultSink for ProgressRelay {
    fn publish(&self, result: &CommandResult) {
        if let Some(upstream) = &self.upstream {
            upstream.publish(result);
        }
        let current = self.current_local.lock().clone();
        if let (Some(uuid), Some(workers)) = (current, &self.local) {
            if let Err(e) = workers.send_to_id(&uuid, result) {
                debug!(%uuid, error = %e, "Local worker gone, dropping progress result");
            }
        }
    }
}
