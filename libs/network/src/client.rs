//! WebSocket client link to a controller or a local worker server
//!
//! The greeting is queued before anything else, so it is always the first
//! frame on the wire.

use crate::connection::{encode_frame, run_connection, Inbox, Outbox};
use crate::error::{Result, TransportError};
use crate::tls;
use codec::{Record, Registry};
use dispatch::ResultSink;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::Connector;
use tracing::{debug, info};
use types::{CommandResult, Greeting};

/// Where to connect and who to introduce ourselves as
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub uuid: String,
    /// Extra root certificate; its presence switches the link to `wss://`
    pub ca_cert: Option<PathBuf>,
}

impl ClientSettings {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        name: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
            uuid: uuid.into(),
            ca_cert: None,
        }
    }

    pub fn url(&self) -> String {
        let scheme = if self.ca_cert.is_some() { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Cloneable sending half of a client link
#[derive(Debug, Clone)]
pub struct ClientHandle {
    outbound: Outbox,
}

impl ClientHandle {
    pub fn send(&self, record: &dyn Record) -> Result<()> {
        self.outbound
            .send(encode_frame(record))
            .map_err(|_| TransportError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Progress results go straight onto the link
impl ResultSink for ClientHandle {
    fn publish(&self, result: &CommandResult) {
        if let Err(e) = self.send(result) {
            debug!(error = %e, "Upstream gone, dropping progress result");
        }
    }
}

pub struct WsClient {
    url: String,
    handle: ClientHandle,
    inbox: Inbox,
    task: JoinHandle<()>,
}

impl WsClient {
    /// Connect and greet
    pub async fn connect(settings: &ClientSettings, registry: &'static Registry) -> Result<Self> {
        let url = settings.url();
        let connected = match &settings.ca_cert {
            Some(ca_cert) => {
                let connector = tls::client_connector(ca_cert)?;
                tokio_tungstenite::connect_async_tls_with_config(
                    url.as_str(),
                    None,
                    false,
                    Some(Connector::NativeTls(connector)),
                )
                .await
            }
            None => tokio_tungstenite::connect_async(url.as_str()).await,
        };
        let (ws, _response) = connected.map_err(|e| {
            TransportError::connection_with_source(format!("connecting to {url}"), None, e)
        })?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let handle = ClientHandle {
            outbound: outbound_tx,
        };
        handle.send(&Greeting::new(&settings.name, &settings.uuid))?;

        let task = tokio::spawn(run_connection(ws, outbound_rx, inbox_tx, registry, url.clone()));
        info!(%url, name = %settings.name, uuid = %settings.uuid, "Connected");

        Ok(Self {
            url,
            handle,
            inbox: inbox_rx,
            task,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    pub fn send(&self, record: &dyn Record) -> Result<()> {
        self.handle.send(record)
    }

    /// Next record from the peer; cancel safe
    pub async fn receive(&mut self) -> Result<Box<dyn Record>> {
        self.inbox.recv().await.ok_or(TransportError::Closed)
    }

    /// Close the link and wait for the connection task to finish
    pub async fn close(self) {
        let _ = self.handle.outbound.send(Message::Close(None));
        if let Err(e) = self.task.await {
            debug!(url = %self.url, error = %e, "Connection task ended abnormally");
        }
        info!(url = %self.url, "Disconnected");
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient").field("url", &self.url).finish()
    }
}
