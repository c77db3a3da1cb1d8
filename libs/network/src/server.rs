//! WebSocket server accepting worker connections
//!
//! A connection becomes a worker only after its first frame decodes to a
//! `Greeting`. Anything else, a timeout, or a greeting reusing a live id closes
//! the connection without touching the registry. Registered workers stay until
//! their link ends.

use crate::connection::{next_record, run_connection};
use crate::error::{Result, TransportError};
use crate::race::race_receive;
use crate::tls;
use crate::workers::WorkerRegistry;
use codec::{Record, Registry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};
use types::Greeting;

/// Default time a new connection may take to greet
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to listen
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    /// Port 0 picks an ephemeral port; see [`WsServer::local_addr`]
    pub port: u16,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    /// Connections that have not greeted within this are closed
    pub handshake_timeout: Duration,
}

impl ServerSettings {
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            cert: None,
            key: None,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Present `cert` with its PKCS#8 `key` to connecting workers
    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self.key = Some(key.into());
        self
    }
}

/// A record received from a worker
#[derive(Debug)]
pub struct Received {
    pub name: String,
    pub uuid: String,
    pub record: Box<dyn Record>,
}

pub struct WsServer {
    local_addr: SocketAddr,
    workers: WorkerRegistry,
    accept_task: JoinHandle<()>,
}

impl WsServer {
    /// Bind the listener and start accepting workers in the background
    pub async fn bind(settings: &ServerSettings, registry: &'static Registry) -> Result<Self> {
        let acceptor = match (&settings.cert, &settings.key) {
            (Some(cert), Some(key)) => Some(tls::server_acceptor(cert, key)?),
            (None, None) => None,
            _ => {
                return Err(TransportError::configuration(
                    "server certificate and key must be given together",
                    Some(if settings.cert.is_some() { "key" } else { "cert" }),
                ))
            }
        };

        let listener = TcpListener::bind((settings.host.as_str(), settings.port))
            .await
            .map_err(|e| {
                TransportError::io(format!("binding {}:{}", settings.host, settings.port), e)
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("reading bound address", e))?;

        info!(%local_addr, tls = acceptor.is_some(), "Worker server listening");

        let workers = WorkerRegistry::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            acceptor,
            settings.handshake_timeout,
            workers.clone(),
            registry,
        ));

        Ok(Self {
            local_addr,
            workers,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Send to the most recently registered worker called `name`
    pub fn send(&self, name: &str, record: &dyn Record) -> Result<()> {
        self.workers.send_to_name(name, record)
    }

    pub fn send_to_id(&self, uuid: &str, record: &dyn Record) -> Result<()> {
        self.workers.send_to_id(uuid, record)
    }

    pub fn broadcast(&self, record: &dyn Record) -> usize {
        self.workers.broadcast(record)
    }

    /// Wait for the first record from any live worker
    ///
    /// Workers joining or leaving while waiting are picked up. Cancel safe:
    /// dropping the future loses no message.
    pub async fn receive(&self) -> Received {
        let mut changes = self.workers.subscribe();
        loop {
            changes.borrow_and_update();

            let handles = self.workers.inboxes();
            let mut guards = Vec::with_capacity(handles.len());
            for handle in handles {
                let guard = handle.inbox.lock_owned().await;
                guards.push(((handle.name, handle.uuid), guard));
            }
            let sources = guards
                .iter_mut()
                .map(|(key, guard)| (key.clone(), &mut **guard))
                .collect();

            let raced = tokio::select! {
                raced = race_receive(sources) => raced,
                _ = changes.changed() => continue,
            };

            match raced {
                Some(((name, uuid), record)) => {
                    debug!(%name, type_name = record.type_name(), "Record from worker");
                    return Received { name, uuid, record };
                }
                // Every current inbox is closed; wait for the set to change
                None => {
                    drop(guards);
                    let _ = changes.changed().await;
                }
            }
        }
    }

    /// Stop accepting and close every worker link
    pub fn shutdown(&self) {
        self.accept_task.abort();
        let closed = self.workers.clear();
        info!(closed, "Worker server shut down");
    }
}

impl Drop for WsServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.workers.clear();
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<tokio_native_tls::TlsAcceptor>,
    handshake_timeout: Duration,
    workers: WorkerRegistry,
    registry: &'static Registry,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };
        debug!(%peer, "Incoming connection");

        let acceptor = acceptor.clone();
        let workers = workers.clone();
        tokio::spawn(async move {
            match acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => {
                        serve_worker(stream, peer, handshake_timeout, workers, registry).await
                    }
                    Err(e) => warn!(%peer, error = %e, "TLS handshake failed"),
                },
                None => serve_worker(stream, peer, handshake_timeout, workers, registry).await,
            }
        });
    }
}

async fn serve_worker<S>(
    stream: S,
    peer: SocketAddr,
    handshake_timeout: Duration,
    workers: WorkerRegistry,
    registry: &'static Registry,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket upgrade failed");
            return;
        }
    };

    let greeting = read_greeting(&mut ws, peer, registry);
    let greeting = match tokio::time::timeout(handshake_timeout, greeting).await {
        Ok(Ok(greeting)) => greeting,
        Ok(Err(e)) => {
            error!(%peer, error = %e, "Rejecting connection");
            let _ = ws.close(None).await;
            return;
        }
        Err(_) => {
            error!(
                %peer,
                timeout = ?handshake_timeout,
                "No greeting received, rejecting connection"
            );
            let _ = ws.close(None).await;
            return;
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let registration = match workers.register(&greeting, peer, outbound_tx, inbox_rx) {
        Ok(registration) => registration,
        Err(e) => {
            error!(%peer, error = %e, "Rejecting connection");
            let _ = ws.close(None).await;
            return;
        }
    };

    let label = format!("{} ({peer})", greeting.name);
    run_connection(ws, outbound_rx, inbox_tx, registry, label).await;
    workers.remove(&greeting.uuid, registration);
}

async fn read_greeting<S>(
    ws: &mut WebSocketStream<S>,
    peer: SocketAddr,
    registry: &Registry,
) -> Result<Greeting>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let record = next_record(ws, registry)
        .await
        .map_err(|e| TransportError::handshake(peer, e.to_string()))?;
    record.downcast::<Greeting>().map_err(|other| {
        TransportError::handshake(peer, format!("expected Greeting, got {}", other.type_name()))
    })
}
