//! Executing commands on a runner over a client link
//!
//! Used by the command-line mode that drives an already running worker
//! through its local server port.

use crate::client::{ClientHandle, WsClient};
use async_trait::async_trait;
use dispatch::CommandExecutor;
use tokio::sync::Mutex;
use tracing::{info, warn};
use types::{Command, CommandResult, LOGGED_MESSAGE_KEY};

type ProgressCallback = Box<dyn Fn(&CommandResult) + Send + Sync>;

pub struct RemoteExecutor {
    handle: ClientHandle,
    client: Mutex<WsClient>,
    on_progress: ProgressCallback,
}

impl RemoteExecutor {
    /// Progress results are logged until [`Self::on_progress`] says otherwise
    pub fn new(client: WsClient) -> Self {
        Self {
            handle: client.handle(),
            client: Mutex::new(client),
            on_progress: Box::new(|progress| {
                let message = progress
                    .message
                    .get(LOGGED_MESSAGE_KEY)
                    .and_then(|m| m.as_str())
                    .unwrap_or_default();
                info!(%message, "Remote progress");
            }),
        }
    }

    pub fn on_progress(
        mut self,
        callback: impl Fn(&CommandResult) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Box::new(callback);
        self
    }

    pub async fn close(self) {
        self.client.into_inner().close().await;
    }
}

#[async_trait]
impl CommandExecutor for RemoteExecutor {
    /// Send `command` and wait for its final result
    async fn execute(&self, command: Command) -> anyhow::Result<CommandResult> {
        // One command in flight per link
        let mut client = self.client.lock().await;
        self.handle.send(&command)?;

        loop {
            let record = client.receive().await?;
            match record.downcast::<CommandResult>() {
                Ok(result) if result.is_final() => return Ok(result),
                Ok(progress) => (self.on_progress)(&progress),
                Err(other) => {
                    warn!(type_name = other.type_name(), "Ignoring unexpected record from runner")
                }
            }
        }
    }
}
