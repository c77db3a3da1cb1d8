//! End-to-end test harness for the simulation runner
//!
//! A [`Controller`] is a plain worker server standing in for the real
//! controller: runners connect to it, greet, and answer the commands it sends.
//! Every wait is bounded by [`WAIT`].

use anyhow::{anyhow, bail, Context, Result};
use network::{Received, ServerSettings, WsServer};
use runner_config::RunnerConfig;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use types::{Command, CommandResult};

/// Upper bound for any single network wait in a test
pub const WAIT: Duration = Duration::from_secs(5);

/// Await `future`, failing after [`WAIT`]
pub async fn within<F: Future>(what: &str, future: F) -> Result<F::Output> {
    tokio::time::timeout(WAIT, future)
        .await
        .map_err(|_| anyhow!("timed out waiting for {what}"))
}

/// Poll `condition` until it holds, failing after [`WAIT`]
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) -> Result<()> {
    within(what, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// A local port nothing listens on right now
pub fn free_port() -> Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Log to the test output when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration for a runner that connects to `controller_port`
pub fn worker_config(controller_port: u16, name: &str, uuid: &str) -> RunnerConfig {
    RunnerConfig {
        wss_remote_host: "127.0.0.1".to_string(),
        wss_remote_port: controller_port,
        worker_name: name.to_string(),
        worker_uuid: Some(uuid.to_string()),
        ..RunnerConfig::default()
    }
}

/// What a runner sent back for one command
#[derive(Debug)]
pub struct Answer {
    pub progress: Vec<CommandResult>,
    pub result: CommandResult,
}

/// Stand-in controller accepting runner connections
pub struct Controller {
    server: WsServer,
}

impl Controller {
    pub async fn start() -> Result<Self> {
        let server = WsServer::bind(
            &ServerSettings::plain("127.0.0.1", 0),
            types::registry()?,
        )
        .await?;
        Ok(Self { server })
    }

    pub fn port(&self) -> u16 {
        self.server.local_addr().port()
    }

    pub fn server(&self) -> &WsServer {
        &self.server
    }

    pub async fn wait_for_workers(&self, count: usize) -> Result<()> {
        wait_until(&format!("{count} workers"), || self.server.worker_count() == count).await
    }

    pub fn send(&self, worker: &str, command: &Command) -> Result<()> {
        self.server
            .send(worker, command)
            .with_context(|| format!("sending {} to {worker}", command.opcode))
    }

    /// Next result from any worker
    pub async fn next_result(&self) -> Result<(String, CommandResult)> {
        let Received { name, record, .. } = within("a result", self.server.receive()).await?;
        match record.downcast::<CommandResult>() {
            Ok(result) => Ok((name, result)),
            Err(other) => bail!("{name} sent a {} instead of a result", other.type_name()),
        }
    }

    /// Collect progress until `worker` sends a final result
    pub async fn answer(&self, worker: &str) -> Result<Answer> {
        let mut progress = Vec::new();
        loop {
            let (name, result) = self.next_result().await?;
            if name != worker {
                bail!("expected an answer from {worker}, got one from {name}");
            }
            if result.is_final() {
                return Ok(Answer { progress, result });
            }
            debug!(%result, "Progress");
            progress.push(result);
        }
    }

    /// Send `command` to `worker` and wait for its answer
    pub async fn call(&self, worker: &str, command: Command) -> Result<Answer> {
        self.send(worker, &command)?;
        self.answer(worker).await
    }

    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}
