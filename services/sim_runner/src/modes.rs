//! Process modes
//!
//! - worker: connect upstream, optionally serve local tooling, dispatch every
//!   received command and reply, clean up on Ctrl-C or upstream close
//! - local batch: load opcodes and run them through an in-process dispatcher
//! - remote batch: load opcodes and run them on a running worker through its
//!   local server

use crate::handler::LoggingHandler;
use anyhow::{Context, Result};
use batch::{run_batch, BatchLoader, BatchOutcome};
use dispatch::{standard_table, CommandExecutor, Dispatcher, ProgressReporter, ResultSink};
use network::{
    serve_commands, ClientSettings, RemoteExecutor, ServerSettings, WorkerCommunicator, WsClient,
};
use runner_config::RunnerConfig;
use std::sync::Arc;
use tracing::{info, warn};
use types::CommandResult;

/// Identity command-line tooling greets a worker's local server with
pub const LOCAL_NAME: &str = "local";
pub const LOCAL_UUID: &str = "42bcc394-10a6-4b5c-a4c5-9fefde697a08";

/// Prints progress results as they are published
struct PrintSink;

impl ResultSink for PrintSink {
    fn publish(&self, result: &CommandResult) {
        println!("{result}");
    }
}

pub fn client_settings(config: &RunnerConfig) -> Result<ClientSettings> {
    let uuid = config
        .worker_uuid
        .clone()
        .context("worker mode needs a worker uuid")?;
    Ok(ClientSettings {
        host: config.wss_remote_host.clone(),
        port: config.wss_remote_port,
        name: config.worker_name.clone(),
        uuid,
        ca_cert: config.ca_cert.clone(),
    })
}

pub fn local_server_settings(config: &RunnerConfig) -> Option<ServerSettings> {
    let (host, port) = config.local_server()?;
    let (cert, key) = match config.server_identity() {
        Some((cert, key)) => (Some(cert.to_path_buf()), Some(key.to_path_buf())),
        None => (None, None),
    };
    Some(ServerSettings {
        cert,
        key,
        ..ServerSettings::plain(host, port)
    })
}

/// Serve controller commands until Ctrl-C or the controller disconnects
pub async fn run_worker(config: &RunnerConfig) -> Result<()> {
    config.validate_worker()?;
    let registry = types::registry()?;

    let client = client_settings(config)?;
    let local = local_server_settings(config);
    match &local {
        Some(settings) => info!(
            host = %settings.host,
            port = settings.port,
            "Running with a local server"
        ),
        None => info!("Running without a local server"),
    }

    let mut communicator = WorkerCommunicator::connect(&client, local.as_ref(), registry)
        .await
        .with_context(|| format!("connecting to controller at {}", client.url()))?;

    let progress = ProgressReporter::new();
    progress.attach(communicator.progress_sink());
    let dispatcher = Dispatcher::new(Arc::new(LoggingHandler::new(progress.clone())))
        .with_progress(progress);

    let served = tokio::select! {
        served = serve_commands(&mut communicator, &dispatcher) => served,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    dispatcher.cleanup().await;
    communicator.close().await;
    served.context("serving commands")
}

/// Load `opcodes` and run them through `executor`, printing every final result
pub async fn run_opcodes(
    opcodes: &[String],
    executor: &dyn CommandExecutor,
) -> Result<BatchOutcome> {
    let table = standard_table();
    let commands = BatchLoader::new(&table, types::registry()?)
        .load(&[opcodes.to_vec()])
        .context("loading opcodes")?;
    info!(commands = commands.len(), "Opcodes loaded");

    let outcome = run_batch(executor, commands, |command, result| {
        println!("{} -> {result}", command.opcode);
    })
    .await?;

    if outcome.halted {
        warn!(
            executed = outcome.results.len(),
            total = outcome.total,
            "Batch halted on a failed command"
        );
    }
    Ok(outcome)
}

/// Run `opcodes` on a new in-process instance
pub async fn run_local_batch(opcodes: &[String]) -> Result<BatchOutcome> {
    let progress = ProgressReporter::new();
    progress.attach(Arc::new(PrintSink));
    let dispatcher = Dispatcher::new(Arc::new(LoggingHandler::new(progress.clone())))
        .with_progress(progress);

    let outcome = run_opcodes(opcodes, &dispatcher).await;
    dispatcher.cleanup().await;
    outcome
}

/// Run `opcodes` on the worker serving locally per `config`
pub async fn run_remote_batch(config: &RunnerConfig, opcodes: &[String]) -> Result<BatchOutcome> {
    let (host, port) = config.cli_target();
    let settings = ClientSettings {
        host: host.to_string(),
        port,
        name: LOCAL_NAME.to_string(),
        uuid: LOCAL_UUID.to_string(),
        ca_cert: config.ca_cert.clone(),
    };

    let client = WsClient::connect(&settings, types::registry()?)
        .await
        .with_context(|| format!("connecting to worker at {}", settings.url()))?;
    let executor = RemoteExecutor::new(client).on_progress(|progress| println!("{progress}"));

    let outcome = run_opcodes(opcodes, &executor).await;
    executor.close().await;
    outcome
}
