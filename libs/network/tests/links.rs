//! Server, client and worker-loop behaviour over real sockets

use async_trait::async_trait;
use dispatch::{CommandExecutor, CommandHandler, Dispatcher, ProgressReporter};
use futures::{SinkExt, StreamExt};
use network::{
    serve_commands, ClientSettings, RemoteExecutor, ServerSettings, WorkerCommunicator, WsClient,
    WsServer,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use types::{Command, CommandResult, Opcode, StatusCode};

async fn server() -> WsServer {
    WsServer::bind(&ServerSettings::plain("127.0.0.1", 0), types::registry().unwrap())
        .await
        .unwrap()
}

async fn client(server: &WsServer, name: &str, uuid: &str) -> WsClient {
    let settings = ClientSettings::new("127.0.0.1", server.local_addr().port(), name, uuid);
    WsClient::connect(&settings, types::registry().unwrap())
        .await
        .unwrap()
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Open a raw websocket, send `first` (if any) and wait for the server to hang up
async fn assert_rejected(server: &WsServer, first: Option<Message>) {
    let url = format!("ws://{}", server.local_addr());
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    if let Some(frame) = first {
        ws.send(frame).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(server.worker_count(), 0);
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_connection_without_greeting_is_dropped() {
    let server = server().await;
    let command = codec::to_text(&Command::new(Opcode::Noop));
    assert_rejected(&server, Some(Message::Text(command))).await;

    // A greeting client is accepted afterwards
    let _u1 = client(&server, "u1", "id-1").await;
    wait_until(|| server.worker_count() == 1).await;
}

#[tokio::test]
async fn test_undecodable_first_frame_is_dropped() {
    let server = server().await;
    for first in [
        "{not json",
        r#"{"type": "Banana", "data": {}}"#,
        r#"{"data": {"name": "u1", "uuid": "id-1"}}"#,
        r#"{"type": "Greeting", "data": {"name": "u1"}}"#,
        r#"{"type": "Greeting", "data": {"name": "u1", "uuid": 7}}"#,
    ] {
        assert_rejected(&server, Some(Message::Text(first.to_string()))).await;
    }
}

#[tokio::test]
async fn test_silent_connection_times_out() {
    let settings = ServerSettings {
        handshake_timeout: Duration::from_millis(50),
        ..ServerSettings::plain("127.0.0.1", 0)
    };
    let server = WsServer::bind(&settings, types::registry().unwrap())
        .await
        .unwrap();
    assert_rejected(&server, None).await;
}

#[tokio::test]
async fn test_tls_link_carries_greeting_and_commands() {
    let settings = ServerSettings::plain("127.0.0.1", 0)
        .with_tls(fixture("localhost.pem"), fixture("localhost.key"));
    let server = WsServer::bind(&settings, types::registry().unwrap())
        .await
        .unwrap();

    let port = server.local_addr().port();
    let mut secure = ClientSettings::new("localhost", port, "secure", "id-tls");
    secure.ca_cert = Some(fixture("localhost.pem"));
    assert!(secure.url().starts_with("wss://"));
    let mut client = WsClient::connect(&secure, types::registry().unwrap())
        .await
        .unwrap();
    wait_until(|| server.worker_count() == 1).await;
    assert_eq!(server.workers().names(), ["secure"]);

    server.send("secure", &Command::new(Opcode::StartMission)).unwrap();
    let record = tokio::time::timeout(Duration::from_secs(5), client.receive())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.downcast_ref::<Command>(),
        Some(&Command::new(Opcode::StartMission))
    );

    client.send(&CommandResult::ok()).unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), server.receive())
        .await
        .unwrap();
    assert_eq!(received.name, "secure");
    assert_eq!(
        received.record.downcast_ref::<CommandResult>(),
        Some(&CommandResult::ok())
    );

    // A plain websocket cannot talk to the TLS listener
    let plain = ClientSettings::new("127.0.0.1", port, "plain", "id-plain");
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        WsClient::connect(&plain, types::registry().unwrap()),
    )
    .await
    .unwrap();
    assert!(outcome.is_err());
    assert_eq!(server.worker_count(), 1);

    client.close().await;
}

#[tokio::test]
async fn test_worker_registered_until_disconnect() {
    let server = server().await;
    let u1 = client(&server, "u1", "id-1").await;
    wait_until(|| server.worker_count() == 1).await;
    assert_eq!(server.workers().names(), ["u1"]);

    u1.close().await;
    wait_until(|| server.worker_count() == 0).await;
}

#[tokio::test]
async fn test_duplicate_live_id_is_rejected() {
    let server = server().await;
    let _first = client(&server, "u1", "shared").await;
    wait_until(|| server.worker_count() == 1).await;

    let mut second = client(&server, "u2", "shared").await;
    let outcome = tokio::time::timeout(Duration::from_secs(5), second.receive())
        .await
        .unwrap();
    assert!(outcome.is_err());
    assert_eq!(server.workers().names(), ["u1"]);
}

#[tokio::test]
async fn test_receive_returns_first_sender_without_duplicates() {
    let server = server().await;
    let a = client(&server, "a", "id-a").await;
    let b = client(&server, "b", "id-b").await;
    let c = client(&server, "c", "id-c").await;
    wait_until(|| server.worker_count() == 3).await;

    b.send(&Command::new(Opcode::StopSim)).unwrap();
    let first = server.receive().await;
    assert_eq!(first.name, "b");
    assert_eq!(
        first.record.downcast_ref::<Command>(),
        Some(&Command::new(Opcode::StopSim))
    );

    a.send(&Command::new(Opcode::StartMission)).unwrap();
    c.send(&Command::new(Opcode::AbortMission)).unwrap();
    let mut names = vec![server.receive().await.name, server.receive().await.name];
    names.sort();
    assert_eq!(names, ["a", "c"]);

    // Nothing is left over
    let extra = tokio::time::timeout(Duration::from_millis(100), server.receive()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn test_receive_picks_up_late_joiner() {
    let server = Arc::new(server().await);
    let waiting = {
        let server = server.clone();
        tokio::spawn(async move { server.receive().await.name })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let late = client(&server, "late", "id-late").await;
    wait_until(|| server.worker_count() == 1).await;
    late.send(&Command::new(Opcode::Noop)).unwrap();

    let name = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(name, "late");
}

#[tokio::test]
async fn test_send_by_name_reaches_worker() {
    let server = server().await;
    let mut u1 = client(&server, "u1", "id-1").await;
    wait_until(|| server.worker_count() == 1).await;

    server.send("u1", &CommandResult::ok()).unwrap();
    let record = u1.receive().await.unwrap();
    assert_eq!(record.downcast_ref::<CommandResult>(), Some(&CommandResult::ok()));

    assert!(server.send("nobody", &CommandResult::ok()).is_err());
}

struct Teardown {
    progress: ProgressReporter,
}

#[async_trait]
impl CommandHandler for Teardown {
    async fn stop_sim(&self) -> anyhow::Result<CommandResult> {
        self.progress.report("stopping simulator");
        Ok(CommandResult::ok())
    }
}

#[tokio::test]
async fn test_remote_executor_through_local_server() {
    let local = server().await;
    let port = local.local_addr().port();

    let communicator = WorkerCommunicator::new(None, Some(local));
    let progress = ProgressReporter::new();
    progress.attach(communicator.progress_sink());
    let dispatcher = Dispatcher::new(Arc::new(Teardown {
        progress: progress.clone(),
    }))
    .with_progress(progress);

    let worker = tokio::spawn(async move {
        let mut communicator = communicator;
        serve_commands(&mut communicator, &dispatcher).await
    });

    let settings = ClientSettings::new("127.0.0.1", port, "local", "cli-id");
    let cli = WsClient::connect(&settings, types::registry().unwrap())
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let executor = RemoteExecutor::new(cli).on_progress({
        let seen = seen.clone();
        move |result| seen.lock().push(result.clone())
    });

    let result = executor.execute(Command::new(Opcode::StopSim)).await.unwrap();
    assert_eq!(result.status, StatusCode::Ok);
    assert!(seen
        .lock()
        .iter()
        .any(|p| p == &CommandResult::in_progress("stopping simulator")));

    // The runner has no handler for this one; it still answers
    let result = executor
        .execute(Command::new(Opcode::RebootAutopilot))
        .await
        .unwrap();
    assert_eq!(result.status, StatusCode::Error);

    executor.close().await;
    worker.abort();
}

struct SlowTeardown;

#[async_trait]
impl CommandHandler for SlowTeardown {
    async fn stop_sim(&self) -> anyhow::Result<CommandResult> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(CommandResult::ok())
    }
}

#[tokio::test]
async fn test_controller_leaving_mid_command_ends_loop_normally() {
    let controller = server().await;
    let settings = ClientSettings::new(
        "127.0.0.1",
        controller.local_addr().port(),
        "runner",
        "id-runner",
    );
    let mut communicator = WorkerCommunicator::connect(&settings, None, types::registry().unwrap())
        .await
        .unwrap();
    wait_until(|| controller.worker_count() == 1).await;

    let dispatcher = Dispatcher::new(Arc::new(SlowTeardown));
    controller.send("runner", &Command::new(Opcode::StopSim)).unwrap();
    let serving =
        tokio::spawn(async move { serve_commands(&mut communicator, &dispatcher).await });

    // Gone while stop_sim is still running
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.shutdown();

    let served = tokio::time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap();
    assert!(served.is_ok(), "unexpected {served:?}");
}
