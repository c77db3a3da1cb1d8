//! Command-line batches run on a worker through its local server

use anyhow::Result;
use e2e_tests::{free_port, init_tracing, within, worker_config, Controller};
use runner_config::RunnerConfig;
use sim_runner::{run_remote_batch, run_worker};
use tokio::task::JoinHandle;
use types::StatusCode;

struct Session {
    controller: Controller,
    worker: JoinHandle<Result<()>>,
    cli: RunnerConfig,
}

impl Session {
    /// Controller plus a worker that also serves local tooling
    async fn start(name: &str, uuid: &str) -> Result<Self> {
        let controller = Controller::start().await?;
        let local_port = free_port()?;

        let mut config = worker_config(controller.port(), name, uuid);
        config.wss_local_host = Some("127.0.0.1".to_string());
        config.wss_local_port = Some(local_port);
        let worker = tokio::spawn(async move { run_worker(&config).await });

        // The local server is bound before the worker greets the controller
        controller.wait_for_workers(1).await?;

        let cli = RunnerConfig {
            wss_local_host: Some("127.0.0.1".to_string()),
            wss_local_port: Some(local_port),
            ..RunnerConfig::default()
        };
        Ok(Self {
            controller,
            worker,
            cli,
        })
    }

    async fn stop(self) -> Result<()> {
        self.controller.shutdown();
        within("the worker to stop", self.worker).await???;
        Ok(())
    }
}

fn opcodes(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

#[tokio::test]
async fn test_remote_batch_runs_on_worker_and_reaches_controller() -> Result<()> {
    init_tracing();
    let session = Session::start("runner-remote", "7f0d0c4e-8b57-4c59-a0b4-6a4d0f1d2e31").await?;

    let outcome = within(
        "the remote batch",
        run_remote_batch(
            &session.cli,
            &opcodes(&[
                r#"{"start_sim": {"mode": "sitl_innosim", "start_3d_sim": false}}"#,
                r#"{"load_scene": {"scene_name": "MainScene"}}"#,
            ]),
        ),
    )
    .await??;
    assert!(outcome.is_success());
    assert_eq!(outcome.total, 2);

    // Progress and final results are mirrored upstream
    let mut finals = Vec::new();
    while finals.len() < 2 {
        let (name, result) = session.controller.next_result().await?;
        assert_eq!(name, "runner-remote");
        if result.is_final() {
            finals.push(result.status);
        }
    }
    assert_eq!(finals, vec![StatusCode::Ok, StatusCode::Ok]);

    session.stop().await
}

#[tokio::test]
async fn test_remote_batch_halts_on_failed_command() -> Result<()> {
    let session = Session::start("runner-halting", "c3e1a7d2-4b6f-4e8a-9d0c-1f2e3a4b5c6d").await?;

    let outcome = within(
        "the remote batch",
        run_remote_batch(
            &session.cli,
            &opcodes(&[
                r#"{"start_sim": {"mode": "hitl_innosim"}}"#,
                r#"{"start_mission": {}}"#,
                r#"{"stop_sim": {}}"#,
            ]),
        ),
    )
    .await??;
    assert!(outcome.halted);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[1].status, StatusCode::Error);

    session.stop().await
}

#[tokio::test]
async fn test_remote_batch_without_worker_fails_to_connect() -> Result<()> {
    let cli = RunnerConfig {
        wss_local_host: Some("127.0.0.1".to_string()),
        wss_local_port: Some(free_port()?),
        ..RunnerConfig::default()
    };
    let err = within(
        "the connection attempt",
        run_remote_batch(&cli, &opcodes(&[r#"{"noop": {}}"#])),
    )
    .await?
    .unwrap_err();
    assert!(format!("{err:#}").contains("connecting to worker"));
    Ok(())
}
