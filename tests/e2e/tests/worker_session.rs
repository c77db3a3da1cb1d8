//! A runner in worker mode driven by a stand-in controller

use anyhow::Result;
use e2e_tests::{init_tracing, within, worker_config, Controller};
use sim_runner::run_worker;
use types::{Command, Opcode, StatusCode, EXCEPTION_KEY, LOGGED_MESSAGE_KEY};

const WORKER: &str = "runner-a";
const WORKER_UUID: &str = "0b7c6f9e-5d1a-4f43-9a43-2f1f0a6f3d11";

#[tokio::test]
async fn test_worker_serves_controller_until_it_closes() -> Result<()> {
    init_tracing();
    let controller = Controller::start().await?;
    let config = worker_config(controller.port(), WORKER, WORKER_UUID);
    let worker = tokio::spawn(async move { run_worker(&config).await });

    controller.wait_for_workers(1).await?;
    assert_eq!(controller.server().workers().names(), vec![WORKER.to_string()]);

    let started = controller
        .call(
            WORKER,
            Command::new(Opcode::StartSim)
                .with_kwarg("mode", "sitl_innosim")
                .with_kwarg("start_3d_sim", false),
        )
        .await?;
    assert_eq!(started.result.status, StatusCode::Ok);
    assert_eq!(started.result.message["mode"].as_str(), Some("sitl_innosim"));
    assert_eq!(started.progress.len(), 1);
    assert_eq!(started.progress[0].status, StatusCode::InProgress);
    assert!(started.progress[0].message[LOGGED_MESSAGE_KEY]
        .as_str()
        .is_some_and(|line| line.starts_with("Starting simulator")));

    // Handler failures come back as error results and the session goes on
    let unknown = controller
        .call(
            WORKER,
            Command::new(Opcode::LoadScene).with_kwarg("scene_name", "Moon"),
        )
        .await?;
    assert_eq!(unknown.result.status, StatusCode::Error);
    assert!(unknown.result.message.contains_key(EXCEPTION_KEY));

    let noop = controller.call(WORKER, Command::new(Opcode::Noop)).await?;
    assert!(noop.result.is_ok());
    assert!(noop.progress.is_empty());

    controller.shutdown();
    within("the worker to stop", worker).await???;
    Ok(())
}

#[tokio::test]
async fn test_worker_without_uuid_refuses_to_start() -> Result<()> {
    let controller = Controller::start().await?;
    let mut config = worker_config(controller.port(), WORKER, WORKER_UUID);
    config.worker_uuid = None;

    let err = run_worker(&config).await.unwrap_err();
    assert!(format!("{err:#}").contains("worker_uuid"));
    assert_eq!(controller.server().worker_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_worker_fails_when_controller_is_unreachable() -> Result<()> {
    let port = e2e_tests::free_port()?;
    let config = worker_config(port, WORKER, WORKER_UUID);
    let err = within("the connection attempt", run_worker(&config)).await?.unwrap_err();
    assert!(format!("{err:#}").contains("connecting to controller"));
    Ok(())
}
