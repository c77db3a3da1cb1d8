//! In-process batches assembled from command-line opcodes and include files

use anyhow::Result;
use sim_runner::run_local_batch;
use std::io::Write;
use std::path::Path;
use types::StatusCode;

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<String> {
    let path = dir.join(name);
    std::fs::File::create(&path)?.write_all(contents.as_bytes())?;
    Ok(path.display().to_string())
}

fn include(path: &str) -> String {
    format!(r#"{{"include_file": "{path}"}}"#)
}

fn vector(x: f64) -> String {
    format!(r#"{{"x": {x:?}, "y": 0.0, "z": 0.0}}"#)
}

fn spawn(agent: &str, x: f64) -> String {
    let zero = vector(0.0);
    let transform = format!(r#"{{"position": {}, "rotation": {zero}}}"#, vector(x));
    let pose = format!(
        r#"{{"transform": {transform}, "velocity": {zero}, "angular_velocity": {zero}}}"#
    );
    format!(r#"{{"spawn_agent": {{"agent_name": "{agent}", "position": {pose}}}}}"#)
}

#[tokio::test]
async fn test_nested_includes_expand_in_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let agents = write_file(
        dir.path(),
        "agents.json",
        &format!(
            "[\n// one of each model\n{},\n{}\n]",
            spawn("Vtol-Seeker", 1.0),
            spawn("Octocopter-Amazon", -1.0)
        ),
    )?;
    let scene = write_file(
        dir.path(),
        "scene.json",
        &format!(
            "[\n// scene setup\n{},\n{}\n]",
            r#"{"load_scene": {"scene_name": "ConstructionScene"}}"#,
            include(&agents)
        ),
    )?;

    let outcome = run_local_batch(&[
        r#"{"start_sim": {"mode": "sitl_innosim", "start_3d_sim": false}}"#.to_string(),
        include(&scene),
        r#"{"stop_sim": {}}"#.to_string(),
    ])
    .await?;

    assert!(outcome.is_success());
    assert_eq!(outcome.total, 5);
    let uids: Vec<_> = outcome.results[2..4]
        .iter()
        .map(|result| result.message["uid"].as_str().map(str::to_string))
        .collect();
    assert!(uids.iter().all(Option::is_some));
    assert_ne!(uids[0], uids[1]);
    Ok(())
}

#[tokio::test]
async fn test_failure_inside_include_halts_the_batch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mission = write_file(
        dir.path(),
        "mission.json",
        r#"[
            {"start_mission": {}},
            {"abort_mission": {}}
        ]"#,
    )?;

    let outcome = run_local_batch(&[
        r#"{"start_sim": {"mode": "sitl_innosim"}}"#.to_string(),
        include(&mission),
    ])
    .await?;

    assert!(outcome.halted);
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[1].status, StatusCode::Error);
    Ok(())
}

#[tokio::test]
async fn test_missing_include_fails_before_anything_runs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("absent.json").display().to_string();

    let err = run_local_batch(&[
        r#"{"start_sim": {"mode": "sitl_innosim"}}"#.to_string(),
        include(&missing),
    ])
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("loading opcodes"));
    Ok(())
}
