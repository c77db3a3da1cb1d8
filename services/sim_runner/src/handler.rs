//! Stand-in command handler that tracks simulator state in memory
//!
//! Used when no simulator is attached: every operation validates its
//! arguments against the current state, logs what it would do and reports it
//! as progress. Controllers and opcode files can be exercised end to end
//! without launching anything.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use dispatch::{CommandHandler, ProgressReporter};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::info;
use types::{AgentName, CommandResult, Pose, SceneName, SimMode};
use uuid::Uuid;

#[derive(Debug, Default)]
struct SimState {
    mode: Option<SimMode>,
    with_3d: bool,
    scene: Option<SceneName>,
    agents: BTreeMap<String, (AgentName, Pose)>,
    firmware: Option<String>,
    mission: Option<String>,
    mission_running: bool,
}

impl SimState {
    fn require_running(&self) -> Result<SimMode> {
        self.mode.ok_or_else(|| anyhow!("simulator is not running"))
    }
}

pub struct LoggingHandler {
    progress: ProgressReporter,
    state: Mutex<SimState>,
}

impl LoggingHandler {
    pub fn new(progress: ProgressReporter) -> Self {
        Self {
            progress,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().mode.is_some()
    }

    pub fn agent_count(&self) -> usize {
        self.state.lock().agents.len()
    }

    fn log(&self, line: String) {
        info!("{line}");
        self.progress.report(line);
    }
}

#[async_trait]
impl CommandHandler for LoggingHandler {
    async fn start_sim(&self, mode: SimMode, start_3d_sim: bool) -> Result<CommandResult> {
        {
            let mut state = self.state.lock();
            if let Some(running) = state.mode {
                bail!("simulator already running in {running} mode");
            }
            state.mode = Some(mode);
            state.with_3d = start_3d_sim;
        }
        self.log(format!("Starting simulator in {mode} mode (3D: {start_3d_sim})"));
        Ok(CommandResult::ok()
            .with("mode", mode.as_ref())
            .with("hardware_in_the_loop", mode.is_hardware_in_the_loop()))
    }

    async fn stop_sim(&self) -> Result<CommandResult> {
        let previous = std::mem::take(&mut *self.state.lock());
        match previous.mode {
            Some(mode) => self.log(format!(
                "Stopping simulator ({mode}, {} agents, 3D: {})",
                previous.agents.len(),
                previous.with_3d
            )),
            None => self.log("Simulator was not running".to_string()),
        }
        Ok(CommandResult::ok())
    }

    async fn load_scene(&self, scene_name: String) -> Result<CommandResult> {
        let scene: SceneName = scene_name
            .parse()
            .map_err(|_| anyhow!("unknown scene {scene_name}"))?;
        {
            let mut state = self.state.lock();
            state.require_running()?;
            state.scene = Some(scene);
            state.agents.clear();
        }
        self.log(format!("Loaded scene {scene}"));
        Ok(CommandResult::ok())
    }

    async fn spawn_agent(&self, agent_name: String, position: Pose) -> Result<CommandResult> {
        let agent: AgentName = agent_name
            .parse()
            .map_err(|_| anyhow!("unknown agent model {agent_name}"))?;
        let uid = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock();
            state.require_running()?;
            if state.scene.is_none() {
                bail!("no scene loaded");
            }
            state.agents.insert(uid.clone(), (agent, position.clone()));
        }
        let at = &position.transform.position;
        self.log(format!("Spawned {agent} as {uid} at ({}, {}, {})", at.x, at.y, at.z));
        Ok(CommandResult::ok().with("uid", uid))
    }

    async fn remove_agent(&self, agent_id: String) -> Result<CommandResult> {
        let removed = self.state.lock().agents.remove(&agent_id);
        match removed {
            Some((agent, _)) => {
                self.log(format!("Removed {agent} {agent_id}"));
                Ok(CommandResult::ok())
            }
            None => bail!("no agent with id {agent_id}"),
        }
    }

    async fn configure_autopilot(
        &self,
        firmware: Option<String>,
        config: Vec<String>,
    ) -> Result<CommandResult> {
        if let Some(firmware) = &firmware {
            self.log(format!("Flashing firmware {firmware}"));
        }
        for entry in &config {
            self.log(format!("Applying autopilot config {entry}"));
        }
        let mut state = self.state.lock();
        if firmware.is_some() {
            state.firmware = firmware;
        }
        Ok(CommandResult::ok().with("applied", config.len() as i64))
    }

    async fn upload_mission(&self, mission: String) -> Result<CommandResult> {
        {
            let mut state = self.state.lock();
            state.require_running()?;
            if state.mission_running {
                bail!("a mission is running, abort it first");
            }
            state.mission = Some(mission.clone());
        }
        self.log(format!("Uploaded mission {mission}"));
        Ok(CommandResult::ok())
    }

    async fn reboot_autopilot(&self) -> Result<CommandResult> {
        {
            let mut state = self.state.lock();
            state.require_running()?;
            state.mission_running = false;
        }
        self.log("Rebooting autopilot".to_string());
        Ok(CommandResult::ok())
    }

    async fn start_mission(&self) -> Result<CommandResult> {
        let mission = {
            let mut state = self.state.lock();
            state.require_running()?;
            let mission = state
                .mission
                .clone()
                .ok_or_else(|| anyhow!("no mission uploaded"))?;
            state.mission_running = true;
            mission
        };
        self.log(format!("Started mission {mission}"));
        Ok(CommandResult::ok())
    }

    async fn abort_mission(&self) -> Result<CommandResult> {
        {
            let mut state = self.state.lock();
            if !state.mission_running {
                bail!("no mission is running");
            }
            state.mission_running = false;
        }
        self.log("Aborted mission".to_string());
        Ok(CommandResult::ok())
    }

    async fn cleanup(&self) -> Result<()> {
        if self.is_running() {
            self.stop_sim().await?;
        }
        Ok(())
    }
}
