//! Command handler contract
//!
//! One method per opcode, each taking its declared, typed parameters. The
//! dispatcher only knows this trait; process orchestration lives in the
//! implementations.
//!
//! Every operation has a default body that fails with "not supported", so a
//! build may leave some opcodes unimplemented and still route the others.

use anyhow::Result;
use async_trait::async_trait;
use types::{CommandResult, Opcode, Pose, SimMode};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Launch the simulator in `mode`, optionally with the 3D front end
    async fn start_sim(&self, _mode: SimMode, _start_3d_sim: bool) -> Result<CommandResult> {
        unsupported(Opcode::StartSim)
    }

    async fn stop_sim(&self) -> Result<CommandResult> {
        unsupported(Opcode::StopSim)
    }

    async fn load_scene(&self, _scene_name: String) -> Result<CommandResult> {
        unsupported(Opcode::LoadScene)
    }

    /// Spawn an agent model at `position`; the result carries its `uid`
    async fn spawn_agent(&self, _agent_name: String, _position: Pose) -> Result<CommandResult> {
        unsupported(Opcode::SpawnAgent)
    }

    async fn remove_agent(&self, _agent_id: String) -> Result<CommandResult> {
        unsupported(Opcode::RemoveAgent)
    }

    /// Flash `firmware` (a path or the image contents) and apply each config
    async fn configure_autopilot(
        &self,
        _firmware: Option<String>,
        _config: Vec<String>,
    ) -> Result<CommandResult> {
        unsupported(Opcode::ConfigureAutopilot)
    }

    async fn upload_mission(&self, _mission: String) -> Result<CommandResult> {
        unsupported(Opcode::UploadMission)
    }

    async fn reboot_autopilot(&self) -> Result<CommandResult> {
        unsupported(Opcode::RebootAutopilot)
    }

    async fn start_mission(&self) -> Result<CommandResult> {
        unsupported(Opcode::StartMission)
    }

    async fn abort_mission(&self) -> Result<CommandResult> {
        unsupported(Opcode::AbortMission)
    }

    /// Release everything the handler started; called once at shutdown
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

fn unsupported(opcode: Opcode) -> Result<CommandResult> {
    anyhow::bail!("{opcode} is not supported by this handler")
}
