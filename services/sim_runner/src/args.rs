//! Command-line interface

use clap::{ArgAction, Args, Parser, Subcommand};
use runner_config::ConfigLoader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// TOML configuration file layered under SIM_* variables and flags
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Serve commands from a controller over a websocket
    Wss(WssArgs),
    /// Execute opcodes on a (new) simulator instance and exit
    Cli(CliArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Args, Debug, Default)]
pub struct WssArgs {
    /// Host of the remote controller
    #[arg(long)]
    pub host: Option<String>,

    /// Port of the remote controller
    #[arg(long)]
    pub port: Option<u16>,

    /// PEM certificate trusted for the controller connection
    #[arg(long, alias = "ca_cert")]
    pub ca_cert: Option<PathBuf>,

    /// PKCS#8 private key (BEGIN PRIVATE KEY); with --ca-cert, enables TLS on
    /// the local server
    #[arg(long, alias = "ca_key")]
    pub ca_key: Option<PathBuf>,

    /// Port for local CLI connections; no local server without it
    #[arg(long)]
    pub local_port: Option<u16>,

    /// Host for local CLI connections; no local server without it
    #[arg(long)]
    pub local_host: Option<String>,

    #[arg(long, alias = "worker_name")]
    pub worker_name: Option<String>,

    /// Worker id issued by the controller
    #[arg(long, alias = "worker_uuid")]
    pub worker_uuid: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct CliArgs {
    /// Run the opcodes on a new in-process instance
    #[arg(long, conflicts_with_all = ["local_port", "local_host"])]
    pub new: bool,

    /// Port of a running worker's local server
    #[arg(long)]
    pub local_port: Option<u16>,

    /// Host of a running worker's local server
    #[arg(long)]
    pub local_host: Option<String>,

    /// PEM certificate trusted for the local server connection
    #[arg(long, alias = "ca_cert")]
    pub ca_cert: Option<PathBuf>,

    /// JSON opcode invocations, e.g. '{"start_sim": {"mode": "sitl_innosim"}}'
    #[arg(long, required = true, num_args = 1.., action = ArgAction::Append)]
    pub opcodes: Vec<String>,
}

impl WssArgs {
    /// Layer these flags over the file and environment
    pub fn apply(&self, loader: ConfigLoader) -> ConfigLoader {
        loader
            .set("wss_remote_host", self.host.clone())
            .set("wss_remote_port", self.port)
            .set_path("ca_cert", self.ca_cert.as_deref())
            .set_path("ca_key", self.ca_key.as_deref())
            .set("wss_local_host", self.local_host.clone())
            .set("wss_local_port", self.local_port)
            .set("worker_name", self.worker_name.clone())
            .set("worker_uuid", self.worker_uuid.clone())
    }
}

impl CliArgs {
    pub fn apply(&self, loader: ConfigLoader) -> ConfigLoader {
        loader
            .set("wss_local_host", self.local_host.clone())
            .set("wss_local_port", self.local_port)
            .set_path("ca_cert", self.ca_cert.as_deref())
    }
}
