//! Runner configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! `SIM_*` environment variables, then explicit overrides (command-line flags).

use crate::error::{ConfigError, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of the environment variables read by [`ConfigLoader`]
pub const ENV_PREFIX: &str = "SIM";

pub const DEFAULT_REMOTE_HOST: &str = "localhost";
pub const DEFAULT_REMOTE_PORT: u16 = 9090;

/// Where command-line tooling looks for a running worker
pub const DEFAULT_CLI_LOCAL_HOST: &str = "localhost";
pub const DEFAULT_CLI_LOCAL_PORT: u16 = 9999;

pub const DEFAULT_WORKER_NAME: &str = "sim-runner";

/// Effective settings of one runner process
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Controller the worker connects to
    pub wss_remote_host: String,
    pub wss_remote_port: u16,

    /// PEM certificate; trusted by the client, presented by the local
    /// server when `ca_key` is also set
    pub ca_cert: Option<PathBuf>,
    pub ca_key: Option<PathBuf>,

    /// Local server for same-LAN tooling; enabled only when both are set
    pub wss_local_host: Option<String>,
    pub wss_local_port: Option<u16>,

    pub worker_name: String,
    pub worker_uuid: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            wss_remote_host: DEFAULT_REMOTE_HOST.to_string(),
            wss_remote_port: DEFAULT_REMOTE_PORT,
            ca_cert: None,
            ca_key: None,
            wss_local_host: None,
            wss_local_port: None,
            worker_name: DEFAULT_WORKER_NAME.to_string(),
            worker_uuid: None,
        }
    }
}

impl RunnerConfig {
    /// Local server address when both halves are configured
    pub fn local_server(&self) -> Option<(&str, u16)> {
        match (&self.wss_local_host, self.wss_local_port) {
            (Some(host), Some(port)) => Some((host.as_str(), port)),
            _ => None,
        }
    }

    /// Worker endpoint command-line tooling connects to
    pub fn cli_target(&self) -> (&str, u16) {
        (
            self.wss_local_host.as_deref().unwrap_or(DEFAULT_CLI_LOCAL_HOST),
            self.wss_local_port.unwrap_or(DEFAULT_CLI_LOCAL_PORT),
        )
    }

    /// Certificate and key for the local server, when both are configured
    pub fn server_identity(&self) -> Option<(&Path, &Path)> {
        match (&self.ca_cert, &self.ca_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    /// Checks that apply to every mode
    pub fn validate(&self) -> Result<()> {
        if self.ca_key.is_some() && self.ca_cert.is_none() {
            return Err(ConfigError::invalid(
                "ca_key",
                "a private key needs its certificate (ca_cert)",
            ));
        }
        if self.wss_remote_host.trim().is_empty() {
            return Err(ConfigError::invalid("wss_remote_host", "must not be empty"));
        }
        Ok(())
    }

    /// Checks for running as a worker
    pub fn validate_worker(&self) -> Result<()> {
        self.validate()?;
        match (&self.wss_local_host, self.wss_local_port) {
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    "wss_local_port",
                    "a local host needs a local port",
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    "wss_local_host",
                    "a local port needs a local host",
                ))
            }
            _ => {}
        }
        match self.worker_uuid.as_deref() {
            None | Some("") => Err(ConfigError::invalid(
                "worker_uuid",
                "worker mode needs the id issued by the controller",
            )),
            Some(_) => Ok(()),
        }
    }

    /// Expand `~` and `$VARS` in the certificate paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.ca_cert = expand(self.ca_cert.take(), "ca_cert")?;
        self.ca_key = expand(self.ca_key.take(), "ca_key")?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn expand(path: Option<PathBuf>, field: &'static str) -> Result<Option<PathBuf>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).map_err(|e| ConfigError::Expansion {
        field,
        reason: e.to_string(),
    })?;
    Ok(Some(PathBuf::from(expanded.as_ref())))
}

/// Builder assembling the configuration layers
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env_prefix: String,
    overrides: Vec<(String, config_crate::Value)>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: ENV_PREFIX.to_string(),
            overrides: Vec::new(),
        }
    }

    /// TOML file layered over the defaults; it must exist
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Highest-precedence value for `key`; `None` leaves lower layers alone
    pub fn set<T>(mut self, key: &str, value: Option<T>) -> Self
    where
        T: Into<config_crate::Value>,
    {
        if let Some(value) = value {
            self.overrides.push((key.to_string(), value.into()));
        }
        self
    }

    pub fn set_path(self, key: &str, value: Option<&Path>) -> Self {
        let value = value.map(|p| p.to_string_lossy().into_owned());
        self.set(key, value)
    }

    pub fn load(self) -> Result<RunnerConfig> {
        let mut builder = Config::builder();

        if let Some(path) = &self.file {
            info!(path = %path.display(), "Loading runner configuration");
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true));

        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }

        let mut config: RunnerConfig = builder.build()?.try_deserialize()?;
        config.expand_paths()?;
        debug!(?config, "Runner configuration loaded");
        Ok(config)
    }
}
