//! # Runner Configuration
//!
//! Settings for the `sim-runner` binary: the controller address, optional TLS
//! material, the optional local server for same-LAN tooling and the worker
//! identity.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use runner_config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .set("wss_remote_port", Some(9443u16))
//!     .load()
//!     .unwrap();
//! config.validate_worker().unwrap();
//! ```

pub mod error;
pub mod runner;

pub use error::{ConfigError, Result};
pub use runner::{
    ConfigLoader, RunnerConfig, DEFAULT_CLI_LOCAL_HOST, DEFAULT_CLI_LOCAL_PORT,
    DEFAULT_REMOTE_HOST, DEFAULT_REMOTE_PORT, DEFAULT_WORKER_NAME, ENV_PREFIX,
};
