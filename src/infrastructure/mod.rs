//! Infrastructure layer
//!
//! This module contains the container runtime adapter, configuration and
//! logging setup.

mod config;
pub mod container;
mod logging;

pub use config::{Config, ConfigError};
pub use container::{
    CONTAINER_WORKDIR, ContainerExecutor, ContainerRuntime, ContainerSpec, PROBE_TIMEOUT,
    build_script, chain_commands,
};
pub use logging::init_logging;
