//! Coordination façade for the SysDB metadata coordinator.
//! Invoked by the transport layer; delegates to the persistence access layer.

mod config;
mod coordinator;
mod status;
mod sweeper;
mod telemetry;

pub use config::{
    Config, ConfigError, DatabaseConfig, LoggingConfig, RetentionConfig, ServerConfig,
};
pub use coordinator::Coordinator;
pub use status::status_from_core;
pub use sweeper::sweep_expired_databases;
pub use telemetry::init_tracing;
