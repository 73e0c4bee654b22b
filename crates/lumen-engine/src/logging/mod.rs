//! Logger setup.
//!
//! The engine logs through the `log` facade; `init_logging` wires `env_logger` behind it.

mod init;

pub use init::{init_logging, LoggingConfig};
