//! Logging utilities.
//!
//! Centralizes logger initialization. Library code only talks to the `log`
//! facade; hosts call [`init_logging`] once if they want `env_logger`.

mod init;

pub use init::{LoggingConfig, init_logging};
