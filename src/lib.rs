//! scpwire - the legacy SCP wire protocol over any duplex byte stream.
//!
//! The surrounding session (SSH transport, authentication, channels) hands
//! over an already-open stream and the argument vector of the `scp`
//! invocation; [`server::handle`] does the rest.

pub mod config;
pub mod error;
pub mod scp;
pub mod server;

pub use config::EngineConfig;
pub use error::{Result, ScpError};
pub use scp::{Direction, TransferRequest, TransferStats};
