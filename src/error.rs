//! Error taxonomy for SCP transfers.
//!
//! Everything except [`ScpError::BadInvocation`] and [`ScpError::PeerFault`]
//! is reported back to the peer as a fatal reply before it is returned.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScpError>;

#[derive(Debug, Error)]
pub enum ScpError {
    /// The `scp` argument vector could not be interpreted.
    #[error("bad invocation: {0}")]
    BadInvocation(String),

    #[error("malformed directive: invalid {field} '{value}'")]
    MalformedDirective { field: &'static str, value: String },

    #[error("unknown directive byte 0x{0:02x}")]
    UnknownDirective(u8),

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The duplex stream itself failed (transport timeouts land here too).
    #[error("stream error: {0}")]
    Stream(#[source] io::Error),

    /// The peer answered with a fatal reply.
    #[error("{0}")]
    PeerFault(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{} is a directory", .0.display())]
    IsDirectory(PathBuf),

    #[error("{}: not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("config error: {0}")]
    Config(String),
}

impl ScpError {
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(field: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedDirective {
            field,
            value: value.into(),
        }
    }

    /// Whether this error should be sent to the peer as a fatal reply.
    pub fn notifies_peer(&self) -> bool {
        !matches!(self, Self::BadInvocation(_) | Self::PeerFault(_))
    }
}

impl From<io::Error> for ScpError {
    fn from(e: io::Error) -> Self {
        Self::Stream(e)
    }
}
