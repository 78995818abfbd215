//! Server mode - runs when a session executes `scp -t <path>` or
//! `scp -f <path>` on this host.
//!
//! The session owns authentication and channel setup; all this module needs
//! is the argument vector and one duplex stream. For the remote binary that
//! stream is stdin/stdout.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::scp::{
    Channel, Direction, Receiver, ReceiverConfig, Sender, SenderConfig, TransferRequest,
    TransferStats,
};
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Whether an argument vector is an `scp` invocation this module can serve.
pub fn is_scp_invocation<T: AsRef<str>>(argv: &[T]) -> bool {
    argv.first()
        .and_then(|program| Path::new(program.as_ref()).file_name())
        .map(|name| name == "scp")
        .unwrap_or(false)
}

/// Interpret `argv` and run the requested transfer over `stream`.
pub async fn handle<S, I, T>(stream: S, argv: I, config: &EngineConfig) -> Result<TransferStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let request = TransferRequest::parse(argv)?;
    serve(stream, &request, config).await
}

/// Run an already interpreted request over `stream`.
pub async fn serve<S>(
    stream: S,
    request: &TransferRequest,
    config: &EngineConfig,
) -> Result<TransferStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::debug!(
        "scp {:?} {} (recursive: {}, preserve: {})",
        request.direction,
        request.destination.display(),
        request.recursive,
        request.preserve_metadata
    );

    let mut channel = Channel::new(stream, config);
    match request.direction {
        Direction::Upload => {
            let mut receiver = Receiver::new(ReceiverConfig::new(request, config));
            receiver.run(&mut channel).await
        }
        Direction::Download => {
            let mut sender = Sender::new(SenderConfig::new(request, config));
            sender.run(&mut channel).await
        }
    }
}

/// Report a failure that happened before either engine could start, so the
/// peer gets a fault message instead of a bare closed stream.
pub async fn refuse<S>(stream: S, message: &str) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut channel = Channel::new(stream, &EngineConfig::default());
    channel.send_fault(message).await
}

/// Main server entry point: the process's stdin/stdout are the stream.
pub async fn run_server(request: &TransferRequest, config: &EngineConfig) -> Result<TransferStats> {
    serve(Stdio::new(), request, config).await
}

/// stdin and stdout joined into one duplex stream.
pub struct Stdio {
    stdin: tokio::io::Stdin,
    stdout: tokio::io::Stdout,
}

impl Stdio {
    pub fn new() -> Self {
        Self {
            stdin: tokio::io::stdin(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for Stdio {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncRead for Stdio {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_read(cx, buf)
    }
}

impl AsyncWrite for Stdio {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stdout).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_shutdown(cx)
    }
}
