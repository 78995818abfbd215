//! Acknowledgment channel.
//!
//! Owns the duplex stream for the whole transfer. Reads (directives, payload,
//! replies) all go through one buffer so bytes are never reordered; writes
//! pass straight through and are flushed at every turn boundary.
//!
//! The protocol is half-duplex per directive: after a directive (or a file
//! payload) is sent, exactly one reply must be read before the next
//! directive may go out.

use crate::config::EngineConfig;
use crate::error::{Result, ScpError};
use crate::scp::protocol::{self, Directive};
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use std::path::Path;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

/// End-of-content marker written after every file payload
pub const SENTINEL: u8 = 0x00;

// =============================================================================
// Reply Codes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    Ok = 0x00,
    Warning = 0x01,
    Fatal = 0x02,
}

impl ReplyCode {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Ok),
            0x01 => Some(Self::Warning),
            0x02 => Some(Self::Fatal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Warning(String),
    Fatal(String),
}

impl Reply {
    pub fn code(&self) -> ReplyCode {
        match self {
            Self::Ok => ReplyCode::Ok,
            Self::Warning(_) => ReplyCode::Warning,
            Self::Fatal(_) => ReplyCode::Fatal,
        }
    }

    pub fn encode(&self) -> Bytes {
        let msg = match self {
            Self::Ok => return Bytes::from_static(&[ReplyCode::Ok as u8]),
            Self::Warning(m) | Self::Fatal(m) => m,
        };
        // A newline inside the message would end it early on the other side.
        let msg = msg.replace('\n', " ");
        let mut buf = BytesMut::with_capacity(msg.len() + 2);
        buf.put_u8(self.code() as u8);
        buf.put_slice(msg.as_bytes());
        buf.put_u8(b'\n');
        buf.freeze()
    }
}

// =============================================================================
// Channel
// =============================================================================

pub struct Channel<S> {
    stream: BufReader<S>,
    max_line_len: usize,
    buffer_size: usize,
    reply_pending: bool,
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: &EngineConfig) -> Self {
        Self {
            stream: BufReader::with_capacity(config.buffer_size, stream),
            max_line_len: config.max_line_len,
            buffer_size: config.buffer_size,
            reply_pending: false,
        }
    }

    /// Give back the underlying stream. Buffered but unread bytes are lost.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Whether a directive or payload is still waiting for its reply.
    pub fn reply_pending(&self) -> bool {
        self.reply_pending
    }

    // -------------------------------------------------------------------------
    // Replies
    // -------------------------------------------------------------------------

    pub async fn send_ok(&mut self) -> Result<()> {
        self.send_reply(&Reply::Ok).await
    }

    pub async fn send_warning(&mut self, msg: &str) -> Result<()> {
        self.send_reply(&Reply::Warning(msg.to_string())).await
    }

    pub async fn send_fault(&mut self, msg: &str) -> Result<()> {
        self.send_reply(&Reply::Fatal(msg.to_string())).await
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        self.stream.write_all(&reply.encode()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Block until the peer answers the last directive or payload.
    ///
    /// Warnings are logged and treated as success; a fatal reply (or any
    /// byte that is not a reply code) fails the transfer.
    pub async fn await_reply(&mut self) -> Result<()> {
        self.reply_pending = false;
        let code = self.stream.read_u8().await?;
        self.decode_status(code).await
    }

    async fn decode_status(&mut self, code: u8) -> Result<()> {
        match ReplyCode::from_u8(code) {
            Some(ReplyCode::Ok) => Ok(()),
            Some(ReplyCode::Warning) => {
                let msg = self.read_message().await?;
                tracing::warn!("peer warning: {}", msg);
                Ok(())
            }
            Some(ReplyCode::Fatal) => {
                let msg = self.read_message().await?;
                Err(ScpError::PeerFault(msg))
            }
            None => Err(ScpError::PeerFault(format!(
                "protocol decoding error: unexpected reply byte 0x{:02x}",
                code
            ))),
        }
    }

    async fn read_message(&mut self) -> Result<String> {
        let raw = protocol::read_line(&mut self.stream, self.max_line_len).await?;
        Ok(String::from_utf8_lossy(&raw).trim_end().to_string())
    }

    // -------------------------------------------------------------------------
    // Directives
    // -------------------------------------------------------------------------

    /// Read the next directive, or `None` at a clean end of stream.
    ///
    /// A source that fails between directives reports it here instead of
    /// sending one: warnings are logged and skipped, a fatal reply ends the
    /// transfer with `PeerFault`.
    pub async fn read_directive(&mut self) -> Result<Option<Directive>> {
        loop {
            let lead = {
                let buf = self.stream.fill_buf().await?;
                match buf.first() {
                    Some(&b) => b,
                    None => return Ok(None),
                }
            };
            match ReplyCode::from_u8(lead) {
                Some(ReplyCode::Warning) | Some(ReplyCode::Fatal) => {
                    self.stream.consume(1);
                    self.decode_status(lead).await?;
                }
                _ => return protocol::read_directive(&mut self.stream, self.max_line_len).await,
            }
        }
    }

    pub async fn send_directive(&mut self, directive: &Directive) -> Result<()> {
        if self.reply_pending {
            return Err(ScpError::Protocol(format!(
                "{:?} directive sent before the previous acknowledgment",
                directive.kind()
            )));
        }
        self.stream.write_all(&directive.encode()).await?;
        self.stream.flush().await?;
        self.reply_pending = true;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Payload
    // -------------------------------------------------------------------------

    /// Copy exactly `size` payload bytes into `dest`, then consume the
    /// sentinel. `path` names `dest` in filesystem errors.
    pub async fn receive_payload<W>(&mut self, dest: &mut W, size: u64, path: &Path) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut remaining = size;
        while remaining > 0 {
            let buf = self.stream.fill_buf().await?;
            if buf.is_empty() {
                return Err(ScpError::Stream(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream ended after {} of {} payload bytes",
                        size - remaining,
                        size
                    ),
                )));
            }
            let n = remaining.min(buf.len() as u64) as usize;
            dest.write_all(&buf[..n])
                .await
                .map_err(|e| ScpError::filesystem(path, e))?;
            self.stream.consume(n);
            remaining -= n as u64;
        }
        dest.flush()
            .await
            .map_err(|e| ScpError::filesystem(path, e))?;

        // The sender reports a failed read in place of the sentinel.
        let sentinel = self.stream.read_u8().await?;
        self.decode_status(sentinel).await?;
        Ok(size)
    }

    /// Stream exactly `size` bytes from `src`, followed by the sentinel.
    /// `path` names `src` in filesystem errors.
    pub async fn send_payload<R>(&mut self, src: &mut R, size: u64, path: &Path) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let chunk = usize::try_from(size)
            .unwrap_or(usize::MAX)
            .min(self.buffer_size)
            .max(1);
        let mut buf = vec![0u8; chunk];
        let mut remaining = size;

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let read = match src.read(&mut buf[..want]).await {
                Ok(0) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file shrank by {} bytes during transfer", remaining),
                )),
                other => other,
            };
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    // The sink still expects `remaining` bytes; the fault
                    // reply then lands where the sentinel would.
                    self.pad_payload(&mut buf, remaining).await?;
                    return Err(ScpError::filesystem(path, e));
                }
            };
            self.stream.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }

        self.stream.write_all(&[SENTINEL]).await?;
        self.stream.flush().await?;
        self.reply_pending = true;
        Ok(())
    }

    /// Write `count` zero bytes, reusing `buf` as scratch.
    async fn pad_payload(&mut self, buf: &mut [u8], mut count: u64) -> Result<()> {
        buf.fill(0);
        while count > 0 {
            let n = count.min(buf.len() as u64) as usize;
            self.stream.write_all(&buf[..n]).await?;
            count -= n as u64;
        }
        self.stream.flush().await?;
        Ok(())
    }
}
