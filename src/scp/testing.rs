//! In-memory duplex stream for engine tests.
//!
//! Serves a fixed script of peer bytes one byte per read and records every
//! read and write in order, so tests can check turn taking.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Read(u8),
    Write(Vec<u8>),
}

/// Consecutive events of the same direction, merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Turn {
    Read(Vec<u8>),
    Write(Vec<u8>),
}

pub(crate) struct ScriptedStream {
    input: VecDeque<u8>,
    events: Vec<Event>,
}

impl ScriptedStream {
    pub(crate) fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            events: Vec::new(),
        }
    }

    /// Everything the engine wrote, concatenated.
    pub(crate) fn written(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Write(bytes) => Some(bytes.as_slice()),
                Event::Read(_) => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Script bytes the engine never consumed.
    pub(crate) fn unread(&self) -> usize {
        self.input.len()
    }

    pub(crate) fn turns(&self) -> Vec<Turn> {
        let mut turns: Vec<Turn> = Vec::new();
        for event in &self.events {
            let merged = match (event, turns.last_mut()) {
                (Event::Read(b), Some(Turn::Read(bytes))) => {
                    bytes.push(*b);
                    true
                }
                (Event::Write(w), Some(Turn::Write(bytes))) => {
                    bytes.extend_from_slice(w);
                    true
                }
                _ => false,
            };
            if !merged {
                turns.push(match event {
                    Event::Read(b) => Turn::Read(vec![*b]),
                    Event::Write(w) => Turn::Write(w.clone()),
                });
            }
        }
        turns
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() > 0 {
            if let Some(b) = this.input.pop_front() {
                buf.put_slice(&[b]);
                this.events.push(Event::Read(b));
            }
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if !buf.is_empty() {
            this.events.push(Event::Write(buf.to_vec()));
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
