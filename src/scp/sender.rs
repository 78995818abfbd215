//! Source engine (`scp -f`).
//!
//! Walks a file or directory tree and emits directives plus payload, waiting
//! for the sink's reply after each one. The walk uses an explicit stack of
//! open directories.

use crate::config::EngineConfig;
use crate::error::{Result, ScpError};
use crate::scp::channel::Channel;
use crate::scp::command::TransferRequest;
use crate::scp::protocol::{self, DirDirective, Directive, FileDirective, TimeDirective};
use crate::scp::TransferStats;
use filetime::FileTime;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWrite};

/// Sender configuration
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Path to send, from the invocation
    pub source: PathBuf,
    pub recursive: bool,
    /// Send a `T` line before every file and directory
    pub preserve: bool,
    /// Maximum number of open directory levels
    pub max_depth: usize,
    /// Send directory entries in name order
    pub sort_entries: bool,
}

impl SenderConfig {
    pub fn new(request: &TransferRequest, config: &EngineConfig) -> Self {
        Self {
            source: request.destination.clone(),
            recursive: request.recursive,
            preserve: request.preserve_metadata,
            max_depth: config.max_depth,
            sort_entries: config.sort_entries,
        }
    }
}

/// A directory whose `D` has been sent and whose `E` has not.
struct DirFrame {
    entries: std::vec::IntoIter<(PathBuf, String)>,
}

/// Sender state
pub struct Sender {
    config: SenderConfig,
    stats: TransferStats,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            stats: TransferStats::default(),
        }
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// Run the source side of the conversation to completion.
    pub async fn run<S>(&mut self, ch: &mut Channel<S>) -> Result<TransferStats>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.send(ch).await {
            Ok(()) => {
                tracing::info!(
                    "sent {} files, {} directories, {} bytes from {}",
                    self.stats.files,
                    self.stats.dirs,
                    self.stats.bytes,
                    self.config.source.display()
                );
                Ok(self.stats.clone())
            }
            Err(e) => {
                if e.notifies_peer() {
                    if let Err(send_err) = ch.send_fault(&e.to_string()).await {
                        tracing::debug!("could not report fault to peer: {}", send_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn send<S>(&mut self, ch: &mut Channel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let root = self.config.source.clone();
        let meta = fs::metadata(&root)
            .await
            .map_err(|e| ScpError::filesystem(&root, e))?;

        if meta.is_dir() && !self.config.recursive {
            return Err(ScpError::IsDirectory(root));
        }
        let name = wire_name(&root).await?;

        // Wait for the sink's go-ahead.
        ch.await_reply().await?;

        if !meta.is_dir() {
            if !meta.is_file() {
                return Err(not_regular(&root));
            }
            return self.send_file(ch, &root, &name, &meta).await;
        }

        let mut stack = vec![self.open_dir(ch, &root, &name, &meta).await?];

        while !stack.is_empty() {
            let next = stack.last_mut().and_then(|frame| frame.entries.next());
            let Some((path, name)) = next else {
                stack.pop();
                ch.send_directive(&Directive::End).await?;
                ch.await_reply().await?;
                continue;
            };

            let meta = fs::metadata(&path)
                .await
                .map_err(|e| ScpError::filesystem(&path, e))?;

            if meta.is_dir() {
                if stack.len() >= self.config.max_depth {
                    return Err(ScpError::Protocol(format!(
                        "{}: directory nesting exceeds {} levels",
                        path.display(),
                        self.config.max_depth
                    )));
                }
                let frame = self.open_dir(ch, &path, &name, &meta).await?;
                stack.push(frame);
            } else if meta.is_file() {
                self.send_file(ch, &path, &name, &meta).await?;
            } else {
                tracing::warn!("skipping {}: not a regular file", path.display());
            }
        }

        Ok(())
    }

    async fn send_file<S>(
        &mut self,
        ch: &mut Channel<S>,
        path: &Path,
        name: &str,
        meta: &Metadata,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Open before the header goes out, so an unreadable file never
        // leaves the sink waiting for payload.
        let mut file = File::open(path)
            .await
            .map_err(|e| ScpError::filesystem(path, e))?;
        let size = meta.len();
        tracing::debug!("sending {} ({} bytes)", path.display(), size);

        if self.config.preserve {
            self.send_times(ch, meta).await?;
        }

        let header = Directive::File(FileDirective {
            mode: permission_bits(meta),
            size,
            name: name.to_string(),
        });
        ch.send_directive(&header).await?;
        ch.await_reply().await?;

        ch.send_payload(&mut file, size, path).await?;
        ch.await_reply().await?;

        self.stats.files += 1;
        self.stats.bytes += size;
        Ok(())
    }

    /// Send `T` (optionally) and `D` for a directory, returning its frame.
    async fn open_dir<S>(
        &mut self,
        ch: &mut Channel<S>,
        path: &Path,
        name: &str,
        meta: &Metadata,
    ) -> Result<DirFrame>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let entries = self.list_dir(path).await?;
        tracing::debug!("entering {} ({} entries)", path.display(), entries.len());

        if self.config.preserve {
            self.send_times(ch, meta).await?;
        }

        let header = Directive::Dir(DirDirective {
            mode: permission_bits(meta),
            name: name.to_string(),
        });
        ch.send_directive(&header).await?;
        ch.await_reply().await?;

        self.stats.dirs += 1;
        Ok(DirFrame {
            entries: entries.into_iter(),
        })
    }

    async fn send_times<S>(&mut self, ch: &mut Channel<S>, meta: &Metadata) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let times = Directive::Time(TimeDirective {
            modify_time: FileTime::from_last_modification_time(meta).unix_seconds(),
            access_time: FileTime::from_last_access_time(meta).unix_seconds(),
        });
        ch.send_directive(&times).await?;
        ch.await_reply().await
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<(PathBuf, String)>> {
        let mut rd = fs::read_dir(path)
            .await
            .map_err(|e| ScpError::filesystem(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| ScpError::filesystem(path, e))?
        {
            let file_name = entry.file_name();
            match file_name.to_str() {
                Some(name) if protocol::is_encodable_name(name) => {
                    entries.push((entry.path(), name.to_string()));
                }
                _ => {
                    tracing::warn!("skipping {}: name cannot be sent", entry.path().display());
                }
            }
        }

        if self.config.sort_entries {
            entries.sort_by(|a, b| a.1.cmp(&b.1));
        }
        Ok(entries)
    }
}

/// Name the top-level entry is announced under.
async fn wire_name(path: &Path) -> Result<String> {
    let resolved;
    let file_name = match path.file_name() {
        Some(name) => name,
        None => {
            resolved = fs::canonicalize(path)
                .await
                .map_err(|e| ScpError::filesystem(path, e))?;
            resolved.file_name().ok_or_else(|| unsendable(path))?
        }
    };

    match file_name.to_str() {
        Some(name) if protocol::is_encodable_name(name) => Ok(name.to_string()),
        _ => Err(unsendable(path)),
    }
}

fn unsendable(path: &Path) -> ScpError {
    ScpError::filesystem(
        path,
        io::Error::new(io::ErrorKind::InvalidInput, "name cannot be sent"),
    )
}

fn not_regular(path: &Path) -> ScpError {
    ScpError::filesystem(
        path,
        io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
    )
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & protocol::MAX_MODE
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}
