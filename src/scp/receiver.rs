//! Sink engine (`scp -t`).
//!
//! Reads directives from the peer and materializes them on disk. Directory
//! nesting is tracked on an explicit frame stack instead of recursion, so
//! the depth limit holds against adversarial peers.
//!
//! Nothing is rolled back after a fatal error: files and directories that
//! were completed before the fault stay on disk.

use crate::config::EngineConfig;
use crate::error::{Result, ScpError};
use crate::scp::channel::Channel;
use crate::scp::command::TransferRequest;
use crate::scp::protocol::{Directive, FileDirective, TimeDirective};
use crate::scp::TransferStats;
use filetime::FileTime;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirBuilder, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite};

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Destination from the invocation
    pub destination: PathBuf,
    pub recursive: bool,
    /// Force exact permission bits (bypassing umask)
    pub preserve: bool,
    /// `-d`: destination must already be a directory
    pub target_is_dir: bool,
    /// Maximum number of open directory levels
    pub max_depth: usize,
}

impl ReceiverConfig {
    pub fn new(request: &TransferRequest, config: &EngineConfig) -> Self {
        Self {
            destination: request.destination.clone(),
            recursive: request.recursive,
            preserve: request.preserve_metadata,
            target_is_dir: request.target_is_dir,
            max_depth: config.max_depth,
        }
    }
}

/// What the destination path is, sampled once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DestinationState {
    Missing,
    File,
    Directory,
}

impl DestinationState {
    async fn probe(path: &Path) -> Result<Self> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(Self::Directory),
            Ok(_) => Ok(Self::File),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::Missing),
            Err(e) => Err(ScpError::filesystem(path, e)),
        }
    }
}

/// Where top-level entries land.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SinkTarget {
    /// The single incoming file is written to exactly this path; its
    /// declared name is ignored.
    Rename(PathBuf),
    /// Incoming entries are created inside this directory.
    Into(PathBuf),
}

/// One open `D` level.
struct DirFrame {
    path: PathBuf,
    mode: u32,
    created: bool,
    times: Option<TimeDirective>,
}

/// Receiver state
pub struct Receiver {
    config: ReceiverConfig,
    stats: TransferStats,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            stats: TransferStats::default(),
        }
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// Run the sink side of the conversation to completion.
    ///
    /// Local failures are reported to the peer as a fatal reply before they
    /// are returned.
    pub async fn run<S>(&mut self, ch: &mut Channel<S>) -> Result<TransferStats>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.receive(ch).await {
            Ok(()) => {
                tracing::info!(
                    "received {} files, {} directories, {} bytes into {}",
                    self.stats.files,
                    self.stats.dirs,
                    self.stats.bytes,
                    self.config.destination.display()
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

    async fn receive<S>(&mut self, ch: &mut Channel<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let target = self.resolve_target().await?;
        tracing::debug!("sink target: {:?}", target);

        // The sink speaks first.
        ch.send_ok().await?;

        let mut stack: Vec<DirFrame> = Vec::new();
        let mut pending: Option<TimeDirective> = None;

        loop {
            let directive = match ch.read_directive().await? {
                Some(d) => d,
                None if !stack.is_empty() => {
                    return Err(ScpError::Protocol(format!(
                        "stream ended with {} unterminated {}",
                        stack.len(),
                        if stack.len() == 1 {
                            "directory"
                        } else {
                            "directories"
                        }
                    )));
                }
                None if pending.is_some() => {
                    return Err(ScpError::Protocol(
                        "stream ended after a timestamp directive".into(),
                    ));
                }
                None => return Ok(()),
            };
            tracing::debug!("depth {}: {:?}", stack.len(), directive);

            match directive {
                Directive::Time(times) => {
                    if pending.is_some() {
                        return Err(ScpError::Protocol(
                            "timestamp directive followed by another timestamp".into(),
                        ));
                    }
                    ch.send_ok().await?;
                    pending = Some(times);
                }
                Directive::File(header) => {
                    ch.send_ok().await?;
                    let path = match (stack.last(), &target) {
                        (Some(frame), _) => frame.path.join(&header.name),
                        (None, SinkTarget::Rename(path)) => path.clone(),
                        (None, SinkTarget::Into(dir)) => dir.join(&header.name),
                    };
                    self.write_file(ch, &header, &path, pending.take()).await?;
                    ch.send_ok().await?;

                    if !self.config.recursive {
                        return Ok(());
                    }
                }
                Directive::Dir(header) => {
                    if !self.config.recursive {
                        return Err(ScpError::Protocol(format!(
                            "received directory '{}' without -r",
                            header.name
                        )));
                    }
                    if stack.len() >= self.config.max_depth {
                        return Err(ScpError::Protocol(format!(
                            "directory nesting exceeds {} levels",
                            self.config.max_depth
                        )));
                    }
                    ch.send_ok().await?;

                    let parent = match (stack.last(), &target) {
                        (Some(frame), _) => frame.path.as_path(),
                        (None, SinkTarget::Into(dir)) => dir.as_path(),
                        (None, SinkTarget::Rename(path)) => {
                            path.parent().unwrap_or_else(|| Path::new("."))
                        }
                    };
                    let path = parent.join(&header.name);
                    let times = pending.take();
                    let created = self.create_dir(&path, header.mode, times).await?;
                    stack.push(DirFrame {
                        path,
                        mode: header.mode,
                        created,
                        times,
                    });
                }
                Directive::End => {
                    if pending.is_some() {
                        return Err(ScpError::Protocol(
                            "timestamp directive not followed by a file or directory".into(),
                        ));
                    }
                    ch.send_ok().await?;
                    match stack.pop() {
                        Some(frame) => self.close_dir(frame).await?,
                        None => {
                            tracing::warn!("end directive with no open directory, finishing");
                            self.stats.unmatched_end = true;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Decide once whether the destination is a rename target or a
    /// container directory.
    async fn resolve_target(&self) -> Result<SinkTarget> {
        let dest = &self.config.destination;
        let state = DestinationState::probe(dest).await?;

        if self.config.target_is_dir && state != DestinationState::Directory {
            return Err(ScpError::NotADirectory(dest.clone()));
        }

        if self.config.recursive {
            return match state {
                DestinationState::Directory => Ok(SinkTarget::Into(dest.clone())),
                DestinationState::Missing => {
                    let mut builder = DirBuilder::new();
                    #[cfg(unix)]
                    builder.mode(0o755);
                    builder
                        .create(dest)
                        .await
                        .map_err(|e| ScpError::filesystem(dest, e))?;
                    Ok(SinkTarget::Into(dest.clone()))
                }
                DestinationState::File => Err(ScpError::NotADirectory(dest.clone())),
            };
        }

        Ok(match state {
            DestinationState::Directory => SinkTarget::Into(dest.clone()),
            DestinationState::Missing | DestinationState::File => {
                SinkTarget::Rename(dest.clone())
            }
        })
    }

    async fn write_file<S>(
        &mut self,
        ch: &mut Channel<S>,
        header: &FileDirective,
        path: &Path,
        times: Option<TimeDirective>,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        tracing::debug!("receiving {} ({} bytes)", path.display(), header.size);

        let mut opts = OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(header.mode);

        let written = {
            let mut file = opts
                .open(path)
                .await
                .map_err(|e| ScpError::filesystem(path, e))?;
            ch.receive_payload(&mut file, header.size, path).await?
        };

        // An existing file keeps its old bits on truncate.
        if self.config.preserve {
            set_mode(path, header.mode).await?;
        }
        if let Some(times) = times {
            apply_times(path, times).await?;
        }

        self.stats.files += 1;
        self.stats.bytes += written;
        Ok(())
    }

    /// Create (or reuse) a directory. Returns whether it was created here.
    async fn create_dir(
        &mut self,
        path: &Path,
        mode: u32,
        times: Option<TimeDirective>,
    ) -> Result<bool> {
        let mut builder = DirBuilder::new();
        // Owner needs rwx to fill it; exact bits are set when it closes.
        #[cfg(unix)]
        builder.mode(mode | 0o700);

        let created = match builder.create(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && is_dir(path).await => {
                tracing::debug!("reusing existing directory {}", path.display());
                false
            }
            Err(e) => return Err(ScpError::filesystem(path, e)),
        };

        if created {
            self.stats.dirs += 1;
        }
        if let Some(times) = times {
            apply_times(path, times).await?;
        }
        Ok(created)
    }

    /// Finish an `E`: restore exact bits and times that writes inside the
    /// directory disturbed.
    async fn close_dir(&mut self, frame: DirFrame) -> Result<()> {
        if frame.created || self.config.preserve {
            set_mode(&frame.path, frame.mode).await?;
        }
        if let Some(times) = frame.times {
            apply_times(&frame.path, times).await?;
        }
        Ok(())
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn apply_times(path: &Path, times: TimeDirective) -> Result<()> {
    let atime = FileTime::from_unix_time(times.access_time, 0);
    let mtime = FileTime::from_unix_time(times.modify_time, 0);
    let p = path.to_path_buf();
    tokio::task::spawn_blocking(move || filetime::set_file_times(&p, atime, mtime))
        .await
        .map_err(|e| ScpError::filesystem(path, io::Error::new(io::ErrorKind::Other, e)))?
        .map_err(|e| ScpError::filesystem(path, e))
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| ScpError::filesystem(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scp::testing::{ScriptedStream, Turn};
    use std::fs;
    use tempfile::TempDir;

    async fn run_sink(
        args: &[&str],
        config: &EngineConfig,
        wire: &[u8],
    ) -> (Result<TransferStats>, ScriptedStream) {
        let request = TransferRequest::parse(args.iter().copied()).unwrap();
        let mut ch = Channel::new(ScriptedStream::new(wire), config);
        let mut receiver = Receiver::new(ReceiverConfig::new(&request, config));
        let result = receiver.run(&mut ch).await;
        (result, ch.into_inner())
    }

    fn mtime(path: &Path) -> i64 {
        FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
    }

    fn atime(path: &Path) -> i64 {
        FileTime::from_last_access_time(&fs::metadata(path).unwrap()).unix_seconds()
    }

    #[tokio::test]
    async fn test_missing_destination_is_a_rename() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("bar.txt");

        let (result, stream) = run_sink(
            &["scp", "-t", dest.to_str().unwrap()],
            &EngineConfig::default(),
            b"C0644 5 foo.txt\nhello\0",
        )
        .await;

        let stats = result.unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.bytes, 5);
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
        assert!(!tmp.path().join("foo.txt").exists());
        assert!(!dest.join("foo.txt").exists());
        assert_eq!(stream.written(), b"\0\0\0");
    }

    #[tokio::test]
    async fn test_existing_file_is_overwritten() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("bar.txt");
        fs::write(&dest, "old contents, longer").unwrap();

        let (result, _) = run_sink(
            &["scp", "-t", dest.to_str().unwrap()],
            &EngineConfig::default(),
            b"C0644 3 foo.txt\nnew\0",
        )
        .await;

        result.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_existing_directory_keeps_declared_name() {
        let tmp = TempDir::new().unwrap();

        let (result, _) = run_sink(
            &["scp", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"C0600 2 foo.txt\nhi\0",
        )
        .await;

        result.unwrap();
        assert_eq!(fs::read(tmp.path().join("foo.txt")).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_non_recursive_stops_after_one_file() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"C0644 1 a\nx\0C0644 1 b\ny\0",
        )
        .await;

        result.unwrap();
        assert!(tmp.path().join("a").exists());
        assert!(!tmp.path().join("b").exists());
        assert!(stream.unread() > 0);
    }

    #[tokio::test]
    async fn test_recursive_nested_tree_and_turns() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("x");

        let (result, stream) = run_sink(
            &["scp", "-r", "-t", dest.to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 sub\nC0644 3 a.txt\nabc\0E\n",
        )
        .await;

        let stats = result.unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.dirs, 1);
        assert!(!stats.unmatched_end);
        assert_eq!(fs::read(dest.join("sub/a.txt")).unwrap(), b"abc");

        assert_eq!(
            stream.turns(),
            vec![
                Turn::Write(vec![0]),
                Turn::Read(b"D0755 0 sub\n".to_vec()),
                Turn::Write(vec![0]),
                Turn::Read(b"C0644 3 a.txt\n".to_vec()),
                Turn::Write(vec![0]),
                Turn::Read(b"abc\0".to_vec()),
                Turn::Write(vec![0]),
                Turn::Read(b"E\n".to_vec()),
                Turn::Write(vec![0]),
            ]
        );
    }

    #[tokio::test]
    async fn test_unterminated_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 sub\nC0644 1 a\nx\0",
        )
        .await;

        assert!(matches!(result, Err(ScpError::Protocol(_))));
        let written = stream.written();
        assert_eq!(&written[..4], b"\0\0\0\0");
        assert_eq!(
            &written[4..],
            b"\x02protocol error: stream ended with 1 unterminated directory\n"
        );
        // Best effort: what was written stays.
        assert!(tmp.path().join("sub/a").exists());
    }

    #[tokio::test]
    async fn test_stray_end_is_distinguishable() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().to_str().unwrap();

        let (matched, _) = run_sink(
            &["scp", "-r", "-t", dest],
            &EngineConfig::default(),
            b"D0755 0 one\nE\n",
        )
        .await;
        assert!(!matched.unwrap().unmatched_end);

        let (stray, stream) = run_sink(
            &["scp", "-r", "-t", dest],
            &EngineConfig::default(),
            b"D0755 0 two\nE\nE\nC0644 1 late\nx\0",
        )
        .await;
        let stats = stray.unwrap();
        assert!(stats.unmatched_end);
        assert!(!tmp.path().join("late").exists());
        assert!(stream.unread() > 0);
    }

    #[tokio::test]
    async fn test_timestamp_applies_to_next_file_only() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("f");

        let (result, stream) = run_sink(
            &["scp", "-p", "-t", dest.to_str().unwrap()],
            &EngineConfig::default(),
            b"T1600000000 0 1600000100 0\nC0640 2 f\nhi\0",
        )
        .await;

        result.unwrap();
        assert_eq!(mtime(&dest), 1600000000);
        assert_eq!(atime(&dest), 1600000100);
        assert_eq!(stream.written(), b"\0\0\0\0");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o7777;
            assert_eq!(mode, 0o640);
        }
    }

    #[tokio::test]
    async fn test_directory_times_survive_its_contents() {
        let tmp = TempDir::new().unwrap();

        let (result, _) = run_sink(
            &["scp", "-r", "-p", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"T1500000000 0 1500000000 0\nD0755 0 d\nC0644 1 f\nx\0E\n",
        )
        .await;

        result.unwrap();
        assert_eq!(mtime(&tmp.path().join("d")), 1500000000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_only_directory_is_filled_then_locked() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();

        let (result, _) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0555 0 ro\nC0644 1 f\nx\0E\n",
        )
        .await;

        result.unwrap();
        let ro = tmp.path().join("ro");
        assert_eq!(fs::read(ro.join("f")).unwrap(), b"x");
        assert_eq!(fs::metadata(&ro).unwrap().permissions().mode() & 0o7777, 0o555);
        fs::set_permissions(&ro, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_existing_directory_is_reused() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/keep"), "k").unwrap();

        let (result, _) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 sub\nC0644 1 new\nn\0E\n",
        )
        .await;

        let stats = result.unwrap();
        assert_eq!(stats.dirs, 0);
        assert!(tmp.path().join("sub/keep").exists());
        assert!(tmp.path().join("sub/new").exists());
    }

    #[tokio::test]
    async fn test_timestamp_cannot_bind_to_end() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 d\nT1 0 1 0\nE\n",
        )
        .await;

        assert!(matches!(result, Err(ScpError::Protocol(_))));
        let written = stream.written();
        assert_eq!(&written[..3], b"\0\0\0");
        assert_eq!(written[3], 0x02);
    }

    #[tokio::test]
    async fn test_unknown_directive_faults() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"Q0644 1 a\n",
        )
        .await;

        assert!(matches!(result, Err(ScpError::UnknownDirective(b'Q'))));
        assert_eq!(stream.written(), b"\0\x02unknown directive byte 0x51\n");
    }

    #[tokio::test]
    async fn test_source_fault_between_directives() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 d\nC0644 1 a\nA\0\x02d/b: No such file or directory\n",
        )
        .await;

        match result {
            Err(ScpError::PeerFault(msg)) => assert_eq!(msg, "d/b: No such file or directory"),
            other => panic!("unexpected sink result: {other:?}"),
        }
        // Acks for start, D, C and payload; the fault is not echoed back.
        assert_eq!(stream.written(), b"\0\0\0\0");
        assert!(tmp.path().join("d/a").exists());
    }

    #[tokio::test]
    async fn test_source_warning_between_directives() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 d\n\x01skipping d/sock\nC0644 1 a\nA\0E\n",
        )
        .await;

        assert_eq!(result.unwrap().files, 1);
        assert_eq!(stream.written(), b"\0\0\0\0\0");
    }

    #[tokio::test]
    async fn test_malformed_size_faults() {
        let tmp = TempDir::new().unwrap();

        let (result, stream) = run_sink(
            &["scp", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"C0644 lots a\n",
        )
        .await;

        assert!(matches!(
            result,
            Err(ScpError::MalformedDirective { field: "size", .. })
        ));
        assert_eq!(
            stream.written(),
            b"\0\x02malformed directive: invalid size 'lots'\n"
        );
    }

    #[tokio::test]
    async fn test_directory_requires_recursive() {
        let tmp = TempDir::new().unwrap();

        let (result, _) = run_sink(
            &["scp", "-t", tmp.path().to_str().unwrap()],
            &EngineConfig::default(),
            b"D0755 0 sub\nE\n",
        )
        .await;

        assert!(matches!(result, Err(ScpError::Protocol(_))));
        assert!(!tmp.path().join("sub").exists());
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig {
            max_depth: 2,
            ..EngineConfig::default()
        };

        let (result, _) = run_sink(
            &["scp", "-r", "-t", tmp.path().to_str().unwrap()],
            &config,
            b"D0755 0 a\nD0755 0 b\nD0755 0 c\nE\nE\nE\n",
        )
        .await;

        assert!(matches!(result, Err(ScpError::Protocol(msg)) if msg.contains("2 levels")));
        assert!(tmp.path().join("a/b").exists());
        assert!(!tmp.path().join("a/b/c").exists());
    }

    #[tokio::test]
    async fn test_target_dir_flag_requires_directory() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("missing");

        let (result, stream) = run_sink(
            &["scp", "-d", "-t", dest.to_str().unwrap()],
            &EngineConfig::default(),
            b"C0644 1 a\nx\0",
        )
        .await;

        assert!(matches!(result, Err(ScpError::NotADirectory(_))));
        // No go-ahead byte before the fault.
        assert_eq!(stream.written()[0], 0x02);
    }

    #[tokio::test]
    async fn test_create_failure_reports_fault() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("no/such/parent/file");

        let (result, stream) = run_sink(
            &["scp", "-t", dest.to_str().unwrap()],
            &EngineConfig::default(),
            b"C0644 1 a\nx\0",
        )
        .await;

        assert!(matches!(result, Err(ScpError::Filesystem { .. })));
        let written = stream.written();
        assert_eq!(&written[..2], b"\0\0");
        assert_eq!(written[2], 0x02);
    }
}
