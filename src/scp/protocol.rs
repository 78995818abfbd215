//! SCP directive codec.
//!
//! Wire format: ASCII lines terminated by `\n`, numbers in decimal except
//! permission bits (octal). Raw file payload follows a `C` line directly.
//!
//! ```text
//! T<mtime> 0 <atime> 0\n
//! C<mode:%04o> <size> <name>\n
//! D<mode:%04o> 0 <name>\n
//! E\n
//! ```

use crate::error::{Result, ScpError};
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Highest permission bits a directive may carry
pub const MAX_MODE: u32 = 0o7777;

// =============================================================================
// Directive Types
// =============================================================================

/// Leading byte of each directive line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DirectiveKind {
    Time = b'T',
    File = b'C',
    Dir = b'D',
    End = b'E',
}

impl DirectiveKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            b'T' => Some(Self::Time),
            b'C' => Some(Self::File),
            b'D' => Some(Self::Dir),
            b'E' => Some(Self::End),
            _ => None,
        }
    }
}

/// Access/modify times for the next `C` or `D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDirective {
    pub modify_time: i64,
    pub access_time: i64,
}

/// Header of exactly one file payload of `size` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDirective {
    pub mode: u32,
    pub size: u64,
    pub name: String,
}

/// Opens one directory level, closed by a later [`Directive::End`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirDirective {
    pub mode: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Time(TimeDirective),
    File(FileDirective),
    Dir(DirDirective),
    End,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Self::Time(_) => DirectiveKind::Time,
            Self::File(_) => DirectiveKind::File,
            Self::Dir(_) => DirectiveKind::Dir,
            Self::End => DirectiveKind::End,
        }
    }

    pub fn encode(&self) -> Bytes {
        let line = match self {
            Self::Time(t) => format!("T{} 0 {} 0\n", t.modify_time, t.access_time),
            Self::File(f) => format!("C{:04o} {} {}\n", f.mode & MAX_MODE, f.size, f.name),
            Self::Dir(d) => format!("D{:04o} 0 {}\n", d.mode & MAX_MODE, d.name),
            Self::End => "E\n".to_string(),
        };
        let mut buf = BytesMut::with_capacity(line.len());
        buf.put_slice(line.as_bytes());
        buf.freeze()
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse the remainder of a directive line (leading byte and `\n` stripped).
pub fn parse_directive(kind: u8, line: &[u8]) -> Result<Directive> {
    let kind = DirectiveKind::from_u8(kind).ok_or(ScpError::UnknownDirective(kind))?;
    let line = std::str::from_utf8(line)
        .map_err(|_| ScpError::malformed("line", String::from_utf8_lossy(line)))?;

    match kind {
        DirectiveKind::Time => parse_time(line).map(Directive::Time),
        DirectiveKind::File => parse_file(line).map(Directive::File),
        DirectiveKind::Dir => parse_dir(line).map(Directive::Dir),
        DirectiveKind::End => Ok(Directive::End),
    }
}

fn parse_time(line: &str) -> Result<TimeDirective> {
    let mut rest = line;
    let modify_time = parse_decimal("mtime", next_field(&mut rest, "mtime")?)?;
    next_field(&mut rest, "mtime_usec")?;
    let access_time = parse_decimal("atime", next_field(&mut rest, "atime")?)?;
    // Sub-second fields are legacy placeholders.
    Ok(TimeDirective {
        modify_time,
        access_time,
    })
}

fn parse_file(line: &str) -> Result<FileDirective> {
    let mut rest = line;
    let mode = parse_mode(next_field(&mut rest, "mode")?)?;
    let size = parse_decimal("size", next_field(&mut rest, "size")?)?;
    let name = validate_name(rest)?;
    Ok(FileDirective { mode, size, name })
}

fn parse_dir(line: &str) -> Result<DirDirective> {
    let mut rest = line;
    let mode = parse_mode(next_field(&mut rest, "mode")?)?;
    next_field(&mut rest, "size")?;
    let name = validate_name(rest)?;
    Ok(DirDirective { mode, name })
}

/// Split off one space-delimited field, leaving the rest of the line.
fn next_field<'a>(rest: &mut &'a str, field: &'static str) -> Result<&'a str> {
    match rest.split_once(' ') {
        Some((value, tail)) => {
            *rest = tail;
            Ok(value)
        }
        None => Err(ScpError::malformed(field, *rest)),
    }
}

fn parse_decimal<T: FromStr>(field: &'static str, value: &str) -> Result<T> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScpError::malformed(field, value));
    }
    value.parse().map_err(|_| ScpError::malformed(field, value))
}

fn parse_mode(value: &str) -> Result<u32> {
    if value.is_empty() || !value.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(ScpError::malformed("mode", value));
    }
    match u32::from_str_radix(value, 8) {
        Ok(mode) if mode <= MAX_MODE => Ok(mode),
        _ => Err(ScpError::malformed("mode", value)),
    }
}

/// A name must stay inside the directory it is created in.
fn validate_name(name: &str) -> Result<String> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(ScpError::malformed("name", name));
    }
    Ok(name.to_string())
}

/// Whether `name` can be carried by a `C`/`D` line at all.
pub fn is_encodable_name(name: &str) -> bool {
    !name.contains('\n') && validate_name(name).is_ok()
}

// =============================================================================
// Stream I/O
// =============================================================================

/// Read one line up to `\n` (not included), bounded by `max_len`.
pub(crate) async fn read_line<R>(r: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let buf = r.fill_buf().await?;
        if buf.is_empty() {
            return Err(ScpError::Stream(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a line",
            )));
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            if line.len() + pos > max_len {
                return Err(ScpError::malformed(
                    "line",
                    format!("longer than {} bytes", max_len),
                ));
            }
            line.extend_from_slice(&buf[..pos]);
            r.consume(pos + 1);
            return Ok(line);
        }

        let n = buf.len();
        if line.len() + n > max_len {
            return Err(ScpError::malformed(
                "line",
                format!("longer than {} bytes", max_len),
            ));
        }
        line.extend_from_slice(buf);
        r.consume(n);
    }
}

/// Read the next directive.
///
/// Returns `Ok(None)` when the stream ends cleanly at a directive boundary.
/// An unknown leading byte is rejected before the rest of its line is read.
pub async fn read_directive<R>(r: &mut R, max_line_len: usize) -> Result<Option<Directive>>
where
    R: AsyncBufRead + Unpin,
{
    let kind = {
        let buf = r.fill_buf().await?;
        match buf.first() {
            Some(&b) => b,
            None => return Ok(None),
        }
    };
    if DirectiveKind::from_u8(kind).is_none() {
        return Err(ScpError::UnknownDirective(kind));
    }
    r.consume(1);

    let line = read_line(r, max_line_len).await?;
    parse_directive(kind, &line).map(Some)
}

// =============================================================================
// Tests
// =============================================================================
