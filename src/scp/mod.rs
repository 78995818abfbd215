//! SCP protocol engine.
//!
//! Both roles of the legacy `scp -t` / `scp -f` exchange over one duplex
//! stream:
//!
//! ```text
//! source (-f)                                sink (-t)
//!                  <-------- 0x00            ready
//! [T<mtime> 0 <atime> 0]  -------->
//!                  <-------- 0x00
//! C<mode> <size> <name>   -------->
//!                  <-------- 0x00
//! <size bytes> 0x00       -------->
//!                  <-------- 0x00 | 0x01 msg | 0x02 msg
//! D<mode> 0 <name> ... E  -------->          (one reply each)
//! ```
//!
//! Every directive and every payload is answered by exactly one reply
//! before the next one is sent.

pub mod channel;
pub mod command;
pub mod protocol;
pub mod receiver;
pub mod sender;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Channel, Reply, ReplyCode, SENTINEL};
pub use command::{Direction, TransferRequest};
pub use protocol::{DirDirective, Directive, DirectiveKind, FileDirective, TimeDirective};
pub use receiver::{Receiver, ReceiverConfig};
pub use sender::{Sender, SenderConfig};

/// Outcome of one transfer, either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub files: u64,
    pub dirs: u64,
    /// Payload bytes, sentinels excluded
    pub bytes: u64,
    /// The sink saw an `E` with no open directory and stopped there
    pub unmatched_end: bool,
}
