//! Transport collaborator contract
//!
//! The console never constructs transports itself. It talks to two byte
//! channels through these traits: a local line (serial port, stdio) and a
//! remote one (network client behind a listener).

use tracing::debug;

/// Anything bytes can be written to.
///
/// Implemented by every channel and by the [`DuplexWriter`](super::writer::DuplexWriter),
/// so code that only prints can take either.
pub trait ByteSink {
    /// Write a single byte, returning the number of bytes accepted
    fn write_one(&mut self, byte: u8) -> usize;

    /// Write a buffer verbatim, returning the number of bytes accepted
    fn write_many(&mut self, buf: &[u8]) -> usize;

    /// Wait for pending output to go out
    fn flush(&mut self);
}

/// A single byte stream with liveness semantics
pub trait Channel: ByteSink {
    /// Is the channel usable right now?
    fn is_live(&self) -> bool;

    /// Number of bytes that can be read without blocking
    fn available(&mut self) -> usize;

    /// Take the next byte, `None` if nothing is pending
    fn read_one(&mut self) -> Option<u8>;

    /// Look at the next byte without consuming it
    fn peek_one(&mut self) -> Option<u8>;
}

/// The network side: a channel backed by a connection that may drop and be
/// replaced by a newly accepted one.
pub trait RemoteChannel: Channel {
    /// Replace a dead connection with a pending inbound one, if any.
    /// Returns true when a connection was accepted.
    fn accept_if_pending(&mut self) -> bool;

    /// Enable/disable synchronous writes (behave like a slow serial line)
    fn set_sync(&mut self, on: bool);

    /// Are writes synchronous?
    fn is_synced(&self) -> bool;
}

/// Which physical path a byte came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Local,
    Remote,
}

impl Source {
    /// The other channel
    pub fn other(self) -> Self {
        match self {
            Source::Local => Source::Remote,
            Source::Remote => Source::Local,
        }
    }
}

/// Returns true if the remote connection is usable, accepting a pending one
/// if the current connection has dropped.
pub fn check_connection<R: RemoteChannel>(remote: &mut R) -> bool {
    if remote.is_live() {
        return true;
    }
    if remote.accept_if_pending() {
        debug!("remote connection accepted");
    }
    remote.is_live()
}
