//! In-memory transports and clock
//!
//! Loopback stand-ins for the serial line, the network listener and the
//! millisecond timer. They let the console run on a host without hardware.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::transport::{ByteSink, Channel, RemoteChannel};
use super::watchdog::Clock;

/// A local channel backed by two byte queues
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    input: VecDeque<u8>,
    output: Vec<u8>,
    live: bool,
    flushes: usize,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChannel {
    /// Create a live, empty channel
    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            output: Vec::new(),
            live: true,
            flushes: 0,
        }
    }

    /// Create a channel that reports itself as not connected
    pub fn detached() -> Self {
        Self {
            live: false,
            ..Self::new()
        }
    }

    /// Queue bytes as if typed by the operator
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Bytes written so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Drain and return the bytes written so far
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Drained output as lossy text, handy in assertions
    pub fn take_text(&mut self) -> String {
        String::from_utf8_lossy(&self.take_output()).into_owned()
    }

    /// Bytes still waiting to be read
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Number of flush calls received
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }
}

impl ByteSink for MemoryChannel {
    fn write_one(&mut self, byte: u8) -> usize {
        if !self.live {
            return 0;
        }
        self.output.push(byte);
        1
    }

    fn write_many(&mut self, buf: &[u8]) -> usize {
        if !self.live {
            return 0;
        }
        self.output.extend_from_slice(buf);
        buf.len()
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

impl Channel for MemoryChannel {
    fn is_live(&self) -> bool {
        self.live
    }

    fn available(&mut self) -> usize {
        if self.live {
            self.input.len()
        } else {
            0
        }
    }

    fn read_one(&mut self) -> Option<u8> {
        if !self.live {
            return None;
        }
        self.input.pop_front()
    }

    fn peek_one(&mut self) -> Option<u8> {
        if !self.live {
            return None;
        }
        self.input.front().copied()
    }
}

/// A remote channel that simulates a listener with queued inbound clients
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    conn: Option<MemoryChannel>,
    pending: usize,
    accepted: usize,
    synced: bool,
}

impl MemoryRemote {
    /// A remote side with nobody connected
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote side with a client already connected
    pub fn connected() -> Self {
        let mut remote = Self::new();
        remote.queue_connection();
        remote.accept_if_pending();
        remote
    }

    /// Simulate a client knocking on the listener
    pub fn queue_connection(&mut self) {
        self.pending += 1;
    }

    /// Drop the current client. The stale connection is kept around (dead)
    /// until the next accept, so its output can still be inspected.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.set_live(false);
        }
    }

    /// Queue bytes as if sent by the connected client
    pub fn push_input(&mut self, bytes: &[u8]) {
        if let Some(conn) = self.conn.as_mut() {
            conn.push_input(bytes);
        }
    }

    /// Drain output sent to the current client
    pub fn take_output(&mut self) -> Vec<u8> {
        self.conn
            .as_mut()
            .map(MemoryChannel::take_output)
            .unwrap_or_default()
    }

    pub fn take_text(&mut self) -> String {
        String::from_utf8_lossy(&self.take_output()).into_owned()
    }

    /// Number of connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn pending_input(&self) -> usize {
        self.conn.as_ref().map_or(0, MemoryChannel::pending_input)
    }
}

impl ByteSink for MemoryRemote {
    fn write_one(&mut self, byte: u8) -> usize {
        self.conn.as_mut().map_or(0, |c| c.write_one(byte))
    }

    fn write_many(&mut self, buf: &[u8]) -> usize {
        self.conn.as_mut().map_or(0, |c| c.write_many(buf))
    }

    fn flush(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.flush();
        }
    }
}

impl Channel for MemoryRemote {
    fn is_live(&self) -> bool {
        self.conn.as_ref().map_or(false, MemoryChannel::is_live)
    }

    fn available(&mut self) -> usize {
        self.conn.as_mut().map_or(0, |c| c.available())
    }

    fn read_one(&mut self) -> Option<u8> {
        self.conn.as_mut().and_then(|c| c.read_one())
    }

    fn peek_one(&mut self) -> Option<u8> {
        self.conn.as_mut().and_then(|c| c.peek_one())
    }
}

impl RemoteChannel for MemoryRemote {
    fn accept_if_pending(&mut self) -> bool {
        if self.pending == 0 {
            return false;
        }
        self.pending -= 1;
        self.accepted += 1;
        self.conn = Some(MemoryChannel::new());
        true
    }

    fn set_sync(&mut self, on: bool) {
        self.synced = on;
    }

    fn is_synced(&self) -> bool {
        self.synced
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep a handle after giving one
/// to the console.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_channel_is_inert() {
        let mut ch = MemoryChannel::detached();
        ch.push_input(b"abc");

        assert_eq!(ch.available(), 0);
        assert_eq!(ch.read_one(), None);
        assert_eq!(ch.write_one(b'x'), 0);
        assert!(ch.output().is_empty());
    }

    #[test]
    fn test_remote_accepts_only_when_pending() {
        let mut remote = MemoryRemote::new();
        assert!(!remote.accept_if_pending());
        assert!(!remote.is_live());

        remote.queue_connection();
        assert!(remote.accept_if_pending());
        assert!(remote.is_live());
        assert_eq!(remote.accepted(), 1);
    }

    #[test]
    fn test_remote_disconnect_drops_writes() {
        let mut remote = MemoryRemote::connected();
        remote.write_many(b"hi");
        remote.disconnect();

        assert!(!remote.is_live());
        assert_eq!(remote.write_one(b'!'), 0);
        assert_eq!(remote.take_output(), b"hi");
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(1500);
        assert_eq!(clock.now_ms(), 1500);
    }
}
