//! Output fan-out and keystroke echo
//!
//! One logical write goes to every live channel. Single-byte writes get
//! LF -> LF CR expansion when auto-CR is on; buffer writes are sent verbatim
//! and are expected to carry their own line endings.

use std::fmt;

use bitflags::bitflags;

use super::selector::{Selection, SourceSelector};
use super::transport::{check_connection, ByteSink, Channel, RemoteChannel, Source};

bitflags! {
    /// Echo and line ending options
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EchoFlags: u8 {
        /// Send CR after every LF written byte-by-byte
        const AUTO_CR     = 0b0001;
        /// Echo keystrokes back to the local channel
        const ECHO_LOCAL  = 0b0010;
        /// Echo keystrokes back to the remote channel
        const ECHO_REMOTE = 0b0100;
        /// Mirror keystrokes from one channel onto the other
        const CROSS_ECHO  = 0b1000;
    }
}

impl Default for EchoFlags {
    fn default() -> Self {
        EchoFlags::AUTO_CR | EchoFlags::ECHO_LOCAL | EchoFlags::CROSS_ECHO
    }
}

/// Both channels plus the state needed to read from and write to them as one
pub struct DuplexWriter<L, R> {
    local: L,
    remote: R,
    selector: SourceSelector,
    flags: EchoFlags,
    /// A CR was just inserted after LF; swallow a literal CR right after it
    auto_cr_sent: bool,
}

impl<L: Channel, R: RemoteChannel> DuplexWriter<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote,
            selector: SourceSelector::new(),
            flags: EchoFlags::default(),
            auto_cr_sent: false,
        }
    }

    pub fn flags(&self) -> EchoFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: EchoFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut L {
        &mut self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn selection(&self) -> Selection {
        self.selector.selection()
    }

    /// Is a remote connection up? Accepts a pending one if needed.
    pub fn check_connection(&mut self) -> bool {
        check_connection(&mut self.remote)
    }

    /// Is any channel usable?
    pub fn check(&mut self) -> bool {
        let local = self.local.is_live();
        let remote = self.check_connection();
        local || remote
    }

    /// Write one byte to every live channel
    pub fn write_byte(&mut self, byte: u8) -> usize {
        if byte == b'\r' && self.auto_cr_sent {
            self.auto_cr_sent = false;
            return 1;
        }
        let written = self.fan_out(byte);
        if self.flags.contains(EchoFlags::AUTO_CR) && byte == b'\n' {
            self.fan_out(b'\r');
            self.auto_cr_sent = true;
        } else {
            self.auto_cr_sent = false;
        }
        written
    }

    /// Write a buffer verbatim to every live channel
    pub fn write_bytes(&mut self, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.auto_cr_sent = false;
        let mut written = 0;
        if self.local.is_live() {
            written = self.local.write_many(buf);
        }
        if self.check_connection() {
            written = self.remote.write_many(buf);
        }
        written
    }

    /// Flush every live channel
    pub fn flush(&mut self) {
        if self.local.is_live() {
            self.local.flush();
        }
        if self.check_connection() {
            self.remote.flush();
        }
    }

    /// Bytes pending on the selected source
    pub fn available(&mut self) -> usize {
        self.selector.available(&mut self.local, &mut self.remote)
    }

    /// Next byte on the selected source, left in place
    pub fn peek(&mut self) -> Option<u8> {
        self.selector.peek(&mut self.local, &mut self.remote)
    }

    /// Read the next byte from the selected source, echoing it as configured
    pub fn read(&mut self) -> Option<u8> {
        let (source, byte) = self.selector.read(&mut self.local, &mut self.remote)?;
        if byte != 0 {
            self.echo(source, byte);
        }
        Some(byte)
    }

    /// Echo a byte read from `source` back to it and/or across to the other channel
    fn echo(&mut self, source: Source, byte: u8) {
        let same = match source {
            Source::Local => EchoFlags::ECHO_LOCAL,
            Source::Remote => EchoFlags::ECHO_REMOTE,
        };
        if self.flags.contains(same) {
            self.echo_to(source, byte);
        }
        if self.flags.contains(EchoFlags::CROSS_ECHO) {
            self.echo_to(source.other(), byte);
        }
    }

    fn echo_to(&mut self, target: Source, byte: u8) {
        let bytes: &[u8] = if byte == b'\n' { b"\n\r" } else { std::slice::from_ref(&byte) };
        match target {
            Source::Local => {
                if self.local.is_live() {
                    self.local.write_many(bytes);
                }
            }
            Source::Remote => {
                if self.remote.is_live() {
                    self.remote.write_many(bytes);
                }
            }
        }
    }

    fn fan_out(&mut self, byte: u8) -> usize {
        let mut written = 0;
        if self.local.is_live() {
            written = self.local.write_one(byte);
        }
        if self.check_connection() {
            written = self.remote.write_one(byte);
        }
        written
    }
}

impl<L: Channel, R: RemoteChannel> ByteSink for DuplexWriter<L, R> {
    fn write_one(&mut self, byte: u8) -> usize {
        self.write_byte(byte)
    }

    fn write_many(&mut self, buf: &[u8]) -> usize {
        self.write_bytes(buf)
    }

    fn flush(&mut self) {
        DuplexWriter::flush(self)
    }
}

impl<L: Channel, R: RemoteChannel> fmt::Write for DuplexWriter<L, R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{MemoryChannel, MemoryRemote};

    fn writer() -> DuplexWriter<MemoryChannel, MemoryRemote> {
        DuplexWriter::new(MemoryChannel::new(), MemoryRemote::connected())
    }

    #[test]
    fn test_auto_cr_expands_lf_and_swallows_next_cr() {
        let mut w = writer();
        for b in b"Hi\n" {
            w.write_byte(*b);
        }
        assert_eq!(w.local_mut().take_output(), b"Hi\n\r");
        assert_eq!(w.remote_mut().take_output(), b"Hi\n\r");

        // Literal CR right after the inserted one is suppressed
        assert_eq!(w.write_byte(b'\r'), 1);
        assert!(w.local_mut().take_output().is_empty());

        // ...but only once
        w.write_byte(b'\r');
        assert_eq!(w.local_mut().take_output(), b"\r");
    }

    #[test]
    fn test_consecutive_lf_each_get_cr() {
        let mut w = writer();
        w.write_byte(b'\n');
        w.write_byte(b'\n');
        assert_eq!(w.local_mut().take_output(), b"\n\r\n\r");
    }

    #[test]
    fn test_auto_cr_disabled() {
        let mut w = writer();
        w.set_flag(EchoFlags::AUTO_CR, false);
        w.write_byte(b'\n');
        w.write_byte(b'\r');
        assert_eq!(w.local_mut().take_output(), b"\n\r");
    }

    #[test]
    fn test_buffer_writes_are_verbatim() {
        let mut w = writer();
        w.write_bytes(b"a\nb");
        assert_eq!(w.local_mut().take_output(), b"a\nb");
        assert_eq!(w.remote_mut().take_output(), b"a\nb");
    }

    #[test]
    fn test_writes_vanish_without_transports() {
        let mut w = DuplexWriter::new(MemoryChannel::detached(), MemoryRemote::new());
        assert_eq!(w.write_byte(b'x'), 0);
        assert_eq!(w.write_bytes(b"xyz"), 0);
        assert!(!w.check());
    }

    #[test]
    fn test_default_echo_local_and_cross() {
        let mut w = writer();
        w.local_mut().push_input(b"a\n");

        assert_eq!(w.read(), Some(b'a'));
        assert_eq!(w.read(), Some(b'\n'));
        // Local echo and cross echo both expand LF regardless of auto-CR
        assert_eq!(w.local_mut().take_output(), b"a\n\r");
        assert_eq!(w.remote_mut().take_output(), b"a\n\r");
    }

    #[test]
    fn test_remote_input_not_echoed_to_itself_by_default() {
        let mut w = writer();
        w.remote_mut().push_input(b"r");

        assert_eq!(w.read(), Some(b'r'));
        assert!(w.remote_mut().take_output().is_empty());
        assert_eq!(w.local_mut().take_output(), b"r");
    }

    #[test]
    fn test_echo_all_off() {
        let mut w = writer();
        w.set_flag(EchoFlags::ECHO_LOCAL | EchoFlags::CROSS_ECHO, false);
        w.local_mut().push_input(b"q");

        assert_eq!(w.read(), Some(b'q'));
        assert!(w.local_mut().take_output().is_empty());
        assert!(w.remote_mut().take_output().is_empty());
    }

    #[test]
    fn test_fmt_write_goes_to_both() {
        use std::fmt::Write;

        let mut w = writer();
        write!(w, "v={}", 3).unwrap();
        assert_eq!(w.local_mut().take_output(), b"v=3");
        assert_eq!(w.remote_mut().take_output(), b"v=3");
    }
}
