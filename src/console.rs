//! Serial + network console
//!
//! [`Console`] joins a local channel and a remote channel into one operator
//! console and parses command lines out of it without ever blocking:
//!
//! ```text
//! Console
//! ├── DuplexWriter (fan-out, echo, LF/CR handling)
//! │   └── SourceSelector (sticky local/remote input)
//! ├── CommandBuffer (verb + parameter tokens)
//! └── IdleWatchdog (drops abandoned input)
//! ```
//!
//! Typical use is a poll loop:
//!
//! ```ignore
//! if console.cmd_available() {
//!     if console.cmd_equal("set", Arity::Exactly(2)) {
//!         let value = console.cmd_param_int(2);
//!         // ...
//!     } else {
//!         console.send_error(ConsoleError::InvalidCommand);
//!     }
//!     console.cmd_init(Some(":"));
//! }
//! ```

use std::fmt;

use tracing::{info, warn};

use crate::core::selector::Selection;
use crate::core::tokenizer::{Arity, CommandBuffer, Feed};
use crate::core::transport::{ByteSink, Channel, RemoteChannel};
use crate::core::watchdog::{Clock, IdleWatchdog, MonotonicClock};
use crate::core::writer::{DuplexWriter, EchoFlags};
use crate::error::ConsoleError;

/// Default prompt shown after an idle timeout
pub const DEFAULT_PROMPT: &str = ":";

const WAITING_NOTICE: &str = "<WAITING FOR INPUT>";
const TIMEOUT_NOTICE: &str = "\r\n<TIMEOUT, INPUT DISCARDED. PLEASE RETYPE>\r\n";

/// Duplex console with an incremental command parser
pub struct Console<L, R, C = MonotonicClock> {
    io: DuplexWriter<L, R>,
    cmd: CommandBuffer,
    watchdog: IdleWatchdog,
    clock: C,
    prompt: String,
}

impl<L: Channel, R: RemoteChannel> Console<L, R, MonotonicClock> {
    /// Create a console over the two channels, timed by the system clock
    pub fn new(local: L, remote: R) -> Self {
        Self::with_clock(local, remote, MonotonicClock::new())
    }
}

impl<L: Channel, R: RemoteChannel, C: Clock> Console<L, R, C> {
    /// Create a console with an explicit time source
    pub fn with_clock(local: L, remote: R, clock: C) -> Self {
        Self {
            io: DuplexWriter::new(local, remote),
            cmd: CommandBuffer::new(),
            watchdog: IdleWatchdog::new(),
            clock,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    // ---------------------------------------------------------------
    // Options
    // ---------------------------------------------------------------

    /// Enable/disable CR after LF on byte writes
    pub fn set_auto_cr(&mut self, on: bool) {
        self.io.set_flag(EchoFlags::AUTO_CR, on);
    }

    /// Enable/disable keystroke echo on each channel
    pub fn set_input_echo(&mut self, local: bool, remote: bool) {
        self.io.set_flag(EchoFlags::ECHO_LOCAL, local);
        self.io.set_flag(EchoFlags::ECHO_REMOTE, remote);
    }

    /// Enable/disable keystroke echo on both channels
    pub fn set_input_echo_all(&mut self, on: bool) {
        self.set_input_echo(on, on);
    }

    /// Enable/disable mirroring input from one channel onto the other
    pub fn set_cross_echo(&mut self, on: bool) {
        self.io.set_flag(EchoFlags::CROSS_ECHO, on);
    }

    /// Make remote writes synchronous (slower, serial-like)
    pub fn set_remote_sync(&mut self, on: bool) {
        self.io.remote_mut().set_sync(on);
    }

    pub fn is_remote_synced(&self) -> bool {
        self.io.remote().is_synced()
    }

    pub fn echo_flags(&self) -> EchoFlags {
        self.io.flags()
    }

    /// Set the command idle timeout in milliseconds (0 disables)
    pub fn set_idle_timeout(&mut self, ms: u64) {
        self.watchdog.set_timeout(ms);
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.watchdog.timeout_ms()
    }

    pub fn set_prompt(&mut self, prompt: &str) {
        self.prompt = prompt.to_string();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    // ---------------------------------------------------------------
    // Channels
    // ---------------------------------------------------------------

    /// Is a remote connection up? Call frequently to pick up new clients.
    pub fn check_connection(&mut self) -> bool {
        self.io.check_connection()
    }

    /// Is any channel connected?
    pub fn check(&mut self) -> bool {
        self.io.check()
    }

    pub fn local(&self) -> &L {
        self.io.local()
    }

    pub fn local_mut(&mut self) -> &mut L {
        self.io.local_mut()
    }

    pub fn remote(&self) -> &R {
        self.io.remote()
    }

    pub fn remote_mut(&mut self) -> &mut R {
        self.io.remote_mut()
    }

    /// Channel reads are currently pinned to
    pub fn selection(&self) -> Selection {
        self.io.selection()
    }

    // ---------------------------------------------------------------
    // Raw stream access
    // ---------------------------------------------------------------

    pub fn write_byte(&mut self, byte: u8) -> usize {
        self.io.write_byte(byte)
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> usize {
        self.io.write_bytes(buf)
    }

    /// Write text verbatim
    pub fn print(&mut self, text: &str) {
        self.io.write_bytes(text.as_bytes());
    }

    /// Write text followed by CR LF
    pub fn println(&mut self, text: &str) {
        self.print(text);
        self.io.write_bytes(b"\r\n");
    }

    pub fn flush(&mut self) {
        self.io.flush();
    }

    pub fn available(&mut self) -> usize {
        self.io.available()
    }

    /// Read one byte (with echo), bypassing the command parser
    pub fn read(&mut self) -> Option<u8> {
        self.io.read()
    }

    pub fn peek(&mut self) -> Option<u8> {
        self.io.peek()
    }

    // ---------------------------------------------------------------
    // Command line
    // ---------------------------------------------------------------

    /// Is a complete command line parsed and waiting?
    ///
    /// Drains whatever input is pending without blocking. Once a line is
    /// complete this keeps returning true until [`cmd_init`](Self::cmd_init).
    pub fn cmd_available(&mut self) -> bool {
        if self.cmd.is_complete() {
            // Pick up a client knocking while the line waits
            self.io.check_connection();
            return true;
        }

        let mut pending = self.io.available();
        if pending == 0 {
            self.watch_idle();
            return false;
        }

        while pending > 0 {
            self.watchdog.keystroke(self.clock.now_ms());
            let Some(byte) = self.io.read() else {
                break;
            };
            match self.cmd.feed(byte) {
                Feed::Pending => {}
                Feed::Ready => return true,
                Feed::Blank => {
                    self.cmd_init(None);
                    self.println("");
                    return false;
                }
                Feed::Rejected(e) => {
                    warn!(error = %e, "command input discarded");
                    self.send_error(e);
                    self.cmd_init(None);
                    return false;
                }
            }
            pending = self.io.available();
        }
        false
    }

    /// Start a new command line, optionally printing a prompt.
    ///
    /// The prompt is remembered and reused after an idle timeout.
    pub fn cmd_init(&mut self, prompt: Option<&str>) {
        self.cmd.reset();
        if let Some(prompt) = prompt {
            self.prompt = prompt.to_string();
            self.print(prompt);
        }
        self.io.flush();
    }

    /// Is the operator in the middle of typing a command?
    ///
    /// Useful to hold back unsolicited output while a line is being typed.
    pub fn cmd_in_progress(&self) -> bool {
        self.cmd.in_progress()
    }

    pub fn cmd_verb(&self) -> Option<&str> {
        self.cmd.verb()
    }

    pub fn cmd_num_params(&self) -> usize {
        self.cmd.param_count()
    }

    /// Parameter `n` as text; 0 is the verb
    pub fn cmd_param_str(&self, n: usize) -> Option<&str> {
        self.cmd.param_str(n)
    }

    pub fn cmd_param_int(&self, n: usize) -> i32 {
        self.cmd.param_int(n)
    }

    pub fn cmd_param_f64(&self, n: usize) -> f64 {
        self.cmd.param_f64(n)
    }

    /// Does the parsed verb equal `expected` with an acceptable parameter count?
    ///
    /// On a verb match with the wrong number of parameters the error is
    /// reported on the console and false is returned; the line is kept.
    pub fn cmd_equal(&mut self, expected: &str, arity: impl Into<Arity>) -> bool {
        match self.cmd.matches(expected, arity.into()) {
            Ok(matched) => matched,
            Err(e) => {
                self.send_error(e);
                false
            }
        }
    }

    /// The parsed command, for inspection
    pub fn command(&self) -> &CommandBuffer {
        &self.cmd
    }

    /// Report an error on every live channel
    pub fn send_error(&mut self, error: ConsoleError) {
        self.send_error_message(&error.to_string());
    }

    /// Report an arbitrary error text on every live channel
    pub fn send_error_message(&mut self, message: &str) {
        self.print("ERROR: ");
        self.println(message);
    }

    fn watch_idle(&mut self) {
        if !self.cmd.is_collecting() {
            return;
        }
        let action = self.watchdog.check(self.clock.now_ms());
        if action.warns() {
            self.print(WAITING_NOTICE);
        }
        if action.discards() {
            info!(
                timeout_ms = self.watchdog.timeout_ms(),
                "idle timeout, partial command discarded"
            );
            self.cmd_init(None);
            self.print(TIMEOUT_NOTICE);
            let prompt = std::mem::take(&mut self.prompt);
            self.print(&prompt);
            self.prompt = prompt;
        }
    }
}

impl<L: Channel, R: RemoteChannel, C: Clock> ByteSink for Console<L, R, C> {
    fn write_one(&mut self, byte: u8) -> usize {
        self.io.write_byte(byte)
    }

    fn write_many(&mut self, buf: &[u8]) -> usize {
        self.io.write_bytes(buf)
    }

    fn flush(&mut self) {
        self.io.flush();
    }
}

impl<L: Channel, R: RemoteChannel, C: Clock> fmt::Write for Console<L, R, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.io.write_bytes(s.as_bytes());
        Ok(())
    }
}
