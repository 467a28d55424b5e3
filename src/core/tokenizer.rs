//! Incremental command line tokenizer
//!
//! Bytes are fed one at a time as they arrive. The buffer is split in place:
//! each whitespace run after the verb collapses into a single NUL, and the
//! offsets of the verb and of every parameter are recorded as they start.
//!
//! ```text
//! input:  "  SET  temp 72\n"
//! buffer: S E T \0 t e m p \0 7 2 \0
//!         ^verb    ^p1        ^p2
//! ```

use std::ops::RangeInclusive;

use crate::error::ConsoleError;

/// Max command + parameters length, terminator included
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Max number of parameters per command
pub const COMMAND_MAX_PARAMS: usize = 20;

/// Result of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Still collecting
    Pending,
    /// A non-empty line is complete
    Ready,
    /// Empty or all-whitespace line; buffer reset
    Blank,
    /// Input rejected; buffer reset
    Rejected(ConsoleError),
}

/// Acceptable parameter count for a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Don't care
    Any,
    Exactly(usize),
    /// Inclusive range
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Any => true,
            Arity::Exactly(n) => count == n,
            Arity::Between(min, max) => (min..=max).contains(&count),
        }
    }
}

impl From<usize> for Arity {
    fn from(n: usize) -> Self {
        Arity::Exactly(n)
    }
}

impl From<RangeInclusive<usize>> for Arity {
    fn from(range: RangeInclusive<usize>) -> Self {
        Arity::Between(*range.start(), *range.end())
    }
}

/// Fixed-size command buffer, reused for every line
#[derive(Clone)]
pub struct CommandBuffer {
    buf: [u8; COMMAND_BUFFER_SIZE],
    /// Next free offset
    scan_pos: usize,
    /// Offset of the verb, once its first byte has been seen
    verb: Option<usize>,
    params: [usize; COMMAND_MAX_PARAMS],
    param_count: usize,
    line_complete: bool,
    /// Last byte stored was a whitespace separator
    pending_whitespace: bool,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("scan_pos", &self.scan_pos)
            .field("verb", &self.verb)
            .field("param_count", &self.param_count)
            .field("line_complete", &self.line_complete)
            .finish()
    }
}

impl CommandBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; COMMAND_BUFFER_SIZE],
            scan_pos: 0,
            verb: None,
            params: [0usize; COMMAND_MAX_PARAMS],
            param_count: 0,
            line_complete: false,
            pending_whitespace: false,
        }
    }

    /// Discard everything and start a new line
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.scan_pos = 0;
        self.verb = None;
        self.param_count = 0;
        self.line_complete = false;
        self.pending_whitespace = false;
    }

    /// Process one input byte
    pub fn feed(&mut self, byte: u8) -> Feed {
        if self.line_complete {
            return Feed::Ready;
        }
        match byte {
            0 | b'\n' | b'\r' => {
                if self.verb.is_none() {
                    self.reset();
                    return Feed::Blank;
                }
                self.buf[self.scan_pos] = 0;
                self.line_complete = true;
                Feed::Ready
            }
            b' ' | b'\t' => {
                // Leading whitespace is skipped, runs store one separator
                if self.verb.is_none() || self.pending_whitespace {
                    return Feed::Pending;
                }
                if let Err(e) = self.store(0) {
                    return Feed::Rejected(e);
                }
                self.pending_whitespace = true;
                Feed::Pending
            }
            _ => {
                if self.verb.is_none() {
                    self.verb = Some(self.scan_pos);
                } else if self.pending_whitespace {
                    if self.param_count >= COMMAND_MAX_PARAMS {
                        self.reset();
                        return Feed::Rejected(ConsoleError::TooManyParams);
                    }
                    self.params[self.param_count] = self.scan_pos;
                    self.param_count += 1;
                }
                if let Err(e) = self.store(byte) {
                    return Feed::Rejected(e);
                }
                self.pending_whitespace = false;
                Feed::Pending
            }
        }
    }

    /// Store a byte, keeping one slot free for the terminator
    fn store(&mut self, byte: u8) -> Result<(), ConsoleError> {
        if self.scan_pos + 1 >= COMMAND_BUFFER_SIZE {
            self.reset();
            return Err(ConsoleError::CommandTooLong);
        }
        self.buf[self.scan_pos] = byte;
        self.scan_pos += 1;
        Ok(())
    }

    /// A full line is waiting to be consumed
    pub fn is_complete(&self) -> bool {
        self.line_complete
    }

    /// Something has been typed
    pub fn in_progress(&self) -> bool {
        self.scan_pos > 0
    }

    /// Partially typed and not yet terminated
    pub fn is_collecting(&self) -> bool {
        self.scan_pos > 0 && !self.line_complete
    }

    pub fn scan_pos(&self) -> usize {
        self.scan_pos
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// The command verb
    pub fn verb(&self) -> Option<&str> {
        self.param_str(0)
    }

    /// Raw bytes of parameter `n`; 0 is the verb, parameters start at 1
    pub fn param_bytes(&self, n: usize) -> Option<&[u8]> {
        let start = match n {
            0 => self.verb?,
            n if n <= self.param_count => {
                self.verb?;
                self.params[n - 1]
            }
            _ => return None,
        };
        let len = self.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(COMMAND_BUFFER_SIZE - start);
        Some(&self.buf[start..start + len])
    }

    /// Parameter `n` as text, `None` if missing or not UTF-8
    pub fn param_str(&self, n: usize) -> Option<&str> {
        self.param_bytes(n).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Parameter `n` as an integer; 0 if missing or malformed
    pub fn param_int(&self, n: usize) -> i32 {
        self.param_str(n).map_or(0, parse_int_prefix)
    }

    /// Parameter `n` as a float; 0.0 if missing or malformed
    pub fn param_f64(&self, n: usize) -> f64 {
        self.param_str(n).map_or(0.0, parse_float_prefix)
    }

    /// Does the verb equal `expected`, with a parameter count `arity` accepts?
    ///
    /// A verb mismatch is `Ok(false)`. A matching verb with the wrong number
    /// of parameters is `Err(ParamCount)`; the buffer is left as is.
    pub fn matches(&self, expected: &str, arity: Arity) -> Result<bool, ConsoleError> {
        match self.verb() {
            Some(verb) if verb == expected => {
                if arity.accepts(self.param_count) {
                    Ok(true)
                } else {
                    Err(ConsoleError::ParamCount)
                }
            }
            _ => Ok(false),
        }
    }
}

/// Leading decimal integer of `s` (optional sign, digits), 0 if none
fn parse_int_prefix(s: &str) -> i32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits {
        return 0;
    }
    s[..end].parse().unwrap_or(0)
}

/// Leading decimal float of `s` (sign, digits, fraction, exponent), 0.0 if none
fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_start = end;
    end = digits_from(end);
    let mut mantissa_digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(buf: &mut CommandBuffer, input: &[u8]) -> Feed {
        let mut last = Feed::Pending;
        for &b in input {
            last = buf.feed(b);
            if last != Feed::Pending {
                break;
            }
        }
        last
    }

    #[test]
    fn test_set_temp_scenario() {
        let mut buf = CommandBuffer::new();
        assert_eq!(feed_all(&mut buf, b"SET  temp 72\n"), Feed::Ready);

        assert_eq!(buf.verb(), Some("SET"));
        assert_eq!(buf.param_count(), 2);
        assert_eq!(buf.param_str(1), Some("temp"));
        assert_eq!(buf.param_str(2), Some("72"));
        assert_eq!(buf.param_int(2), 72);
        assert_eq!(buf.param_str(3), None);
    }

    #[test]
    fn test_leading_and_internal_whitespace() {
        let mut buf = CommandBuffer::new();
        assert_eq!(feed_all(&mut buf, b" \t  show \t\t wpm   now\r"), Feed::Ready);

        assert_eq!(buf.verb(), Some("show"));
        assert_eq!(buf.param_str(0), Some("show"));
        assert_eq!(buf.param_str(1), Some("wpm"));
        assert_eq!(buf.param_str(2), Some("now"));
        assert_eq!(buf.param_count(), 2);
        // show\0wpm\0now
        assert_eq!(buf.scan_pos(), 12);
    }

    #[test]
    fn test_trailing_whitespace_adds_no_param() {
        let mut buf = CommandBuffer::new();
        assert_eq!(feed_all(&mut buf, b"help   \n"), Feed::Ready);
        assert_eq!(buf.verb(), Some("help"));
        assert_eq!(buf.param_count(), 0);
    }

    #[test]
    fn test_blank_lines_reset() {
        let mut buf = CommandBuffer::new();
        assert_eq!(buf.feed(b'\n'), Feed::Blank);
        assert!(!buf.in_progress());

        assert_eq!(feed_all(&mut buf, b"   \t \r"), Feed::Blank);
        assert!(!buf.is_complete());
        assert_eq!(buf.verb(), None);
    }

    #[test]
    fn test_nul_terminates_line() {
        let mut buf = CommandBuffer::new();
        assert_eq!(feed_all(&mut buf, b"ping\0"), Feed::Ready);
        assert_eq!(buf.verb(), Some("ping"));
    }

    #[test]
    fn test_complete_line_is_sticky() {
        let mut buf = CommandBuffer::new();
        feed_all(&mut buf, b"go 1\n");
        assert_eq!(buf.feed(b'x'), Feed::Ready);
        assert_eq!(buf.feed(b'\n'), Feed::Ready);
        assert_eq!(buf.param_str(1), Some("1"));

        buf.reset();
        assert!(!buf.is_complete());
        assert_eq!(buf.verb(), None);
    }

    #[test]
    fn test_overflow_at_capacity() {
        let mut buf = CommandBuffer::new();
        for _ in 0..COMMAND_BUFFER_SIZE - 1 {
            assert_eq!(buf.feed(b'a'), Feed::Pending);
        }
        assert_eq!(buf.feed(b'a'), Feed::Rejected(ConsoleError::CommandTooLong));
        assert!(!buf.in_progress());
        assert!(!buf.is_complete());
    }

    #[test]
    fn test_longest_line_fits() {
        let mut buf = CommandBuffer::new();
        for _ in 0..COMMAND_BUFFER_SIZE - 1 {
            buf.feed(b'z');
        }
        assert_eq!(buf.feed(b'\n'), Feed::Ready);
        assert_eq!(buf.verb().map(str::len), Some(COMMAND_BUFFER_SIZE - 1));
    }

    #[test]
    fn test_too_many_params() {
        let mut line = String::from("cmd");
        for i in 0..COMMAND_MAX_PARAMS {
            line.push_str(&format!(" {}", i));
        }
        let mut buf = CommandBuffer::new();
        assert_eq!(feed_all(&mut buf, line.as_bytes()), Feed::Pending);
        assert_eq!(buf.param_count(), COMMAND_MAX_PARAMS);

        assert_eq!(feed_all(&mut buf, b" x"), Feed::Rejected(ConsoleError::TooManyParams));
        assert!(!buf.in_progress());
    }

    #[test]
    fn test_max_params_accepted() {
        let mut line = String::from("cmd");
        for i in 0..COMMAND_MAX_PARAMS {
            line.push_str(&format!(" {}", i));
        }
        line.push('\n');
        let mut buf = CommandBuffer::new();
        assert_eq!(feed_all(&mut buf, line.as_bytes()), Feed::Ready);
        assert_eq!(buf.param_int(COMMAND_MAX_PARAMS), 19);
    }

    #[test]
    fn test_numeric_params() {
        let mut buf = CommandBuffer::new();
        feed_all(&mut buf, b"x -12 3.5e2 abc 42abc .25 +7 1e\n");

        assert_eq!(buf.param_int(1), -12);
        assert_eq!(buf.param_f64(2), 350.0);
        assert_eq!(buf.param_int(3), 0);
        assert_eq!(buf.param_f64(3), 0.0);
        assert_eq!(buf.param_int(4), 42);
        assert_eq!(buf.param_f64(5), 0.25);
        assert_eq!(buf.param_int(6), 7);
        assert_eq!(buf.param_f64(7), 1.0);
        // Missing parameter
        assert_eq!(buf.param_int(9), 0);
        assert_eq!(buf.param_f64(9), 0.0);
    }

    #[test]
    fn test_matches_with_arity() {
        let mut buf = CommandBuffer::new();
        feed_all(&mut buf, b"set wpm 25\n");

        assert_eq!(buf.matches("set", Arity::Any), Ok(true));
        assert_eq!(buf.matches("set", Arity::Exactly(2)), Ok(true));
        assert_eq!(buf.matches("set", Arity::from(1usize..=3)), Ok(true));
        assert_eq!(buf.matches("SET", Arity::Any), Ok(false));
        assert_eq!(buf.matches("get", Arity::Exactly(0)), Ok(false));
        assert_eq!(buf.matches("set", Arity::Exactly(1)), Err(ConsoleError::ParamCount));
        // Buffer untouched after an arity failure
        assert!(buf.is_complete());
        assert_eq!(buf.param_str(2), Some("25"));
    }
}
