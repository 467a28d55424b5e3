//! Input source arbitration
//!
//! Reads come from whichever channel has data, local first. Once a channel
//! yields data every `available`/`peek`/`read` sticks to it until it runs
//! dry, so one command line is never built from bytes of both sources.

use tracing::debug;

use super::transport::{check_connection, Channel, RemoteChannel, Source};

/// Which channel reads are currently pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    PinnedToLocal,
    PinnedToRemote,
}

impl Selection {
    pub fn source(self) -> Option<Source> {
        match self {
            Selection::None => None,
            Selection::PinnedToLocal => Some(Source::Local),
            Selection::PinnedToRemote => Some(Source::Remote),
        }
    }
}

/// Sticky source selector
#[derive(Debug, Default)]
pub struct SourceSelector {
    selection: Selection,
}

impl SourceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Forget the current pin
    pub fn release(&mut self) {
        self.selection = Selection::None;
    }

    /// Number of bytes pending on the selected channel.
    ///
    /// A pinned channel is queried alone. When it reports zero the pin is
    /// dropped and the other channel gets its turn in the same call.
    pub fn available<L, R>(&mut self, local: &mut L, remote: &mut R) -> usize
    where
        L: Channel,
        R: RemoteChannel,
    {
        // The channel that just ran dry is not asked again
        let (try_local, try_remote) = match self.selection {
            Selection::PinnedToLocal => {
                let n = if local.is_live() { local.available() } else { 0 };
                if n > 0 {
                    return n;
                }
                self.release();
                (false, true)
            }
            Selection::PinnedToRemote => {
                let n = if check_connection(remote) { remote.available() } else { 0 };
                if n > 0 {
                    return n;
                }
                self.release();
                (true, false)
            }
            Selection::None => (true, true),
        };

        if try_local && local.is_live() {
            let n = local.available();
            if n > 0 {
                self.pin(Selection::PinnedToLocal);
                return n;
            }
        }
        if try_remote && check_connection(remote) {
            let n = remote.available();
            if n > 0 {
                self.pin(Selection::PinnedToRemote);
                return n;
            }
        }
        0
    }

    /// Next byte on the selected channel without consuming it
    pub fn peek<L, R>(&mut self, local: &mut L, remote: &mut R) -> Option<u8>
    where
        L: Channel,
        R: RemoteChannel,
    {
        if self.available(local, remote) == 0 {
            return None;
        }
        match self.selection.source()? {
            Source::Local => local.peek_one(),
            Source::Remote => remote.peek_one(),
        }
    }

    /// Consume the next byte on the selected channel, tagged with its source
    pub fn read<L, R>(&mut self, local: &mut L, remote: &mut R) -> Option<(Source, u8)>
    where
        L: Channel,
        R: RemoteChannel,
    {
        if self.selection == Selection::None && self.available(local, remote) == 0 {
            return None;
        }
        let source = self.selection.source()?;
        let byte = match source {
            Source::Local => local.read_one(),
            Source::Remote => {
                if check_connection(remote) {
                    remote.read_one()
                } else {
                    None
                }
            }
        };
        if byte.is_none() {
            // Source exhausted
            self.release();
        }
        byte.map(|b| (source, b))
    }

    fn pin(&mut self, selection: Selection) {
        if self.selection != selection {
            debug!(?selection, "input source pinned");
        }
        self.selection = selection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{MemoryChannel, MemoryRemote};
    use crate::core::transport::ByteSink;

    /// Wraps a channel and counts `available` and `is_live` queries
    struct Counting<T> {
        inner: T,
        available_calls: usize,
        live_calls: std::cell::Cell<usize>,
    }

    impl<T> Counting<T> {
        fn new(inner: T) -> Self {
            Self {
                inner,
                available_calls: 0,
                live_calls: std::cell::Cell::new(0),
            }
        }
    }

    impl<T: ByteSink> ByteSink for Counting<T> {
        fn write_one(&mut self, byte: u8) -> usize {
            self.inner.write_one(byte)
        }

        fn write_many(&mut self, buf: &[u8]) -> usize {
            self.inner.write_many(buf)
        }

        fn flush(&mut self) {
            self.inner.flush();
        }
    }

    impl<T: Channel> Channel for Counting<T> {
        fn is_live(&self) -> bool {
            self.live_calls.set(self.live_calls.get() + 1);
            self.inner.is_live()
        }

        fn available(&mut self) -> usize {
            self.available_calls += 1;
            self.inner.available()
        }

        fn read_one(&mut self) -> Option<u8> {
            self.inner.read_one()
        }

        fn peek_one(&mut self) -> Option<u8> {
            self.inner.peek_one()
        }
    }

    impl<T: RemoteChannel> RemoteChannel for Counting<T> {
        fn accept_if_pending(&mut self) -> bool {
            self.inner.accept_if_pending()
        }

        fn set_sync(&mut self, on: bool) {
            self.inner.set_sync(on);
        }

        fn is_synced(&self) -> bool {
            self.inner.is_synced()
        }
    }

    #[test]
    fn test_local_wins_tie() {
        let mut sel = SourceSelector::new();
        let mut local = MemoryChannel::new();
        let mut remote = MemoryRemote::connected();
        local.push_input(b"ab");
        remote.push_input(b"xyz");

        assert_eq!(sel.available(&mut local, &mut remote), 2);
        assert_eq!(sel.selection(), Selection::PinnedToLocal);
    }

    #[test]
    fn test_pinned_remote_ignores_local_until_drained() {
        let mut sel = SourceSelector::new();
        let mut local = MemoryChannel::new();
        let mut remote = MemoryRemote::connected();
        remote.push_input(b"xy");

        assert_eq!(sel.available(&mut local, &mut remote), 2);
        assert_eq!(sel.selection(), Selection::PinnedToRemote);

        // Local data shows up mid-line
        local.push_input(b"L");
        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Remote, b'x')));
        assert_eq!(sel.available(&mut local, &mut remote), 1);
        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Remote, b'y')));
        assert_eq!(local.pending_input(), 1);

        // Remote dry: re-arbitrate, local gets its turn
        assert_eq!(sel.available(&mut local, &mut remote), 1);
        assert_eq!(sel.selection(), Selection::PinnedToLocal);
        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Local, b'L')));
    }

    #[test]
    fn test_nothing_available_resets_selection() {
        let mut sel = SourceSelector::new();
        let mut local = MemoryChannel::new();
        let mut remote = MemoryRemote::new();
        local.push_input(b"a");

        assert_eq!(sel.available(&mut local, &mut remote), 1);
        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Local, b'a')));
        assert_eq!(sel.available(&mut local, &mut remote), 0);
        assert_eq!(sel.selection(), Selection::None);
        assert_eq!(sel.read(&mut local, &mut remote), None);
    }

    #[test]
    fn test_remote_accepted_lazily_on_poll() {
        let mut sel = SourceSelector::new();
        let mut local = MemoryChannel::detached();
        let mut remote = MemoryRemote::new();
        remote.queue_connection();

        assert_eq!(sel.available(&mut local, &mut remote), 0);
        assert_eq!(remote.accepted(), 1);

        remote.push_input(b"q");
        assert_eq!(sel.peek(&mut local, &mut remote), Some(b'q'));
        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Remote, b'q')));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut sel = SourceSelector::new();
        let mut local = MemoryChannel::new();
        let mut remote = MemoryRemote::new();
        local.push_input(b"z");

        assert_eq!(sel.peek(&mut local, &mut remote), Some(b'z'));
        assert_eq!(sel.peek(&mut local, &mut remote), Some(b'z'));
        assert_eq!(local.pending_input(), 1);
    }

    #[test]
    fn test_dry_local_pin_queried_once() {
        let mut sel = SourceSelector::new();
        let mut local = Counting::new(MemoryChannel::new());
        let mut remote = Counting::new(MemoryRemote::connected());
        local.inner.push_input(b"a");

        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Local, b'a')));
        local.available_calls = 0;
        local.live_calls.set(0);
        remote.available_calls = 0;

        assert_eq!(sel.available(&mut local, &mut remote), 0);
        assert_eq!(local.available_calls, 1);
        assert_eq!(local.live_calls.get(), 1);
        assert_eq!(remote.available_calls, 1);
        assert_eq!(sel.selection(), Selection::None);
    }

    #[test]
    fn test_dry_remote_pin_queried_once() {
        let mut sel = SourceSelector::new();
        let mut local = Counting::new(MemoryChannel::new());
        let mut remote = Counting::new(MemoryRemote::connected());
        remote.inner.push_input(b"r");

        assert_eq!(sel.read(&mut local, &mut remote), Some((Source::Remote, b'r')));
        local.available_calls = 0;
        remote.available_calls = 0;
        remote.live_calls.set(0);

        assert_eq!(sel.available(&mut local, &mut remote), 0);
        assert_eq!(remote.available_calls, 1);
        // One liveness check, inside the single connection check
        assert_eq!(remote.live_calls.get(), 1);
        assert_eq!(local.available_calls, 1);
    }
}
