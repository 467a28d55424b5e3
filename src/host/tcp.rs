//! TCP listener as the remote channel
//!
//! One client at a time. Everything is non-blocking: the listener is polled
//! for a new client only when the current one is gone, and a dropped client
//! is noticed the next time it is read from or written to. Bytes a client
//! sent before hanging up are still served until they are read.
//!
//! In sync mode writes block (up to [`SYNC_WRITE_TIMEOUT`]) until the whole
//! buffer is handed to the socket, instead of dropping what does not fit.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::transport::{ByteSink, Channel, RemoteChannel};

const READ_CHUNK: usize = 512;

/// Longest a sync-mode write may stall before the client is dropped
pub const SYNC_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote channel backed by a TCP listener and its current client
pub struct TcpRemote {
    listener: TcpListener,
    client: Option<TcpStream>,
    peer: Option<SocketAddr>,
    inbound: VecDeque<u8>,
    synced: bool,
}

impl TcpRemote {
    /// Bind the listener
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            client: None,
            peer: None,
            inbound: VecDeque::new(),
            synced: false,
        })
    }

    /// Port the listener is bound to
    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Address of the connected client
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn disconnect(&mut self, reason: &str) {
        if let Some(peer) = self.peer.take() {
            info!("remote client {} disconnected ({})", peer, reason);
        }
        self.client = None;
    }

    /// Pull whatever the client has sent into the inbound queue
    fn fill(&mut self) {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let Some(stream) = self.client.as_mut() else {
                return;
            };
            match stream.read(&mut buf) {
                Ok(0) => {
                    self.disconnect("closed by peer");
                    return;
                }
                Ok(n) => self.inbound.extend(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("remote read failed: {}", e);
                    self.disconnect("read error");
                    return;
                }
            }
        }
    }

    fn send(&mut self, buf: &[u8]) -> usize {
        let Some(stream) = self.client.as_mut() else {
            return 0;
        };
        let result = if self.synced {
            write_blocking(stream, buf)
        } else {
            write_available(stream, buf)
        };
        match result {
            Ok(n) => n,
            Err(e) => {
                warn!("remote write failed: {}", e);
                self.disconnect("write error");
                0
            }
        }
    }
}

/// Write the whole buffer, blocking until the socket takes it
fn write_blocking(stream: &mut TcpStream, buf: &[u8]) -> io::Result<usize> {
    stream.set_nonblocking(false)?;
    let written = stream.write_all(buf);
    let restored = stream.set_nonblocking(true);
    written?;
    restored?;
    Ok(buf.len())
}

/// Write as much as the socket takes right now; the rest is dropped
fn write_available(stream: &mut TcpStream, buf: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        match stream.write(&buf[written..]) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                warn!(
                    dropped = buf.len() - written,
                    total = buf.len(),
                    "remote send buffer full, output dropped"
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

impl ByteSink for TcpRemote {
    fn write_one(&mut self, byte: u8) -> usize {
        self.send(&[byte])
    }

    fn write_many(&mut self, buf: &[u8]) -> usize {
        self.send(buf)
    }

    fn flush(&mut self) {
        if let Some(stream) = self.client.as_mut() {
            let _ = stream.flush();
        }
    }
}

impl Channel for TcpRemote {
    /// Connected, or a departed client still has unread bytes
    fn is_live(&self) -> bool {
        self.client.is_some() || !self.inbound.is_empty()
    }

    fn available(&mut self) -> usize {
        self.fill();
        self.inbound.len()
    }

    fn read_one(&mut self) -> Option<u8> {
        if self.inbound.is_empty() {
            self.fill();
        }
        self.inbound.pop_front()
    }

    fn peek_one(&mut self) -> Option<u8> {
        if self.inbound.is_empty() {
            self.fill();
        }
        self.inbound.front().copied()
    }
}

impl RemoteChannel for TcpRemote {
    fn accept_if_pending(&mut self) -> bool {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("cannot make client socket non-blocking: {}", e);
                    return false;
                }
                let _ = stream.set_nodelay(true);
                if let Err(e) = stream.set_write_timeout(Some(SYNC_WRITE_TIMEOUT)) {
                    debug!("cannot set client write timeout: {}", e);
                }
                info!("remote client {} connected", addr);
                self.client = Some(stream);
                self.peer = Some(addr);
                self.inbound.clear();
                true
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => false,
            Err(e) => {
                warn!("accept failed: {}", e);
                false
            }
        }
    }

    fn set_sync(&mut self, on: bool) {
        self.synced = on;
    }

    fn is_synced(&self) -> bool {
        self.synced
    }
}
