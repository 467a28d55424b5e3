//! Controlling terminal as the local channel
//!
//! The terminal is put into raw mode so every keystroke arrives on its own.
//! A reader thread blocks on key events and forwards the mapped bytes over a
//! channel; the console side only ever drains it with `try_recv`.

use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event};
use crossterm::terminal;
use tracing::{debug, info};

use super::keys::KeyMapper;
use crate::core::transport::{ByteSink, Channel};

/// Local channel over the controlling terminal
pub struct StdioChannel {
    input_rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    out: Stdout,
    /// Reader thread still alive
    running: Arc<AtomicBool>,
    /// Ctrl+C seen
    interrupted: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
}

impl StdioChannel {
    /// Switch the terminal to raw mode and start reading keys
    pub fn start() -> io::Result<Self> {
        terminal::enable_raw_mode()?;

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let running = Arc::new(AtomicBool::new(true));
        let interrupted = Arc::new(AtomicBool::new(false));

        let thread_running = running.clone();
        let thread_interrupted = interrupted.clone();
        let reader_thread = thread::spawn(move || {
            while thread_running.load(Ordering::SeqCst) {
                match event::poll(Duration::from_millis(50)) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        debug!("terminal poll failed: {}", e);
                        break;
                    }
                }
                let key = match event::read() {
                    Ok(Event::Key(key)) => key,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("terminal read failed: {}", e);
                        break;
                    }
                };
                if KeyMapper::is_interrupt(&key) {
                    thread_interrupted.store(true, Ordering::SeqCst);
                    continue;
                }
                if let Some(bytes) = KeyMapper::map(&key) {
                    if tx.send(bytes).is_err() {
                        break;
                    }
                }
            }
            thread_running.store(false, Ordering::SeqCst);
        });

        info!("local console started on stdio");
        Ok(Self {
            input_rx: rx,
            pending: VecDeque::new(),
            out: io::stdout(),
            running,
            interrupted,
            reader_thread: Some(reader_thread),
        })
    }

    /// Has the operator pressed Ctrl+C?
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Move everything the reader thread has sent into the pending queue
    fn drain(&mut self) {
        loop {
            match self.input_rx.try_recv() {
                Ok(bytes) => self.pending.extend(bytes),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
}

impl ByteSink for StdioChannel {
    fn write_one(&mut self, byte: u8) -> usize {
        self.write_many(&[byte])
    }

    fn write_many(&mut self, buf: &[u8]) -> usize {
        match self.out.write_all(buf) {
            Ok(()) => buf.len(),
            Err(e) => {
                debug!("stdout write failed: {}", e);
                0
            }
        }
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl Channel for StdioChannel {
    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst) || !self.pending.is_empty()
    }

    fn available(&mut self) -> usize {
        self.drain();
        self.pending.len()
    }

    fn read_one(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.drain();
        }
        self.pending.pop_front()
    }

    fn peek_one(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.drain();
        }
        self.pending.front().copied()
    }
}

impl Drop for StdioChannel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }
}
