//! Core console components.
//!
//! - **transport**: channel traits the console is built on
//! - **selector**: sticky local/remote input arbitration
//! - **writer**: output fan-out, CR handling and keystroke echo
//! - **tokenizer**: incremental verb + parameter parser
//! - **watchdog**: idle timeout for half-typed commands
//! - **memory**: in-memory channels and clock
//!
//! # Architecture
//!
//! ```text
//! DuplexWriter
//! ├── local: Channel
//! ├── remote: RemoteChannel
//! └── SourceSelector (None | PinnedToLocal | PinnedToRemote)
//!
//! CommandBuffer (Idle -> Collecting -> LineReady)
//! IdleWatchdog  (half-timeout warning, full-timeout discard)
//! ```

pub mod memory;
pub mod selector;
pub mod tokenizer;
pub mod transport;
pub mod watchdog;
pub mod writer;

pub use selector::{Selection, SourceSelector};
pub use tokenizer::{Arity, CommandBuffer, Feed, COMMAND_BUFFER_SIZE, COMMAND_MAX_PARAMS};
pub use transport::{ByteSink, Channel, RemoteChannel, Source};
pub use watchdog::{Clock, IdleWatchdog, MonotonicClock, COMMAND_MIN_TIMEOUT};
pub use writer::{DuplexWriter, EchoFlags};
