//! dualcon - one operator console over a serial line and a network link
//!
//! Bytes typed on either channel are parsed into commands a few at a time,
//! without blocking, and everything written goes out on both channels.
//!
//! # Features
//!
//! - **Sticky input**: reads stay on one channel until it runs dry
//! - **Fan-out output**: every write reaches all live channels
//! - **Echo control**: per-channel echo, cross echo, auto CR on LF
//! - **Command parsing**: verb + up to 20 parameters, parsed in place
//! - **Idle timeout**: abandoned half-typed lines are discarded
//!
//! # Example
//!
//! ```
//! use dualcon::core::memory::{MemoryChannel, MemoryRemote};
//! use dualcon::Console;
//!
//! let mut console = Console::new(MemoryChannel::new(), MemoryRemote::new());
//! console.local_mut().push_input(b"set wpm 25\n");
//!
//! assert!(console.cmd_available());
//! assert_eq!(console.cmd_verb(), Some("set"));
//! assert_eq!(console.cmd_param_int(2), 25);
//! console.cmd_init(Some(":"));
//! ```

pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod host;

pub use crate::config::Config;
pub use crate::console::Console;
pub use crate::core::{Arity, ByteSink, Channel, RemoteChannel};
pub use crate::error::{ConfigError, ConsoleError};
