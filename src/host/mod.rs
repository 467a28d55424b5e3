//! Host-side transports for running the console on a workstation.
//!
//! - **stdio**: the controlling terminal stands in for the serial line
//! - **tcp**: a non-blocking listener stands in for the telnet server
//! - **keys**: terminal key events to console bytes

pub mod keys;
pub mod stdio;
pub mod tcp;

pub use keys::KeyMapper;
pub use stdio::StdioChannel;
pub use tcp::TcpRemote;
