//! MPV module - spawns and controls an external player via JSON IPC.
//!
//! Architecture:
//! - `process.rs` - launcher table, executable probing and process spawning
//! - `ipc.rs` - one-shot IPC exchanges (Unix sockets, Named Pipes on Windows)
//! - `protocol.rs` - JSON command/response types and serialization
//! - `supervisor.rs` - the single supervised player and its state machine

mod ipc;
mod process;
mod protocol;
mod supervisor;

pub use ipc::{Delivery, IpcChannel, IpcError};
pub use process::{default_launchers, Launcher, ProcessError};
pub use protocol::{MpvCommand, MpvResponse, SeekMode};
pub use supervisor::{NowPlaying, PlayReport, PlaybackSupervisor, Resolution};
