//! Daemon module: a long-running process that owns the call log.
//!
//! Proxy plugins push traffic events over a Unix socket; the CLI queries
//! the same socket. One JSON object per line in each direction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   traffic    ┌──────────────────────────┐
//! │  proxy plugin    │ ───────────▶ │     gqlscope daemon      │
//! └──────────────────┘              │  - ingest pipeline       │
//!                                   │  - call registry         │
//! ┌──────────────────┐  rows / row  │  - viewer facade         │
//! │  gqlscope CLI    │ ◀──────────▶ │                          │
//! └──────────────────┘              └──────────────────────────┘
//!              .gqlscope/gqlscope.sock
//! ```

pub mod protocol;
pub mod server;

pub use protocol::{Request, Response, RowDetail, WireEvent};
pub use server::{is_daemon_running, send_request, serve, start_daemon};
