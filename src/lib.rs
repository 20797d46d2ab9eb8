//! # lua-debug-bridge
//!
//! Transport/protocol core for a remote Lua debugger bridge. Sits on one
//! end of a TCP stream between an editor-side controller and an in-process
//! debuggee, and turns the raw byte stream into reliably reassembled file
//! payloads and dispatched, correlated command/response exchanges.
//!
//! ## Architecture
//!
//! Two independent sub-protocols share one connection:
//!
//! - **File channel** (binary): length-prefixed frames carrying bulk file
//!   payloads into a staging directory ([`FileReceiver`])
//! - **Command channel** (text): delimiter-separated JSON commands, parsed
//!   and either resolved against a pending callback by correlation id or
//!   dispatched to the [`DebugRuntime`] collaborator ([`CommandProcessor`])
//!
//! Both tolerate arbitrary TCP fragmentation and coalescing: a logical
//! unit may arrive split across reads or many units may arrive in one
//! read, and each is delivered exactly once, in arrival order.
//!
//! ## Example
//!
//! ```ignore
//! use lua_debug_bridge::{DebugSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> lua_debug_bridge::Result<()> {
//!     let stream = tokio::net::TcpStream::connect("127.0.0.1:8818").await?;
//!     let config = SessionConfig::new("temp");
//!     let mut session = DebugSession::new(MyRuntime::default(), config)?;
//!     lua_debug_bridge::session::run(stream, &mut session).await
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod files;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod writer;

pub use command::{Callback, CommandProcessor, Completion};
pub use config::SessionConfig;
pub use error::{BridgeError, Result};
pub use files::{FileEvent, FileReceiver};
pub use runtime::DebugRuntime;
pub use session::{DebugSession, InboundMode};
