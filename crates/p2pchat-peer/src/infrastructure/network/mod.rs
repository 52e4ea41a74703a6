//! Network infrastructure for the peer application.
//!
//! # Sub-modules
//!
//! - **`connection_manager`** – Owns the socket lifecycle state machine: the
//!   accept loop (host role), the connect operation (joiner role), the
//!   line-based reader loop, message sends, and coordinated teardown.  State
//!   and messages are published through `tokio::sync::watch` channels.

pub mod connection_manager;

pub use connection_manager::{ConnectionError, ConnectionManager, CONNECT_TIMEOUT};
