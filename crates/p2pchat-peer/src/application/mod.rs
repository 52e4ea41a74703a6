//! Application layer use cases for the peer application.
//!
//! # What use cases does a peer have?
//!
//! - **`chat_session`** – Everything a chat screen needs: discover this
//!   machine's IPv6 addresses, start hosting and publish a join code, join a
//!   peer from a join code or `[addr]:port`, send and receive messages, and
//!   tear the session down.  The OS-facing pieces (sockets and interface
//!   enumeration) are injected: a `ConnectionManager` is owned and an
//!   `AddressDiscovery` implementation is passed in at construction.

pub mod chat_session;

pub use chat_session::{ChatSession, SessionError, UiState, INVALID_INPUT_MESSAGE};
