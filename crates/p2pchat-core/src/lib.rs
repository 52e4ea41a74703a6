//! # p2pchat-core
//!
//! Shared library for P2PChat containing the join-code codec and the chat
//! domain types.
//!
//! This crate is used by every front end of the peer application.  It has
//! zero dependencies on sockets, async runtimes, or UI frameworks.
//!
//! # Architecture overview (for beginners)
//!
//! P2PChat opens a direct, plain-text TCP chat between two machines over
//! IPv6.  One side *hosts* (binds a listening socket) and the other side
//! *joins* (connects to the host's address and port).  To avoid typing long
//! IPv6 addresses, the host shares a 24-character *join code* that packs its
//! address and port.
//!
//! - **`joincode`** – Converts `(address, port)` to and from the join code,
//!   and parses whatever the user pasted (a code, `[addr]:port`, or
//!   `addr:port`).
//!
//! - **`domain`** – Value types observed by the UI: the connection state
//!   machine's states and the chat messages.

pub mod domain;
pub mod joincode;

// Re-export the most-used types at the crate root so callers can write
// `p2pchat_core::PeerInfo` instead of `p2pchat_core::joincode::PeerInfo`.
pub use domain::message::ChatMessage;
pub use domain::state::ConnectionState;
pub use joincode::{
    decode, encode, is_raw_ipv6, is_valid_code, parse_input, try_decode, JoinCodeError, PeerInfo,
};
