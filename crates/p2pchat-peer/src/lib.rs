//! p2pchat-peer library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does a peer do? (for beginners)
//!
//! Every P2PChat installation can play either role in a chat:
//!
//! 1. **Host** – binds a TCP listening socket on the IPv6 wildcard address,
//!    looks up this machine's global IPv6 address, and shows a *join code*
//!    that packs the address and port.
//! 2. **Joiner** – takes a join code (or a pasted `[addr]:port`), decodes it,
//!    and opens an outbound TCP connection to the host.
//!
//! Once connected, both sides exchange UTF-8 text, one message per line,
//! until either side disconnects.  There is no encryption and no relay: the
//! two machines must be able to reach each other directly over IPv6.

/// Application layer: the chat session use case.
pub mod application;

/// Infrastructure layer: sockets, interface discovery, config, UI bridge.
pub mod infrastructure;
