//! Infrastructure layer for the peer application.
//!
//! Contains OS-facing adapters: TCP socket lifecycle, network interface
//! enumeration, configuration persistence, and the UI snapshot bridge.
//!
//! **Dependency rule**: this layer may depend on `p2pchat_core`.  Only
//! `ui_bridge` may import the `application` layer, because it exists to turn
//! application state into front-end snapshots.
//!
//! # Sub-modules
//!
//! - **`network`** – The `ConnectionManager`: listening socket and accept loop
//!   for the host role, outbound connect with timeout for the joiner role,
//!   line-oriented message streaming, and teardown.
//!
//! - **`discovery`** – Enumerates this machine's global-scope IPv6 addresses
//!   so the host can build a join code.  A static implementation is provided
//!   for tests.
//!
//! - **`storage`** – TOML configuration file (listen port, discovery options,
//!   log level).
//!
//! - **`ui_bridge`** – Serializable snapshots of connection state and
//!   messages for front ends.

pub mod discovery;
pub mod network;
pub mod storage;
pub mod ui_bridge;
