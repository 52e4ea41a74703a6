//! Domain types for a single chat connection.
//!
//! - **`state`** – [`ConnectionState`], the tagged state of the connection
//!   lifecycle (disconnected, listening, connecting, connected, error).
//! - **`message`** – [`ChatMessage`], an immutable line of chat text tagged
//!   with its direction and arrival time.

pub mod message;
pub mod state;

pub use message::ChatMessage;
pub use state::ConnectionState;
