//! Join codes: compact, shareable encodings of a peer's IPv6 address and port.
//!
//! # Format
//!
//! ```text
//! [ipv6 address: 16 bytes, network order][port: 2 bytes, big-endian]
//!                  └──────── URL-safe base64, no padding ────────┘
//!                              = 24 ASCII characters
//! ```
//!
//! The code is a bijection over the *value* of the address, not its text:
//! `fe80:0:0:0:0:0:0:1` and `fe80::1` encode to the same code, and decoding
//! always yields the compressed form.
//!
//! # Sub-modules
//!
//! - **`codec`** – `encode` / `decode` and the IPv6 text ⇄ bytes helpers.
//! - **`input`** – Permissive parsing of whatever the user pasted: a join
//!   code, a bracketed `[addr]:port`, or a bare `addr:port`.

pub mod codec;
pub mod input;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::{
    address_to_bytes, bytes_to_address, canonical_address, decode, encode, try_decode,
    JOIN_CODE_LEN, PAYLOAD_LEN,
};
pub use input::{is_raw_ipv6, is_valid_code, parse_input};

/// Errors produced while building or reading a join code.
///
/// The public [`decode`] and [`parse_input`] functions fold these into an
/// absent result; [`try_decode`] and [`encode`] expose them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinCodeError {
    /// The textual address is not a valid IPv6 address.
    #[error("not a valid IPv6 address: {0:?}")]
    InvalidAddress(String),

    /// The code contains characters outside the URL-safe base64 alphabet, or
    /// carries padding.
    #[error("join code is not valid URL-safe base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The code decoded to the wrong number of bytes.
    #[error("join code decodes to {len} bytes, expected {PAYLOAD_LEN}")]
    WrongLength { len: usize },
}

/// A peer's address and port, as recovered from a join code or pasted text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Textual address.  Compressed IPv6 when produced by [`decode`]; taken
    /// verbatim from the input for the raw `addr:port` forms.
    pub address: String,
    /// TCP port.
    pub port: u16,
}

impl PeerInfo {
    /// Creates a new `PeerInfo`.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Packs this peer into a join code.
    ///
    /// # Errors
    ///
    /// Returns [`JoinCodeError::InvalidAddress`] if `address` is not IPv6.
    pub fn to_join_code(&self) -> Result<String, JoinCodeError> {
        encode(&self.address, self.port)
    }
}

impl std::fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]:{}", self.address, self.port)
    }
}
