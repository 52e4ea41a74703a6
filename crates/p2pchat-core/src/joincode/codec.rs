//! Binary codec between `(IPv6 address, port)` and the 24-character join code.
//!
//! All multi-byte integers are big-endian.  The address bytes are the 16
//! octets of the IPv6 address in network order; the port follows as two bytes.

use std::net::Ipv6Addr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tracing::trace;

use super::{JoinCodeError, PeerInfo};

/// Length of the raw payload: 16 address bytes + 2 port bytes.
pub const PAYLOAD_LEN: usize = 18;

/// Length of every encoded join code (18 bytes → 24 base64 characters).
pub const JOIN_CODE_LEN: usize = 24;

const ADDRESS_LEN: usize = 16;

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an IPv6 address and port into a join code.
///
/// A zone suffix (`%eth0`) is discarded before parsing.  A `::` run is
/// expanded to the right number of zero groups; an address without `::` must
/// spell out all eight groups.
///
/// # Errors
///
/// Returns [`JoinCodeError::InvalidAddress`] if `address` is not IPv6.
///
/// # Examples
///
/// ```rust
/// use p2pchat_core::joincode::{encode, JOIN_CODE_LEN};
///
/// let code = encode("::1", 8080).unwrap();
/// assert_eq!(code, "AAAAAAAAAAAAAAAAAAAAAR-Q");
/// assert_eq!(code.len(), JOIN_CODE_LEN);
/// ```
pub fn encode(address: &str, port: u16) -> Result<String, JoinCodeError> {
    let octets = address_to_bytes(address)?;

    let mut payload = [0u8; PAYLOAD_LEN];
    payload[..ADDRESS_LEN].copy_from_slice(&octets);
    payload[ADDRESS_LEN..].copy_from_slice(&port.to_be_bytes());

    Ok(URL_SAFE_NO_PAD.encode(payload))
}

/// Decodes a join code, returning `None` for anything malformed.
///
/// Surrounding whitespace is ignored.  Padded codes, non-base64 characters,
/// and codes that decode to anything other than 18 bytes are rejected.
///
/// # Examples
///
/// ```rust
/// use p2pchat_core::joincode::decode;
///
/// let peer = decode("_oAAAAAAAAAAAAAAAAAAAQ-g").unwrap();
/// assert_eq!(peer.address, "fe80::1");
/// assert_eq!(peer.port, 4000);
/// assert!(decode("not a code").is_none());
/// ```
pub fn decode(code: &str) -> Option<PeerInfo> {
    match try_decode(code) {
        Ok(peer) => Some(peer),
        Err(e) => {
            trace!("join code rejected: {e}");
            None
        }
    }
}

/// Decodes a join code, reporting why it was rejected.
///
/// # Errors
///
/// - [`JoinCodeError::InvalidBase64`] if the text is not unpadded URL-safe base64.
/// - [`JoinCodeError::WrongLength`] if the payload is not exactly 18 bytes.
pub fn try_decode(code: &str) -> Result<PeerInfo, JoinCodeError> {
    let bytes = URL_SAFE_NO_PAD.decode(code.trim().as_bytes())?;
    if bytes.len() != PAYLOAD_LEN {
        return Err(JoinCodeError::WrongLength { len: bytes.len() });
    }

    let mut octets = [0u8; ADDRESS_LEN];
    octets.copy_from_slice(&bytes[..ADDRESS_LEN]);
    let port = u16::from_be_bytes([bytes[ADDRESS_LEN], bytes[ADDRESS_LEN + 1]]);

    Ok(PeerInfo {
        address: bytes_to_address(octets),
        port,
    })
}

// ── IPv6 text ⇄ bytes ─────────────────────────────────────────────────────────

/// Parses a textual IPv6 address (zone id allowed) into its 16 octets.
///
/// # Errors
///
/// Returns [`JoinCodeError::InvalidAddress`] if the text is not IPv6.
pub fn address_to_bytes(address: &str) -> Result<[u8; 16], JoinCodeError> {
    let without_zone = address
        .split_once('%')
        .map_or(address, |(head, _zone)| head)
        .trim();

    without_zone
        .parse::<Ipv6Addr>()
        .map(|ip| ip.octets())
        .map_err(|_| JoinCodeError::InvalidAddress(address.to_string()))
}

/// Renders 16 octets as compressed IPv6 text.
///
/// The longest run of all-zero groups (the first one on ties) is replaced by
/// `::` when it spans more than one group.  Groups are lowercase hex with no
/// leading zeros, and embedded IPv4 notation is never used.
pub fn bytes_to_address(octets: [u8; 16]) -> String {
    let groups = Ipv6Addr::from(octets).segments();

    match longest_zero_run(&groups) {
        Some((start, len)) if len > 1 => format!(
            "{}::{}",
            join_groups(&groups[..start]),
            join_groups(&groups[start + len..])
        ),
        _ => join_groups(&groups),
    }
}

/// Normalises a textual IPv6 address to the compressed form [`decode`] emits.
///
/// # Errors
///
/// Returns [`JoinCodeError::InvalidAddress`] if the text is not IPv6.
pub fn canonical_address(address: &str) -> Result<String, JoinCodeError> {
    address_to_bytes(address).map(bytes_to_address)
}

/// Returns `(start, len)` of the first longest run of zero groups.
fn longest_zero_run(groups: &[u16; 8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut current: Option<(usize, usize)> = None;

    for (i, &group) in groups.iter().enumerate() {
        if group == 0 {
            let run = match current {
                Some((start, len)) => (start, len + 1),
                None => (i, 1),
            };
            current = Some(run);
            if best.map_or(true, |(_, best_len)| run.1 > best_len) {
                best = Some(run);
            }
        } else {
            current = None;
        }
    }

    best
}

fn join_groups(groups: &[u16]) -> String {
    groups
        .iter()
        .map(|g| format!("{g:x}"))
        .collect::<Vec<_>>()
        .join(":")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
