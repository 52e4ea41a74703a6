//! Integration tests for the join-code codec.
//!
//! These tests go through the public API only and check the properties the
//! rest of the application relies on:
//!
//! - `decode(encode(a, p))` recovers the port exactly and the address *value*
//!   (the text may change to its compressed form).
//! - Malformed codes never panic; they simply produce no `PeerInfo`.
//! - `parse_input` on a generated code agrees with `decode`.

use std::net::Ipv6Addr;

use p2pchat_core::joincode::{address_to_bytes, bytes_to_address, JOIN_CODE_LEN};
use p2pchat_core::{decode, encode, is_raw_ipv6, is_valid_code, parse_input, PeerInfo};

/// Encodes then decodes, asserting the value-level round trip.
fn assert_roundtrip(address: &str, port: u16) -> PeerInfo {
    let code = encode(address, port).expect("encode must succeed");
    assert_eq!(code.len(), JOIN_CODE_LEN);

    let peer = decode(&code).expect("decode must succeed");
    assert_eq!(peer.port, port, "port must survive for {address}");
    assert_eq!(
        address_to_bytes(&peer.address).unwrap(),
        address_to_bytes(address).unwrap(),
        "address value must survive for {address}"
    );
    peer
}

#[test]
fn test_roundtrip_unspecified_address() {
    let peer = assert_roundtrip("::", 0);
    assert_eq!(peer.address, "::");
}

#[test]
fn test_roundtrip_loopback() {
    let peer = assert_roundtrip("::1", 65535);
    assert_eq!(peer.address, "::1");
}

#[test]
fn test_roundtrip_link_local() {
    let peer = assert_roundtrip("fe80::1", 4000);
    assert_eq!(peer.address, "fe80::1");
}

#[test]
fn test_roundtrip_fully_expanded_form_keeps_all_groups() {
    let peer = assert_roundtrip("1:2:3:4:5:6:7:8", 1234);
    assert_eq!(peer.address, "1:2:3:4:5:6:7:8");
}

#[test]
fn test_roundtrip_uncompressed_input_comes_back_compressed() {
    // Arrange: value-equal to 2001:db8::1 but spelled out.
    let peer = assert_roundtrip("2001:0db8:0000:0000:0000:0000:0000:0001", 443);

    // Assert: text differs, value does not.
    assert_eq!(peer.address, "2001:db8::1");
}

#[test]
fn test_roundtrip_zone_id_is_dropped() {
    let code = encode("fe80::abcd%wlan0", 50000).unwrap();
    assert_eq!(decode(&code), Some(PeerInfo::new("fe80::abcd", 50000)));
}

#[test]
fn test_roundtrip_pseudo_random_values() {
    // Deterministic xorshift so failures are reproducible.
    let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for _ in 0..256 {
        let hi = next();
        let lo = next();
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(&hi.to_be_bytes());
        octets[8..].copy_from_slice(&lo.to_be_bytes());
        // Zero out a few groups so the compression paths are exercised too.
        let mask = (next() & 0xFF) as u8;
        for group in 0..8 {
            if mask & (1 << group) != 0 {
                octets[group * 2] = 0;
                octets[group * 2 + 1] = 0;
            }
        }
        let port = (next() & 0xFFFF) as u16;

        let text = Ipv6Addr::from(octets).to_string();
        let peer = assert_roundtrip(&text, port);
        assert_eq!(peer.address, bytes_to_address(octets));
    }
}

#[test]
fn test_decode_never_panics_on_arbitrary_text() {
    let inputs = [
        "",
        "=",
        "====",
        "AAAAAAAAAAAAAAAAAAAAAAA=",
        "AAAAAAAAAAAAAAAAAAAAAAAAA",
        "!!!!!!!!!!!!!!!!!!!!!!!!",
        "ÄÖÜäöü",
        "[::1]:80",
        "fe80::1:4000",
    ];
    for input in inputs {
        assert!(decode(input).is_none(), "{input:?} must not decode");
    }
}

#[test]
fn test_parse_input_of_generated_code_matches_decode() {
    let code = encode("2a00:1450:4001:82a::200e", 8443).unwrap();
    assert_eq!(parse_input(&code), decode(&code));
    assert_eq!(
        parse_input(&code),
        Some(PeerInfo::new("2a00:1450:4001:82a::200e", 8443))
    );
}

#[test]
fn test_predicates_agree_with_parse_input() {
    let code = encode("::1", 9000).unwrap();
    assert!(is_valid_code(&code));
    assert!(!is_raw_ipv6(&code));

    let raw = "[::1]:9000";
    assert!(!is_valid_code(raw));
    assert!(is_raw_ipv6(raw));
    assert_eq!(parse_input(raw), Some(PeerInfo::new("::1", 9000)));
}
