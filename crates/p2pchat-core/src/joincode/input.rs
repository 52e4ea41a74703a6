//! Parsing of user-supplied peer input.
//!
//! Users paste one of three forms, tried in this order:
//!
//! | Form              | Example                      | Address handling      |
//! |-------------------|------------------------------|-----------------------|
//! | Join code         | `_oAAAAAAAAAAAAAAAAAAAQ-g`   | decoded, compressed   |
//! | Bracketed         | `peer at [fe80::1]:4000`     | verbatim              |
//! | Bare, last colon  | `fe80::1:4000`               | verbatim              |
//!
//! The bracketed form is found anywhere in the input, so a pasted sentence or
//! URL fragment still works.  The first `[address]:digits` wins and any text
//! around it is ignored; once one is found its port decides the result.
//!
//! The bare form is ambiguous for IPv6: the text after the *last* colon is
//! taken as the port only if it is a decimal number in `1..=65535`.

use super::codec::decode;
use super::PeerInfo;

/// Parses a join code, `[address]:port`, or `address:port`.
///
/// Returns the first form that matches, or `None` if none does.
///
/// # Examples
///
/// ```rust
/// use p2pchat_core::joincode::{parse_input, PeerInfo};
///
/// assert_eq!(parse_input("[fe80::1]:4000"), Some(PeerInfo::new("fe80::1", 4000)));
/// assert_eq!(parse_input("fe80::1:4000"), Some(PeerInfo::new("fe80::1", 4000)));
/// assert_eq!(parse_input("hello"), None);
/// ```
pub fn parse_input(input: &str) -> Option<PeerInfo> {
    let trimmed = input.trim();

    if let Some(peer) = decode(trimmed) {
        return Some(peer);
    }
    match find_bracketed(trimmed) {
        Some((address, port)) => port.parse::<u16>().ok().map(|port| PeerInfo::new(address, port)),
        None => parse_last_colon(trimmed),
    }
}

/// Returns `true` if `code` decodes as a join code.
pub fn is_valid_code(code: &str) -> bool {
    decode(code).is_some()
}

/// Returns `true` if `input` looks like a pasted raw address rather than a
/// join code: it contains a colon and does not decode as a code.
pub fn is_raw_ipv6(input: &str) -> bool {
    input.contains(':') && !is_valid_code(input)
}

/// Leftmost `[address]:digits` in `input`, as `(address, digits)`.
fn find_bracketed(input: &str) -> Option<(&str, &str)> {
    for (open, _) in input.match_indices('[') {
        let rest = &input[open + 1..];
        // Without a later ']' no bracket further right can match either.
        let close = rest.find(']')?;
        let address = &rest[..close];
        let Some(tail) = rest[close + 1..].strip_prefix(':') else {
            continue;
        };
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if !address.is_empty() && digits > 0 {
            return Some((address, &tail[..digits]));
        }
    }
    None
}

/// `address:port`, split on the last colon, port in `1..=65535`.
fn parse_last_colon(input: &str) -> Option<PeerInfo> {
    let (address, port) = input.rsplit_once(':')?;
    if address.is_empty() {
        return None;
    }

    match port.parse::<u16>() {
        Ok(port) if port != 0 => Some(PeerInfo::new(address, port)),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joincode::codec::encode;

    #[test]
    fn test_parse_input_accepts_join_code() {
        // Arrange
        let code = encode("2001:db8::42", 5000).unwrap();

        // Act
        let peer = parse_input(&code);

        // Assert
        assert_eq!(peer, Some(PeerInfo::new("2001:db8::42", 5000)));
    }

    #[test]
    fn test_parse_input_join_code_with_whitespace() {
        let code = encode("::1", 7).unwrap();
        assert_eq!(parse_input(&format!("  {code}  ")), Some(PeerInfo::new("::1", 7)));
    }

    #[test]
    fn test_parse_input_bracketed_form() {
        assert_eq!(
            parse_input("[fe80::1]:4000"),
            Some(PeerInfo::new("fe80::1", 4000))
        );
    }

    #[test]
    fn test_parse_input_bracketed_keeps_address_verbatim() {
        // No canonicalisation for raw forms; zone ids survive.
        assert_eq!(
            parse_input("[FE80:0:0:0:0:0:0:1%eth0]:22"),
            Some(PeerInfo::new("FE80:0:0:0:0:0:0:1%eth0", 22))
        );
    }

    #[test]
    fn test_parse_input_bracketed_port_zero_is_accepted() {
        // The bracketed form only requires a non-negative integer.
        assert_eq!(parse_input("[::1]:0"), Some(PeerInfo::new("::1", 0)));
    }

    #[test]
    fn test_parse_input_bracketed_with_out_of_range_port_fails() {
        assert_eq!(parse_input("[::1]:70000"), None);
    }

    #[test]
    fn test_parse_input_finds_bracketed_form_inside_text() {
        assert_eq!(
            parse_input("connect to peer [2001:db8::7]:8080 please"),
            Some(PeerInfo::new("2001:db8::7", 8080))
        );
    }

    #[test]
    fn test_parse_input_bracketed_ignores_trailing_text_after_digits() {
        assert_eq!(parse_input("[::1]:80abc"), Some(PeerInfo::new("::1", 80)));
        assert_eq!(parse_input("http://[::1]:8080/chat"), Some(PeerInfo::new("::1", 8080)));
    }

    #[test]
    fn test_parse_input_bracketed_skips_empty_brackets() {
        assert_eq!(parse_input("[]:1 [::1]:2"), Some(PeerInfo::new("::1", 2)));
    }

    #[test]
    fn test_parse_input_bracketed_without_digits_falls_back_to_last_colon() {
        // No "[...]:digits" match, and "notaport" is not a port either.
        assert_eq!(parse_input("[::1]:notaport"), None);
        assert_eq!(parse_input("[::1]"), None);
    }

    #[test]
    fn test_parse_input_bare_form_splits_on_last_colon() {
        assert_eq!(
            parse_input("fe80::1:4000"),
            Some(PeerInfo::new("fe80::1", 4000))
        );
    }

    #[test]
    fn test_parse_input_bare_form_rejects_port_zero_and_out_of_range() {
        assert_eq!(parse_input("fe80::1:0"), None);
        assert_eq!(parse_input("fe80::1:65536"), None);
    }

    #[test]
    fn test_parse_input_bare_form_with_hex_suffix_fails() {
        // "beef" is not a decimal port, so the whole input is rejected.
        assert_eq!(parse_input("fe80::beef"), None);
    }

    #[test]
    fn test_parse_input_rejects_inputs_without_port() {
        assert_eq!(parse_input(""), None);
        assert_eq!(parse_input("   "), None);
        assert_eq!(parse_input("hello"), None);
        assert_eq!(parse_input(":4000"), None);
    }

    #[test]
    fn test_is_valid_code() {
        let code = encode("fe80::1", 4000).unwrap();
        assert!(is_valid_code(&code));
        assert!(!is_valid_code("fe80::1:4000"));
        assert!(!is_valid_code(&code[..20]));
    }

    #[test]
    fn test_is_raw_ipv6_distinguishes_address_from_code() {
        let code = encode("fe80::1", 4000).unwrap();
        assert!(is_raw_ipv6("fe80::1:4000"));
        assert!(is_raw_ipv6("[::1]:80"));
        assert!(!is_raw_ipv6(&code));
        assert!(!is_raw_ipv6("no-colons-here"));
    }
}
