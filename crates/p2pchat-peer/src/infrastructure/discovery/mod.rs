//! Local IPv6 address discovery.
//!
//! The host needs a reachable address to pack into its join code.  This module
//! enumerates the machine's network interfaces and keeps only addresses a
//! remote peer could plausibly dial.
//!
//! # Which addresses qualify?
//!
//! | Address kind                  | Kept?                                   |
//! |-------------------------------|-----------------------------------------|
//! | IPv4 (any)                    | no                                      |
//! | `::1` loopback                | no                                      |
//! | `::` unspecified              | no                                      |
//! | `ff00::/8` multicast          | no                                      |
//! | `fe80::/10` link-local        | only when `include_link_local` is set   |
//! | everything else (GUA, ULA)    | yes                                     |
//!
//! Addresses are rendered in canonical compressed form without a zone suffix,
//! deduplicated, and returned in interface enumeration order.  The first entry
//! is the one used for the join code.
//!
//! A [`MockAddressDiscovery`] is always compiled (not guarded by `#[cfg]`) so
//! tests can run without depending on the host's network configuration.

use std::net::{IpAddr, Ipv6Addr};

use p2pchat_core::joincode::bytes_to_address;
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for interface enumeration.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to enumerate network interfaces: {0}")]
    Enumerate(#[from] std::io::Error),
}

/// Source of the machine's interface addresses.
///
/// Implementors return raw addresses; filtering happens in
/// [`global_ipv6_addresses`] so every source is filtered identically.
pub trait AddressDiscovery: Send + Sync {
    /// Returns every non-loopback interface address, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Enumerate`] if the OS query fails.
    fn interface_addresses(&self) -> Result<Vec<IpAddr>, DiscoveryError>;
}

/// Queries the OS interface table via `if_addrs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterfaceDiscovery;

impl InterfaceDiscovery {
    pub fn new() -> Self {
        Self
    }
}

impl AddressDiscovery for InterfaceDiscovery {
    fn interface_addresses(&self) -> Result<Vec<IpAddr>, DiscoveryError> {
        let interfaces = if_addrs::get_if_addrs()?;
        Ok(interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| {
                debug!("interface {} has {}", iface.name, iface.ip());
                iface.ip()
            })
            .collect())
    }
}

/// Returns a fixed address list.  For tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MockAddressDiscovery {
    pub addresses: Vec<IpAddr>,
}

impl MockAddressDiscovery {
    pub fn new(addresses: Vec<IpAddr>) -> Self {
        Self { addresses }
    }
}

impl AddressDiscovery for MockAddressDiscovery {
    fn interface_addresses(&self) -> Result<Vec<IpAddr>, DiscoveryError> {
        Ok(self.addresses.clone())
    }
}

/// Asks `discovery` for interface addresses and keeps the dialable IPv6 ones.
///
/// Enumeration failures are logged and yield an empty list: a host without a
/// usable address can still listen, it just has no join code to show.
pub fn global_ipv6_addresses(
    discovery: &dyn AddressDiscovery,
    include_link_local: bool,
) -> Vec<String> {
    match discovery.interface_addresses() {
        Ok(addresses) => select_ipv6_candidates(addresses, include_link_local),
        Err(e) => {
            warn!("{e}");
            Vec::new()
        }
    }
}

/// Applies the filter table from the module docs.
pub fn select_ipv6_candidates(
    addresses: impl IntoIterator<Item = IpAddr>,
    include_link_local: bool,
) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for address in addresses {
        let IpAddr::V6(v6) = address else {
            continue;
        };
        if v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() {
            continue;
        }
        if is_link_local(&v6) && !include_link_local {
            continue;
        }
        let rendered = bytes_to_address(v6.octets());
        if !selected.contains(&rendered) {
            selected.push(rendered);
        }
    }
    selected
}

fn is_link_local(address: &Ipv6Addr) -> bool {
    (address.segments()[0] & 0xffc0) == 0xfe80
}
