//! Common types for the switch-hwsync control plane.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the state tree, the hardware abstraction layer and the agent:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpAddress`] / [`IpPrefix`]: IPv4/IPv6 addresses and CIDR prefixes
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`PortId`] / [`RouterId`] / [`InterfaceId`]: switch entity identifiers
//! - [`L2Entry`] / [`L2EntryUpdateType`]: hardware MAC-learning facts

mod ids;
mod ip;
mod l2;
mod mac;
mod vlan;

pub use ids::{InterfaceId, PortId, RouterId};
pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use l2::{L2Entry, L2EntryUpdateType};
pub use mac::MacAddress;
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),
}
