//! Common types for VLAN topology reconciliation.
//!
//! This crate provides type-safe representations of the network primitives
//! that appear in a topology schema:
//!
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`Ipv4Cidr`]: IPv4 networks in CIDR notation, with netmask derivation
//! - [`Autoneg`], [`Speed`], [`Duplex`], [`Fec`]: physical link parameters

mod ip;
mod link;
mod vlan;

pub use ip::{cidr_to_netmask, Ipv4Cidr};
pub use link::{Autoneg, ConnectionParams, Duplex, Fec, Speed};
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid CIDR: {0}")]
    InvalidCidr(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("unknown {kind} value: {value}")]
    UnknownLinkValue { kind: &'static str, value: String },
}
