//! Platform adapter traits.
//!
//! The reconciliation core never touches the network directly. It drives a
//! platform through two narrow capability sets:
//!
//! - [`LinkOps`]: links, bridges, addresses and routes
//! - [`AclOps`]: policy tables and entries
//!
//! Platform-specific conventions such as bridge naming or how a tagged member
//! is materialized are adapter choices, not core control flow.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;

use vlanrecon_types::{ConnectionParams, Ipv4Cidr, VlanId};

use crate::acl::{AclEntry, AclEntryId, AclEntrySpec, AclTableId, AclTableSpec};
use crate::error::ReconcileResult;

/// Administrative link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LinkState::Up => "up",
            LinkState::Down => "down",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a port is attached to a VLAN bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortTagging {
    Tagged,
    Untagged,
}

impl PortTagging {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PortTagging::Tagged => "tagged",
            PortTagging::Untagged => "untagged",
        }
    }
}

/// Result of a bridge membership query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeMembers {
    /// The interface is a bridge with these member ports, in reported order.
    Bridge(Vec<String>),
    /// The interface is not a bridge. This is a normal outcome.
    NotABridge,
}

impl BridgeMembers {
    pub fn is_bridge(&self) -> bool {
        matches!(self, BridgeMembers::Bridge(_))
    }

    /// Returns the member ports; empty for non-bridges.
    pub fn into_members(self) -> Vec<String> {
        match self {
            BridgeMembers::Bridge(members) => members,
            BridgeMembers::NotABridge => Vec::new(),
        }
    }
}

/// Link, bridge, address and route primitives.
///
/// Every mutating call must complete before the next one is issued; failures
/// are fatal and carry the operation and target.
#[async_trait]
pub trait LinkOps: Send {
    /// Short platform name for logging (e.g., "linux", "opx").
    fn platform_name(&self) -> &str;

    /// Returns the bridge interface name used for a VLAN.
    fn bridge_name(&self, vlan_name: &str, vlan_id: VlanId) -> String;

    /// Enumerates the live network interfaces.
    async fn list_interfaces(&mut self) -> ReconcileResult<BTreeSet<String>>;

    /// Reports bridge membership. Non-bridges yield [`BridgeMembers::NotABridge`].
    async fn query_bridge_members(&mut self, name: &str) -> ReconcileResult<BridgeMembers>;

    async fn set_link_state(&mut self, name: &str, state: LinkState) -> ReconcileResult<()>;

    /// Deletes a virtual link such as a tagged sub-interface.
    async fn delete_link(&mut self, name: &str) -> ReconcileResult<()>;

    /// Creates the link that carries `vlan_id` tagged traffic of `parent`
    /// and returns the name to attach to the VLAN bridge.
    async fn create_tagged_link(&mut self, parent: &str, vlan_id: VlanId)
        -> ReconcileResult<String>;

    async fn create_bridge(&mut self, name: &str, vlan_id: VlanId) -> ReconcileResult<()>;

    async fn delete_bridge(&mut self, name: &str) -> ReconcileResult<()>;

    async fn set_multicast_snooping(&mut self, bridge: &str, enabled: bool)
        -> ReconcileResult<()>;

    async fn set_proxy_arp(&mut self, link: &str, enabled: bool) -> ReconcileResult<()>;

    async fn attach_port(
        &mut self,
        bridge: &str,
        port: &str,
        tagging: PortTagging,
    ) -> ReconcileResult<()>;

    async fn detach_port(&mut self, bridge: &str, port: &str) -> ReconcileResult<()>;

    async fn add_address(&mut self, link: &str, cidr: &Ipv4Cidr) -> ReconcileResult<()>;

    async fn add_route(&mut self, destination: &str, gateway: &str) -> ReconcileResult<()>;

    /// Programs physical link parameters (autoneg, speed, duplex, FEC).
    async fn configure_connection(
        &mut self,
        name: &str,
        params: &ConnectionParams,
    ) -> ReconcileResult<()>;
}

/// Policy table primitives. Every failure is an ACL commit failure.
#[async_trait]
pub trait AclOps: Send {
    /// Looks up a table by name. Absence is not an error.
    async fn find_acl_table(&mut self, name: &str) -> ReconcileResult<Option<AclTableId>>;

    async fn create_acl_table(&mut self, spec: &AclTableSpec) -> ReconcileResult<AclTableId>;

    async fn delete_acl_table(&mut self, table_id: &AclTableId) -> ReconcileResult<()>;

    async fn list_acl_entries(&mut self, table_id: &AclTableId) -> ReconcileResult<Vec<AclEntry>>;

    async fn create_acl_entry(&mut self, spec: &AclEntrySpec) -> ReconcileResult<AclEntryId>;

    async fn delete_acl_entry(
        &mut self,
        table_id: &AclTableId,
        entry_id: &AclEntryId,
    ) -> ReconcileResult<()>;
}

/// A complete platform adapter.
pub trait Platform: LinkOps + AclOps {}

impl<T: LinkOps + AclOps> Platform for T {}
