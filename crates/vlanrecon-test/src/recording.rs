//! In-memory platform adapter.
//!
//! Behaves like a small kernel: links must exist before they are used,
//! bridges own member lists, deleting a link drops it from every bridge, and
//! ACL tables refuse deletion while they still hold entries.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use vlanrecon_common::{
    AclEntry, AclEntryId, AclEntrySpec, AclOps, AclPacketAction, AclStage, AclTableId,
    AclTableSpec, BridgeMembers, LinkOps, LinkState, OpKind, PortTagging, ReconcileError,
    ReconcileResult,
};
use vlanrecon_types::{ConnectionParams, Ipv4Cidr, VlanId};

/// A primitive call as seen by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOp {
    ListInterfaces,
    QueryBridgeMembers(String),
    SetLinkState(String, LinkState),
    DeleteLink(String),
    CreateTaggedLink { parent: String, vlan_id: u16 },
    CreateBridge(String),
    DeleteBridge(String),
    SetMulticastSnooping(String, bool),
    SetProxyArp(String, bool),
    AttachPort {
        bridge: String,
        port: String,
        tagging: PortTagging,
    },
    DetachPort { bridge: String, port: String },
    AddAddress { link: String, cidr: String },
    AddRoute { destination: String, gateway: String },
    ConfigureConnection(String),
    FindAclTable(String),
    CreateAclTable(String),
    DeleteAclTable(String),
    ListAclEntries(String),
    CreateAclEntry { table_id: String, name: String },
    DeleteAclEntry { table_id: String, entry_id: String },
}

impl PlatformOp {
    /// Primitive name, as used for failure injection.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListInterfaces => "list_interfaces",
            Self::QueryBridgeMembers(_) => "query_bridge_members",
            Self::SetLinkState(..) => "set_link_state",
            Self::DeleteLink(_) => "delete_link",
            Self::CreateTaggedLink { .. } => "create_tagged_link",
            Self::CreateBridge(_) => "create_bridge",
            Self::DeleteBridge(_) => "delete_bridge",
            Self::SetMulticastSnooping(..) => "set_multicast_snooping",
            Self::SetProxyArp(..) => "set_proxy_arp",
            Self::AttachPort { .. } => "attach_port",
            Self::DetachPort { .. } => "detach_port",
            Self::AddAddress { .. } => "add_address",
            Self::AddRoute { .. } => "add_route",
            Self::ConfigureConnection(_) => "configure_connection",
            Self::FindAclTable(_) => "find_acl_table",
            Self::CreateAclTable(_) => "create_acl_table",
            Self::DeleteAclTable(_) => "delete_acl_table",
            Self::ListAclEntries(_) => "list_acl_entries",
            Self::CreateAclEntry { .. } => "create_acl_entry",
            Self::DeleteAclEntry { .. } => "delete_acl_entry",
        }
    }

    /// The object the call acts on.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ListInterfaces => None,
            Self::QueryBridgeMembers(name)
            | Self::SetLinkState(name, _)
            | Self::DeleteLink(name)
            | Self::CreateBridge(name)
            | Self::DeleteBridge(name)
            | Self::SetMulticastSnooping(name, _)
            | Self::SetProxyArp(name, _)
            | Self::ConfigureConnection(name)
            | Self::FindAclTable(name)
            | Self::CreateAclTable(name)
            | Self::DeleteAclTable(name)
            | Self::ListAclEntries(name) => Some(name),
            Self::CreateTaggedLink { parent, .. } => Some(parent),
            Self::AttachPort { port, .. } | Self::DetachPort { port, .. } => Some(port),
            Self::AddAddress { link, .. } => Some(link),
            Self::AddRoute { destination, .. } => Some(destination),
            Self::CreateAclEntry { name, .. } => Some(name),
            Self::DeleteAclEntry { entry_id, .. } => Some(entry_id),
        }
    }

    /// True for calls that remove state.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DeleteLink(_)
                | Self::DeleteBridge(_)
                | Self::DetachPort { .. }
                | Self::DeleteAclTable(_)
                | Self::DeleteAclEntry { .. }
        )
    }

    fn kind(&self) -> OpKind {
        match self {
            Self::CreateBridge(_)
            | Self::DeleteBridge(_)
            | Self::QueryBridgeMembers(_)
            | Self::SetMulticastSnooping(..)
            | Self::AttachPort { .. }
            | Self::DetachPort { .. } => OpKind::Bridge,
            Self::AddAddress { .. } => OpKind::Addr,
            Self::AddRoute { .. } => OpKind::Route,
            Self::FindAclTable(_)
            | Self::CreateAclTable(_)
            | Self::DeleteAclTable(_)
            | Self::ListAclEntries(_)
            | Self::CreateAclEntry { .. }
            | Self::DeleteAclEntry { .. } => OpKind::Acl,
            _ => OpKind::Link,
        }
    }
}

/// How bridges and tagged links are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeNaming {
    /// Bridge named after the VLAN; tagged members are `<port>.<id>` links.
    #[default]
    VlanName,
    /// Bridge named `br<id>`; tagged members are the port itself.
    VlanTag,
}

/// An ACL table held by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAclTable {
    pub spec: AclTableSpec,
    pub entries: Vec<(AclEntryId, AclEntrySpec)>,
}

/// In-memory [`LinkOps`] + [`AclOps`] implementation with an operation log.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    naming: BridgeNaming,
    links: BTreeMap<String, LinkState>,
    bridges: BTreeMap<String, Vec<String>>,
    addresses: Vec<(String, String)>,
    routes: Vec<(String, String)>,
    connections: BTreeMap<String, ConnectionParams>,
    acl_tables: BTreeMap<AclTableId, RecordedAclTable>,
    next_id: u32,
    failures: Vec<(String, String)>,
    ops: Vec<PlatformOp>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform using `br<id>` bridges and port-level tagging.
    pub fn tag_named() -> Self {
        Self {
            naming: BridgeNaming::VlanTag,
            ..Self::default()
        }
    }

    /// Adds physical ports, administratively down.
    pub fn with_interfaces<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.links.insert(name.into(), LinkState::Down);
        }
        self
    }

    /// Adds a bridge with members. Missing member links are created.
    pub fn with_bridge<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        for member in &members {
            self.links.entry(member.clone()).or_insert(LinkState::Down);
        }
        self.links.insert(name.to_string(), LinkState::Up);
        self.bridges.insert(name.to_string(), members);
        self
    }

    /// Adds a `<parent>.<id>` sub-interface, creating the parent if needed.
    pub fn with_tagged_link(mut self, parent: &str, vlan_id: u16) -> Self {
        self.links.entry(parent.to_string()).or_insert(LinkState::Down);
        self.links
            .insert(format!("{}.{}", parent, vlan_id), LinkState::Up);
        self
    }

    /// Adds an ACL table holding `entries` placeholder drop entries.
    pub fn with_acl_table(mut self, name: &str, entries: usize) -> Self {
        let table_id = self.allocate_id("table");
        let entries = (0..entries)
            .map(|i| {
                let spec = AclEntrySpec {
                    table_id: table_id.clone(),
                    name: format!("stale-{}", i),
                    priority: 10,
                    matches: Vec::new(),
                    action: AclPacketAction::Drop,
                };
                (self.allocate_id("entry"), spec)
            })
            .collect();
        let spec = AclTableSpec {
            name: name.to_string(),
            stage: AclStage::Ingress,
            priority: 100,
            match_fields: Vec::new(),
        };
        self.acl_tables
            .insert(table_id, RecordedAclTable { spec, entries });
        self
    }

    /// Makes the named primitive fail when it acts on `target`.
    pub fn failing_on(mut self, op: &str, target: &str) -> Self {
        self.failures.push((op.to_string(), target.to_string()));
        self
    }

    pub fn ops(&self) -> &[PlatformOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn destructive_ops(&self) -> Vec<&PlatformOp> {
        self.ops.iter().filter(|op| op.is_destructive()).collect()
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.links.contains_key(name)
    }

    pub fn link_state(&self, name: &str) -> Option<LinkState> {
        self.links.get(name).copied()
    }

    pub fn link_names(&self) -> Vec<&str> {
        self.links.keys().map(String::as_str).collect()
    }

    pub fn is_bridge(&self, name: &str) -> bool {
        self.bridges.contains_key(name)
    }

    /// Members of a bridge; empty for unknown names.
    pub fn bridge_members(&self, name: &str) -> Vec<String> {
        self.bridges.get(name).cloned().unwrap_or_default()
    }

    /// Assigned `(link, cidr)` addresses.
    pub fn addresses(&self) -> &[(String, String)] {
        &self.addresses
    }

    /// Installed `(destination, gateway)` routes.
    pub fn routes(&self) -> &[(String, String)] {
        &self.routes
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionParams> {
        self.connections.get(name)
    }

    /// Looks up a table by name.
    pub fn acl_table(&self, name: &str) -> Option<&RecordedAclTable> {
        self.acl_tables.values().find(|t| t.spec.name == name)
    }

    /// Entries of the named table; empty when the table does not exist.
    pub fn acl_entries(&self, name: &str) -> Vec<&AclEntrySpec> {
        self.acl_table(name)
            .map(|t| t.entries.iter().map(|(_, spec)| spec).collect())
            .unwrap_or_default()
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Logs the call and applies any injected failure.
    fn record(&mut self, op: PlatformOp) -> ReconcileResult<()> {
        let injected = op.target().is_some_and(|target| {
            self.failures
                .iter()
                .any(|(name, t)| name == op.name() && t == target)
        });
        let error = injected.then(|| fail(&op, "injected failure"));
        self.ops.push(op);
        error.map_or(Ok(()), Err)
    }

    fn require_link(&self, op: &PlatformOp, name: &str) -> ReconcileResult<()> {
        if self.links.contains_key(name) {
            Ok(())
        } else {
            Err(fail(op, format!("no such link '{}'", name)))
        }
    }

    fn require_bridge(&self, op: &PlatformOp, name: &str) -> ReconcileResult<()> {
        if self.bridges.contains_key(name) {
            Ok(())
        } else {
            Err(fail(op, format!("'{}' is not a bridge", name)))
        }
    }

    fn require_table(&self, op: &PlatformOp, table_id: &str) -> ReconcileResult<()> {
        if self.acl_tables.contains_key(table_id) {
            Ok(())
        } else {
            Err(fail(op, format!("no such table '{}'", table_id)))
        }
    }
}

fn fail(op: &PlatformOp, message: impl Into<String>) -> ReconcileError {
    ReconcileError::op_failed(
        op.kind(),
        op.name(),
        op.target().unwrap_or_default(),
        message,
    )
}

#[async_trait]
impl LinkOps for RecordingPlatform {
    fn platform_name(&self) -> &str {
        "recording"
    }

    fn bridge_name(&self, vlan_name: &str, vlan_id: VlanId) -> String {
        match self.naming {
            BridgeNaming::VlanName => vlan_name.to_string(),
            BridgeNaming::VlanTag => format!("br{}", vlan_id),
        }
    }

    async fn list_interfaces(&mut self) -> ReconcileResult<BTreeSet<String>> {
        self.record(PlatformOp::ListInterfaces)?;
        Ok(self.links.keys().cloned().collect())
    }

    async fn query_bridge_members(&mut self, name: &str) -> ReconcileResult<BridgeMembers> {
        self.record(PlatformOp::QueryBridgeMembers(name.to_string()))?;
        Ok(match self.bridges.get(name) {
            Some(members) => BridgeMembers::Bridge(members.clone()),
            None => BridgeMembers::NotABridge,
        })
    }

    async fn set_link_state(&mut self, name: &str, state: LinkState) -> ReconcileResult<()> {
        let op = PlatformOp::SetLinkState(name.to_string(), state);
        self.require_link(&op, name)?;
        self.record(op)?;
        self.links.insert(name.to_string(), state);
        Ok(())
    }

    async fn delete_link(&mut self, name: &str) -> ReconcileResult<()> {
        let op = PlatformOp::DeleteLink(name.to_string());
        self.require_link(&op, name)?;
        self.record(op)?;
        self.links.remove(name);
        for members in self.bridges.values_mut() {
            members.retain(|m| m != name);
        }
        Ok(())
    }

    async fn create_tagged_link(
        &mut self,
        parent: &str,
        vlan_id: VlanId,
    ) -> ReconcileResult<String> {
        let op = PlatformOp::CreateTaggedLink {
            parent: parent.to_string(),
            vlan_id: vlan_id.as_u16(),
        };
        self.require_link(&op, parent)?;
        if self.naming == BridgeNaming::VlanTag {
            self.record(op)?;
            return Ok(parent.to_string());
        }

        let name = format!("{}.{}", parent, vlan_id);
        if self.links.contains_key(&name) {
            return Err(fail(&op, format!("'{}' already exists", name)));
        }
        self.record(op)?;
        self.links.insert(name.clone(), LinkState::Down);
        Ok(name)
    }

    async fn create_bridge(&mut self, name: &str, _vlan_id: VlanId) -> ReconcileResult<()> {
        let op = PlatformOp::CreateBridge(name.to_string());
        if self.links.contains_key(name) {
            return Err(fail(&op, format!("'{}' already exists", name)));
        }
        self.record(op)?;
        self.links.insert(name.to_string(), LinkState::Down);
        self.bridges.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn delete_bridge(&mut self, name: &str) -> ReconcileResult<()> {
        let op = PlatformOp::DeleteBridge(name.to_string());
        self.require_bridge(&op, name)?;
        self.record(op)?;
        self.bridges.remove(name);
        self.links.remove(name);
        self.addresses.retain(|(link, _)| link != name);
        Ok(())
    }

    async fn set_multicast_snooping(
        &mut self,
        bridge: &str,
        enabled: bool,
    ) -> ReconcileResult<()> {
        let op = PlatformOp::SetMulticastSnooping(bridge.to_string(), enabled);
        self.require_bridge(&op, bridge)?;
        self.record(op)
    }

    async fn set_proxy_arp(&mut self, link: &str, enabled: bool) -> ReconcileResult<()> {
        let op = PlatformOp::SetProxyArp(link.to_string(), enabled);
        self.require_link(&op, link)?;
        self.record(op)
    }

    async fn attach_port(
        &mut self,
        bridge: &str,
        port: &str,
        tagging: PortTagging,
    ) -> ReconcileResult<()> {
        let op = PlatformOp::AttachPort {
            bridge: bridge.to_string(),
            port: port.to_string(),
            tagging,
        };
        self.require_bridge(&op, bridge)?;
        self.require_link(&op, port)?;
        if self.bridge_members(bridge).iter().any(|m| m == port) {
            return Err(fail(&op, format!("'{}' is already a member", port)));
        }
        self.record(op)?;
        if let Some(members) = self.bridges.get_mut(bridge) {
            members.push(port.to_string());
        }
        Ok(())
    }

    async fn detach_port(&mut self, bridge: &str, port: &str) -> ReconcileResult<()> {
        let op = PlatformOp::DetachPort {
            bridge: bridge.to_string(),
            port: port.to_string(),
        };
        self.require_bridge(&op, bridge)?;
        if !self.bridge_members(bridge).iter().any(|m| m == port) {
            return Err(fail(&op, format!("'{}' is not a member", port)));
        }
        self.record(op)?;
        if let Some(members) = self.bridges.get_mut(bridge) {
            members.retain(|m| m != port);
        }
        Ok(())
    }

    async fn add_address(&mut self, link: &str, cidr: &Ipv4Cidr) -> ReconcileResult<()> {
        let op = PlatformOp::AddAddress {
            link: link.to_string(),
            cidr: cidr.to_string(),
        };
        self.require_link(&op, link)?;
        self.record(op)?;
        self.addresses.push((link.to_string(), cidr.to_string()));
        Ok(())
    }

    async fn add_route(&mut self, destination: &str, gateway: &str) -> ReconcileResult<()> {
        self.record(PlatformOp::AddRoute {
            destination: destination.to_string(),
            gateway: gateway.to_string(),
        })?;
        self.routes
            .push((destination.to_string(), gateway.to_string()));
        Ok(())
    }

    async fn configure_connection(
        &mut self,
        name: &str,
        params: &ConnectionParams,
    ) -> ReconcileResult<()> {
        let op = PlatformOp::ConfigureConnection(name.to_string());
        self.require_link(&op, name)?;
        self.record(op)?;
        self.connections.insert(name.to_string(), *params);
        Ok(())
    }
}

#[async_trait]
impl AclOps for RecordingPlatform {
    async fn find_acl_table(&mut self, name: &str) -> ReconcileResult<Option<AclTableId>> {
        self.record(PlatformOp::FindAclTable(name.to_string()))?;
        Ok(self
            .acl_tables
            .iter()
            .find(|(_, t)| t.spec.name == name)
            .map(|(id, _)| id.clone()))
    }

    async fn create_acl_table(&mut self, spec: &AclTableSpec) -> ReconcileResult<AclTableId> {
        let op = PlatformOp::CreateAclTable(spec.name.clone());
        if self.acl_table(&spec.name).is_some() {
            return Err(fail(&op, "table already exists"));
        }
        self.record(op)?;
        let table_id = self.allocate_id("table");
        self.acl_tables.insert(
            table_id.clone(),
            RecordedAclTable {
                spec: spec.clone(),
                entries: Vec::new(),
            },
        );
        Ok(table_id)
    }

    async fn delete_acl_table(&mut self, table_id: &AclTableId) -> ReconcileResult<()> {
        let op = PlatformOp::DeleteAclTable(table_id.clone());
        self.require_table(&op, table_id)?;
        if self
            .acl_tables
            .get(table_id)
            .is_some_and(|t| !t.entries.is_empty())
        {
            return Err(fail(&op, "table still has entries"));
        }
        self.record(op)?;
        self.acl_tables.remove(table_id);
        Ok(())
    }

    async fn list_acl_entries(&mut self, table_id: &AclTableId) -> ReconcileResult<Vec<AclEntry>> {
        let op = PlatformOp::ListAclEntries(table_id.clone());
        self.require_table(&op, table_id)?;
        self.record(op)?;
        Ok(self
            .acl_tables
            .get(table_id)
            .map(|t| {
                t.entries
                    .iter()
                    .map(|(id, _)| AclEntry { id: id.clone() })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_acl_entry(&mut self, spec: &AclEntrySpec) -> ReconcileResult<AclEntryId> {
        let op = PlatformOp::CreateAclEntry {
            table_id: spec.table_id.clone(),
            name: spec.name.clone(),
        };
        self.require_table(&op, &spec.table_id)?;
        self.record(op)?;
        let entry_id = self.allocate_id("entry");
        if let Some(table) = self.acl_tables.get_mut(&spec.table_id) {
            table.entries.push((entry_id.clone(), spec.clone()));
        }
        Ok(entry_id)
    }

    async fn delete_acl_entry(
        &mut self,
        table_id: &AclTableId,
        entry_id: &AclEntryId,
    ) -> ReconcileResult<()> {
        let op = PlatformOp::DeleteAclEntry {
            table_id: table_id.clone(),
            entry_id: entry_id.clone(),
        };
        self.require_table(&op, table_id)?;
        let known = self
            .acl_tables
            .get(table_id)
            .is_some_and(|t| t.entries.iter().any(|(id, _)| id == entry_id));
        if !known {
            return Err(fail(&op, "no such entry"));
        }
        self.record(op)?;
        if let Some(table) = self.acl_tables.get_mut(table_id) {
            table.entries.retain(|(id, _)| id != entry_id);
        }
        Ok(())
    }
}
