//! OpenSwitch OPX platform adapter.
//!
//! VLANs are CPS VLAN objects whose kernel bridges are named `br<id>`. Tagged
//! membership is a property of the port attachment, so no sub-interface is
//! created. Link state, addresses and routes still go through `ip`.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, instrument, warn};

use vlanrecon_common::{
    AclEntry, AclEntryId, AclEntrySpec, AclOps, AclTableId, AclTableSpec, BridgeMembers,
    CommandRunner, LinkOps, LinkState, OpKind, PortTagging, ReconcileError, ReconcileResult,
};
use vlanrecon_types::{ConnectionParams, Ipv4Cidr, VlanId};

use crate::commands;
use crate::cps::{self, attrs, FieldValuesExt};
use crate::linux::{read_interface_dir, PROC_IPV4_CONF_DIR, SYSFS_NET_DIR};

/// Placeholder id reported for objects that a dry run did not create.
pub const DRY_RUN_ID: &str = "<dry-run>";

/// Adapter for OPX switches.
#[derive(Debug)]
pub struct OpxPlatform {
    runner: CommandRunner,
    sysfs_net: PathBuf,
}

impl OpxPlatform {
    pub fn new(runner: CommandRunner) -> Self {
        Self {
            runner,
            sysfs_net: PathBuf::from(SYSFS_NET_DIR),
        }
    }

    /// Reads interfaces from `dir` instead of the live registry.
    pub fn with_sysfs_net(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sysfs_net = dir.into();
        self
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    async fn run_checked(
        &mut self,
        kind: OpKind,
        operation: &str,
        target: &str,
        cmd: &str,
    ) -> ReconcileResult<String> {
        let result = self.runner.run(cmd).await?;
        Ok(result.check(kind, operation, target, cmd)?.stdout)
    }

    /// Runs a CPS create and extracts the id the platform assigned.
    async fn create_object(
        &mut self,
        operation: &str,
        target: &str,
        cmd: &str,
        id_attr: &str,
    ) -> ReconcileResult<String> {
        let stdout = self.run_checked(OpKind::Acl, operation, target, cmd).await?;
        if self.runner.is_dry_run() {
            return Ok(DRY_RUN_ID.to_string());
        }

        cps::parse_fields(&stdout)
            .get_field(id_attr)
            .map(str::to_string)
            .ok_or_else(|| {
                ReconcileError::acl_commit(operation, target, format!("no {} in reply", id_attr))
            })
    }

    /// Resolves the CPS if-index of a port.
    async fn if_index(&mut self, name: &str) -> ReconcileResult<String> {
        let cmd = cps::build_get_interface_cmd(name);
        let result = self.runner.query(&cmd).await?;
        let fields = cps::parse_fields(&result.stdout);

        match fields.get_field(attrs::IF_INDEX) {
            Some(index) => Ok(index.to_string()),
            None if self.runner.is_dry_run() => {
                warn!(interface = %name, "No if-index found, using placeholder");
                Ok(DRY_RUN_ID.to_string())
            }
            None => Err(ReconcileError::op_failed(
                OpKind::Link,
                "configure_connection",
                name,
                format!("no if-index reported by '{}'", cmd),
            )),
        }
    }
}

#[async_trait]
impl LinkOps for OpxPlatform {
    fn platform_name(&self) -> &str {
        "opx"
    }

    fn bridge_name(&self, _vlan_name: &str, vlan_id: VlanId) -> String {
        cps::bridge_name(vlan_id)
    }

    async fn list_interfaces(&mut self) -> ReconcileResult<BTreeSet<String>> {
        read_interface_dir(&self.sysfs_net).await
    }

    /// CPS releases member ports when the VLAN is deleted, so bridges are
    /// reported without members.
    async fn query_bridge_members(&mut self, name: &str) -> ReconcileResult<BridgeMembers> {
        Ok(if cps::is_vlan_bridge(name) {
            BridgeMembers::Bridge(Vec::new())
        } else {
            BridgeMembers::NotABridge
        })
    }

    #[instrument(skip(self))]
    async fn set_link_state(&mut self, name: &str, state: LinkState) -> ReconcileResult<()> {
        let cmd = commands::build_set_link_state_cmd(name, state);
        self.run_checked(OpKind::Link, "set_link_state", name, &cmd)
            .await?;
        Ok(())
    }

    async fn delete_link(&mut self, name: &str) -> ReconcileResult<()> {
        let cmd = commands::build_delete_link_cmd(name);
        self.run_checked(OpKind::Link, "delete_link", name, &cmd)
            .await?;
        Ok(())
    }

    async fn create_tagged_link(
        &mut self,
        parent: &str,
        vlan_id: VlanId,
    ) -> ReconcileResult<String> {
        debug!(port = %parent, vlan_id = %vlan_id, "Tagged membership is set on attach");
        Ok(parent.to_string())
    }

    async fn create_bridge(&mut self, name: &str, vlan_id: VlanId) -> ReconcileResult<()> {
        let cmd = cps::build_add_vlan_cmd(vlan_id);
        self.run_checked(OpKind::Bridge, "create_bridge", name, &cmd)
            .await?;
        Ok(())
    }

    async fn delete_bridge(&mut self, name: &str) -> ReconcileResult<()> {
        let cmd = cps::build_delete_vlan_cmd(name);
        self.run_checked(OpKind::Bridge, "delete_bridge", name, &cmd)
            .await?;
        Ok(())
    }

    async fn set_multicast_snooping(
        &mut self,
        bridge: &str,
        enabled: bool,
    ) -> ReconcileResult<()> {
        let path = self
            .sysfs_net
            .join(bridge)
            .join("bridge")
            .join("multicast_snooping");
        let cmd = commands::build_write_flag_cmd(&path.display().to_string(), enabled);
        self.run_checked(OpKind::Bridge, "set_multicast_snooping", bridge, &cmd)
            .await?;
        Ok(())
    }

    async fn set_proxy_arp(&mut self, link: &str, enabled: bool) -> ReconcileResult<()> {
        let path = format!("{}/{}/proxy_arp", PROC_IPV4_CONF_DIR, link);
        let cmd = commands::build_write_flag_cmd(&path, enabled);
        self.run_checked(OpKind::Link, "set_proxy_arp", link, &cmd)
            .await?;
        Ok(())
    }

    async fn attach_port(
        &mut self,
        bridge: &str,
        port: &str,
        tagging: PortTagging,
    ) -> ReconcileResult<()> {
        let cmd = cps::build_add_vlan_port_cmd(bridge, port, tagging == PortTagging::Tagged);
        self.run_checked(OpKind::Bridge, "attach_port", port, &cmd)
            .await?;
        Ok(())
    }

    async fn detach_port(&mut self, bridge: &str, port: &str) -> ReconcileResult<()> {
        let cmd = cps::build_delete_vlan_port_cmd(bridge, port);
        self.run_checked(OpKind::Bridge, "detach_port", port, &cmd)
            .await?;
        Ok(())
    }

    async fn add_address(&mut self, link: &str, cidr: &Ipv4Cidr) -> ReconcileResult<()> {
        let cmd = commands::build_add_address_cmd(link, cidr);
        self.run_checked(OpKind::Addr, "add_address", link, &cmd)
            .await?;
        Ok(())
    }

    async fn add_route(&mut self, destination: &str, gateway: &str) -> ReconcileResult<()> {
        let cmd = commands::build_add_route_cmd(destination, gateway);
        self.run_checked(OpKind::Route, "add_route", destination, &cmd)
            .await?;
        Ok(())
    }

    async fn configure_connection(
        &mut self,
        name: &str,
        params: &ConnectionParams,
    ) -> ReconcileResult<()> {
        let if_index = self.if_index(name).await?;
        let cmd = cps::build_set_connection_cmd(&if_index, params);
        self.run_checked(OpKind::Link, "configure_connection", name, &cmd)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AclOps for OpxPlatform {
    async fn find_acl_table(&mut self, name: &str) -> ReconcileResult<Option<AclTableId>> {
        let result = self
            .runner
            .query(&cps::build_get_acl_table_cmd(name))
            .await?;
        if !result.success() {
            return Ok(None);
        }
        Ok(cps::parse_fields(&result.stdout)
            .get_field(attrs::ACL_TABLE_ID)
            .map(str::to_string))
    }

    async fn create_acl_table(&mut self, spec: &AclTableSpec) -> ReconcileResult<AclTableId> {
        let cmd = cps::build_create_acl_table_cmd(spec);
        self.create_object("create_acl_table", &spec.name, &cmd, attrs::ACL_TABLE_ID)
            .await
    }

    async fn delete_acl_table(&mut self, table_id: &AclTableId) -> ReconcileResult<()> {
        let cmd = cps::build_delete_acl_table_cmd(table_id);
        self.run_checked(OpKind::Acl, "delete_acl_table", table_id, &cmd)
            .await?;
        Ok(())
    }

    async fn list_acl_entries(&mut self, table_id: &AclTableId) -> ReconcileResult<Vec<AclEntry>> {
        let cmd = cps::build_get_acl_entries_cmd(table_id);
        let result = self.runner.query(&cmd).await?;
        let result = result.check(OpKind::Acl, "list_acl_entries", table_id, &cmd)?;
        Ok(cps::parse_fields(&result.stdout)
            .get_all(attrs::ACL_ENTRY_ID)
            .into_iter()
            .map(|id| AclEntry { id: id.to_string() })
            .collect())
    }

    async fn create_acl_entry(&mut self, spec: &AclEntrySpec) -> ReconcileResult<AclEntryId> {
        let cmd = cps::build_create_acl_entry_cmd(spec);
        self.create_object("create_acl_entry", &spec.name, &cmd, attrs::ACL_ENTRY_ID)
            .await
    }

    async fn delete_acl_entry(
        &mut self,
        table_id: &AclTableId,
        entry_id: &AclEntryId,
    ) -> ReconcileResult<()> {
        let cmd = cps::build_delete_acl_entry_cmd(table_id, entry_id);
        self.run_checked(OpKind::Acl, "delete_acl_entry", entry_id, &cmd)
            .await?;
        Ok(())
    }
}
