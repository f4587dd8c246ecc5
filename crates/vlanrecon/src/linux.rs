//! Generic Linux platform adapter.
//!
//! Links and addresses go through `ip`, bridges through `brctl`, link
//! parameters through `ethtool`. The isolation table is an iptables chain
//! hooked from FORWARD; entry ids are the chain's rule specifications, and
//! entry priority has no effect since all rules in the chain are drops.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use vlanrecon_common::{
    AclEntry, AclEntryId, AclEntrySpec, AclOps, AclTableId, AclTableSpec, BridgeMembers,
    CommandRunner, LinkOps, LinkState, OpKind, PortTagging, ReconcileError, ReconcileResult,
};
use vlanrecon_types::{ConnectionParams, Ipv4Cidr, VlanId};

use crate::commands;

/// Kernel interface registry.
pub const SYSFS_NET_DIR: &str = "/sys/class/net";

/// Per-interface IPv4 settings.
pub const PROC_IPV4_CONF_DIR: &str = "/proc/sys/net/ipv4/conf";

/// Reads interface names from a sysfs-style directory.
pub(crate) async fn read_interface_dir(dir: &Path) -> ReconcileResult<BTreeSet<String>> {
    let target = dir.display().to_string();
    let read_err = |e: std::io::Error| {
        ReconcileError::op_failed(OpKind::Link, "list_interfaces", target.as_str(), e.to_string())
    };

    let mut names = BTreeSet::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Adapter for a plain Linux box.
#[derive(Debug)]
pub struct LinuxPlatform {
    runner: CommandRunner,
    sysfs_net: PathBuf,
    proc_ipv4_conf: PathBuf,
}

impl LinuxPlatform {
    pub fn new(runner: CommandRunner) -> Self {
        Self {
            runner,
            sysfs_net: PathBuf::from(SYSFS_NET_DIR),
            proc_ipv4_conf: PathBuf::from(PROC_IPV4_CONF_DIR),
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

    fn multicast_snooping_path(&self, bridge: &str) -> String {
        self.sysfs_net
            .join(bridge)
            .join("bridge")
            .join("multicast_snooping")
            .display()
            .to_string()
    }

    fn proxy_arp_path(&self, link: &str) -> String {
        self.proc_ipv4_conf
            .join(link)
            .join("proxy_arp")
            .display()
            .to_string()
    }
}

#[async_trait]
impl LinkOps for LinuxPlatform {
    fn platform_name(&self) -> &str {
        "linux"
    }

    fn bridge_name(&self, vlan_name: &str, _vlan_id: VlanId) -> String {
        vlan_name.to_string()
    }

    async fn list_interfaces(&mut self) -> ReconcileResult<BTreeSet<String>> {
        read_interface_dir(&self.sysfs_net).await
    }

    async fn query_bridge_members(&mut self, name: &str) -> ReconcileResult<BridgeMembers> {
        let result = self
            .runner
            .query(&commands::build_show_bridge_cmd(name))
            .await?;
        if !result.success() || !result.stderr.is_empty() {
            debug!(link = %name, "Not a bridge");
            return Ok(BridgeMembers::NotABridge);
        }

        Ok(match commands::parse_brctl_show(name, &result.stdout) {
            Some(members) => BridgeMembers::Bridge(members),
            None => BridgeMembers::NotABridge,
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
        let name = commands::tagged_link_name(parent, vlan_id);
        let cmd = commands::build_add_tagged_link_cmd(parent, vlan_id);
        self.run_checked(OpKind::Link, "create_tagged_link", &name, &cmd)
            .await?;
        Ok(name)
    }

    async fn create_bridge(&mut self, name: &str, _vlan_id: VlanId) -> ReconcileResult<()> {
        let cmd = commands::build_add_bridge_cmd(name);
        self.run_checked(OpKind::Bridge, "create_bridge", name, &cmd)
            .await?;
        Ok(())
    }

    async fn delete_bridge(&mut self, name: &str) -> ReconcileResult<()> {
        let cmd = commands::build_delete_bridge_cmd(name);
        self.run_checked(OpKind::Bridge, "delete_bridge", name, &cmd)
            .await?;
        Ok(())
    }

    async fn set_multicast_snooping(
        &mut self,
        bridge: &str,
        enabled: bool,
    ) -> ReconcileResult<()> {
        let cmd = commands::build_write_flag_cmd(&self.multicast_snooping_path(bridge), enabled);
        self.run_checked(OpKind::Bridge, "set_multicast_snooping", bridge, &cmd)
            .await?;
        Ok(())
    }

    async fn set_proxy_arp(&mut self, link: &str, enabled: bool) -> ReconcileResult<()> {
        let cmd = commands::build_write_flag_cmd(&self.proxy_arp_path(link), enabled);
        self.run_checked(OpKind::Link, "set_proxy_arp", link, &cmd)
            .await?;
        Ok(())
    }

    async fn attach_port(
        &mut self,
        bridge: &str,
        port: &str,
        _tagging: PortTagging,
    ) -> ReconcileResult<()> {
        let cmd = commands::build_add_bridge_port_cmd(bridge, port);
        self.run_checked(OpKind::Bridge, "attach_port", port, &cmd)
            .await?;
        Ok(())
    }

    async fn detach_port(&mut self, bridge: &str, port: &str) -> ReconcileResult<()> {
        let cmd = commands::build_delete_bridge_port_cmd(bridge, port);
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
        for cmd in commands::build_connection_cmds(name, params) {
            self.run_checked(OpKind::Link, "configure_connection", name, &cmd)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AclOps for LinuxPlatform {
    async fn find_acl_table(&mut self, name: &str) -> ReconcileResult<Option<AclTableId>> {
        let result = self
            .runner
            .query(&commands::build_list_chain_cmd(name))
            .await?;
        Ok(result.success().then(|| name.to_string()))
    }

    async fn create_acl_table(&mut self, spec: &AclTableSpec) -> ReconcileResult<AclTableId> {
        debug!(
            table = %spec.name,
            stage = %spec.stage,
            priority = spec.priority,
            "Creating isolation chain"
        );
        let cmd = commands::build_create_chain_cmd(&spec.name);
        self.run_checked(OpKind::Acl, "create_acl_table", &spec.name, &cmd)
            .await?;
        Ok(spec.name.clone())
    }

    async fn delete_acl_table(&mut self, table_id: &AclTableId) -> ReconcileResult<()> {
        let cmd = commands::build_delete_chain_cmd(table_id);
        self.run_checked(OpKind::Acl, "delete_acl_table", table_id, &cmd)
            .await?;
        Ok(())
    }

    async fn list_acl_entries(&mut self, table_id: &AclTableId) -> ReconcileResult<Vec<AclEntry>> {
        let cmd = commands::build_list_chain_cmd(table_id);
        let result = self.runner.query(&cmd).await?;
        let result = result.check(OpKind::Acl, "list_acl_entries", table_id, &cmd)?;
        Ok(commands::parse_chain_rules(table_id, &result.stdout)
            .into_iter()
            .map(|id| AclEntry { id })
            .collect())
    }

    async fn create_acl_entry(&mut self, spec: &AclEntrySpec) -> ReconcileResult<AclEntryId> {
        let rule = commands::rule_spec(spec);
        let cmd = commands::build_append_rule_cmd(&spec.table_id, &rule);
        self.run_checked(OpKind::Acl, "create_acl_entry", &spec.name, &cmd)
            .await?;
        Ok(rule)
    }

    async fn delete_acl_entry(
        &mut self,
        table_id: &AclTableId,
        entry_id: &AclEntryId,
    ) -> ReconcileResult<()> {
        let cmd = commands::build_delete_rule_cmd(table_id, entry_id);
        self.run_checked(OpKind::Acl, "delete_acl_entry", entry_id, &cmd)
            .await?;
        Ok(())
    }
}
