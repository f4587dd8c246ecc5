//! Run configuration.

use clap::ValueEnum;
use std::fmt;

use vlanrecon_common::{AclPriority, ExecMode};

/// Fixed values shared by every run.
pub mod defaults {
    use vlanrecon_common::AclPriority;

    /// Interfaces never touched by teardown: loopback, the dummy placeholder
    /// and the network-processor control interface.
    pub const RESERVED_INTERFACES: [&str; 3] = ["lo", "dummy0", "npu-0"];

    /// Name of the ACL table holding the VLAN isolation rules.
    pub const ISOLATION_TABLE_NAME: &str = "VLAN_ISOLATION";

    /// Priority of the isolation table.
    pub const ISOLATION_TABLE_PRIORITY: AclPriority = 100;

    /// Priority shared by every isolation entry.
    pub const ISOLATION_ENTRY_PRIORITY: AclPriority = 10;
}

/// Which platform adapter drives the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PlatformKind {
    /// Generic Linux: ip, brctl, iptables, ethtool.
    #[default]
    Linux,
    /// OpenSwitch OPX: CPS VLAN and ACL objects, br<id> bridges.
    Opx,
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::Linux => f.write_str("linux"),
            PlatformKind::Opx => f.write_str("opx"),
        }
    }
}

/// Per-bridge tuning applied right after a VLAN bridge is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTuning {
    /// Turn multicast snooping off on every VLAN bridge.
    pub disable_multicast_snooping: bool,
    /// Turn proxy ARP on for every VLAN bridge.
    pub enable_proxy_arp: bool,
}

impl Default for BridgeTuning {
    fn default() -> Self {
        Self {
            disable_multicast_snooping: true,
            enable_proxy_arp: true,
        }
    }
}

/// Identity and priorities of the isolation ACL table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationSettings {
    pub table_name: String,
    pub table_priority: AclPriority,
    pub entry_priority: AclPriority,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            table_name: defaults::ISOLATION_TABLE_NAME.to_string(),
            table_priority: defaults::ISOLATION_TABLE_PRIORITY,
            entry_priority: defaults::ISOLATION_ENTRY_PRIORITY,
        }
    }
}

/// Configuration of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    pub platform: PlatformKind,
    pub exec_mode: ExecMode,
    pub reserved_interfaces: Vec<String>,
    pub bridge: BridgeTuning,
    pub isolation: IsolationSettings,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::default(),
            exec_mode: ExecMode::default(),
            reserved_interfaces: defaults::RESERVED_INTERFACES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bridge: BridgeTuning::default(),
            isolation: IsolationSettings::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn with_platform(mut self, platform: PlatformKind) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_exec_mode(mut self, exec_mode: ExecMode) -> Self {
        self.exec_mode = exec_mode;
        self
    }

    pub fn with_bridge_tuning(mut self, bridge: BridgeTuning) -> Self {
        self.bridge = bridge;
        self
    }

    /// Returns true if teardown must leave this interface alone.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_interfaces.iter().any(|r| r == name)
    }
}
