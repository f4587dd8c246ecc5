//! ACL table and entry specifications.
//!
//! Stages, match fields and actions are closed enumerations with explicit
//! wire values for platforms that program ACLs by integer attribute.

use std::fmt;
use std::net::Ipv4Addr;

use vlanrecon_types::Ipv4Cidr;

/// ACL table identifier assigned by the platform on commit.
pub type AclTableId = String;

/// ACL entry identifier assigned by the platform on commit.
pub type AclEntryId = String;

/// ACL priority (u32, higher = more specific).
pub type AclPriority = u32;

/// ACL stage. Isolation tables only ever filter on ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AclStage {
    #[default]
    Ingress,
}

impl AclStage {
    pub const fn wire_value(&self) -> u32 {
        match self {
            Self::Ingress => 1,
        }
    }
}

impl fmt::Display for AclStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => write!(f, "INGRESS"),
        }
    }
}

/// ACL match field types used by isolation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AclMatchField {
    SrcIp,
    DstIp,
}

impl AclMatchField {
    pub const fn wire_value(&self) -> u32 {
        match self {
            Self::SrcIp => 5,
            Self::DstIp => 6,
        }
    }
}

impl fmt::Display for AclMatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SrcIp => write!(f, "SRC_IP"),
            Self::DstIp => write!(f, "DST_IP"),
        }
    }
}

/// ACL action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclActionType {
    /// Packet action.
    PacketAction,
}

impl AclActionType {
    pub const fn wire_value(&self) -> u32 {
        match self {
            Self::PacketAction => 3,
        }
    }
}

impl fmt::Display for AclActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PacketAction => write!(f, "PACKET_ACTION"),
        }
    }
}

/// Packet action values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AclPacketAction {
    #[default]
    Drop,
}

impl AclPacketAction {
    pub const fn wire_value(&self) -> u32 {
        match self {
            Self::Drop => 1,
        }
    }

    /// Returns the iptables jump target for this action.
    pub const fn iptables_target(&self) -> &'static str {
        match self {
            Self::Drop => "DROP",
        }
    }
}

impl fmt::Display for AclPacketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "DROP"),
        }
    }
}

/// Definition of an ACL table to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclTableSpec {
    pub name: String,
    pub stage: AclStage,
    pub priority: AclPriority,
    pub match_fields: Vec<AclMatchField>,
}

/// An IPv4 subnet match (network address and dotted netmask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AclSubnetMatch {
    pub field: AclMatchField,
    pub network: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl AclSubnetMatch {
    /// Creates a match from a CIDR, keeping its address as written.
    pub fn new(field: AclMatchField, cidr: &Ipv4Cidr) -> Self {
        Self {
            field,
            network: cidr.address(),
            netmask: cidr.netmask(),
        }
    }

    pub fn src_ip(cidr: &Ipv4Cidr) -> Self {
        Self::new(AclMatchField::SrcIp, cidr)
    }

    pub fn dst_ip(cidr: &Ipv4Cidr) -> Self {
        Self::new(AclMatchField::DstIp, cidr)
    }
}

impl fmt::Display for AclSubnetMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}/{}", self.field, self.network, self.netmask)
    }
}

/// Definition of an ACL entry to be committed into an existing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntrySpec {
    pub table_id: AclTableId,
    /// Human readable label, e.g. "red->blue".
    pub name: String,
    pub priority: AclPriority,
    pub matches: Vec<AclSubnetMatch>,
    pub action: AclPacketAction,
}

impl AclEntrySpec {
    /// Returns the match for a field, if present.
    pub fn match_for(&self, field: AclMatchField) -> Option<&AclSubnetMatch> {
        self.matches.iter().find(|m| m.field == field)
    }
}

/// An entry reported by the platform as installed in a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub id: AclEntryId,
}
