//! Shared infrastructure for VLAN topology reconciliation.
//!
//! - [`error`]: the fatal error taxonomy of a reconciliation run
//! - [`shell`]: command execution with proper quoting and dry-run support
//! - [`platform`]: the [`LinkOps`] / [`AclOps`] adapter traits
//! - [`acl`]: ACL table and entry specifications
//!
//! # Architecture
//!
//! A reconciliation run follows this pattern:
//!
//! 1. Tear down every non-reserved link, bridge and the isolation ACL table
//! 2. Create VLAN bridges, routes and port memberships from the schema
//! 3. Compile the VLAN isolation matrix into drop entries
//!
//! Steps 1-3 only ever talk to a [`Platform`], so the same driver runs on any
//! switch flavour that implements the traits.

pub mod acl;
pub mod error;
pub mod platform;
pub mod shell;

// Re-export commonly used items at crate root
pub use acl::{
    AclActionType, AclEntry, AclEntryId, AclEntrySpec, AclMatchField, AclPacketAction,
    AclPriority, AclStage, AclSubnetMatch, AclTableId, AclTableSpec,
};
pub use error::{OpKind, ReconcileError, ReconcileResult};
pub use platform::{AclOps, BridgeMembers, LinkOps, LinkState, Platform, PortTagging};
pub use shell::{CommandRunner, ExecMode, ExecResult};
