//! Error types for reconciliation runs.
//!
//! Every primitive failure is fatal: the variants below carry enough context
//! (operation and target) for the top-level run to report the failing step.

use std::fmt;
use std::io;
use thiserror::Error;
use vlanrecon_types::ParseError;

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Category of a platform primitive, used to pick the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Link,
    Bridge,
    Addr,
    Route,
    Acl,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpKind::Link => "link",
            OpKind::Bridge => "bridge",
            OpKind::Addr => "address",
            OpKind::Route => "route",
            OpKind::Acl => "acl",
        };
        f.write_str(s)
    }
}

/// Errors that can abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Failed to spawn a shell command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Link state change, link deletion or tagged link creation failed.
    #[error("Link operation {operation} failed on '{target}': {message}")]
    LinkOpFailed {
        operation: String,
        target: String,
        message: String,
    },

    /// Bridge creation, deletion or membership change failed.
    #[error("Bridge operation {operation} failed on '{target}': {message}")]
    BridgeOpFailed {
        operation: String,
        target: String,
        message: String,
    },

    /// Address assignment failed.
    #[error("Address operation {operation} failed on '{target}': {message}")]
    AddrOpFailed {
        operation: String,
        target: String,
        message: String,
    },

    /// Route installation failed.
    #[error("Route operation {operation} failed for '{target}': {message}")]
    RouteOpFailed {
        operation: String,
        target: String,
        message: String,
    },

    /// An ACL table or entry commit did not succeed.
    #[error("ACL commit {operation} failed for '{target}': {message}")]
    AclCommitFailed {
        operation: String,
        target: String,
        message: String,
    },

    /// A CIDR value could not be parsed.
    #[error("Invalid CIDR for {context}: {source}")]
    InvalidCidr {
        context: String,
        #[source]
        source: ParseError,
    },

    /// The schema references a VLAN that is undeclared or unusable here.
    #[error("Schema reference error: vlan '{vlan}' {reason}")]
    SchemaReference { vlan: String, reason: String },

    /// The schema file could not be read or typed.
    #[error("Failed to load schema '{path}': {message}")]
    SchemaLoad { path: String, message: String },

    /// Missing or conflicting command-line arguments.
    #[error("Usage error: {message}")]
    Usage { message: String },
}

impl ReconcileError {
    /// Creates the error variant matching a failed primitive.
    pub fn op_failed(
        kind: OpKind,
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let target = target.into();
        let message = message.into();
        match kind {
            OpKind::Link => Self::LinkOpFailed {
                operation,
                target,
                message,
            },
            OpKind::Bridge => Self::BridgeOpFailed {
                operation,
                target,
                message,
            },
            OpKind::Addr => Self::AddrOpFailed {
                operation,
                target,
                message,
            },
            OpKind::Route => Self::RouteOpFailed {
                operation,
                target,
                message,
            },
            OpKind::Acl => Self::AclCommitFailed {
                operation,
                target,
                message,
            },
        }
    }

    /// Creates an ACL commit error.
    pub fn acl_commit(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::op_failed(OpKind::Acl, operation, target, message)
    }

    /// Creates an invalid CIDR error.
    pub fn invalid_cidr(context: impl Into<String>, source: ParseError) -> Self {
        Self::InvalidCidr {
            context: context.into(),
            source,
        }
    }

    /// Creates an error for a reference to an undeclared VLAN.
    pub fn undeclared_vlan(vlan: impl Into<String>, referenced_by: impl fmt::Display) -> Self {
        Self::SchemaReference {
            vlan: vlan.into(),
            reason: format!("is not declared (referenced by {})", referenced_by),
        }
    }

    /// Creates an error for a VLAN used by the ACL section without an address.
    pub fn vlan_without_address(vlan: impl Into<String>) -> Self {
        Self::SchemaReference {
            vlan: vlan.into(),
            reason: "has no ip but is used by acl isolation".to_string(),
        }
    }

    /// Creates a schema load error.
    pub fn schema_load(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::SchemaLoad {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Returns the primitive category for operation failures.
    pub fn op_kind(&self) -> Option<OpKind> {
        match self {
            Self::LinkOpFailed { .. } => Some(OpKind::Link),
            Self::BridgeOpFailed { .. } => Some(OpKind::Bridge),
            Self::AddrOpFailed { .. } => Some(OpKind::Addr),
            Self::RouteOpFailed { .. } => Some(OpKind::Route),
            Self::AclCommitFailed { .. } => Some(OpKind::Acl),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_op_failed_picks_variant() {
        let err = ReconcileError::op_failed(OpKind::Bridge, "create_bridge", "red", "exists");
        assert!(matches!(err, ReconcileError::BridgeOpFailed { .. }));
        assert_eq!(err.op_kind(), Some(OpKind::Bridge));
        assert_eq!(
            err.to_string(),
            "Bridge operation create_bridge failed on 'red': exists"
        );
    }

    #[test]
    fn test_acl_commit_display() {
        let err = ReconcileError::acl_commit("create_acl_entry", "red->blue", "rejected");
        assert_eq!(
            err.to_string(),
            "ACL commit create_acl_entry failed for 'red->blue': rejected"
        );
    }

    #[test]
    fn test_schema_reference_display() {
        let err = ReconcileError::undeclared_vlan("green", "interface eth0");
        assert_eq!(
            err.to_string(),
            "Schema reference error: vlan 'green' is not declared (referenced by interface eth0)"
        );
        assert_eq!(err.op_kind(), None);
    }

    #[test]
    fn test_invalid_cidr_display() {
        let err = ReconcileError::invalid_cidr(
            "vlan red",
            ParseError::InvalidCidr("10.0.0.0/33".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Invalid CIDR for vlan red: invalid CIDR: 10.0.0.0/33"
        );
    }
}
