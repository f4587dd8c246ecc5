//! Verification helpers for reconciliation tests
//!
//! Checks the final state and the operation log of a [`RecordingPlatform`].

use thiserror::Error;
use vlanrecon_common::{AclMatchField, LinkState};

use crate::recording::{PlatformOp, RecordingPlatform};

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Expected link '{name}' to exist")]
    LinkMissing { name: String },

    #[error("Expected link '{name}' to be gone")]
    LinkPresent { name: String },

    #[error("Link '{name}' is {actual}, expected {expected}")]
    LinkStateMismatch {
        name: String,
        expected: LinkState,
        actual: String,
    },

    #[error("Bridge '{bridge}' members {actual:?}, expected {expected:?}")]
    MembersMismatch {
        bridge: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("ACL table '{table}' has no drop entry {src} -> {dst}")]
    DropEntryMissing {
        table: String,
        src: String,
        dst: String,
    },

    #[error("Expected {expected} operations matching '{what}', found {actual}")]
    OpCountMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Operation '{later}' at {later_index} precedes '{earlier}' at {earlier_index}")]
    OrderViolation {
        earlier: String,
        earlier_index: usize,
        later: String,
        later_index: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Platform state verification helper
pub struct StateVerifier<'a> {
    platform: &'a RecordingPlatform,
}

impl<'a> StateVerifier<'a> {
    pub fn new(platform: &'a RecordingPlatform) -> Self {
        Self { platform }
    }

    pub fn assert_link_exists(&self, name: &str) -> VerifyResult<()> {
        if !self.platform.has_link(name) {
            return Err(VerificationError::LinkMissing {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn assert_link_absent(&self, name: &str) -> VerifyResult<()> {
        if self.platform.has_link(name) {
            return Err(VerificationError::LinkPresent {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn assert_link_up(&self, name: &str) -> VerifyResult<()> {
        match self.platform.link_state(name) {
            Some(LinkState::Up) => Ok(()),
            Some(state) => Err(VerificationError::LinkStateMismatch {
                name: name.to_string(),
                expected: LinkState::Up,
                actual: state.to_string(),
            }),
            None => Err(VerificationError::LinkMissing {
                name: name.to_string(),
            }),
        }
    }

    /// Verifies bridge membership, ignoring member order.
    pub fn assert_members(&self, bridge: &str, expected: &[&str]) -> VerifyResult<()> {
        let mut actual = self.platform.bridge_members(bridge);
        actual.sort();
        let mut wanted: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        wanted.sort();
        if actual != wanted {
            return Err(VerificationError::MembersMismatch {
                bridge: bridge.to_string(),
                expected: wanted,
                actual,
            });
        }
        Ok(())
    }

    /// Verifies that `table` drops traffic from network `src` to network `dst`.
    pub fn assert_drops(&self, table: &str, src: &str, dst: &str) -> VerifyResult<()> {
        let found = self.platform.acl_entries(table).iter().any(|entry| {
            let network = |field| {
                entry
                    .match_for(field)
                    .map(|m| m.network.to_string())
                    .unwrap_or_default()
            };
            network(AclMatchField::SrcIp) == src && network(AclMatchField::DstIp) == dst
        });
        if !found {
            return Err(VerificationError::DropEntryMissing {
                table: table.to_string(),
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
        Ok(())
    }
}

/// Operation log verification helper
pub struct OpLogVerifier<'a> {
    ops: &'a [PlatformOp],
}

impl<'a> OpLogVerifier<'a> {
    pub fn new(platform: &'a RecordingPlatform) -> Self {
        Self {
            ops: platform.ops(),
        }
    }

    /// Verifies how many logged operations have the given primitive name.
    pub fn assert_count(&self, name: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.ops.iter().filter(|op| op.name() == name).count();
        if actual != expected {
            return Err(VerificationError::OpCountMismatch {
                what: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn assert_no_destructive(&self) -> VerifyResult<()> {
        let actual = self.ops.iter().filter(|op| op.is_destructive()).count();
        if actual != 0 {
            return Err(VerificationError::OpCountMismatch {
                what: "destructive".to_string(),
                expected: 0,
                actual,
            });
        }
        Ok(())
    }

    /// Verifies that the last `earlier` op comes before the first `later` op.
    pub fn assert_all_before(&self, earlier: &str, later: &str) -> VerifyResult<()> {
        let last_earlier = self.ops.iter().rposition(|op| op.name() == earlier);
        let first_later = self.ops.iter().position(|op| op.name() == later);
        match (last_earlier, first_later) {
            (Some(earlier_index), Some(later_index)) if later_index < earlier_index => {
                Err(VerificationError::OrderViolation {
                    earlier: earlier.to_string(),
                    earlier_index,
                    later: later.to_string(),
                    later_index,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vlanrecon_common::LinkOps;

    #[tokio::test]
    async fn test_state_verifier() {
        let mut platform = RecordingPlatform::new()
            .with_interfaces(["eth1", "eth0"])
            .with_bridge("red", ["eth1", "eth0"]);
        platform.set_link_state("eth0", LinkState::Up).await.unwrap();

        let verifier = StateVerifier::new(&platform);
        verifier.assert_members("red", &["eth0", "eth1"]).unwrap();
        verifier.assert_link_up("eth0").unwrap();
        assert!(matches!(
            verifier.assert_link_up("eth1"),
            Err(VerificationError::LinkStateMismatch { .. })
        ));
        assert!(verifier.assert_link_absent("eth2").is_ok());
    }

    #[tokio::test]
    async fn test_order_violation() {
        let mut platform = RecordingPlatform::new().with_interfaces(["eth0"]);
        platform.set_link_state("eth0", LinkState::Up).await.unwrap();
        platform.delete_link("eth0").await.unwrap();

        let verifier = OpLogVerifier::new(&platform);
        verifier.assert_all_before("set_link_state", "delete_link").unwrap();
        assert!(verifier
            .assert_all_before("delete_link", "set_link_state")
            .is_err());
        verifier.assert_count("delete_link", 1).unwrap();
        assert!(verifier.assert_no_destructive().is_err());
    }
}
