//! Test infrastructure for vlanrecon
//!
//! Provides:
//! - An in-memory [`RecordingPlatform`] that keeps link, bridge and ACL state
//!   and logs every primitive call
//! - Schema fixtures for common topologies
//! - Verification helpers over the operation log and resulting state

pub mod fixtures;
mod recording;
mod verification;

pub use fixtures::*;
pub use recording::{BridgeNaming, PlatformOp, RecordedAclTable, RecordingPlatform};
pub use verification::*;
