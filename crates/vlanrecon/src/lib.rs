//! vlanrecon - declarative VLAN topology reconciliation
//!
//! Brings a switch's bridges, tagged sub-interfaces, routes and VLAN
//! isolation ACLs in line with a YAML schema. Every run tears the managed
//! state down and rebuilds it from scratch.

pub mod cli;
pub mod commands;
pub mod config;
pub mod cps;
pub mod inventory;
pub mod isolation;
pub mod linux;
pub mod opx;
pub mod reconcile;
pub mod schema;
pub mod teardown;
pub mod topology;

pub use config::{BridgeTuning, IsolationSettings, PlatformKind, ReconcileConfig};
pub use isolation::{IsolationPlan, IsolationReport, VlanPair};
pub use linux::LinuxPlatform;
pub use opx::OpxPlatform;
pub use reconcile::{Reconciler, RunMode, RunSummary};
pub use schema::Schema;
pub use teardown::TeardownReport;
pub use topology::BuildReport;
