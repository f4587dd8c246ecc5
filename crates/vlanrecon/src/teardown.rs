//! Teardown engine.
//!
//! Returns the box to a clean slate: every non-reserved interface goes down,
//! tagged sub-interfaces are deleted, bridges are emptied and deleted, and
//! the isolation ACL table is removed with all its entries. Physical ports
//! are only brought down. Running teardown twice in a row is safe: the second
//! pass finds nothing left to delete.

use tracing::{debug, info, instrument};

use vlanrecon_common::{LinkState, Platform, ReconcileResult};

use crate::config::ReconcileConfig;
use crate::inventory::{self, LinkKind};

/// What a teardown pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub links_down: usize,
    pub tagged_links_deleted: Vec<String>,
    pub bridges_deleted: Vec<String>,
    pub ports_detached: usize,
    pub acl_entries_deleted: usize,
    pub acl_table_deleted: bool,
}

/// Tears down links and the isolation table, in that order.
#[instrument(skip_all, fields(platform = %platform.platform_name()))]
pub async fn teardown<P>(platform: &mut P, config: &ReconcileConfig) -> ReconcileResult<TeardownReport>
where
    P: Platform + ?Sized,
{
    let mut report = TeardownReport::default();

    teardown_links(platform, config, &mut report).await?;
    teardown_isolation_table(platform, config, &mut report).await?;

    info!(
        links_down = report.links_down,
        tagged_links_deleted = report.tagged_links_deleted.len(),
        bridges_deleted = report.bridges_deleted.len(),
        ports_detached = report.ports_detached,
        acl_entries_deleted = report.acl_entries_deleted,
        "Teardown complete"
    );
    Ok(report)
}

async fn teardown_links<P>(
    platform: &mut P,
    config: &ReconcileConfig,
    report: &mut TeardownReport,
) -> ReconcileResult<()>
where
    P: Platform + ?Sized,
{
    let names = inventory::list_interfaces(platform).await?;

    for name in names.iter().filter(|name| !config.is_reserved(name)) {
        platform.set_link_state(name, LinkState::Down).await?;
        report.links_down += 1;

        match inventory::classify(platform, name).await? {
            LinkKind::TaggedSubinterface => {
                info!(link = %name, "Deleting tagged sub-interface");
                platform.delete_link(name).await?;
                report.tagged_links_deleted.push(name.clone());
            }
            LinkKind::Bridge(members) => {
                info!(bridge = %name, members = members.len(), "Deleting bridge");
                for member in &members {
                    platform.detach_port(name, member).await?;
                    report.ports_detached += 1;
                }
                platform.delete_bridge(name).await?;
                report.bridges_deleted.push(name.clone());
            }
            LinkKind::Port => debug!(port = %name, "Leaving port in place"),
        }
    }

    Ok(())
}

async fn teardown_isolation_table<P>(
    platform: &mut P,
    config: &ReconcileConfig,
    report: &mut TeardownReport,
) -> ReconcileResult<()>
where
    P: Platform + ?Sized,
{
    let table_name = &config.isolation.table_name;
    let Some(table_id) = platform.find_acl_table(table_name).await? else {
        debug!(table = %table_name, "No isolation table installed");
        return Ok(());
    };

    let entries = platform.list_acl_entries(&table_id).await?;
    for entry in &entries {
        platform.delete_acl_entry(&table_id, &entry.id).await?;
        report.acl_entries_deleted += 1;
    }
    platform.delete_acl_table(&table_id).await?;
    report.acl_table_deleted = true;

    info!(
        table = %table_name,
        table_id = %table_id,
        entries = entries.len(),
        "Deleted isolation table"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vlanrecon_test::{PlatformOp, RecordingPlatform};

    #[tokio::test]
    async fn test_teardown_empty_box() {
        let mut platform = RecordingPlatform::new().with_interfaces(["lo"]);
        let report = teardown(&mut platform, &ReconcileConfig::default())
            .await
            .unwrap();
        assert_eq!(report, TeardownReport::default());
    }

    #[tokio::test]
    async fn test_teardown_bridge_detaches_members_first() {
        let mut platform = RecordingPlatform::new()
            .with_interfaces(["eth0", "eth1"])
            .with_bridge("red", ["eth0", "eth1"]);

        let report = teardown(&mut platform, &ReconcileConfig::default())
            .await
            .unwrap();

        assert_eq!(report.bridges_deleted, vec!["red".to_string()]);
        assert_eq!(report.ports_detached, 2);

        let destructive: Vec<_> = platform
            .ops()
            .iter()
            .filter(|op| op.is_destructive())
            .cloned()
            .collect();
        assert_eq!(
            destructive,
            vec![
                PlatformOp::DetachPort {
                    bridge: "red".to_string(),
                    port: "eth0".to_string()
                },
                PlatformOp::DetachPort {
                    bridge: "red".to_string(),
                    port: "eth1".to_string()
                },
                PlatformOp::DeleteBridge("red".to_string()),
            ]
        );
        assert!(platform.has_link("eth0"));
    }

    #[tokio::test]
    async fn test_teardown_empty_bridge_still_deleted() {
        let mut platform = RecordingPlatform::new().with_bridge("idle", Vec::<&str>::new());
        let report = teardown(&mut platform, &ReconcileConfig::default())
            .await
            .unwrap();
        assert_eq!(report.bridges_deleted, vec!["idle".to_string()]);
        assert!(!platform.has_link("idle"));
    }

    #[tokio::test]
    async fn test_teardown_removes_acl_entries_then_table() {
        let mut platform = RecordingPlatform::new().with_acl_table("VLAN_ISOLATION", 3);
        let report = teardown(&mut platform, &ReconcileConfig::default())
            .await
            .unwrap();

        assert_eq!(report.acl_entries_deleted, 3);
        assert!(report.acl_table_deleted);
        assert!(platform.acl_table("VLAN_ISOLATION").is_none());
        assert!(matches!(
            platform.ops().last(),
            Some(PlatformOp::DeleteAclTable(_))
        ));
    }

    #[tokio::test]
    async fn test_teardown_stops_on_first_failure() {
        let mut platform = RecordingPlatform::new()
            .with_interfaces(["eth0"])
            .with_tagged_link("eth0", 20)
            .with_tagged_link("eth0", 30)
            .failing_on("delete_link", "eth0.20");

        let err = teardown(&mut platform, &ReconcileConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("eth0.20"));
        assert!(platform.has_link("eth0.30"));
    }
}
