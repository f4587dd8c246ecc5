//! Link inventory: what exists on the box right now.

use std::collections::BTreeSet;
use tracing::debug;

use vlanrecon_common::{LinkOps, ReconcileResult};

/// Separator between a parent interface and its VLAN tag (`eth0.20`).
pub const TAG_SEPARATOR: char = '.';

/// How teardown should treat a live interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// `<base>.<tag>`: a virtual link owned by this system.
    TaggedSubinterface,
    /// A bridge with its member ports.
    Bridge(Vec<String>),
    /// A physical port; never removed.
    Port,
}

/// Returns true if the name splits into exactly `<base>.<tag>`.
pub fn is_tagged_subinterface(name: &str) -> bool {
    name.split(TAG_SEPARATOR).count() == 2
}

/// Enumerates every live interface, sorted by name.
pub async fn list_interfaces<P>(platform: &mut P) -> ReconcileResult<BTreeSet<String>>
where
    P: LinkOps + ?Sized,
{
    let names = platform.list_interfaces().await?;
    debug!(count = names.len(), "Enumerated interfaces");
    Ok(names)
}

/// Returns the member ports of a bridge, or nothing for a non-bridge.
pub async fn bridge_members<P>(platform: &mut P, name: &str) -> ReconcileResult<Vec<String>>
where
    P: LinkOps + ?Sized,
{
    Ok(platform.query_bridge_members(name).await?.into_members())
}

/// Classifies a live interface. Tagged sub-interfaces are recognised by name
/// alone; everything else is asked about bridge membership.
pub async fn classify<P>(platform: &mut P, name: &str) -> ReconcileResult<LinkKind>
where
    P: LinkOps + ?Sized,
{
    if is_tagged_subinterface(name) {
        return Ok(LinkKind::TaggedSubinterface);
    }

    // An empty bridge is still a bridge, so ask before taking the members
    let membership = platform.query_bridge_members(name).await?;
    Ok(if membership.is_bridge() {
        LinkKind::Bridge(membership.into_members())
    } else {
        LinkKind::Port
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vlanrecon_test::RecordingPlatform;

    #[test]
    fn test_is_tagged_subinterface() {
        assert!(is_tagged_subinterface("eth0.20"));
        assert!(is_tagged_subinterface("e101-001-0.100"));
        assert!(!is_tagged_subinterface("eth0"));
        assert!(!is_tagged_subinterface("eth0.20.30"));
        assert!(!is_tagged_subinterface("br20"));
    }

    #[tokio::test]
    async fn test_bridge_members_for_non_bridge_is_empty() {
        let mut platform = RecordingPlatform::new().with_interfaces(["eth0"]);
        assert!(bridge_members(&mut platform, "eth0").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_members_in_reported_order() {
        let mut platform = RecordingPlatform::new()
            .with_interfaces(["eth0", "eth1"])
            .with_bridge("red", ["eth1", "eth0"]);
        assert_eq!(
            bridge_members(&mut platform, "red").await.unwrap(),
            ["eth1", "eth0"]
        );
    }

    #[tokio::test]
    async fn test_classify() {
        let mut platform = RecordingPlatform::new()
            .with_interfaces(["eth0", "eth1"])
            .with_bridge("red", ["eth0"])
            .with_bridge("idle", Vec::<&str>::new())
            .with_tagged_link("eth1", 20);

        assert_eq!(
            classify(&mut platform, "red").await.unwrap(),
            LinkKind::Bridge(vec!["eth0".to_string()])
        );
        assert_eq!(classify(&mut platform, "eth0").await.unwrap(), LinkKind::Port);
        assert_eq!(
            classify(&mut platform, "idle").await.unwrap(),
            LinkKind::Bridge(Vec::new())
        );
        assert_eq!(
            classify(&mut platform, "eth1.20").await.unwrap(),
            LinkKind::TaggedSubinterface
        );
    }

    #[tokio::test]
    async fn test_list_interfaces_sorted() {
        let mut platform = RecordingPlatform::new().with_interfaces(["eth1", "eth0", "lo"]);
        let names: Vec<_> = list_interfaces(&mut platform)
            .await
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(names, ["eth0", "eth1", "lo"]);
    }
}
