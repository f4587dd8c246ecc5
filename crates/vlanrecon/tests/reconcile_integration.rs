//! End-to-end reconciliation tests
//!
//! Drive a full teardown and rebuild against the in-memory platform and check
//! the resulting links, bridges and isolation entries.

use pretty_assertions::assert_eq;

use vlanrecon::isolation::{self, universe, whitelist};
use vlanrecon::{ReconcileConfig, Reconciler, RunMode, Schema};
use vlanrecon_common::{LinkState, ReconcileError};
use vlanrecon_test::{
    fixtures, OpLogVerifier, PlatformOp, RecordingPlatform, SchemaYaml, StateVerifier,
};

fn schema(yaml: &str) -> Schema {
    Schema::from_yaml_str(yaml, "test").expect("fixture schema must parse")
}

fn reconciler(platform: RecordingPlatform) -> Reconciler<RecordingPlatform> {
    Reconciler::new(platform, ReconcileConfig::default())
}

/// Scenario:
/// 1. A box left over from an earlier run: bridges, a tagged link, a table
/// 2. Apply the red/blue schema
/// 3. Verify the rebuilt topology and both drop directions
#[tokio::test]
async fn test_red_blue_end_to_end() {
    let platform = RecordingPlatform::new()
        .with_interfaces(["lo", "eth0", "eth1"])
        .with_tagged_link("eth1", 30)
        .with_bridge("green", ["eth1.30"])
        .with_bridge("red", ["eth0"])
        .with_acl_table("VLAN_ISOLATION", 4);
    let schema = schema(fixtures::RED_BLUE_SCHEMA);
    let mut reconciler = reconciler(platform);

    let summary = reconciler.run(RunMode::Apply(&schema)).await.unwrap();

    assert_eq!(
        summary.teardown.bridges_deleted,
        vec!["green".to_string(), "red".to_string()]
    );
    assert_eq!(summary.teardown.tagged_links_deleted, vec!["eth1.30".to_string()]);
    assert_eq!(summary.teardown.acl_entries_deleted, 4);

    let build = summary.build.unwrap();
    assert_eq!(build.bridges_created, vec!["red".to_string(), "blue".to_string()]);
    assert_eq!(build.tagged_links_created, vec!["eth0.20".to_string()]);

    let platform = reconciler.platform();
    let state = StateVerifier::new(platform);
    state.assert_link_absent("green").unwrap();
    state.assert_link_absent("eth1.30").unwrap();
    state.assert_members("red", &["eth0"]).unwrap();
    state.assert_members("blue", &["eth0.20"]).unwrap();
    state.assert_link_up("red").unwrap();
    state.assert_link_up("blue").unwrap();
    state.assert_link_up("eth0.20").unwrap();
    state.assert_link_up("eth0").unwrap();
    state.assert_drops("VLAN_ISOLATION", "10.0.10.0", "10.0.20.0").unwrap();
    state.assert_drops("VLAN_ISOLATION", "10.0.20.0", "10.0.10.0").unwrap();
    assert_eq!(platform.acl_entries("VLAN_ISOLATION").len(), 2);

    let log = OpLogVerifier::new(platform);
    log.assert_all_before("delete_acl_table", "create_bridge").unwrap();
    log.assert_all_before("create_bridge", "attach_port").unwrap();
    log.assert_all_before("attach_port", "create_acl_table").unwrap();
}

#[tokio::test]
async fn test_teardown_skips_reserved_interfaces() {
    let platform = RecordingPlatform::new()
        .with_interfaces(["lo", "dummy0", "npu-0", "eth0"])
        .with_bridge("red", ["eth0"]);
    let mut reconciler = reconciler(platform);

    let summary = reconciler.run(RunMode::DownOnly).await.unwrap();

    assert_eq!(summary.teardown.links_down, 2);
    let touched: Vec<_> = reconciler
        .platform()
        .ops()
        .iter()
        .filter_map(PlatformOp::target)
        .collect();
    for reserved in ["lo", "dummy0", "npu-0"] {
        assert!(!touched.contains(&reserved), "{} was touched", reserved);
    }
    assert_eq!(reconciler.platform().link_state("lo"), Some(LinkState::Down));
}

#[tokio::test]
async fn test_second_teardown_is_a_no_op() {
    let platform = RecordingPlatform::new()
        .with_interfaces(["eth0", "eth1"])
        .with_tagged_link("eth0", 20)
        .with_bridge("blue", ["eth0.20"])
        .with_bridge("red", ["eth0", "eth1"])
        .with_acl_table("VLAN_ISOLATION", 2);
    let mut reconciler = reconciler(platform);

    reconciler.run(RunMode::DownOnly).await.unwrap();
    let mut platform = reconciler.into_platform();
    platform.clear_ops();

    let mut reconciler = Reconciler::new(platform, ReconcileConfig::default());
    let summary = reconciler.run(RunMode::DownOnly).await.unwrap();

    assert!(summary.teardown.bridges_deleted.is_empty());
    assert!(!summary.teardown.acl_table_deleted);
    OpLogVerifier::new(reconciler.platform())
        .assert_no_destructive()
        .unwrap();
}

#[tokio::test]
async fn test_apply_twice_converges() {
    let yaml = SchemaYaml::new()
        .vlan("red", 10, Some("10.0.10.0/24"))
        .vlan("blue", 20, Some("10.0.20.0/24"))
        .vlan("green", 30, Some("10.0.30.0/24"))
        .access_port("eth0", "red", &["blue", "green"])
        .access_port("eth1", "green", &[])
        .allow("red", "blue")
        .build();
    let schema = schema(&yaml);
    let mut reconciler = reconciler(RecordingPlatform::new().with_interfaces(["eth0", "eth1"]));

    reconciler.run(RunMode::Apply(&schema)).await.unwrap();
    let first: Vec<_> = ["red", "blue", "green"]
        .iter()
        .map(|b| reconciler.platform().bridge_members(b))
        .collect();
    let first_entries = reconciler.platform().acl_entries("VLAN_ISOLATION").len();

    reconciler.run(RunMode::Apply(&schema)).await.unwrap();
    let second: Vec<_> = ["red", "blue", "green"]
        .iter()
        .map(|b| reconciler.platform().bridge_members(b))
        .collect();

    assert_eq!(first, second);
    assert_eq!(first_entries, 4);
    assert_eq!(
        reconciler.platform().acl_entries("VLAN_ISOLATION").len(),
        first_entries
    );
}

#[tokio::test]
async fn test_all_vlan_whitelist_leaves_one_dropped_pair() {
    let yaml = fixtures::THREE_VLAN_SCHEMA.to_string() + "acl:\n  - [{ vlan: red }, all-vlan]\n";
    let schema = schema(&yaml);
    let mut reconciler = reconciler(RecordingPlatform::new());

    let summary = reconciler.run(RunMode::Apply(&schema)).await.unwrap();

    let isolation = summary.isolation.unwrap();
    assert_eq!(isolation.pairs_dropped, 1);
    assert_eq!(isolation.entries_created, 2);

    let names: Vec<_> = reconciler
        .platform()
        .acl_entries("VLAN_ISOLATION")
        .iter()
        .map(|e| e.name.clone())
        .collect();
    assert_eq!(names, ["blue->green", "green->blue"]);
}

#[test]
fn test_whitelist_and_drop_set_partition_universe() {
    let schema = schema(&fixtures::vlans_with_acl(6, None));
    let all = universe(&schema);
    assert_eq!(all.len(), 15);

    let allowed = whitelist(
        &schema,
        &[
            vlanrecon::schema::AclAllowPair(
                vlanrecon::schema::AclSide::Vlan("v1".to_string()),
                vlanrecon::schema::AclSide::Vlan("v2".to_string()),
            ),
            vlanrecon::schema::AclAllowPair(
                vlanrecon::schema::AclSide::Vlan("v3".to_string()),
                vlanrecon::schema::AclSide::AllVlan,
            ),
        ],
    )
    .unwrap();
    let dropped = isolation::drop_set(&all, &allowed);

    assert_eq!(allowed.len(), 6);
    assert_eq!(dropped.len(), 9);
    assert!(dropped.is_disjoint(&allowed));
    assert_eq!(dropped.union(&allowed).cloned().collect::<std::collections::BTreeSet<_>>(), all);
}

#[tokio::test]
async fn test_acl_commit_failure_is_fatal() {
    let schema = schema(fixtures::RED_BLUE_SCHEMA);
    let platform = RecordingPlatform::new()
        .with_interfaces(["eth0"])
        .failing_on("create_acl_entry", "red->blue");
    let mut reconciler = reconciler(platform);

    let err = reconciler.run(RunMode::Apply(&schema)).await.unwrap_err();

    assert!(matches!(err, ReconcileError::AclCommitFailed { .. }));
    assert!(err.to_string().contains("red->blue"));
    assert_eq!(reconciler.platform().acl_entries("VLAN_ISOLATION").len(), 1);
}

#[tokio::test]
async fn test_undeclared_acl_vlan_aborts_before_table() {
    let yaml = fixtures::THREE_VLAN_SCHEMA.to_string() + "acl:\n  - [{ vlan: red }, { vlan: purple }]\n";
    let schema = schema(&yaml);
    let mut reconciler = reconciler(RecordingPlatform::new());

    let err = reconciler.run(RunMode::Apply(&schema)).await.unwrap_err();

    assert!(matches!(err, ReconcileError::SchemaReference { ref vlan, .. } if vlan == "purple"));
    assert!(reconciler.platform().acl_table("VLAN_ISOLATION").is_none());
    assert!(reconciler.platform().has_link("red"));
}

#[tokio::test]
async fn test_tag_named_platform_end_to_end() {
    let schema = schema(fixtures::RED_BLUE_SCHEMA);
    let platform = RecordingPlatform::tag_named()
        .with_interfaces(["eth0"])
        .with_bridge("br99", ["eth0"]);
    let mut reconciler = reconciler(platform);

    let summary = reconciler.run(RunMode::Apply(&schema)).await.unwrap();

    assert_eq!(summary.teardown.bridges_deleted, vec!["br99".to_string()]);
    let state = StateVerifier::new(reconciler.platform());
    state.assert_link_absent("br99").unwrap();
    state.assert_members("br10", &["eth0"]).unwrap();
    state.assert_members("br20", &["eth0"]).unwrap();
    assert!(!reconciler.platform().has_link("eth0.20"));
    assert_eq!(summary.isolation.unwrap().entries_created, 2);
}
