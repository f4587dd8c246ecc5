//! Topology builder.
//!
//! Materializes the schema on a clean box: VLAN bridges first, then static
//! routes, then interface memberships. Schema references are resolved as they
//! are used, so a bad reference aborts the run after every earlier step has
//! already been applied.

use tracing::{debug, info, instrument};

use vlanrecon_common::{LinkOps, LinkState, PortTagging, ReconcileError, ReconcileResult};
use vlanrecon_types::Ipv4Cidr;

use crate::config::BridgeTuning;
use crate::schema::{InterfaceEntry, InterfaceSpec, Schema, TaggedVlans};

/// What a build pass created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub bridges_created: Vec<String>,
    pub addresses_assigned: usize,
    pub routes_added: usize,
    pub tagged_links_created: Vec<String>,
    pub ports_attached: usize,
    pub interfaces_ignored: usize,
}

/// Parses a CIDR taken from the schema, naming where it came from on failure.
pub fn parse_cidr(value: &str, context: impl Into<String>) -> ReconcileResult<Ipv4Cidr> {
    value
        .parse()
        .map_err(|e| ReconcileError::invalid_cidr(context, e))
}

/// Builds bridges, routes and memberships from the schema.
#[instrument(skip_all, fields(platform = %platform.platform_name()))]
pub async fn build<P>(
    platform: &mut P,
    schema: &Schema,
    tuning: &BridgeTuning,
) -> ReconcileResult<BuildReport>
where
    P: LinkOps + ?Sized,
{
    let mut report = BuildReport::default();

    build_vlans(platform, schema, tuning, &mut report).await?;
    add_routes(platform, schema, &mut report).await?;
    configure_interfaces(platform, schema, &mut report).await?;

    info!(
        bridges = report.bridges_created.len(),
        routes = report.routes_added,
        tagged_links = report.tagged_links_created.len(),
        ports_attached = report.ports_attached,
        "Topology built"
    );
    Ok(report)
}

async fn build_vlans<P>(
    platform: &mut P,
    schema: &Schema,
    tuning: &BridgeTuning,
    report: &mut BuildReport,
) -> ReconcileResult<()>
where
    P: LinkOps + ?Sized,
{
    for (name, vlan) in schema.vlan.iter() {
        let bridge = platform.bridge_name(name, vlan.id);
        info!(vlan = %name, id = %vlan.id, bridge = %bridge, "Creating VLAN bridge");

        platform.create_bridge(&bridge, vlan.id).await?;
        report.bridges_created.push(bridge.clone());

        if tuning.disable_multicast_snooping {
            platform.set_multicast_snooping(&bridge, false).await?;
        }
        if tuning.enable_proxy_arp {
            platform.set_proxy_arp(&bridge, true).await?;
        }

        if let Some(ip) = &vlan.ip {
            let cidr = parse_cidr(ip, format!("vlan {}", name))?;
            platform.add_address(&bridge, &cidr).await?;
            report.addresses_assigned += 1;
        }

        platform.set_link_state(&bridge, LinkState::Up).await?;
    }
    Ok(())
}

async fn add_routes<P>(
    platform: &mut P,
    schema: &Schema,
    report: &mut BuildReport,
) -> ReconcileResult<()>
where
    P: LinkOps + ?Sized,
{
    for (destination, gateway) in schema.route.iter() {
        debug!(destination, gateway = %gateway, "Adding route");
        platform.add_route(destination, gateway).await?;
        report.routes_added += 1;
    }
    Ok(())
}

async fn configure_interfaces<P>(
    platform: &mut P,
    schema: &Schema,
    report: &mut BuildReport,
) -> ReconcileResult<()>
where
    P: LinkOps + ?Sized,
{
    for (name, entry) in schema.interface.iter() {
        match entry {
            InterfaceEntry::Ignore => {
                debug!(interface = %name, "Ignoring interface");
                report.interfaces_ignored += 1;
            }
            InterfaceEntry::Configured(spec) => {
                configure_interface(platform, schema, name, spec, report).await?;
            }
        }
    }
    Ok(())
}

async fn configure_interface<P>(
    platform: &mut P,
    schema: &Schema,
    name: &str,
    spec: &InterfaceSpec,
    report: &mut BuildReport,
) -> ReconcileResult<()>
where
    P: LinkOps + ?Sized,
{
    if let Some(params) = &spec.connection {
        platform.configure_connection(name, params).await?;
    }

    let Some(vlans) = &spec.vlan else {
        return Ok(());
    };

    if let Some(untagged) = &vlans.untagged {
        let vlan = schema.vlan(untagged, format_args!("interface {} untagged", name))?;
        let bridge = platform.bridge_name(untagged, vlan.id);
        info!(interface = %name, vlan = %untagged, "Attaching untagged port");
        platform
            .attach_port(&bridge, name, PortTagging::Untagged)
            .await?;
        report.ports_attached += 1;
        platform.set_link_state(name, LinkState::Up).await?;
    }

    let tagged: Vec<&str> = match &vlans.tagged {
        TaggedVlans::All => schema.vlan_names().collect(),
        TaggedVlans::List(names) => names.iter().map(String::as_str).collect(),
    };

    for vlan_name in tagged {
        if vlans.untagged.as_deref() == Some(vlan_name) {
            debug!(interface = %name, vlan = %vlan_name, "Already untagged member");
            continue;
        }

        let vlan = schema.vlan(vlan_name, format_args!("interface {} tagged", name))?;
        let bridge = platform.bridge_name(vlan_name, vlan.id);
        let link = platform.create_tagged_link(name, vlan.id).await?;
        info!(interface = %name, vlan = %vlan_name, link = %link, "Attaching tagged port");

        platform.attach_port(&bridge, &link, PortTagging::Tagged).await?;
        report.ports_attached += 1;
        if link != name {
            report.tagged_links_created.push(link.clone());
        }
        platform.set_link_state(&link, LinkState::Up).await?;
    }

    platform.set_link_state(name, LinkState::Up).await?;
    Ok(())
}
