//! Shell command builders for the generic Linux adapter

use vlanrecon_common::shell::{self, shellquote};
use vlanrecon_common::{AclEntrySpec, AclMatchField, LinkState};
use vlanrecon_types::{ConnectionParams, Duplex, Ipv4Cidr, VlanId};

/// Kernel chain every isolation table is hooked from.
pub const FORWARD_CHAIN: &str = "FORWARD";

/// Build link admin state command
pub fn build_set_link_state_cmd(name: &str, state: LinkState) -> String {
    format!(
        "{} link set dev {} {}",
        shell::IP_CMD,
        shellquote(name),
        state
    )
}

/// Build link delete command
pub fn build_delete_link_cmd(name: &str) -> String {
    format!("{} link delete {}", shell::IP_CMD, shellquote(name))
}

/// Name of the 802.1Q sub-interface of `parent` for a VLAN.
pub fn tagged_link_name(parent: &str, vlan_id: VlanId) -> String {
    format!("{}.{}", parent, vlan_id)
}

/// Build 802.1Q sub-interface creation command
pub fn build_add_tagged_link_cmd(parent: &str, vlan_id: VlanId) -> String {
    format!(
        "{} link add link {} name {} type vlan id {}",
        shell::IP_CMD,
        shellquote(parent),
        shellquote(&tagged_link_name(parent, vlan_id)),
        vlan_id
    )
}

/// Build bridge membership query command
pub fn build_show_bridge_cmd(name: &str) -> String {
    format!("{} show {}", shell::BRCTL_CMD, shellquote(name))
}

/// Build bridge creation command
pub fn build_add_bridge_cmd(name: &str) -> String {
    format!("{} addbr {}", shell::BRCTL_CMD, shellquote(name))
}

/// Build bridge deletion command
pub fn build_delete_bridge_cmd(name: &str) -> String {
    format!("{} delbr {}", shell::BRCTL_CMD, shellquote(name))
}

/// Build bridge port attach command
pub fn build_add_bridge_port_cmd(bridge: &str, port: &str) -> String {
    format!(
        "{} addif {} {}",
        shell::BRCTL_CMD,
        shellquote(bridge),
        shellquote(port)
    )
}

/// Build bridge port detach command
pub fn build_delete_bridge_port_cmd(bridge: &str, port: &str) -> String {
    format!(
        "{} delif {} {}",
        shell::BRCTL_CMD,
        shellquote(bridge),
        shellquote(port)
    )
}

/// Build a sysfs/procfs write of a 0/1 flag
pub fn build_write_flag_cmd(path: &str, enabled: bool) -> String {
    format!(
        "{} {} > {}",
        shell::ECHO_CMD,
        u8::from(enabled),
        shellquote(path)
    )
}

/// Build address assignment command
pub fn build_add_address_cmd(link: &str, cidr: &Ipv4Cidr) -> String {
    format!(
        "{} addr add {} dev {}",
        shell::IP_CMD,
        shellquote(&cidr.to_string()),
        shellquote(link)
    )
}

/// Build static route command
pub fn build_add_route_cmd(destination: &str, gateway: &str) -> String {
    format!(
        "{} route add {} via {}",
        shell::IP_CMD,
        shellquote(destination),
        shellquote(gateway)
    )
}

/// Build ethtool commands for the parameters that are set.
///
/// Unset parameters are left as the driver has them; speed values without a
/// fixed Ethernet rate are skipped.
pub fn build_connection_cmds(name: &str, params: &ConnectionParams) -> Vec<String> {
    let mut settings = Vec::new();
    if let Some(autoneg) = params.autoneg {
        settings.push(format!("autoneg {}", autoneg));
    }
    if let Some(mbps) = params.speed.and_then(|s| s.megabits()) {
        settings.push(format!("speed {}", mbps));
    }
    match params.duplex {
        Some(Duplex::Full) => settings.push("duplex full".to_string()),
        Some(Duplex::Half) => settings.push("duplex half".to_string()),
        Some(Duplex::Auto) | None => {}
    }

    let mut cmds = Vec::new();
    if !settings.is_empty() {
        cmds.push(format!(
            "{} -s {} {}",
            shell::ETHTOOL_CMD,
            shellquote(name),
            settings.join(" ")
        ));
    }
    if let Some(fec) = params.fec {
        cmds.push(format!(
            "{} --set-fec {} encoding {}",
            shell::ETHTOOL_CMD,
            shellquote(name),
            fec.ethtool_encoding()
        ));
    }
    cmds
}

/// Build chain listing command
pub fn build_list_chain_cmd(chain: &str) -> String {
    format!("{} -S {}", shell::IPTABLES_CMD, shellquote(chain))
}

/// Build chain creation command, hooking the chain from FORWARD
pub fn build_create_chain_cmd(chain: &str) -> String {
    format!(
        "{} -N {} && {} -I {} -j {}",
        shell::IPTABLES_CMD,
        shellquote(chain),
        shell::IPTABLES_CMD,
        FORWARD_CHAIN,
        shellquote(chain)
    )
}

/// Build chain removal command. A missing FORWARD hook is tolerated.
pub fn build_delete_chain_cmd(chain: &str) -> String {
    format!(
        "{} -D {} -j {} 2>/dev/null; {} -X {}",
        shell::IPTABLES_CMD,
        FORWARD_CHAIN,
        shellquote(chain),
        shell::IPTABLES_CMD,
        shellquote(chain)
    )
}

/// Renders an entry as an iptables rule specification.
pub fn rule_spec(spec: &AclEntrySpec) -> String {
    let mut parts = Vec::new();
    for field in [AclMatchField::SrcIp, AclMatchField::DstIp] {
        if let Some(m) = spec.match_for(field) {
            let flag = match field {
                AclMatchField::SrcIp => "-s",
                AclMatchField::DstIp => "-d",
            };
            parts.push(format!("{} {}/{}", flag, m.network, m.netmask));
        }
    }
    parts.push(format!("-j {}", spec.action.iptables_target()));
    parts.join(" ")
}

/// Build rule append command
pub fn build_append_rule_cmd(chain: &str, rule: &str) -> String {
    format!(
        "{} -A {} {}",
        shell::IPTABLES_CMD,
        shellquote(chain),
        quote_words(rule)
    )
}

/// Build rule delete command
pub fn build_delete_rule_cmd(chain: &str, rule: &str) -> String {
    format!(
        "{} -D {} {}",
        shell::IPTABLES_CMD,
        shellquote(chain),
        quote_words(rule)
    )
}

fn quote_words(rule: &str) -> String {
    rule.split_whitespace()
        .map(shellquote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses `brctl show <name>` output.
///
/// Returns `None` when the output does not describe `name` as a bridge.
/// Members follow the bridge line, one per line after the first.
pub fn parse_brctl_show(name: &str, output: &str) -> Option<Vec<String>> {
    let mut lines = output.lines().skip(1);
    let first: Vec<&str> = lines.next()?.split_whitespace().collect();
    if first.first() != Some(&name) || first.len() < 3 {
        return None;
    }

    let mut members = Vec::new();
    if let Some(port) = first.get(3) {
        members.push(port.to_string());
    }
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [port] => members.push(port.to_string()),
            _ => break,
        }
    }
    Some(members)
}

/// Parses `iptables -S <chain>` output into rule specifications.
pub fn parse_chain_rules(chain: &str, output: &str) -> Vec<String> {
    let prefix = format!("-A {} ", chain);
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(prefix.as_str()))
        .map(str::to_string)
        .collect()
}
