//! CPS command builders and output parsing for the OPX adapter.
//!
//! `cps_get_oid.py` and `cps_set_oid.py` print one `attribute = value` pair
//! per line; [`parse_fields`] turns that into [`FieldValues`].

use vlanrecon_common::shell::{self, shellquote};
use vlanrecon_common::{AclActionType, AclEntrySpec, AclMatchField, AclTableSpec};
use vlanrecon_types::{ConnectionParams, VlanId};

/// A field-value pair from CPS output.
pub type FieldValue = (String, String);

/// CPS object attributes in reported order.
pub type FieldValues = Vec<FieldValue>;

/// Lookup helpers over [`FieldValues`].
pub trait FieldValuesExt {
    fn get_field(&self, field: &str) -> Option<&str>;

    /// Every value reported for a field, in order.
    fn get_all(&self, field: &str) -> Vec<&str>;
}

impl FieldValuesExt for FieldValues {
    fn get_field(&self, field: &str) -> Option<&str> {
        self.iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    fn get_all(&self, field: &str) -> Vec<&str> {
        self.iter()
            .filter(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Parses `attribute = value` lines; anything else is skipped.
pub fn parse_fields(output: &str) -> FieldValues {
    output
        .lines()
        .filter_map(|line| line.split_once(" = "))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// CPS object and attribute paths.
pub mod attrs {
    pub const IF_OBJECT: &str = "dell-base-if-cmn/if/interfaces/interface";
    pub const IF_NAME_KEY: &str = "if/interfaces/interface/name";
    pub const IF_INDEX: &str = "dell-base-if-cmn/if/interfaces/interface/if-index";
    pub const IF_AUTONEG: &str = "dell-if/if/interfaces/interface/auto-negotiation";
    pub const IF_SPEED: &str = "dell-if/if/interfaces/interface/speed";
    pub const IF_DUPLEX: &str = "dell-if/if/interfaces/interface/duplex";
    pub const IF_FEC: &str = "dell-if/if/interfaces/interface/fec";

    pub const ACL_TABLE_OBJECT: &str = "base-acl/table";
    pub const ACL_TABLE_ID: &str = "base-acl/table/id";
    pub const ACL_TABLE_NAME: &str = "base-acl/table/name";
    pub const ACL_TABLE_STAGE: &str = "base-acl/table/stage";
    pub const ACL_TABLE_PRIORITY: &str = "base-acl/table/priority";
    pub const ACL_TABLE_MATCH_FIELDS: &str = "base-acl/table/allowed-match-fields";

    pub const ACL_ENTRY_OBJECT: &str = "base-acl/entry";
    pub const ACL_ENTRY_ID: &str = "base-acl/entry/id";
    pub const ACL_ENTRY_TABLE_ID: &str = "base-acl/entry/table-id";
    pub const ACL_ENTRY_NAME: &str = "base-acl/entry/name";
    pub const ACL_ENTRY_PRIORITY: &str = "base-acl/entry/priority";
}

/// VLAN type passed to `cps_config_vlan.py --vlantype` for data VLANs.
pub const DATA_VLAN_TYPE: u8 = 1;

/// OPX bridge name for a VLAN.
pub fn bridge_name(vlan_id: VlanId) -> String {
    format!("br{}", vlan_id)
}

/// Returns true for names [`bridge_name`] could have produced.
pub fn is_vlan_bridge(name: &str) -> bool {
    name.strip_prefix("br")
        .and_then(|id| id.parse::<VlanId>().ok())
        .is_some_and(|vlan_id| bridge_name(vlan_id) == name)
}

fn set_attr(attr: &str, value: impl std::fmt::Display) -> String {
    shellquote(&format!("{}={}", attr, value))
}

/// Build VLAN creation command
pub fn build_add_vlan_cmd(vlan_id: VlanId) -> String {
    format!(
        "{} --add --id {} --vlantype {}",
        shell::CPS_CONFIG_VLAN_CMD,
        vlan_id,
        DATA_VLAN_TYPE
    )
}

/// Build VLAN deletion command
pub fn build_delete_vlan_cmd(bridge: &str) -> String {
    format!(
        "{} --del --name {}",
        shell::CPS_CONFIG_VLAN_CMD,
        shellquote(bridge)
    )
}

/// Build VLAN port attach command
pub fn build_add_vlan_port_cmd(bridge: &str, port: &str, tagged: bool) -> String {
    let mut cmd = format!(
        "{} --addport --name {} --port {}",
        shell::CPS_CONFIG_VLAN_CMD,
        shellquote(bridge),
        shellquote(port)
    );
    if tagged {
        cmd.push_str(" --tagged");
    }
    cmd
}

/// Build VLAN port detach command
pub fn build_delete_vlan_port_cmd(bridge: &str, port: &str) -> String {
    format!(
        "{} --delport --name {} --port {}",
        shell::CPS_CONFIG_VLAN_CMD,
        shellquote(bridge),
        shellquote(port)
    )
}

/// Build interface lookup command
pub fn build_get_interface_cmd(name: &str) -> String {
    format!(
        "{} {} {}",
        shell::CPS_GET_OID_CMD,
        attrs::IF_OBJECT,
        set_attr(attrs::IF_NAME_KEY, name)
    )
}

/// Build connection parameter command. Unset parameters take their defaults.
pub fn build_set_connection_cmd(if_index: &str, params: &ConnectionParams) -> String {
    let (autoneg, speed, duplex, fec) = params.resolved();
    format!(
        "{} -oper=set {} {} {} {} {} {}",
        shell::CPS_SET_OID_CMD,
        attrs::IF_OBJECT,
        set_attr(attrs::IF_INDEX, if_index),
        set_attr(attrs::IF_AUTONEG, autoneg.wire_value()),
        set_attr(attrs::IF_SPEED, speed.wire_value()),
        set_attr(attrs::IF_DUPLEX, duplex.wire_value()),
        set_attr(attrs::IF_FEC, fec.wire_value())
    )
}

/// Build ACL table lookup command
pub fn build_get_acl_table_cmd(name: &str) -> String {
    format!(
        "{} {} {}",
        shell::CPS_GET_OID_CMD,
        attrs::ACL_TABLE_OBJECT,
        set_attr(attrs::ACL_TABLE_NAME, name)
    )
}

/// Build ACL table creation command
pub fn build_create_acl_table_cmd(spec: &AclTableSpec) -> String {
    let fields = spec
        .match_fields
        .iter()
        .map(|f| f.wire_value().to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{} -oper=create {} {} {} {} {}",
        shell::CPS_SET_OID_CMD,
        attrs::ACL_TABLE_OBJECT,
        set_attr(attrs::ACL_TABLE_NAME, &spec.name),
        set_attr(attrs::ACL_TABLE_STAGE, spec.stage.wire_value()),
        set_attr(attrs::ACL_TABLE_PRIORITY, spec.priority),
        set_attr(attrs::ACL_TABLE_MATCH_FIELDS, fields)
    )
}

/// Build ACL table deletion command
pub fn build_delete_acl_table_cmd(table_id: &str) -> String {
    format!(
        "{} -oper=delete {} {}",
        shell::CPS_SET_OID_CMD,
        attrs::ACL_TABLE_OBJECT,
        set_attr(attrs::ACL_TABLE_ID, table_id)
    )
}

/// Build ACL entry listing command
pub fn build_get_acl_entries_cmd(table_id: &str) -> String {
    format!(
        "{} {} {}",
        shell::CPS_GET_OID_CMD,
        attrs::ACL_ENTRY_OBJECT,
        set_attr(attrs::ACL_ENTRY_TABLE_ID, table_id)
    )
}

fn match_value_attr(field: AclMatchField) -> &'static str {
    match field {
        AclMatchField::SrcIp => "SRC_IP_VALUE",
        AclMatchField::DstIp => "DST_IP_VALUE",
    }
}

/// Build ACL entry creation command
pub fn build_create_acl_entry_cmd(spec: &AclEntrySpec) -> String {
    let mut args = vec![
        set_attr(attrs::ACL_ENTRY_TABLE_ID, &spec.table_id),
        set_attr(attrs::ACL_ENTRY_NAME, &spec.name),
        set_attr(attrs::ACL_ENTRY_PRIORITY, spec.priority),
    ];
    for (i, m) in spec.matches.iter().enumerate() {
        let base = format!("{}/match/{}", attrs::ACL_ENTRY_OBJECT, i);
        let value = match_value_attr(m.field);
        args.push(set_attr(&format!("{}/type", base), m.field.wire_value()));
        args.push(set_attr(&format!("{}/{}/addr", base, value), m.network));
        args.push(set_attr(&format!("{}/{}/mask", base, value), m.netmask));
    }
    let action = format!("{}/action/0", attrs::ACL_ENTRY_OBJECT);
    args.push(set_attr(
        &format!("{}/type", action),
        AclActionType::PacketAction.wire_value(),
    ));
    args.push(set_attr(
        &format!("{}/PACKET_ACTION_VALUE", action),
        spec.action.wire_value(),
    ));

    format!(
        "{} -oper=create {} {}",
        shell::CPS_SET_OID_CMD,
        attrs::ACL_ENTRY_OBJECT,
        args.join(" ")
    )
}

/// Build ACL entry deletion command
pub fn build_delete_acl_entry_cmd(table_id: &str, entry_id: &str) -> String {
    format!(
        "{} -oper=delete {} {} {}",
        shell::CPS_SET_OID_CMD,
        attrs::ACL_ENTRY_OBJECT,
        set_attr(attrs::ACL_ENTRY_TABLE_ID, table_id),
        set_attr(attrs::ACL_ENTRY_ID, entry_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vlanrecon_common::{AclPacketAction, AclStage, AclSubnetMatch};
    use vlanrecon_types::{Ipv4Cidr, Speed};

    fn vid(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    #[test]
    fn test_parse_fields() {
        let output = "Key: 1.20.1310766.1310754.\n\
                      dell-base-if-cmn/if/interfaces/interface/if-index = 17\n\
                      if/interfaces/interface/name = e101-001-0\n";
        let fields = parse_fields(output);
        assert_eq!(fields.get_field(attrs::IF_INDEX), Some("17"));
        assert_eq!(fields.get_field(attrs::IF_NAME_KEY), Some("e101-001-0"));
        assert_eq!(fields.get_field("missing"), None);
    }

    #[test]
    fn test_get_all() {
        let fields = parse_fields("base-acl/entry/id = 4\nbase-acl/entry/id = 9\n");
        assert_eq!(fields.get_all(attrs::ACL_ENTRY_ID), vec!["4", "9"]);
    }

    #[test]
    fn test_bridge_naming() {
        assert_eq!(bridge_name(vid(20)), "br20");
        assert!(is_vlan_bridge("br20"));
        assert!(!is_vlan_bridge("br"));
        assert!(!is_vlan_bridge("bridge0"));
        assert!(!is_vlan_bridge("eth0"));
        assert!(!is_vlan_bridge("br0"));
        assert!(!is_vlan_bridge("br4095"));
        assert!(!is_vlan_bridge("br99999"));
        assert!(!is_vlan_bridge("br010"));
        assert!(is_vlan_bridge("br4094"));
    }

    #[test]
    fn test_vlan_cmds() {
        assert_eq!(
            build_add_vlan_cmd(vid(10)),
            "cps_config_vlan.py --add --id 10 --vlantype 1"
        );
        assert_eq!(
            build_delete_vlan_cmd("br10"),
            "cps_config_vlan.py --del --name \"br10\""
        );
        assert_eq!(
            build_add_vlan_port_cmd("br20", "e101-001-0", true),
            "cps_config_vlan.py --addport --name \"br20\" --port \"e101-001-0\" --tagged"
        );
        assert_eq!(
            build_delete_vlan_port_cmd("br20", "e101-001-0"),
            "cps_config_vlan.py --delport --name \"br20\" --port \"e101-001-0\""
        );
    }

    #[test]
    fn test_set_connection_defaults() {
        let params = ConnectionParams {
            speed: Some(Speed::Gb10),
            ..Default::default()
        };
        assert_eq!(
            build_set_connection_cmd("17", &params),
            "cps_set_oid.py -oper=set dell-base-if-cmn/if/interfaces/interface \
             \"dell-base-if-cmn/if/interfaces/interface/if-index=17\" \
             \"dell-if/if/interfaces/interface/auto-negotiation=1\" \
             \"dell-if/if/interfaces/interface/speed=4\" \
             \"dell-if/if/interfaces/interface/duplex=1\" \
             \"dell-if/if/interfaces/interface/fec=2\""
        );
    }

    #[test]
    fn test_create_acl_table_cmd() {
        let spec = AclTableSpec {
            name: "VLAN_ISOLATION".to_string(),
            stage: AclStage::Ingress,
            priority: 100,
            match_fields: vec![AclMatchField::SrcIp, AclMatchField::DstIp],
        };
        assert_eq!(
            build_create_acl_table_cmd(&spec),
            "cps_set_oid.py -oper=create base-acl/table \
             \"base-acl/table/name=VLAN_ISOLATION\" \
             \"base-acl/table/stage=1\" \
             \"base-acl/table/priority=100\" \
             \"base-acl/table/allowed-match-fields=5,6\""
        );
    }

    #[test]
    fn test_create_acl_entry_cmd() {
        let src: Ipv4Cidr = "10.0.10.0/24".parse().unwrap();
        let dst: Ipv4Cidr = "10.0.20.0/24".parse().unwrap();
        let spec = AclEntrySpec {
            table_id: "3".to_string(),
            name: "red->blue".to_string(),
            priority: 10,
            matches: vec![AclSubnetMatch::src_ip(&src), AclSubnetMatch::dst_ip(&dst)],
            action: AclPacketAction::Drop,
        };
        let cmd = build_create_acl_entry_cmd(&spec);

        assert!(cmd.starts_with("cps_set_oid.py -oper=create base-acl/entry "));
        assert!(cmd.contains("\"base-acl/entry/table-id=3\""));
        assert!(cmd.contains("\"base-acl/entry/name=red->blue\""));
        assert!(cmd.contains("\"base-acl/entry/match/0/type=5\""));
        assert!(cmd.contains("\"base-acl/entry/match/0/SRC_IP_VALUE/addr=10.0.10.0\""));
        assert!(cmd.contains("\"base-acl/entry/match/0/SRC_IP_VALUE/mask=255.255.255.0\""));
        assert!(cmd.contains("\"base-acl/entry/match/1/type=6\""));
        assert!(cmd.contains("\"base-acl/entry/match/1/DST_IP_VALUE/addr=10.0.20.0\""));
        assert!(cmd.contains("\"base-acl/entry/action/0/type=3\""));
        assert!(cmd.ends_with("\"base-acl/entry/action/0/PACKET_ACTION_VALUE=1\""));
    }

    #[test]
    fn test_delete_acl_entry_cmd() {
        assert_eq!(
            build_delete_acl_entry_cmd("3", "7"),
            "cps_set_oid.py -oper=delete base-acl/entry \
             \"base-acl/entry/table-id=3\" \"base-acl/entry/id=7\""
        );
    }
}
