//! Schema fixtures shared by unit and integration tests.

use std::fmt::Write;

/// Two addressed VLANs, one trunk port and an empty whitelist.
pub const RED_BLUE_SCHEMA: &str = "\
vlan:
  red: { id: 10, ip: 10.0.10.0/24 }
  blue: { id: 20, ip: 10.0.20.0/24 }
interface:
  eth0:
    vlan:
      untagged: red
      tagged: [blue]
acl: []
";

/// Three addressed VLANs without an `acl` section.
pub const THREE_VLAN_SCHEMA: &str = "\
vlan:
  red: { id: 10, ip: 10.0.10.0/24 }
  blue: { id: 20, ip: 10.0.20.0/24 }
  green: { id: 30, ip: 10.0.30.0/24 }
";

/// A port untagged in `red` and tagged in every VLAN.
pub const TAGGED_ALL_SCHEMA: &str = "\
vlan:
  red: { id: 10 }
  blue: { id: 20 }
  green: { id: 30 }
interface:
  eth0:
    vlan:
      untagged: red
      tagged: all
";

/// Generates `count` addressed VLANs named `v1..vN` with ids from 101.
///
/// `acl` is inserted verbatim as the body of the `acl` section; `None` omits
/// the section.
pub fn vlans_with_acl(count: usize, acl: Option<&str>) -> String {
    let mut yaml = String::from("vlan:\n");
    for i in 1..=count {
        let _ = writeln!(yaml, "  v{i}: {{ id: {}, ip: 10.{i}.0.0/16 }}", 100 + i);
    }
    if let Some(acl) = acl {
        let _ = writeln!(yaml, "acl: {}", acl);
    }
    yaml
}

/// Builder for ad-hoc schema documents.
///
/// Sections are emitted in declaration order, which is also the order the
/// builder sees them in.
#[derive(Debug, Clone, Default)]
pub struct SchemaYaml {
    vlans: Vec<String>,
    routes: Vec<String>,
    interfaces: Vec<String>,
    acl: Option<Vec<String>>,
}

impl SchemaYaml {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vlan(mut self, name: &str, id: u16, ip: Option<&str>) -> Self {
        let line = match ip {
            Some(ip) => format!("  {}: {{ id: {}, ip: {} }}", name, id, ip),
            None => format!("  {}: {{ id: {} }}", name, id),
        };
        self.vlans.push(line);
        self
    }

    pub fn route(mut self, destination: &str, gateway: &str) -> Self {
        self.routes.push(format!("  {}: {}", destination, gateway));
        self
    }

    /// Adds an interface with an untagged VLAN and a tagged list.
    pub fn access_port(mut self, name: &str, untagged: &str, tagged: &[&str]) -> Self {
        self.interfaces.push(format!(
            "  {}: {{ vlan: {{ untagged: {}, tagged: [{}] }} }}",
            name,
            untagged,
            tagged.join(", ")
        ));
        self
    }

    pub fn ignored(mut self, name: &str) -> Self {
        self.interfaces.push(format!("  {}: ignore", name));
        self
    }

    /// Whitelists a pair; `all-vlan` is passed through as the wildcard.
    pub fn allow(mut self, a: &str, b: &str) -> Self {
        self.acl
            .get_or_insert_with(Vec::new)
            .push(format!("  - [{}, {}]", acl_side(a), acl_side(b)));
        self
    }

    /// Declares an empty whitelist, isolating every VLAN pair.
    pub fn isolate_all(mut self) -> Self {
        self.acl.get_or_insert_with(Vec::new);
        self
    }

    pub fn build(&self) -> String {
        let mut yaml = String::new();
        section(&mut yaml, "vlan", &self.vlans);
        section(&mut yaml, "route", &self.routes);
        section(&mut yaml, "interface", &self.interfaces);
        match &self.acl {
            Some(pairs) if pairs.is_empty() => yaml.push_str("acl: []\n"),
            Some(pairs) => section(&mut yaml, "acl", pairs),
            None => {}
        }
        yaml
    }
}

fn acl_side(side: &str) -> String {
    if side == "all-vlan" {
        side.to_string()
    } else {
        format!("{{ vlan: {} }}", side)
    }
}

fn section(yaml: &mut String, name: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    yaml.push_str(name);
    yaml.push_str(":\n");
    for line in lines {
        yaml.push_str(line);
        yaml.push('\n');
    }
}
