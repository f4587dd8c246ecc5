//! Typed network schema.
//!
//! The schema is parsed once per run from YAML into the types below and is
//! never mutated afterwards. Mapping sections keep document order, which is
//! the order bridges, routes and interfaces are applied in.
//!
//! ```yaml
//! vlan:
//!   red:  { id: 10, ip: 10.0.10.1/24 }
//!   blue: { id: 20, ip: 10.0.20.1/24 }
//! route:
//!   10.1.0.0/16: 10.0.10.254
//! interface:
//!   eth0:
//!     vlan: { untagged: red, tagged: [blue] }
//!   eth1:
//!     vlan: { tagged: all }
//!     connection: { speed: 10G, fec: off }
//!   eth2: ignore
//! acl:
//!   - [{ vlan: red }, { vlan: blue }]
//!   - [all-vlan, { vlan: red }]
//! ```

use serde::de::value::{MapAccessDeserializer, SeqAccessDeserializer};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, instrument};

use vlanrecon_common::{ReconcileError, ReconcileResult};
use vlanrecon_types::{ConnectionParams, VlanId};

/// Literal accepted by `interface.*.vlan.tagged` meaning every declared VLAN.
pub const TAGGED_ALL: &str = "all";

/// Literal accepted on either side of an `acl` pair meaning every VLAN.
pub const ACL_ALL_VLAN: &str = "all-vlan";

/// Literal accepted as an interface body to leave the interface alone.
pub const INTERFACE_IGNORE: &str = "ignore";

/// A string-keyed mapping that preserves document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(OrderedMap::new())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(de::Error::custom(format!("duplicate key '{}'", key)));
            }
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// A declared VLAN.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VlanSpec {
    pub id: VlanId,
    /// Bridge address in CIDR notation. Parsed when first used.
    #[serde(default)]
    pub ip: Option<String>,
}

/// Tagged VLAN membership of an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedVlans {
    /// Every declared VLAN, in declaration order.
    All,
    /// The listed VLAN names, in listed order.
    List(Vec<String>),
}

impl Default for TaggedVlans {
    fn default() -> Self {
        TaggedVlans::List(Vec::new())
    }
}

struct TaggedVlansVisitor;

impl<'de> Visitor<'de> for TaggedVlansVisitor {
    type Value = TaggedVlans;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' or a list of vlan names", TAGGED_ALL)
    }

    fn visit_str<E: de::Error>(self, word: &str) -> Result<Self::Value, E> {
        if word == TAGGED_ALL {
            Ok(TaggedVlans::All)
        } else {
            Err(E::custom(format!(
                "tagged must be '{}' or a list of vlan names, got '{}'",
                TAGGED_ALL, word
            )))
        }
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
        Vec::<String>::deserialize(SeqAccessDeserializer::new(seq)).map(TaggedVlans::List)
    }
}

impl<'de> Deserialize<'de> for TaggedVlans {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TaggedVlansVisitor)
    }
}

/// VLAN membership of a physical interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceVlans {
    #[serde(default)]
    pub untagged: Option<String>,
    #[serde(default)]
    pub tagged: TaggedVlans,
}

/// Configuration of a physical interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceSpec {
    #[serde(default)]
    pub vlan: Option<InterfaceVlans>,
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
}

/// An `interface` section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceEntry {
    /// The interface is left untouched by the builder.
    Ignore,
    Configured(InterfaceSpec),
}

struct InterfaceEntryVisitor;

impl<'de> Visitor<'de> for InterfaceEntryVisitor {
    type Value = InterfaceEntry;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' or an interface mapping", INTERFACE_IGNORE)
    }

    // A key with no body still counts as declared
    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(InterfaceEntry::Configured(InterfaceSpec::default()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        self.visit_unit()
    }

    fn visit_str<E: de::Error>(self, word: &str) -> Result<Self::Value, E> {
        if word == INTERFACE_IGNORE {
            Ok(InterfaceEntry::Ignore)
        } else {
            Err(E::custom(format!(
                "interface must be '{}' or a mapping, got '{}'",
                INTERFACE_IGNORE, word
            )))
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let spec = InterfaceSpec::deserialize(MapAccessDeserializer::new(map))?;
        Ok(InterfaceEntry::Configured(spec))
    }
}

impl<'de> Deserialize<'de> for InterfaceEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(InterfaceEntryVisitor)
    }
}

/// One side of an `acl` whitelist pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AclSide {
    /// Expands to every declared VLAN.
    AllVlan,
    Vlan(String),
}

impl fmt::Display for AclSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclSide::AllVlan => f.write_str(ACL_ALL_VLAN),
            AclSide::Vlan(name) => write!(f, "vlan {}", name),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct VlanRef {
    vlan: String,
}

struct AclSideVisitor;

impl<'de> Visitor<'de> for AclSideVisitor {
    type Value = AclSide;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' or {{vlan: <name>}}", ACL_ALL_VLAN)
    }

    fn visit_str<E: de::Error>(self, word: &str) -> Result<Self::Value, E> {
        if word == ACL_ALL_VLAN {
            Ok(AclSide::AllVlan)
        } else {
            Err(E::custom(format!(
                "acl side must be '{}' or {{vlan: <name>}}, got '{}'",
                ACL_ALL_VLAN, word
            )))
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let VlanRef { vlan } = VlanRef::deserialize(MapAccessDeserializer::new(map))?;
        Ok(AclSide::Vlan(vlan))
    }
}

impl<'de> Deserialize<'de> for AclSide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AclSideVisitor)
    }
}

/// An unordered pair of VLANs allowed to talk to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct AclAllowPair(pub AclSide, pub AclSide);

/// The root schema document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Schema {
    #[serde(default)]
    pub vlan: OrderedMap<VlanSpec>,
    /// Destination CIDR -> gateway address.
    #[serde(default)]
    pub route: OrderedMap<String>,
    #[serde(default)]
    pub interface: OrderedMap<InterfaceEntry>,
    /// Allowed VLAN pairs. `None` means no isolation table is installed.
    #[serde(default)]
    pub acl: Option<Vec<AclAllowPair>>,
}

impl Schema {
    /// Parses and types a YAML (or JSON) document.
    pub fn from_yaml_str(text: &str, origin: &str) -> ReconcileResult<Self> {
        let schema: Schema =
            serde_yaml::from_str(text).map_err(|e| ReconcileError::schema_load(origin, e))?;
        schema.check_unique_ids(origin)?;
        debug!(
            origin,
            vlans = schema.vlan.len(),
            routes = schema.route.len(),
            interfaces = schema.interface.len(),
            "Loaded schema"
        );
        Ok(schema)
    }

    /// Reads and parses a schema file.
    #[instrument]
    pub async fn load(path: &Path) -> ReconcileResult<Self> {
        let origin = path.display().to_string();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReconcileError::schema_load(origin.as_str(), e))?;
        Self::from_yaml_str(&text, &origin)
    }

    fn check_unique_ids(&self, origin: &str) -> ReconcileResult<()> {
        let mut seen: HashMap<VlanId, &str> = HashMap::new();
        for (name, spec) in self.vlan.iter() {
            if let Some(first) = seen.insert(spec.id, name) {
                return Err(ReconcileError::schema_load(
                    origin,
                    format!(
                        "vlan id {} is declared by both '{}' and '{}'",
                        spec.id, first, name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Looks up a declared VLAN, failing with a reference error otherwise.
    pub fn vlan(&self, name: &str, referenced_by: impl fmt::Display) -> ReconcileResult<&VlanSpec> {
        self.vlan
            .get(name)
            .ok_or_else(|| ReconcileError::undeclared_vlan(name, referenced_by))
    }

    /// Declared VLAN names in declaration order.
    pub fn vlan_names(&self) -> impl Iterator<Item = &str> {
        self.vlan.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vlanrecon_types::Speed;

    const FULL: &str = r#"
vlan:
  red: { id: 10, ip: 10.0.10.1/24 }
  blue: { id: 20, ip: 10.0.20.1/24 }
  mgmt: { id: 99 }
route:
  10.2.0.0/16: 10.0.10.254
  0.0.0.0/0: 10.0.20.254
interface:
  eth0:
    vlan: { untagged: red, tagged: [blue] }
  eth1:
    vlan: { tagged: all }
    connection: { speed: 10G }
  eth2: ignore
acl:
  - [{ vlan: red }, { vlan: blue }]
  - [all-vlan, { vlan: mgmt }]
"#;

    #[test]
    fn test_parse_full_schema() {
        let schema = Schema::from_yaml_str(FULL, "test").unwrap();

        assert_eq!(schema.vlan_names().collect::<Vec<_>>(), ["red", "blue", "mgmt"]);
        assert_eq!(schema.vlan.get("mgmt").unwrap().ip, None);
        assert_eq!(schema.vlan.get("red").unwrap().id.as_u16(), 10);

        let routes: Vec<_> = schema.route.iter().collect();
        assert_eq!(
            routes,
            [
                ("10.2.0.0/16", &"10.0.10.254".to_string()),
                ("0.0.0.0/0", &"10.0.20.254".to_string()),
            ]
        );

        let Some(InterfaceEntry::Configured(eth1)) = schema.interface.get("eth1") else {
            panic!("eth1 should be configured");
        };
        assert_eq!(eth1.vlan.as_ref().unwrap().tagged, TaggedVlans::All);
        assert_eq!(eth1.connection.unwrap().speed, Some(Speed::Gb10));
        assert_eq!(schema.interface.get("eth2"), Some(&InterfaceEntry::Ignore));

        let acl = schema.acl.as_ref().unwrap();
        assert_eq!(acl.len(), 2);
        assert_eq!(
            acl[1],
            AclAllowPair(AclSide::AllVlan, AclSide::Vlan("mgmt".to_string()))
        );
    }

    #[test]
    fn test_empty_document_sections() {
        let schema = Schema::from_yaml_str("vlan:\n  red: { id: 1 }\n", "test").unwrap();
        assert!(schema.route.is_empty());
        assert!(schema.interface.is_empty());
        assert_eq!(schema.acl, None);

        let schema = Schema::from_yaml_str("acl: []\n", "test").unwrap();
        assert_eq!(schema.acl, Some(Vec::new()));
    }

    #[test]
    fn test_json_is_accepted() {
        let schema = Schema::from_yaml_str(
            r#"{"vlan": {"red": {"id": 10}}, "interface": {"eth0": {"vlan": {"untagged": "red"}}}}"#,
            "json",
        )
        .unwrap();
        assert!(schema.vlan.contains_key("red"));
    }

    #[test]
    fn test_interface_without_body() {
        let schema = Schema::from_yaml_str("interface:\n  eth0:\n", "test").unwrap();
        assert_eq!(
            schema.interface.get("eth0"),
            Some(&InterfaceEntry::Configured(InterfaceSpec::default()))
        );
    }

    #[test]
    fn test_rejects_bad_literals() {
        let err = Schema::from_yaml_str(
            "interface:\n  eth0:\n    vlan: { tagged: some }\n",
            "test",
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaLoad { .. }));

        assert!(Schema::from_yaml_str("interface:\n  eth0: skip\n", "test").is_err());
        assert!(Schema::from_yaml_str("acl:\n  - [any-vlan, { vlan: a }]\n", "test").is_err());
        assert!(Schema::from_yaml_str("acl:\n  - [{ vlan: a }]\n", "test").is_err());
    }

    fn load_error(yaml: &str) -> String {
        Schema::from_yaml_str(yaml, "test").unwrap_err().to_string()
    }

    #[test]
    fn test_nested_errors_name_the_cause() {
        let err = load_error("interface:\n  eth0:\n    vlan: { untaged: red }\n");
        assert!(err.contains("unknown field `untaged`"), "{}", err);

        let err = load_error("interface:\n  eth0:\n    connection: { speed: 11G }\n");
        assert!(err.contains("11G"), "{}", err);

        let err = load_error("acl:\n  - [{ vlna: red }, all-vlan]\n");
        assert!(err.contains("unknown field `vlna`"), "{}", err);

        let err = load_error("interface:\n  eth0:\n    vlan: { tagged: [red, { id: 7 }] }\n");
        assert!(err.contains("invalid type: map"), "{}", err);
    }

    #[test]
    fn test_literal_errors_list_accepted_words() {
        let err = load_error("interface:\n  eth0: skip\n");
        assert!(err.contains("'ignore' or a mapping, got 'skip'"), "{}", err);

        let err = load_error("acl:\n  - [any-vlan, { vlan: a }]\n");
        assert!(err.contains("got 'any-vlan'"), "{}", err);

        let err = load_error("interface:\n  eth0:\n    vlan: { tagged: 20 }\n");
        assert!(err.contains("'all' or a list of vlan names"), "{}", err);
    }

    #[test]
    fn test_rejects_invalid_vlan_id() {
        assert!(Schema::from_yaml_str("vlan:\n  red: { id: 0 }\n", "test").is_err());
        assert!(Schema::from_yaml_str("vlan:\n  red: { ip: 10.0.0.1/24 }\n", "test").is_err());
    }

    #[test]
    fn test_rejects_duplicate_vlan_id() {
        let err = Schema::from_yaml_str(
            "vlan:\n  red: { id: 10 }\n  blue: { id: 10 }\n",
            "dup.yaml",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'red' and 'blue'"));
    }

    #[test]
    fn test_rejects_unknown_section() {
        assert!(Schema::from_yaml_str("vlans: {}\n", "test").is_err());
    }

    #[test]
    fn test_vlan_lookup_reports_reference() {
        let schema = Schema::from_yaml_str(FULL, "test").unwrap();
        assert!(schema.vlan("red", "test").is_ok());

        let err = schema.vlan("green", "interface eth7").unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaReference { ref vlan, .. } if vlan == "green"));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = Schema::load(Path::new("/nonexistent/schema.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::SchemaLoad { .. }));
    }
}
