//! VLAN isolation compiler.
//!
//! Turns the `acl` whitelist into drop rules: every unordered pair of declared
//! VLANs not explicitly allowed is blocked in both directions. Compilation is
//! pure; [`install`] commits a compiled plan through an [`AclOps`] adapter.
//!
//! The whitelist is symmetric. Allowing `red <-> blue` opens both directions,
//! and there is no way to allow only one of them.

use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, instrument};

use vlanrecon_common::{
    AclEntrySpec, AclMatchField, AclOps, AclPacketAction, AclPriority, AclStage, AclSubnetMatch,
    AclTableId, AclTableSpec, ReconcileError, ReconcileResult,
};
use vlanrecon_types::Ipv4Cidr;

use crate::config::IsolationSettings;
use crate::schema::{AclAllowPair, AclSide, Schema};
use crate::topology::parse_cidr;

/// An unordered pair of distinct VLAN names, stored in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VlanPair {
    low: String,
    high: String,
}

impl VlanPair {
    /// Normalizes a pair. A VLAN paired with itself is not a pair.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self {
                low: a.to_string(),
                high: b.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                low: b.to_string(),
                high: a.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }
}

impl fmt::Display for VlanPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

/// Every unordered pair of distinct declared VLANs.
pub fn universe(schema: &Schema) -> BTreeSet<VlanPair> {
    let names: Vec<&str> = schema.vlan_names().collect();
    let mut pairs = BTreeSet::new();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            pairs.extend(VlanPair::new(a, b));
        }
    }
    pairs
}

/// Expands the allow list into explicit pairs. `all-vlan` stands for every
/// declared VLAN; self pairs produced by the expansion are dropped.
pub fn whitelist(schema: &Schema, allowed: &[AclAllowPair]) -> ReconcileResult<BTreeSet<VlanPair>> {
    let mut pairs = BTreeSet::new();
    for (index, AclAllowPair(left, right)) in allowed.iter().enumerate() {
        let left = expand_side(schema, left, index)?;
        let right = expand_side(schema, right, index)?;
        for a in &left {
            for b in &right {
                pairs.extend(VlanPair::new(a, b));
            }
        }
    }
    Ok(pairs)
}

fn expand_side<'a>(
    schema: &'a Schema,
    side: &'a AclSide,
    index: usize,
) -> ReconcileResult<Vec<&'a str>> {
    match side {
        AclSide::AllVlan => Ok(schema.vlan_names().collect()),
        AclSide::Vlan(name) => {
            schema.vlan(name, format_args!("acl entry #{}", index))?;
            Ok(vec![name.as_str()])
        }
    }
}

/// Pairs of the universe that are not whitelisted.
pub fn drop_set(universe: &BTreeSet<VlanPair>, whitelist: &BTreeSet<VlanPair>) -> BTreeSet<VlanPair> {
    universe.difference(whitelist).cloned().collect()
}

/// One directional drop rule, before it has a table to live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationRule {
    pub src_vlan: String,
    pub dst_vlan: String,
    pub src: AclSubnetMatch,
    pub dst: AclSubnetMatch,
}

impl IsolationRule {
    /// Entry label, e.g. `red->blue`.
    pub fn name(&self) -> String {
        format!("{}->{}", self.src_vlan, self.dst_vlan)
    }

    /// Binds the rule to a committed table.
    pub fn entry_spec(&self, table_id: &AclTableId, priority: AclPriority) -> AclEntrySpec {
        AclEntrySpec {
            table_id: table_id.clone(),
            name: self.name(),
            priority,
            matches: vec![self.src, self.dst],
            action: AclPacketAction::Drop,
        }
    }
}

/// The compiled isolation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationPlan {
    pub table: AclTableSpec,
    pub entry_priority: AclPriority,
    pub dropped: BTreeSet<VlanPair>,
    pub rules: Vec<IsolationRule>,
}

/// What an install pass committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationReport {
    pub table_id: AclTableId,
    pub pairs_dropped: usize,
    pub entries_created: usize,
}

/// Compiles the `acl` section. Returns `None` when the schema has no `acl`
/// section at all; an empty section blocks every pair.
pub fn compile(schema: &Schema, settings: &IsolationSettings) -> ReconcileResult<Option<IsolationPlan>> {
    let Some(allowed) = &schema.acl else {
        return Ok(None);
    };

    let universe = universe(schema);
    let whitelist = whitelist(schema, allowed)?;
    let dropped = drop_set(&universe, &whitelist);
    debug!(
        universe = universe.len(),
        whitelisted = whitelist.len(),
        dropped = dropped.len(),
        "Computed isolation matrix"
    );

    let mut rules = Vec::with_capacity(dropped.len() * 2);
    for pair in &dropped {
        let low = vlan_subnet(schema, pair.low())?;
        let high = vlan_subnet(schema, pair.high())?;
        rules.push(directional_rule(pair.low(), &low, pair.high(), &high));
        rules.push(directional_rule(pair.high(), &high, pair.low(), &low));
    }

    Ok(Some(IsolationPlan {
        table: AclTableSpec {
            name: settings.table_name.clone(),
            stage: AclStage::Ingress,
            priority: settings.table_priority,
            match_fields: vec![AclMatchField::SrcIp, AclMatchField::DstIp],
        },
        entry_priority: settings.entry_priority,
        dropped,
        rules,
    }))
}

fn vlan_subnet(schema: &Schema, name: &str) -> ReconcileResult<Ipv4Cidr> {
    let vlan = schema.vlan(name, "acl isolation")?;
    let ip = vlan
        .ip
        .as_deref()
        .ok_or_else(|| ReconcileError::vlan_without_address(name))?;
    parse_cidr(ip, format!("vlan {}", name))
}

fn directional_rule(src_vlan: &str, src: &Ipv4Cidr, dst_vlan: &str, dst: &Ipv4Cidr) -> IsolationRule {
    IsolationRule {
        src_vlan: src_vlan.to_string(),
        dst_vlan: dst_vlan.to_string(),
        src: AclSubnetMatch::src_ip(src),
        dst: AclSubnetMatch::dst_ip(dst),
    }
}

/// Commits the table, then one entry per rule using the table id returned by
/// the platform.
#[instrument(skip_all, fields(table = %plan.table.name))]
pub async fn install<P>(platform: &mut P, plan: &IsolationPlan) -> ReconcileResult<IsolationReport>
where
    P: AclOps + ?Sized,
{
    let table_id = platform.create_acl_table(&plan.table).await?;
    info!(table_id = %table_id, rules = plan.rules.len(), "Created isolation table");

    for rule in &plan.rules {
        let spec = rule.entry_spec(&table_id, plan.entry_priority);
        let entry_id = platform.create_acl_entry(&spec).await?;
        debug!(entry = %spec.name, entry_id = %entry_id, "Created isolation entry");
    }

    Ok(IsolationReport {
        table_id,
        pairs_dropped: plan.dropped.len(),
        entries_created: plan.rules.len(),
    })
}
