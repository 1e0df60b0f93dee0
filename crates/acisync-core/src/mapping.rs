// ── Field mapper ──
//
// Declarative source-attribute → destination-field tables, one per entity
// kind. The diff builder consumes these tables; no kind has its own
// comparison code.

use serde_json::Value;

use crate::kind::EntityKind;
use crate::record::SourceRecord;

/// Value converter applied to a present source attribute.
///
/// Returning `None` means "treat as absent", which selects the mapping's
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convert {
    /// Pass the value through unchanged.
    Identity,
    /// `yes` / `no` to a boolean.
    YesNo,
    /// Three-state switch: `on` → true, `off` → false, anything else
    /// (`inherit`, `default`) → the mapping's fallback.
    TriState {
        on: &'static str,
        off: &'static str,
    },
    /// True when the value equals the given string.
    Equals(&'static str),
    /// True when the comma-separated value contains the token.
    ContainsToken(&'static str),
    /// A valid MAC address, upper-cased with `:` separators.
    MacAddress,
    /// Strings longer than the limit are cut at a char boundary.
    Truncate(usize),
    /// Integer, accepting numeric strings.
    Integer,
    /// Drop a sentinel value (e.g. `unspecified`).
    Omit(&'static str),
}

impl Convert {
    pub fn apply(self, value: &Value) -> Option<Value> {
        match self {
            Self::Identity => Some(value.clone()),
            Self::YesNo => match value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "yes" | "true" => Some(Value::Bool(true)),
                    "no" | "false" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            Self::TriState { on, off } => match value.as_str() {
                Some(s) if s.eq_ignore_ascii_case(on) => Some(Value::Bool(true)),
                Some(s) if s.eq_ignore_ascii_case(off) => Some(Value::Bool(false)),
                _ => value.as_bool().map(Value::Bool),
            },
            Self::Equals(expected) => value.as_str().map(|s| Value::Bool(s == expected)),
            Self::ContainsToken(token) => value
                .as_str()
                .map(|s| Value::Bool(s.split(',').any(|t| t.trim() == token))),
            Self::MacAddress => value.as_str().and_then(normalize_mac).map(Value::String),
            Self::Truncate(max) => match value {
                Value::String(s) => Some(Value::String(s.chars().take(max).collect())),
                other => Some(other.clone()),
            },
            Self::Integer => match value {
                Value::Number(n) => Some(Value::Number(n.clone())),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            Self::Omit(sentinel) => match value.as_str() {
                Some(s) if s == sentinel => None,
                _ => Some(value.clone()),
            },
        }
    }
}

fn normalize_mac(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.split([':', '-']).collect();
    let valid = parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()));
    valid.then(|| parts.join(":").to_ascii_uppercase())
}

/// The destination's defined default for a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    /// No default: an absent source value leaves the field untouched.
    None,
    Bool(bool),
    Str(&'static str),
    Int(i64),
}

impl Fallback {
    pub fn to_value(self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Bool(b) => Some(Value::Bool(b)),
            Self::Str(s) => Some(Value::String(s.to_owned())),
            Self::Int(i) => Some(Value::from(i)),
        }
    }
}

/// One `source attribute → destination field` entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMapping {
    pub source: &'static str,
    pub dest: &'static str,
    pub convert: Convert,
    pub fallback: Fallback,
}

impl FieldMapping {
    pub const fn new(source: &'static str, dest: &'static str) -> Self {
        Self {
            source,
            dest,
            convert: Convert::Identity,
            fallback: Fallback::None,
        }
    }

    pub const fn convert(mut self, convert: Convert) -> Self {
        self.convert = convert;
        self
    }

    pub const fn or(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Destination value for `record`, or `None` when the field should be
    /// left out of the payload.
    pub fn resolve(&self, record: &SourceRecord) -> Option<Value> {
        record
            .attr(self.source)
            .and_then(|v| self.convert.apply(v))
            .or_else(|| self.fallback.to_value())
    }
}

/// Apply the converter registered for `attribute`, or pass `value` through.
pub fn convert(table: &[FieldMapping], attribute: &str, value: &Value) -> Option<Value> {
    match table.iter().find(|m| m.source == attribute) {
        Some(m) => m.convert.apply(value),
        None => Some(value.clone()),
    }
}

// ── Tables ───────────────────────────────────────────────────────────

const YES_NO: Convert = Convert::YesNo;
const ENABLED: Convert = Convert::TriState {
    on: "enabled",
    off: "disabled",
};

const fn text(source: &'static str, dest: &'static str) -> FieldMapping {
    FieldMapping::new(source, dest).or(Fallback::Str(""))
}

const fn flag(source: &'static str, dest: &'static str, default: bool) -> FieldMapping {
    FieldMapping::new(source, dest)
        .convert(YES_NO)
        .or(Fallback::Bool(default))
}

pub const FABRIC: &[FieldMapping] = &[
    FieldMapping::new("fabric_id", "fabric_id")
        .convert(Convert::Integer)
        .or(Fallback::Int(1)),
    FieldMapping::new("infra_vlan_vid", "infra_vlan_vid")
        .convert(Convert::Integer)
        .or(Fallback::Int(4093)),
    FieldMapping::new("gipo_pool", "gipo_pool"),
];

pub const DESCRIBED: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
];

pub const VRF: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    flag("bd_enforced_enabled", "bd_enforcement_enabled", false),
    FieldMapping::new("ip_data_plane_learning", "ip_data_plane_learning_enabled")
        .convert(ENABLED)
        .or(Fallback::Bool(true)),
    FieldMapping::new("pc_enf_dir", "pc_enforcement_direction").or(Fallback::Str("ingress")),
    FieldMapping::new("pc_enf_pref", "pc_enforcement_preference").or(Fallback::Str("enforced")),
    flag("pim_v4_enabled", "pim_ipv4_enabled", false),
    flag("pim_v6_enabled", "pim_ipv6_enabled", false),
    FieldMapping::new("preferred_group", "preferred_group_enabled")
        .convert(ENABLED)
        .or(Fallback::Bool(false)),
];

pub const BRIDGE_DOMAIN: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    flag("arp_flood", "arp_flooding_enabled", false),
    flag("ip_learning", "ip_data_plane_learning_enabled", true),
    flag("limit_ip_learn", "limit_ip_learn_enabled", true),
    FieldMapping::new("mac", "mac_address")
        .convert(Convert::MacAddress)
        .or(Fallback::Str("00:22:BD:F8:19:FF")),
    FieldMapping::new("multi_dest_pkt_act", "multi_destination_flooding")
        .or(Fallback::Str("bd-flood")),
    flag("unicast_route", "unicast_routing_enabled", true),
    FieldMapping::new("unk_mac_ucast_act", "unknown_unicast").or(Fallback::Str("proxy")),
    FieldMapping::new("unk_mcast_act", "unknown_ipv4_multicast").or(Fallback::Str("flood")),
    FieldMapping::new("v6_unk_mcast_act", "unknown_ipv6_multicast").or(Fallback::Str("flood")),
    FieldMapping::new("vmac", "virtual_mac_address").convert(Convert::MacAddress),
    flag("pim_v4_enabled", "pim_ipv4_enabled", false),
    flag("host_route_adv", "advertise_host_routes_enabled", false),
    FieldMapping::new("ep_move_detect", "ep_move_detection_enabled")
        .convert(Convert::Equals("garp"))
        .or(Fallback::Bool(false)),
];

pub const SUBNET: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    flag("preferred", "preferred_ip_address_enabled", false),
    flag("virtual", "virtual_ip_enabled", false),
    FieldMapping::new("scope", "advertised_externally_enabled")
        .convert(Convert::ContainsToken("public"))
        .or(Fallback::Bool(false)),
    FieldMapping::new("scope", "shared_enabled")
        .convert(Convert::ContainsToken("shared"))
        .or(Fallback::Bool(false)),
    FieldMapping::new("ctrl", "no_default_svi_gateway")
        .convert(Convert::ContainsToken("no-default-gateway"))
        .or(Fallback::Bool(false)),
    FieldMapping::new("ctrl", "nd_ra_enabled")
        .convert(Convert::ContainsToken("nd"))
        .or(Fallback::Bool(false)),
    FieldMapping::new("ctrl", "igmp_querier_enabled")
        .convert(Convert::ContainsToken("querier"))
        .or(Fallback::Bool(false)),
];

pub const EPG: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    FieldMapping::new("pref_gr_memb", "preferred_group_member_enabled")
        .convert(Convert::Equals("include"))
        .or(Fallback::Bool(false)),
    FieldMapping::new("prio", "qos_class").or(Fallback::Str("unspecified")),
    FieldMapping::new("flood_on_encap", "flood_in_encapsulation_enabled")
        .convert(ENABLED)
        .or(Fallback::Bool(false)),
    flag("shutdown", "admin_shutdown", false),
    FieldMapping::new("pc_enf_pref", "intra_epg_isolation_enabled")
        .convert(Convert::Equals("enforced"))
        .or(Fallback::Bool(false)),
];

pub const ESG: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    FieldMapping::new("pref_gr_memb", "preferred_group_member_enabled")
        .convert(Convert::Equals("include"))
        .or(Fallback::Bool(false)),
    FieldMapping::new("prio", "qos_class").or(Fallback::Str("unspecified")),
    flag("shutdown", "admin_shutdown", false),
];

pub const FILTER_ENTRY: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    FieldMapping::new("ether_type", "ether_type").convert(Convert::Omit("unspecified")),
    FieldMapping::new("ip_protocol", "ip_protocol").convert(Convert::Omit("unspecified")),
    FieldMapping::new("d_from_port", "destination_port_from").convert(Convert::Omit("unspecified")),
    FieldMapping::new("d_to_port", "destination_port_to").convert(Convert::Omit("unspecified")),
    FieldMapping::new("s_from_port", "source_port_from").convert(Convert::Omit("unspecified")),
    FieldMapping::new("s_to_port", "source_port_to").convert(Convert::Omit("unspecified")),
];

pub const CONTRACT: &[FieldMapping] = &[
    text("name_alias", "name_alias"),
    text("description", "description"),
    FieldMapping::new("scope", "scope").or(Fallback::Str("context")),
    FieldMapping::new("prio", "qos_class").or(Fallback::Str("unspecified")),
    FieldMapping::new("target_dscp", "target_dscp").or(Fallback::Str("unspecified")),
];

pub const CONTRACT_SUBJECT: &[FieldMapping] = &[text("description", "description")];

pub const SOFTWARE: &[FieldMapping] = &[
    FieldMapping::new("filename", "filename").convert(Convert::Truncate(256)),
    FieldMapping::new("md5sum", "md5sum").convert(Convert::Truncate(36)),
    FieldMapping::new("comments", "comments"),
];

/// The fixed mapping table for an entity kind.
pub fn table(kind: EntityKind) -> &'static [FieldMapping] {
    match kind {
        EntityKind::Fabric => FABRIC,
        EntityKind::Tenants | EntityKind::AppProfiles | EntityKind::ContractFilters => DESCRIBED,
        EntityKind::Vrfs => VRF,
        EntityKind::BridgeDomains => BRIDGE_DOMAIN,
        EntityKind::Subnets => SUBNET,
        EntityKind::Epgs => EPG,
        EntityKind::Esgs => ESG,
        EntityKind::Contracts => CONTRACT,
        EntityKind::Software => SOFTWARE,
        EntityKind::Pods | EntityKind::Nodes | EntityKind::ContractRelations => &[],
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolve(table: &[FieldMapping], dest: &str, record: &SourceRecord) -> Option<Value> {
        table
            .iter()
            .find(|m| m.dest == dest)
            .and_then(|m| m.resolve(record))
    }

    #[test]
    fn tri_state_inherit_uses_destination_default() {
        let rec = SourceRecord::new("v").with("ip_data_plane_learning", Some("inherit"));
        assert_eq!(
            resolve(VRF, "ip_data_plane_learning_enabled", &rec),
            Some(json!(true))
        );
        let rec = SourceRecord::new("v").with("ip_data_plane_learning", Some("disabled"));
        assert_eq!(
            resolve(VRF, "ip_data_plane_learning_enabled", &rec),
            Some(json!(false))
        );
    }

    #[test]
    fn absent_attribute_maps_to_default() {
        let rec = SourceRecord::new("v");
        assert_eq!(
            resolve(VRF, "pc_enforcement_direction", &rec),
            Some(json!("ingress"))
        );
        assert_eq!(resolve(VRF, "description", &rec), Some(json!("")));
        assert_eq!(resolve(BRIDGE_DOMAIN, "virtual_mac_address", &rec), None);
    }

    #[test]
    fn mac_addresses_are_validated() {
        assert_eq!(
            Convert::MacAddress.apply(&json!("00-22-bd-f8-19-ff")),
            Some(json!("00:22:BD:F8:19:FF"))
        );
        assert_eq!(Convert::MacAddress.apply(&json!("not-applicable")), None);
        let rec = SourceRecord::new("bd").with("mac", Some("n/a"));
        assert_eq!(
            resolve(BRIDGE_DOMAIN, "mac_address", &rec),
            Some(json!("00:22:BD:F8:19:FF"))
        );
    }

    #[test]
    fn token_lists_split_on_commas() {
        let rec = SourceRecord::new("s")
            .with("scope", Some("public,shared"))
            .with("ctrl", Some("nd,querier"));
        assert_eq!(resolve(SUBNET, "advertised_externally_enabled", &rec), Some(json!(true)));
        assert_eq!(resolve(SUBNET, "shared_enabled", &rec), Some(json!(true)));
        assert_eq!(resolve(SUBNET, "no_default_svi_gateway", &rec), Some(json!(false)));
        assert_eq!(resolve(SUBNET, "igmp_querier_enabled", &rec), Some(json!(true)));
    }

    #[test]
    fn integers_accept_numeric_strings() {
        assert_eq!(Convert::Integer.apply(&json!("8")), Some(json!(8)));
        assert_eq!(Convert::Integer.apply(&json!(8)), Some(json!(8)));
        assert_eq!(Convert::Integer.apply(&json!("eight")), None);
    }

    #[test]
    fn unknown_attribute_passes_through() {
        assert_eq!(convert(VRF, "name", &json!("x")), Some(json!("x")));
        assert_eq!(convert(VRF, "bd_enforced_enabled", &json!("yes")), Some(json!(true)));
        assert_eq!(
            Convert::Omit("unspecified").apply(&json!("unspecified")),
            None
        );
    }
}
