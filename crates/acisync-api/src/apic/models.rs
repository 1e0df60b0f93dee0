// APIC REST payload shapes.
//
// Every APIC response wraps managed objects as `{"<class>": {"attributes":
// {...}, "children": [...]}}` inside an `imdata` array. Attribute values are
// always strings on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Class name APIC uses for error entries inside `imdata`.
pub const ERROR_CLASS: &str = "error";

/// The `{ totalCount, imdata }` envelope returned by every APIC query.
#[derive(Debug, Deserialize)]
pub struct ImData {
    #[serde(rename = "totalCount", default)]
    pub total_count: Option<String>,
    #[serde(default)]
    pub imdata: Vec<ManagedObject>,
}

/// One managed object with its class, attributes and (optional) children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedObject {
    pub class: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<ManagedObject>,
}

#[derive(Deserialize)]
struct ObjectBody {
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    children: Vec<ManagedObject>,
}

impl<'de> Deserialize<'de> for ManagedObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wrapper = BTreeMap::<String, ObjectBody>::deserialize(deserializer)?;
        let mut entries = wrapper.into_iter();
        let (class, body) = entries
            .next()
            .ok_or_else(|| serde::de::Error::custom("empty managed object"))?;
        if entries.next().is_some() {
            return Err(serde::de::Error::custom(
                "managed object must have exactly one class key",
            ));
        }
        Ok(Self {
            class,
            attributes: body.attributes,
            children: body.children,
        })
    }
}

impl ManagedObject {
    /// Attribute value, treating the empty string as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The object's distinguished name (empty if APIC omitted it).
    pub fn dn(&self) -> &str {
        self.attributes.get("dn").map_or("", String::as_str)
    }

    /// Children of the given class.
    pub fn children_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a ManagedObject> {
        self.children.iter().filter(move |c| c.class == class)
    }

    /// First child of the given class.
    pub fn child(&self, class: &str) -> Option<&ManagedObject> {
        self.children.iter().find(|c| c.class == class)
    }

    pub fn is_error(&self) -> bool {
        self.class == ERROR_CLASS
    }
}

// ── Distinguished names ─────────────────────────────────────────────

/// Split a DN into relative names.
///
/// Slashes inside `[...]` belong to the relative name, so
/// `uni/tn-a/BD-b/subnet-[10.0.0.1/24]` yields four parts.
pub fn split_dn(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, ch) in dn.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                parts.push(&dn[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < dn.len() {
        parts.push(&dn[start..]);
    }
    parts
}

/// Value of the first relative name starting with `prefix`.
///
/// `rn_value("uni/tn-prod/ap-web", "ap-")` returns `Some("web")`.
pub fn rn_value<'a>(dn: &'a str, prefix: &str) -> Option<&'a str> {
    split_dn(dn)
        .into_iter()
        .find_map(|rn| rn.strip_prefix(prefix))
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_nested_objects() {
        let raw = r#"{
            "totalCount": "1",
            "imdata": [{
                "fvBD": {
                    "attributes": {"dn": "uni/tn-prod/BD-web", "name": "web", "arpFlood": "yes"},
                    "children": [{"fvRsCtx": {"attributes": {"tDn": "uni/tn-common/ctx-shared"}}}]
                }
            }]
        }"#;
        let data: ImData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.total_count.as_deref(), Some("1"));
        let bd = &data.imdata[0];
        assert_eq!(bd.class, "fvBD");
        assert_eq!(bd.attr("arpFlood"), Some("yes"));
        let rs = bd.child("fvRsCtx").unwrap();
        assert_eq!(rs.attr("tDn"), Some("uni/tn-common/ctx-shared"));
    }

    #[test]
    fn empty_attribute_reads_as_absent() {
        let raw = r#"{"fvTenant": {"attributes": {"name": "t", "descr": ""}}}"#;
        let mo: ManagedObject = serde_json::from_str(raw).unwrap();
        assert_eq!(mo.attr("descr"), None);
        assert_eq!(mo.attr("name"), Some("t"));
    }

    #[test]
    fn split_dn_respects_brackets() {
        let parts = split_dn("uni/tn-a/BD-b/subnet-[10.0.0.1/24]");
        assert_eq!(parts, vec!["uni", "tn-a", "BD-b", "subnet-[10.0.0.1/24]"]);
    }

    #[test]
    fn rn_value_extracts_prefixed_segment() {
        let dn = "uni/tn-prod/ap-shop/epg-web/rsprov-http";
        assert_eq!(rn_value(dn, "tn-"), Some("prod"));
        assert_eq!(rn_value(dn, "ap-"), Some("shop"));
        assert_eq!(rn_value(dn, "epg-"), Some("web"));
        assert_eq!(rn_value(dn, "ctx-"), None);
        assert_eq!(rn_value("topology/pod-2/node-101", "pod-"), Some("2"));
    }
}
