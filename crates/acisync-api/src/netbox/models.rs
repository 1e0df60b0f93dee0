// NetBox response shapes.
//
// Objects are kept as loose JSON maps: the engine compares fields through
// its own mapping tables and never needs a typed model per endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Paginated list envelope: `{count, next, previous, results}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Any NetBox object: its numeric id plus every other field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub id: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Object {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Id of a nested reference field (`{"id": 3, ...}`) or a bare integer.
    pub fn ref_id(&self, name: &str) -> Option<u64> {
        match self.fields.get(name)? {
            Value::Object(nested) => nested.get("id").and_then(Value::as_u64),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// `GET /api/status/` payload (only the parts the CLI reports).
#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    #[serde(rename = "netbox-version", default)]
    pub netbox_version: Option<String>,
    #[serde(default)]
    pub plugins: Map<String, Value>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn object_keeps_all_fields() {
        let raw = r#"{"id": 7, "name": "prod", "aci_fabric": {"id": 2, "name": "f1"}, "url": "x"}"#;
        let obj: Object = serde_json::from_str(raw).unwrap();
        assert_eq!(obj.id, 7);
        assert_eq!(obj.str_field("name"), Some("prod"));
        assert_eq!(obj.ref_id("aci_fabric"), Some(2));
        assert_eq!(obj.ref_id("missing"), None);
        assert!(!obj.fields.contains_key("id"));
    }

    #[test]
    fn page_defaults_missing_links() {
        let page: Page<Object> = serde_json::from_str(r#"{"count": 0, "results": []}"#).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
    }
}
