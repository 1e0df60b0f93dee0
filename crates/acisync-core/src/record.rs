// Source snapshots and destination handles.

use std::fmt;

use acisync_api::netbox::Object;
use serde_json::{Map, Value};

/// One object read from the source system for this pass.
///
/// `attrs` holds normalized attribute names (`name_alias`, `arp_flood`, ...)
/// with string values as the source reports them. Absent attributes are
/// simply missing from the map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    pub name: String,
    pub attrs: Map<String, Value>,
    pub children: Vec<SourceRecord>,
}

impl SourceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter; `None` leaves the attribute absent.
    pub fn with<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.attrs.insert(key.to_owned(), v.into());
        }
        self
    }

    pub fn with_child(mut self, child: SourceRecord) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// String attribute; empty strings read as absent.
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Like `str_attr`, but a missing attribute is an error.
    pub fn require(&self, key: &str) -> Result<&str, crate::CoreError> {
        self.str_attr(key).ok_or_else(|| {
            crate::CoreError::Internal(format!("source record '{}' has no '{key}'", self.name))
        })
    }
}

/// Destination identifier: assigned by NetBox, or planned during a dry run
/// for an object that would have been created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DestId {
    Existing(u64),
    Planned(u32),
}

impl DestId {
    pub fn existing(self) -> Option<u64> {
        match self {
            Self::Existing(id) => Some(id),
            Self::Planned(_) => None,
        }
    }

    pub fn is_planned(self) -> bool {
        matches!(self, Self::Planned(_))
    }

    /// Payload form of a reference. Planned ids only appear in payloads
    /// that are never sent.
    pub fn to_value(self) -> Value {
        match self {
            Self::Existing(id) => Value::from(id),
            Self::Planned(_) => Value::Null,
        }
    }
}

impl fmt::Display for DestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing(id) => write!(f, "{id}"),
            Self::Planned(n) => write!(f, "planned:{n}"),
        }
    }
}

/// The destination's current view of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct DestRecord {
    pub id: DestId,
    pub fields: Map<String, Value>,
}

impl DestRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Apply a set of written fields on top of the current ones.
    pub fn merged(mut self, changes: &Map<String, Value>) -> Self {
        for (k, v) in changes {
            self.fields.insert(k.clone(), v.clone());
        }
        self
    }
}

impl From<Object> for DestRecord {
    fn from(obj: Object) -> Self {
        Self {
            id: DestId::Existing(obj.id),
            fields: obj.fields,
        }
    }
}

/// Scalar identity of a field value: the `id` (or choice `value`) of a
/// nested object, or the plain scalar rendered as a string.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::Object(nested) => nested
            .get("id")
            .or_else(|| nested.get("value"))
            .and_then(scalar_key),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalar_key_unwraps_nested_refs_and_choices() {
        assert_eq!(scalar_key(&json!({"id": 4, "name": "x"})), Some("4".into()));
        assert_eq!(
            scalar_key(&json!({"value": "provider", "label": "Provider"})),
            Some("provider".into())
        );
        assert_eq!(scalar_key(&json!(12)), Some("12".into()));
        assert_eq!(scalar_key(&Value::Null), None);
    }

    #[test]
    fn planned_ids_never_serialize_as_numbers() {
        assert_eq!(DestId::Existing(3).to_value(), json!(3));
        assert_eq!(DestId::Planned(1).to_value(), Value::Null);
        assert_eq!(DestId::Planned(1).to_string(), "planned:1");
    }

    #[test]
    fn empty_string_attribute_is_absent() {
        let rec = SourceRecord::new("t")
            .with("description", Some(""))
            .with("name_alias", Some("alias"))
            .with::<&str>("missing", None);
        assert_eq!(rec.str_attr("description"), None);
        assert_eq!(rec.str_attr("name_alias"), Some("alias"));
        assert!(rec.attr("missing").is_none());
    }
}
