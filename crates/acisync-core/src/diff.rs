// ── Diff / update builder ──
//
// Create payloads, minimal change sets and post-write verification, all
// driven by the mapping tables and one value-equality rule.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::mapping::FieldMapping;
use crate::record::{DestRecord, SourceRecord};

/// Ordered `field → new value` changes for one destination object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet(IndexMap<String, Value>);

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Request body for a partial update.
    pub fn to_body(&self) -> Map<String, Value> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Full creation payload: every mapping that yields a value.
pub fn build_params(table: &[FieldMapping], record: &SourceRecord) -> Map<String, Value> {
    table
        .iter()
        .filter_map(|m| m.resolve(record).map(|v| (m.dest.to_owned(), v)))
        .collect()
}

/// Minimal change set bringing `current` in line with `record`.
pub fn build_updates(
    table: &[FieldMapping],
    record: &SourceRecord,
    current: &DestRecord,
) -> ChangeSet {
    diff_fields(&build_params(table, record), current)
}

/// Fields of `desired` whose value differs from `current` under
/// [`values_equal`].
pub fn diff_fields(desired: &Map<String, Value>, current: &DestRecord) -> ChangeSet {
    ChangeSet(
        desired
            .iter()
            .filter(|(field, want)| !values_equal(want, current.field(field)))
            .map(|(field, want)| (field.clone(), want.clone()))
            .collect(),
    )
}

/// Names of `expected` fields the re-read object does not match.
pub fn verify_fields(expected: &Map<String, Value>, actual: &DestRecord) -> Vec<String> {
    diff_fields(expected, actual)
        .fields()
        .map(str::to_owned)
        .collect()
}

// ── Value equality ───────────────────────────────────────────────────

/// Logical equality between a desired value and the destination's current
/// value.
///
/// - null, absent and `""` are the same value; for booleans they are `false`
/// - a number equals a string that parses to the same number
/// - a nested reference (`{"id": 3, ...}`) equals its id
/// - a choice (`{"value": "x", "label": "X"}`) equals its value
/// - `"true"`/`"yes"` and `"false"`/`"no"` equal the matching boolean
pub fn values_equal(desired: &Value, current: Option<&Value>) -> bool {
    let current = current.unwrap_or(&Value::Null);
    let current = unwrap_nested(current);

    match desired {
        Value::Null => is_blank(current),
        Value::Bool(want) => as_bool(current) == Some(*want),
        Value::Number(want) => match current {
            Value::Number(have) => numbers_equal(want, have),
            Value::String(s) => number_matches_str(want, s),
            _ => false,
        },
        Value::String(want) => match current {
            Value::String(have) => have == want,
            Value::Number(have) => number_matches_str(have, want),
            Value::Bool(have) => as_bool(&Value::String(want.clone())) == Some(*have),
            Value::Null => want.is_empty(),
            _ => false,
        },
        Value::Object(want) => match current {
            Value::Object(have) => want.iter().all(|(k, v)| values_equal(v, have.get(k))),
            _ => want.is_empty() && is_blank(current),
        },
        Value::Array(want) => match current {
            Value::Array(have) => {
                want.len() == have.len()
                    && want.iter().zip(have).all(|(w, h)| values_equal(w, Some(h)))
            }
            _ => want.is_empty() && is_blank(current),
        },
    }
}

/// Reduce `{"id": ..}` references and `{"value": .., "label": ..}` choices
/// to their scalar.
fn unwrap_nested(value: &Value) -> &Value {
    if let Value::Object(map) = value {
        if let Some(id) = map.get("id") {
            return id;
        }
        if map.contains_key("label") {
            if let Some(inner) = map.get("value") {
                return inner;
            }
        }
    }
    value
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Null => Some(false),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "enabled" => Some(true),
            "false" | "no" | "disabled" | "" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_f64() == b.as_f64(),
    }
}

/// `"8"`, `" 8 "`, `"08"` and `"8.0"` all match the number 8.
fn number_matches_str(n: &serde_json::Number, s: &str) -> bool {
    let s = s.trim();
    if let (Some(x), Ok(y)) = (n.as_i64(), s.parse::<i64>()) {
        return x == y;
    }
    s.parse::<f64>().is_ok_and(|y| n.as_f64() == Some(y))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::mapping::{FieldMapping, VRF};
    use crate::record::DestId;

    fn dest(fields: Value) -> DestRecord {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object")
        };
        DestRecord {
            id: DestId::Existing(1),
            fields,
        }
    }

    #[test]
    fn numbers_equal_strings_that_parse_to_them() {
        assert!(values_equal(&json!(8), Some(&json!("8"))));
        assert!(values_equal(&json!("8"), Some(&json!(8))));
        assert!(values_equal(&json!(8), Some(&json!("8.0"))));
        assert!(values_equal(&json!(8), Some(&json!("08"))));
        assert!(values_equal(&json!("08"), Some(&json!(8))));
        assert!(values_equal(&json!(1.5), Some(&json!("1.50"))));
        assert!(!values_equal(&json!(8), Some(&json!("8a"))));
        assert!(!values_equal(&json!(8), Some(&json!("9"))));
        assert!(!values_equal(&json!(8), Some(&json!("9"))));
    }

    #[test]
    fn null_absent_and_empty_are_equal() {
        assert!(values_equal(&json!(""), None));
        assert!(values_equal(&json!(""), Some(&Value::Null)));
        assert!(values_equal(&Value::Null, Some(&json!(""))));
        assert!(values_equal(&json!(false), None));
        assert!(!values_equal(&json!(true), None));
    }

    #[test]
    fn references_and_choices_compare_by_scalar() {
        assert!(values_equal(&json!(4), Some(&json!({"id": 4, "name": "t"}))));
        assert!(values_equal(
            &json!("enforced"),
            Some(&json!({"value": "enforced", "label": "Enforced"}))
        ));
        assert!(!values_equal(&json!(5), Some(&json!({"id": 4}))));
    }

    #[test]
    fn objects_compare_on_desired_keys() {
        let want = json!({"firmware": {"version": "6.0(2h)"}});
        let have = json!({"firmware": {"version": "6.0(2h)", "model": "N9K"}, "owner": "x"});
        assert!(values_equal(&want, Some(&have)));
    }

    #[test]
    fn unchanged_policy_flag_yields_empty_changeset() {
        let record = SourceRecord::new("V1")
            .with("pc_enf_pref", Some("enforced"))
            .with("bd_enforced_enabled", Some("no"));
        let current = dest(json!({
            "name": "V1",
            "name_alias": "",
            "description": null,
            "bd_enforcement_enabled": false,
            "ip_data_plane_learning_enabled": true,
            "pc_enforcement_direction": {"value": "ingress", "label": "Ingress"},
            "pc_enforcement_preference": {"value": "enforced", "label": "Enforced"},
            "pim_ipv4_enabled": false,
            "pim_ipv6_enabled": false,
            "preferred_group_enabled": false
        }));
        let changes = build_updates(VRF, &record, &current);
        assert!(changes.is_empty(), "unexpected changes: {changes:?}");
    }

    #[test]
    fn only_differing_fields_are_included() {
        let table = [
            FieldMapping::new("description", "description"),
            FieldMapping::new("name_alias", "name_alias"),
        ];
        let record = SourceRecord::new("t")
            .with("description", Some("new"))
            .with("name_alias", Some("same"));
        let current = dest(json!({"description": "old", "name_alias": "same"}));
        let changes = build_updates(&table, &record, &current);
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec!["description"]);
        assert_eq!(changes.to_body(), json!({"description": "new"}).as_object().cloned().unwrap_or_default());
    }

    #[test]
    fn verify_reports_mismatched_fields() {
        let expected = json!({"description": "x", "qos_class": "level1"});
        let Value::Object(expected) = expected else {
            unreachable!()
        };
        let actual = dest(json!({"description": "x", "qos_class": "unspecified"}));
        assert_eq!(verify_fields(&expected, &actual), vec!["qos_class".to_owned()]);
    }
}
