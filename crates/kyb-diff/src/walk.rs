//! Recursive leaf walk over two JSON values.

use std::collections::BTreeSet;

use kyb_core::entities::FieldChange;
use kyb_core::enums::ChangeKind;
use serde_json::{Map, Value};

/// Collect leaf-level changes between `old` and `new`, appending to `out`.
///
/// Objects recurse; arrays and scalars are leaves. `None` means the key is
/// absent, which is distinct from `Some(Value::Null)`.
pub(crate) fn walk(
    path: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    tolerance: f64,
    out: &mut Vec<FieldChange>,
) {
    match (old, new) {
        (None, None) => {}
        (Some(Value::Object(a)), Some(Value::Object(b))) => walk_objects(path, a, b, tolerance, out),
        (None, Some(value)) => emit_leaves(path, value, ChangeKind::Added, out),
        (Some(value), None) => emit_leaves(path, value, ChangeKind::Removed, out),
        (Some(a), Some(b)) => {
            if !values_equal(a, b, tolerance) {
                out.push(FieldChange {
                    path: path.to_string(),
                    kind: ChangeKind::Modified,
                    old: Some(a.clone()),
                    new: Some(b.clone()),
                });
            }
        }
    }
}

fn walk_objects(
    path: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    tolerance: f64,
    out: &mut Vec<FieldChange>,
) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        walk(&join(path, key), old.get(key), new.get(key), tolerance, out);
    }
}

/// One change per leaf of `value`. An empty object is itself a leaf.
fn emit_leaves(path: &str, value: &Value, kind: ChangeKind, out: &mut Vec<FieldChange>) {
    if let Value::Object(map) = value {
        if !map.is_empty() {
            for (key, child) in map {
                emit_leaves(&join(path, key), child, kind, out);
            }
            return;
        }
    }
    let (old, new) = match kind {
        ChangeKind::Removed => (Some(value.clone()), None),
        ChangeKind::Added | ChangeKind::Modified => (None, Some(value.clone())),
    };
    out.push(FieldChange {
        path: path.to_string(),
        kind,
        old,
        new,
    });
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Float noise allowed when a difference sits exactly on the tolerance.
/// Without it `0.58 - 0.57` and `0.59 - 0.58` land on opposite sides of
/// `0.01`.
const TOLERANCE_SLACK: f64 = 1e-9;

/// Deep equality with numeric tolerance applied at every level. A difference
/// of the tolerance itself is a change.
pub(crate) fn values_equal(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y || (x - y).abs() + TOLERANCE_SLACK < tolerance,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| values_equal(x, y, tolerance))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y, tolerance)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn changes(old: &Value, new: &Value) -> Vec<FieldChange> {
        let mut out = Vec::new();
        walk("", Some(old), Some(new), 0.01, &mut out);
        out
    }

    #[test]
    fn nested_objects_produce_dotted_paths() {
        let out = changes(
            &json!({"address": {"city": "Berlin", "zip": "10115"}}),
            &json!({"address": {"city": "Hamburg", "zip": "10115"}}),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "address.city");
        assert_eq!(out[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn arrays_are_leaves() {
        let out = changes(&json!({"aliases": ["A", "B"]}), &json!({"aliases": ["B", "A"]}));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "aliases");
        assert_eq!(out[0].new, Some(json!(["B", "A"])));
    }

    #[test]
    fn null_and_absent_are_distinct() {
        let out = changes(&json!({"name": null}), &json!({"name": "ACME"}));
        assert_eq!(out[0].kind, ChangeKind::Modified);
        assert_eq!(out[0].old, Some(Value::Null));

        let out = changes(&json!({}), &json!({"name": null}));
        assert_eq!(out[0].kind, ChangeKind::Added);
        assert_eq!(out[0].old, None);
        assert_eq!(out[0].new, Some(Value::Null));
    }

    #[test]
    fn added_object_expands_to_leaves() {
        let out = changes(&json!({}), &json!({"a": {"b": 1, "c": {}}}));
        let paths: Vec<_> = out.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.b", "a.c"]);
        assert!(out.iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn object_replaced_by_scalar_is_modified() {
        let out = changes(&json!({"a": {"b": 1}}), &json!({"a": 3}));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, "a");
        assert_eq!(out[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn numbers_within_tolerance_are_equal() {
        assert!(values_equal(&json!(0.9), &json!(0.905), 0.01));
        assert!(!values_equal(&json!(0.9), &json!(0.95), 0.01));
        assert!(values_equal(&json!(1), &json!(1.0), 0.0));
        assert!(values_equal(&json!([0.5, 0.7]), &json!([0.501, 0.7]), 0.01));
        assert!(!values_equal(&json!(1), &json!("1"), 0.01));
    }

    #[test]
    fn one_hundredth_step_is_always_a_change() {
        for i in 0..100_u32 {
            let low = f64::from(i) / 100.0;
            let high = f64::from(i + 1) / 100.0;
            assert!(!values_equal(&json!(low), &json!(high), 0.01), "{low} -> {high}");
        }
        assert!(!values_equal(&json!(0.57), &json!(0.58), 0.01));
        assert!(values_equal(&json!(0.57), &json!(0.579), 0.01));
    }
}
