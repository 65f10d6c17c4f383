//! Pure value comparison (spec §4.4). No I/O, no logging side effects beyond
//! the warn-on-unknown-comparator case the spec calls out explicitly.

use serde_json::Value;
use tracing::warn;

use crate::types::ComparatorSpec;

/// Compare `actual` against `expected` under `spec`'s semantics.
pub fn compare(actual: &Value, expected: &Value, spec: &ComparatorSpec) -> bool {
    match spec {
        ComparatorSpec::Exact => exact(actual, expected),
        ComparatorSpec::Numeric { tolerance } => numeric(actual, expected, *tolerance),
        ComparatorSpec::UnorderedArray | ComparatorSpec::Multiset => {
            unordered_array(actual, expected)
        }
        ComparatorSpec::Set => set(actual, expected),
        ComparatorSpec::FloatArray { tolerance } => float_array(actual, expected, *tolerance),
        ComparatorSpec::Unknown => {
            warn!("unknown comparator spec encountered; falling back to exact");
            exact(actual, expected)
        }
    }
}

/// Structural deep equality. `serde_json::Value`'s own `PartialEq` already
/// implements this: primitives by value, arrays elementwise in order,
/// objects by key set + recursive value equality (its `Map` is `BTreeMap`-
/// backed internally under the `preserve_order` feature being off, so key
/// order never participates in equality).
fn exact(actual: &Value, expected: &Value) -> bool {
    actual == expected
}

fn numeric(actual: &Value, expected: &Value, tolerance: f64) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() <= tolerance,
        _ => exact(actual, expected),
    }
}

/// Canonical sort key: the element's own JSON encoding. Stable and total
/// over arbitrary JSON values, matching spec §4.4's "sorting both by a
/// canonical key (JSON encoding of each element)".
fn canonical_key(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn unordered_array(actual: &Value, expected: &Value) -> bool {
    match (actual.as_array(), expected.as_array()) {
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return false;
            }
            let mut a_sorted: Vec<&Value> = a.iter().collect();
            let mut b_sorted: Vec<&Value> = b.iter().collect();
            a_sorted.sort_by_key(|v| canonical_key(v));
            b_sorted.sort_by_key(|v| canonical_key(v));
            a_sorted.iter().zip(b_sorted.iter()).all(|(x, y)| x == y)
        }
        _ => exact(actual, expected),
    }
}

fn set(actual: &Value, expected: &Value) -> bool {
    match (actual.as_array(), expected.as_array()) {
        (Some(a), Some(b)) => {
            let mut a_keys: Vec<String> = a.iter().map(canonical_key).collect();
            let mut b_keys: Vec<String> = b.iter().map(canonical_key).collect();
            a_keys.sort();
            a_keys.dedup();
            b_keys.sort();
            b_keys.dedup();
            a_keys == b_keys
        }
        _ => exact(actual, expected),
    }
}

fn float_array(actual: &Value, expected: &Value, tolerance: f64) -> bool {
    match (actual.as_array(), expected.as_array()) {
        (Some(a), Some(b)) => {
            a.len() == b.len()
                && a.iter().zip(b.iter()).all(|(x, y)| numeric(x, y, tolerance))
        }
        _ => exact(actual, expected),
    }
}
