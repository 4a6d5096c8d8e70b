//! Value ordering, equality and structural hashing
//!
//! One total order is shared by range predicates, the sort stage and the
//! storage indexes, so an index scan and an in-memory sort agree on the
//! position of every value.
//!
//! Cross-type order: null < bool < number < string < array < object.
//! Numbers compare numerically (1 == 1.0), arrays element-wise, objects
//! by their key-sorted entries.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};

/// Rank of a value's type in the cross-type order
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Returns true if both values share a type rank
pub fn comparable(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Total structural comparison of two values
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => compare_objects(x, y),
        _ => Ordering::Equal,
    }
}

/// Structural equality: numbers by value, objects regardless of key order
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

// 2^127: every integral f64 below this magnitude is an exact i128.
const I128_LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// A number in its single canonical form: the exact integer when the value
/// is integral, otherwise the float.
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    fn of(n: &Number) -> Self {
        if let Some(i) = n.as_i64() {
            return Numeric::Int(i as i128);
        }
        if let Some(u) = n.as_u64() {
            return Numeric::Int(u as i128);
        }
        let f = n.as_f64().unwrap_or(0.0);
        if f.fract() == 0.0 && f >= -I128_LIMIT && f < I128_LIMIT {
            Numeric::Int(f as i128)
        } else {
            Numeric::Float(f)
        }
    }
}

// Exact comparison. A `Float` is never integral inside the i128 range, so
// it never equals an `Int`.
fn compare_int_float(i: i128, f: f64) -> Ordering {
    if f >= I128_LIMIT {
        return Ordering::Less;
    }
    if f < -I128_LIMIT {
        return Ordering::Greater;
    }
    if i <= f.floor() as i128 {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (Numeric::of(x), Numeric::of(y)) {
        (Numeric::Int(a), Numeric::Int(b)) => a.cmp(&b),
        (Numeric::Float(a), Numeric::Float(b)) => a.total_cmp(&b),
        (Numeric::Int(a), Numeric::Float(b)) => compare_int_float(a, b),
        (Numeric::Float(a), Numeric::Int(b)) => compare_int_float(b, a).reverse(),
    }
}

fn sorted_entries(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn compare_objects(x: &Map<String, Value>, y: &Map<String, Value>) -> Ordering {
    let left = sorted_entries(x);
    let right = sorted_entries(y);

    for ((lk, lv), (rk, rv)) in left.iter().zip(right.iter()) {
        let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

/// SHA-256 digest of a value's canonical structure.
///
/// Values that are `values_equal` hash identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueHash([u8; 32]);

impl ValueHash {
    /// Returns the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Computes the structural hash of a value
pub fn structural_hash(value: &Value) -> ValueHash {
    let mut hasher = Sha256::new();
    feed(&mut hasher, value);
    ValueHash(hasher.finalize().into())
}

fn feed(hasher: &mut Sha256, value: &Value) {
    hasher.update([type_rank(value)]);
    match value {
        Value::Null => {}
        Value::Bool(b) => hasher.update([*b as u8]),
        Value::Number(n) => feed_number(hasher, n),
        Value::String(s) => {
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update((map.len() as u64).to_le_bytes());
            for (key, item) in sorted_entries(map) {
                hasher.update((key.len() as u64).to_le_bytes());
                hasher.update(key.as_bytes());
                feed(hasher, item);
            }
        }
    }
}

fn feed_number(hasher: &mut Sha256, n: &Number) {
    match Numeric::of(n) {
        Numeric::Int(i) => {
            hasher.update([0]);
            hasher.update(i.to_le_bytes());
        }
        Numeric::Float(f) => {
            hasher.update([1]);
            hasher.update(f.to_bits().to_le_bytes());
        }
    }
}

/// Returns the numeric value as f64, if the value is a number
pub fn as_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Builds a JSON number from an f64, preferring an integer representation
pub fn number_value(n: f64) -> Value {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
