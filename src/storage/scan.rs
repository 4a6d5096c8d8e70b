//! Scan request vocabulary shared by the planner and the substrate

use std::cmp::Ordering;

use serde_json::{json, Value};

use crate::lang::value::{compare_values, comparable};

/// Access mode of a storage cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Scan direction over the key order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Parses a sort directive (`1` or `-1`)
    pub fn from_directive(value: &Value) -> Option<Self> {
        match value.as_i64() {
            Some(1) => Some(Direction::Ascending),
            Some(-1) => Some(Direction::Descending),
            _ => None,
        }
    }

    /// Applies the direction to an ascending comparison
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    }

    /// Returns the directive value (`1` or `-1`)
    pub fn directive(&self) -> i64 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }
}

/// One end of a key range
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBound {
    pub value: Value,
    pub inclusive: bool,
}

/// Contiguous range over index keys.
///
/// A bounded range only matches keys of the same type as its bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRange {
    pub lower: Option<KeyBound>,
    pub upper: Option<KeyBound>,
}

impl KeyRange {
    /// The unbounded range
    pub fn all() -> Self {
        Self::default()
    }

    /// Exactly one key
    pub fn only(value: Value) -> Self {
        Self {
            lower: Some(KeyBound {
                value: value.clone(),
                inclusive: true,
            }),
            upper: Some(KeyBound {
                value,
                inclusive: true,
            }),
        }
    }

    /// Keys greater than (or equal to) `value`
    pub fn above(value: Value, inclusive: bool) -> Self {
        Self {
            lower: Some(KeyBound { value, inclusive }),
            upper: None,
        }
    }

    /// Keys less than (or equal to) `value`
    pub fn below(value: Value, inclusive: bool) -> Self {
        Self {
            lower: None,
            upper: Some(KeyBound { value, inclusive }),
        }
    }

    /// Returns true if neither end is bounded
    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Returns true if no key can satisfy both ends
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match compare_values(&lower.value, &upper.value) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => !comparable(&lower.value, &upper.value),
            },
            _ => false,
        }
    }

    /// Returns true if `key` lies inside the range
    pub fn contains(&self, key: &Value) -> bool {
        if let Some(lower) = &self.lower {
            if !comparable(key, &lower.value) {
                return false;
            }
            match compare_values(key, &lower.value) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            if !comparable(key, &upper.value) {
                return false;
            }
            match compare_values(key, &upper.value) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Describes the range for explain output
    pub fn describe(&self) -> Value {
        let bound = |b: &Option<KeyBound>| match b {
            Some(b) => json!({ "value": b.value, "inclusive": b.inclusive }),
            None => Value::Null,
        };
        json!({ "lower": bound(&self.lower), "upper": bound(&self.upper) })
    }
}

/// A storage-level scan: which index, what range, which direction
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Index path literal; `None` scans the primary `_id` order
    pub index: Option<String>,
    pub range: KeyRange,
    pub direction: Direction,
}

impl ScanRequest {
    /// Full primary-order scan, ascending
    pub fn primary() -> Self {
        Self {
            index: None,
            range: KeyRange::all(),
            direction: Direction::Ascending,
        }
    }
}
