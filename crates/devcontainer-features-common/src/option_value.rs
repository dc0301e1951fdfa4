//! A dynamic option-value sum type, per §9's re-architecture guidance:
//! user-supplied Feature options may be a bool, a string, or (for the
//! nested override syntax some Features use) a map of further values.
//!
//! Serialized with an untagged enum, the same idiom `wasm-pkg-common`
//! uses for `TomlAuth` in `wasm-pkg-common::config::oci`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    String(String),
    Map(BTreeMap<String, OptionValue>),
}

impl OptionValue {
    fn kind_rank(&self) -> u8 {
        match self {
            OptionValue::Bool(_) => 0,
            OptionValue::String(_) => 1,
            OptionValue::Map(_) => 2,
        }
    }

    /// Length used by the comparator: 1 for scalars, entry count for maps.
    fn len(&self) -> usize {
        match self {
            OptionValue::Bool(_) | OptionValue::String(_) => 1,
            OptionValue::Map(m) => m.len(),
        }
    }
}

impl Eq for OptionValue {}

/// Compares by length first, then keys, then values — matching the
/// reference scheduler's option comparator (§4.8, §9).
impl Ord for OptionValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.len().cmp(&other.len()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (self, other) {
            (OptionValue::Bool(a), OptionValue::Bool(b)) => a.cmp(b),
            (OptionValue::String(a), OptionValue::String(b)) => a.cmp(b),
            (OptionValue::Map(a), OptionValue::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    match ka.cmp(kb) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                    match va.cmp(vb) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                }
                Ordering::Equal
            }
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for OptionValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The options a user supplied for a single Feature instantiation.
pub type OptionsMap = BTreeMap<String, OptionValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorter_sorts_before_longer() {
        let a = OptionValue::Bool(true);
        let mut m = BTreeMap::new();
        m.insert("x".to_string(), OptionValue::Bool(false));
        let b = OptionValue::Map(m);
        assert_eq!(a.cmp(&b), Ordering::Equal.then(a.len().cmp(&b.len())));
        assert!(a.len() < b.len());
    }

    #[test]
    fn equal_length_compares_by_key_then_value() {
        let a = OptionValue::String("alpha".into());
        let b = OptionValue::String("beta".into());
        assert_eq!(a.cmp(&b), Ordering::Less);
    }

    #[test]
    fn maps_compare_entrywise() {
        let mut m1 = BTreeMap::new();
        m1.insert("a".to_string(), OptionValue::Bool(false));
        let mut m2 = BTreeMap::new();
        m2.insert("a".to_string(), OptionValue::Bool(true));
        assert_eq!(
            OptionValue::Map(m1).cmp(&OptionValue::Map(m2)),
            Ordering::Less
        );
    }

    #[test]
    fn serializes_untagged() {
        let v = OptionValue::Bool(true);
        assert_eq!(serde_json::to_string(&v).unwrap(), "true");
        let v = OptionValue::String("x".into());
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"x\"");
    }
}
