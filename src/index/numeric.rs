use std::collections::BTreeMap;

use crate::core::types::{DocId, Number};

/// Ordered index over one numeric field: value -> sorted set of doc ids
/// carrying that value. Backs `:`, `:<`, `:>`, `:<=`, `:>=`, `:!=`
/// filter comparisons and range facets (spec.md §5.2).
#[derive(Default, Clone)]
pub struct NumericIndex {
    by_value: BTreeMap<OrderedNumber, Vec<DocId>>,
}

/// `Number` wrapper giving a total order so it can key a `BTreeMap`;
/// `Number`'s own `PartialOrd` already promotes int/float comparisons,
/// this just makes that total for the subset of values actually stored
/// (NaN is rejected at ingest, never reaches this index).
#[derive(Debug, Clone, Copy, PartialEq)]
struct OrderedNumber(Number);

impl Eq for OrderedNumber {}

impl PartialOrd for OrderedNumber {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedNumber {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_f64().partial_cmp(&other.0.as_f64()).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl NumericIndex {
    pub fn new() -> Self {
        NumericIndex { by_value: BTreeMap::new() }
    }

    pub fn insert(&mut self, value: Number, doc_id: DocId) {
        let entry = self.by_value.entry(OrderedNumber(value)).or_default();
        if let Err(pos) = entry.binary_search(&doc_id) {
            entry.insert(pos, doc_id);
        }
    }

    pub fn remove(&mut self, value: Number, doc_id: DocId) {
        if let Some(entry) = self.by_value.get_mut(&OrderedNumber(value)) {
            if let Ok(pos) = entry.binary_search(&doc_id) {
                entry.remove(pos);
            }
            if entry.is_empty() {
                self.by_value.remove(&OrderedNumber(value));
            }
        }
    }

    pub fn equal(&self, value: Number) -> Vec<DocId> {
        self.by_value.get(&OrderedNumber(value)).cloned().unwrap_or_default()
    }

    pub fn not_equal(&self, value: Number) -> Vec<DocId> {
        let mut out = Vec::new();
        for (v, ids) in &self.by_value {
            if v.0 != value {
                out.extend(ids);
            }
        }
        out.sort_unstable();
        out
    }

    pub fn less_than(&self, value: Number, inclusive: bool) -> Vec<DocId> {
        self.range_collect(|v| if inclusive { *v <= value } else { *v < value })
    }

    pub fn greater_than(&self, value: Number, inclusive: bool) -> Vec<DocId> {
        self.range_collect(|v| if inclusive { *v >= value } else { *v > value })
    }

    pub fn between(&self, low: Number, high: Number) -> Vec<DocId> {
        self.range_collect(|v| *v >= low && *v <= high)
    }

    fn range_collect(&self, predicate: impl Fn(&Number) -> bool) -> Vec<DocId> {
        let mut out = Vec::new();
        for (v, ids) in &self.by_value {
            if predicate(&v.0) {
                out.extend(ids);
            }
        }
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_returns_exact_matches_only() {
        let mut idx = NumericIndex::new();
        idx.insert(Number::Int(5), DocId::new(1));
        idx.insert(Number::Int(7), DocId::new(2));
        assert_eq!(idx.equal(Number::Int(5)), vec![DocId::new(1)]);
    }

    #[test]
    fn range_queries_respect_inclusivity() {
        let mut idx = NumericIndex::new();
        idx.insert(Number::Int(1), DocId::new(1));
        idx.insert(Number::Int(5), DocId::new(2));
        idx.insert(Number::Int(10), DocId::new(3));

        assert_eq!(idx.greater_than(Number::Int(5), false), vec![DocId::new(3)]);
        assert_eq!(idx.greater_than(Number::Int(5), true).len(), 2);
    }

    #[test]
    fn mixed_int_float_comparisons_promote_correctly() {
        let mut idx = NumericIndex::new();
        idx.insert(Number::Int(3), DocId::new(1));
        idx.insert(Number::Float(3.5), DocId::new(2));
        assert_eq!(idx.less_than(Number::Float(3.2), false), vec![DocId::new(1)]);
    }

    #[test]
    fn remove_drops_doc_from_value_bucket() {
        let mut idx = NumericIndex::new();
        idx.insert(Number::Int(5), DocId::new(1));
        idx.insert(Number::Int(5), DocId::new(2));
        idx.remove(Number::Int(5), DocId::new(1));
        assert_eq!(idx.equal(Number::Int(5)), vec![DocId::new(2)]);
    }
}
