use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Internal monotonic sequence id, dense and never reused within a
/// collection (spec.md §3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

/// Runtime-variant numeric scalar. Kinds never mix silently: comparisons
/// between an `Int` and a `Float` promote the int side to float, matching
/// `number_t` in the original implementation this spec was distilled from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

/// A point on the sphere, `(lat, lng)` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        GeoPoint { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// A simple polygon, stored as a CCW-normalized vertex loop (schema.rs /
/// index/geo.rs enforce and normalize orientation at insert time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPolygon {
    pub vertices: Vec<GeoPoint>,
}

/// Value stored in a document field, tagged by the schema's `FieldType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    TextArray(Vec<String>),
    Int32(i32),
    Int64(i64),
    Float(f64),
    Bool(bool),
    GeoPoint(GeoPoint),
    GeoPointArray(Vec<GeoPoint>),
    GeoPolygon(GeoPolygon),
    Null,
}

impl FieldValue {
    pub fn as_number(&self) -> Option<Number> {
        match self {
            FieldValue::Int32(v) => Some(Number::Int(*v as i64)),
            FieldValue::Int64(v) => Some(Number::Int(*v)),
            FieldValue::Float(v) => Some(Number::Float(*v)),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "string",
            FieldValue::TextArray(_) => "string[]",
            FieldValue::Int32(_) => "int32",
            FieldValue::Int64(_) => "int64",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "bool",
            FieldValue::GeoPoint(_) => "geopoint",
            FieldValue::GeoPointArray(_) => "geopoint[]",
            FieldValue::GeoPolygon(_) => "geopolygon",
            FieldValue::Null => "null",
        }
    }
}

/// Document coercion policy applied per insert (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertMode {
    Reject,
    CoerceOrReject,
    CoerceOrDrop,
    Drop,
}

impl Default for InsertMode {
    fn default() -> Self {
        InsertMode::Reject
    }
}

/// A document: an external id plus a JSON-shaped payload conforming to a
/// collection's schema, keyed by field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub external_id: String,
    pub fields: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: DocId, external_id: String) -> Self {
        Document { id, external_id, fields: HashMap::new() }
    }

    pub fn add_field(&mut self, name: String, value: FieldValue) {
        self.fields.insert(name, value);
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_promotes_int_to_float_when_comparing_mixed_kinds() {
        let a = Number::Int(3);
        let b = Number::Float(3.5);
        assert!(a < b);
        assert_eq!(a.as_f64(), 3.0);
    }

    #[test]
    fn number_int_eq_does_not_go_through_float_path() {
        assert_eq!(Number::Int(1), Number::Int(1));
        assert_ne!(Number::Int(1), Number::Float(1.0000001));
    }
}
