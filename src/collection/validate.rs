use std::collections::HashMap;

use serde_json::Value;

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document, FieldValue, GeoPoint, GeoPolygon, InsertMode};
use crate::schema::{FieldDefinition, FieldType, Schema};

/// Validate and coerce a raw field map against `schema`, per `mode`
/// (spec.md §3's document insertion policy). Returns the field map
/// actually stored for the document; fields dropped under
/// `drop`/`coerce-or-drop` are simply absent from the result.
pub fn coerce_fields(
    schema: &Schema,
    mut raw: HashMap<String, FieldValue>,
    mode: InsertMode,
) -> Result<HashMap<String, FieldValue>> {
    let mut out = HashMap::with_capacity(raw.len());

    for field in &schema.fields {
        if field.is_wildcard() {
            continue;
        }
        match raw.remove(&field.name) {
            Some(value) => match coerce_value(field, value) {
                Ok(coerced) => {
                    out.insert(field.name.clone(), coerced);
                }
                Err(err) => match mode {
                    InsertMode::Reject | InsertMode::CoerceOrReject => return Err(err),
                    InsertMode::Drop | InsertMode::CoerceOrDrop => {}
                },
            },
            None if field.optional => {}
            None => match mode {
                InsertMode::Reject | InsertMode::CoerceOrReject => {
                    return Err(Error::schema_violation(format!("missing required field `{}`", field.name)))
                }
                InsertMode::Drop | InsertMode::CoerceOrDrop => {}
            },
        }
    }

    // Whatever is left belongs to no declared field; under a wildcard
    // schema it's carried through untouched and typed per-value at
    // index time (collection::state::CollectionState::effective_field).
    if schema.wildcard().is_some() {
        out.extend(raw);
    }

    Ok(out)
}

fn coerce_value(field: &FieldDefinition, value: FieldValue) -> Result<FieldValue> {
    if matches!(value, FieldValue::Null) || type_matches(field.kind, &value) {
        return Ok(value);
    }
    coerce_mismatch(field, value)
}

fn type_matches(kind: FieldType, value: &FieldValue) -> bool {
    matches!(
        (kind, value),
        (FieldType::String, FieldValue::Text(_))
            | (FieldType::StringArray, FieldValue::TextArray(_))
            | (FieldType::Int32, FieldValue::Int32(_))
            | (FieldType::Int64, FieldValue::Int64(_))
            | (FieldType::Float, FieldValue::Float(_))
            | (FieldType::Bool, FieldValue::Bool(_))
            | (FieldType::GeoPoint, FieldValue::GeoPoint(_))
            | (FieldType::GeoPointArray, FieldValue::GeoPointArray(_))
            | (FieldType::GeoPolygon, FieldValue::GeoPolygon(_))
    )
}

/// The coercions `coerce-or-reject`/`coerce-or-drop` are willing to try:
/// numeric widening/narrowing between int/float kinds, and text<->number
/// round trips via parsing/formatting (spec.md §3).
fn coerce_mismatch(field: &FieldDefinition, value: FieldValue) -> Result<FieldValue> {
    let failure = || {
        Error::schema_violation(format!(
            "field `{}` expected {:?}, got {}",
            field.name,
            field.kind,
            value.type_name()
        ))
    };

    match (field.kind, &value) {
        (FieldType::GeoPolygon, FieldValue::GeoPointArray(pts)) => {
            Ok(FieldValue::GeoPolygon(GeoPolygon { vertices: pts.clone() }))
        }
        (FieldType::Int32, FieldValue::Int64(v)) => i32::try_from(*v).map(FieldValue::Int32).map_err(|_| failure()),
        (FieldType::Int32, FieldValue::Float(v)) if v.fract() == 0.0 => Ok(FieldValue::Int32(*v as i32)),
        (FieldType::Int64, FieldValue::Int32(v)) => Ok(FieldValue::Int64(*v as i64)),
        (FieldType::Int64, FieldValue::Float(v)) if v.fract() == 0.0 => Ok(FieldValue::Int64(*v as i64)),
        (FieldType::Float, FieldValue::Int32(v)) => Ok(FieldValue::Float(*v as f64)),
        (FieldType::Float, FieldValue::Int64(v)) => Ok(FieldValue::Float(*v as f64)),
        (FieldType::String, FieldValue::Int32(v)) => Ok(FieldValue::Text(v.to_string())),
        (FieldType::String, FieldValue::Int64(v)) => Ok(FieldValue::Text(v.to_string())),
        (FieldType::String, FieldValue::Float(v)) => Ok(FieldValue::Text(v.to_string())),
        (FieldType::String, FieldValue::Bool(v)) => Ok(FieldValue::Text(v.to_string())),
        (FieldType::Int32, FieldValue::Text(s)) => s.parse::<i32>().map(FieldValue::Int32).map_err(|_| failure()),
        (FieldType::Int64, FieldValue::Text(s)) => s.parse::<i64>().map(FieldValue::Int64).map_err(|_| failure()),
        (FieldType::Float, FieldValue::Text(s)) => s.parse::<f64>().map(FieldValue::Float).map_err(|_| failure()),
        (FieldType::Bool, FieldValue::Text(s)) => match s.as_str() {
            "true" => Ok(FieldValue::Bool(true)),
            "false" => Ok(FieldValue::Bool(false)),
            _ => Err(failure()),
        },
        _ => Err(failure()),
    }
}

/// Check an `alter`'s added fields against every existing document before
/// the schema change is committed (spec.md §4.1: "failing the whole alter
/// if any document's existing value is incompatible and the field is
/// non-optional"). Only documents that already carry a value under the new
/// field's name can conflict — the usual case of a brand new field simply
/// leaves older documents without it.
pub fn check_alter_compatible(documents: &HashMap<DocId, Document>, new_fields: &[FieldDefinition]) -> Result<()> {
    for field in new_fields {
        if field.is_wildcard() || field.optional {
            continue;
        }
        for document in documents.values() {
            if let Some(value) = document.fields.get(&field.name) {
                if !matches!(value, FieldValue::Null) && !type_matches(field.kind, value) {
                    return Err(Error::schema_violation(format!(
                        "alter: document `{}` has a value incompatible with new field `{}`",
                        document.external_id, field.name
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Convert a single JSON value into the `FieldValue` shape `kind` expects
/// (spec.md §6: "Dates, numerics, and booleans are coerced per the
/// per-insert mode"). Numeric/string round trips and int widths are left
/// to `coerce_fields`/`coerce_mismatch`; this only resolves the JSON
/// representation itself (e.g. a two-element array is a geopoint, not a
/// coordinate pair, when the target field says so).
fn value_for_kind(kind: FieldType, json: &Value) -> Option<FieldValue> {
    match kind {
        FieldType::String => json.as_str().map(|s| FieldValue::Text(s.to_string())),
        FieldType::StringArray => json
            .as_array()
            .map(|arr| FieldValue::TextArray(arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())),
        FieldType::Int32 => json
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(FieldValue::Int32)
            .or_else(|| json.as_f64().filter(|f| f.fract() == 0.0).map(|f| FieldValue::Int32(f as i32))),
        FieldType::Int64 => json
            .as_i64()
            .map(FieldValue::Int64)
            .or_else(|| json.as_f64().filter(|f| f.fract() == 0.0).map(|f| FieldValue::Int64(f as i64))),
        FieldType::Float => json.as_f64().map(FieldValue::Float),
        FieldType::Bool => json.as_bool().map(FieldValue::Bool),
        FieldType::GeoPoint => geo_point_from_json(json).map(FieldValue::GeoPoint),
        FieldType::GeoPointArray => json
            .as_array()
            .map(|arr| FieldValue::GeoPointArray(arr.iter().filter_map(geo_point_from_json).collect())),
        FieldType::GeoPolygon => json
            .as_array()
            .map(|arr| FieldValue::GeoPolygon(GeoPolygon { vertices: arr.iter().filter_map(geo_point_from_json).collect() })),
        FieldType::Auto => infer_from_json(json),
    }
}

fn geo_point_from_json(json: &Value) -> Option<GeoPoint> {
    let arr = json.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    Some(GeoPoint::new(arr[0].as_f64()?, arr[1].as_f64()?))
}

/// Best-effort JSON -> `FieldValue` mapping with no declared kind to lean
/// on, used for the wildcard field's undeclared values.
fn infer_from_json(json: &Value) -> Option<FieldValue> {
    match json {
        Value::String(s) => Some(FieldValue::Text(s.clone())),
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(FieldValue::Int64(i)),
            None => n.as_f64().map(FieldValue::Float),
        },
        Value::Array(arr) if arr.iter().all(|v| v.is_string()) => {
            Some(FieldValue::TextArray(arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()))
        }
        Value::Null => Some(FieldValue::Null),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Parse a JSON document body into an external id (the `id` field, if
/// present) and a raw field map ready for `coerce_fields` (spec.md §6).
pub fn parse_document_json(schema: &Schema, json: Value) -> Result<(Option<String>, HashMap<String, FieldValue>)> {
    let obj = match json {
        Value::Object(obj) => obj,
        _ => return Err(Error::schema_violation("document must be a JSON object")),
    };

    let mut external_id = None;
    let mut fields = HashMap::with_capacity(obj.len());
    for (key, value) in &obj {
        if key == "id" {
            match value {
                Value::String(s) => external_id = Some(s.clone()),
                Value::Null => {}
                _ => return Err(Error::schema_violation("`id` field must be a string")),
            }
            continue;
        }

        let kind = schema.field(key).map(|f| f.kind).unwrap_or(FieldType::Auto);
        if let Some(parsed) = value_for_kind(kind, value).or_else(|| infer_from_json(value)) {
            fields.insert(key.clone(), parsed);
        }
    }

    Ok((external_id, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .add_field(FieldDefinition::new("title", FieldType::String))
            .unwrap()
            .add_field(FieldDefinition::new("year", FieldType::Int32))
            .unwrap()
    }

    fn fields(pairs: Vec<(&str, FieldValue)>) -> HashMap<String, FieldValue> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn reject_mode_fails_whole_document_on_type_mismatch() {
        let schema = schema();
        let raw = fields(vec![("title", FieldValue::Text("x".into())), ("year", FieldValue::Text("2020".into()))]);
        let err = coerce_fields(&schema, raw, InsertMode::Reject).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::SchemaViolation);
    }

    #[test]
    fn coerce_or_reject_parses_numeric_strings() {
        let schema = schema();
        let raw = fields(vec![("title", FieldValue::Text("x".into())), ("year", FieldValue::Text("2020".into()))]);
        let out = coerce_fields(&schema, raw, InsertMode::CoerceOrReject).unwrap();
        assert_eq!(out.get("year"), Some(&FieldValue::Int32(2020)));
    }

    #[test]
    fn coerce_or_drop_keeps_document_but_drops_unparseable_field() {
        let schema = schema();
        let raw =
            fields(vec![("title", FieldValue::Text("x".into())), ("year", FieldValue::Text("not-a-number".into()))]);
        let out = coerce_fields(&schema, raw, InsertMode::CoerceOrDrop).unwrap();
        assert!(!out.contains_key("year"));
        assert!(out.contains_key("title"));
    }

    #[test]
    fn missing_required_field_is_rejected_under_reject_mode() {
        let schema = schema();
        let raw = fields(vec![("title", FieldValue::Text("x".into()))]);
        let err = coerce_fields(&schema, raw, InsertMode::Reject).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::SchemaViolation);
    }

    #[test]
    fn wildcard_schema_carries_through_undeclared_fields() {
        let schema = Schema::new()
            .add_field(FieldDefinition::new(crate::schema::WILDCARD_FIELD, FieldType::Auto))
            .unwrap();
        let raw = fields(vec![("anything", FieldValue::Bool(true))]);
        let out = coerce_fields(&schema, raw, InsertMode::Reject).unwrap();
        assert_eq!(out.get("anything"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn parse_document_json_extracts_id_and_coerces_via_schema() {
        let schema = schema();
        let json = serde_json::json!({"id": "book-1", "title": "Dune", "year": 1965});
        let (external_id, fields) = parse_document_json(&schema, json).unwrap();
        assert_eq!(external_id, Some("book-1".to_string()));
        assert_eq!(fields.get("title"), Some(&FieldValue::Text("Dune".to_string())));
        assert_eq!(fields.get("year"), Some(&FieldValue::Int64(1965)));
    }

    #[test]
    fn parse_document_json_without_id_leaves_it_none() {
        let schema = schema();
        let json = serde_json::json!({"title": "Dune"});
        let (external_id, _fields) = parse_document_json(&schema, json).unwrap();
        assert_eq!(external_id, None);
    }

    #[test]
    fn parse_document_json_rejects_non_string_id() {
        let schema = schema();
        let json = serde_json::json!({"id": 42});
        let err = parse_document_json(&schema, json).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::SchemaViolation);
    }

    #[test]
    fn parse_document_json_decodes_geopoint_array_as_array_of_pairs() {
        let schema = Schema::new().add_field(FieldDefinition::new("stops", FieldType::GeoPointArray)).unwrap();
        let json = serde_json::json!({"stops": [[40.7128, -74.0060], [34.0522, -118.2437]]});
        let (_, fields) = parse_document_json(&schema, json).unwrap();
        assert_eq!(
            fields.get("stops"),
            Some(&FieldValue::GeoPointArray(vec![
                crate::core::types::GeoPoint::new(40.7128, -74.0060),
                crate::core::types::GeoPoint::new(34.0522, -118.2437),
            ]))
        );
    }

    #[test]
    fn geopoint_array_coerces_into_geopolygon_field() {
        let field = FieldDefinition::new("region", FieldType::GeoPolygon);
        let points = vec![
            crate::core::types::GeoPoint::new(0.0, 0.0),
            crate::core::types::GeoPoint::new(0.0, 1.0),
            crate::core::types::GeoPoint::new(1.0, 1.0),
        ];
        let coerced = coerce_value(&field, FieldValue::GeoPointArray(points.clone())).unwrap();
        assert_eq!(coerced, FieldValue::GeoPolygon(GeoPolygon { vertices: points }));
    }

    #[test]
    fn parse_document_json_infers_undeclared_wildcard_fields() {
        let schema = Schema::new().add_field(FieldDefinition::new(crate::schema::WILDCARD_FIELD, FieldType::Auto)).unwrap();
        let json = serde_json::json!({"tags": ["a", "b"], "active": true});
        let (_, fields) = parse_document_json(&schema, json).unwrap();
        assert_eq!(fields.get("tags"), Some(&FieldValue::TextArray(vec!["a".to_string(), "b".to_string()])));
        assert_eq!(fields.get("active"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn alter_compatibility_rejects_mismatched_existing_value() {
        let mut documents = HashMap::new();
        let mut doc = Document::new(crate::core::types::DocId::new(1), "1".to_string());
        doc.add_field("year".to_string(), FieldValue::Text("not-a-year".to_string()));
        documents.insert(doc.id, doc);

        let new_field = FieldDefinition::new("year", FieldType::Int32);
        let err = check_alter_compatible(&documents, std::slice::from_ref(&new_field)).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::SchemaViolation);
    }

    #[test]
    fn alter_compatibility_ignores_documents_missing_the_new_field() {
        let mut documents = HashMap::new();
        let doc = Document::new(crate::core::types::DocId::new(1), "1".to_string());
        documents.insert(doc.id, doc);

        let new_field = FieldDefinition::new("year", FieldType::Int32);
        assert!(check_alter_compatible(&documents, std::slice::from_ref(&new_field)).is_ok());
    }
}
