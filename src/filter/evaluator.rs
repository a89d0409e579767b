use std::collections::HashMap;

use roaring::RoaringBitmap;

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document, FieldValue, Number};
use crate::filter::ast::{CompareOp, Comparison, FilterExpr, FilterValue, GeoClause, GeoPredicate};
use crate::filter::geo_filter::within_polygon;
use crate::filter::geo_filter::within_radius;
use crate::schema::Schema;

/// Evaluates a parsed `FilterExpr` against a single document. This is
/// the reference (always-correct) evaluation path; index-assisted
/// candidate narrowing in the search pipeline must agree with it on
/// every document it lets through (spec.md §5).
pub struct Evaluator<'a> {
    schema: &'a Schema,
}

impl<'a> Evaluator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Evaluator { schema }
    }

    pub fn evaluate(&self, expr: &FilterExpr, document: &Document) -> Result<bool> {
        match expr {
            FilterExpr::And(left, right) => Ok(self.evaluate(left, document)? && self.evaluate(right, document)?),
            FilterExpr::Or(left, right) => Ok(self.evaluate(left, document)? || self.evaluate(right, document)?),
            FilterExpr::Comparison(comparison) => self.evaluate_comparison(comparison, document),
            FilterExpr::Geo(clause) => self.evaluate_geo(clause, document),
        }
    }

    /// The doc-id set a filter survives across, as a dense bitmap
    /// (spec.md §4.5: "dense bitmap for large ... set"). Doc ids are
    /// truncated to `u32` the same way `index::posting::PostingList`
    /// already frames seq ids, so the collection sizes this core targets
    /// never lose precision.
    pub fn matching_bitmap(
        &self,
        expr: &FilterExpr,
        documents: &HashMap<DocId, Document>,
    ) -> Result<RoaringBitmap> {
        let mut bitmap = RoaringBitmap::new();
        for (doc_id, document) in documents {
            if self.evaluate(expr, document)? {
                bitmap.insert(doc_id.value() as u32);
            }
        }
        Ok(bitmap)
    }

    fn evaluate_comparison(&self, comparison: &Comparison, document: &Document) -> Result<bool> {
        let field = self
            .schema
            .field(&comparison.field)
            .ok_or_else(|| Error::invalid_filter_field(&comparison.field, "unknown field"))?;
        let value = document.get_field(&field.name).unwrap_or(&FieldValue::Null);

        match value {
            FieldValue::Text(text) => self.evaluate_text(comparison, std::slice::from_ref(text)),
            FieldValue::TextArray(texts) => self.evaluate_text(comparison, texts),
            FieldValue::Bool(b) => self.evaluate_bool(comparison, *b),
            FieldValue::Null => Ok(matches!(comparison.op, CompareOp::NotEq)),
            _ => {
                let number = value
                    .as_number()
                    .ok_or_else(|| Error::invalid_filter_field(&comparison.field, "field is not numeric"))?;
                self.evaluate_number(comparison, number)
            }
        }
    }

    fn evaluate_text(&self, comparison: &Comparison, actual: &[String]) -> Result<bool> {
        let wanted: Vec<&str> = comparison
            .values
            .iter()
            .filter_map(|v| match v {
                FilterValue::Text(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();

        let matches = match comparison.op {
            CompareOp::Eq | CompareOp::NotEq => actual.iter().any(|a| wanted.contains(&a.as_str())),
            CompareOp::ExactEq => {
                actual.len() == wanted.len() && wanted.iter().all(|w| actual.iter().any(|a| a == w))
            }
            _ => {
                return Err(Error::invalid_filter_field(
                    &comparison.field,
                    "ordering comparisons are not supported on string fields",
                ))
            }
        };

        Ok(if comparison.op == CompareOp::NotEq { !matches } else { matches })
    }

    fn evaluate_bool(&self, comparison: &Comparison, actual: bool) -> Result<bool> {
        let wanted = comparison.values.iter().any(|v| matches!(v, FilterValue::Bool(b) if *b == actual));
        Ok(match comparison.op {
            CompareOp::Eq | CompareOp::ExactEq => wanted,
            CompareOp::NotEq => !wanted,
            _ => {
                return Err(Error::invalid_filter_field(
                    &comparison.field,
                    "ordering comparisons are not supported on boolean fields",
                ))
            }
        })
    }

    fn evaluate_number(&self, comparison: &Comparison, actual: Number) -> Result<bool> {
        let numbers: Vec<Number> = comparison
            .values
            .iter()
            .filter_map(|v| match v {
                FilterValue::Number(n) => Some(*n),
                _ => None,
            })
            .collect();

        if numbers.is_empty() {
            return Err(Error::invalid_filter_field(&comparison.field, "expected a numeric value"));
        }

        let result = match comparison.op {
            CompareOp::Eq | CompareOp::ExactEq => numbers.iter().any(|&n| n == actual),
            CompareOp::NotEq => numbers.iter().all(|&n| n != actual),
            CompareOp::Lt => numbers.iter().all(|&n| actual < n),
            CompareOp::Lte => numbers.iter().all(|&n| actual <= n),
            CompareOp::Gt => numbers.iter().all(|&n| actual > n),
            CompareOp::Gte => numbers.iter().all(|&n| actual >= n),
        };

        Ok(result)
    }

    fn evaluate_geo(&self, clause: &GeoClause, document: &Document) -> Result<bool> {
        let field = self
            .schema
            .field(&clause.field)
            .ok_or_else(|| Error::invalid_filter_field(&clause.field, "unknown field"))?;
        let value = document.get_field(&field.name).unwrap_or(&FieldValue::Null);

        let points: Vec<crate::core::types::GeoPoint> = match value {
            FieldValue::GeoPoint(p) => vec![*p],
            FieldValue::GeoPointArray(points) => points.clone(),
            FieldValue::Null => Vec::new(),
            _ => return Err(Error::invalid_filter_field(&clause.field, "field is not a geopoint")),
        };
        let is_array = matches!(value, FieldValue::GeoPointArray(_));

        Ok(points.iter().any(|p| self.matches_predicate(&clause.predicate, p, is_array)))
    }

    fn matches_predicate(&self, predicate: &GeoPredicate, point: &crate::core::types::GeoPoint, is_array: bool) -> bool {
        match predicate {
            GeoPredicate::Radius { center, radius_km, exact_filter_radius_km } => {
                within_radius(point, center, *radius_km, is_array, *exact_filter_radius_km)
            }
            GeoPredicate::Polygon(polygon) => within_polygon(point, polygon),
            GeoPredicate::Union(predicates) => predicates.iter().any(|p| self.matches_predicate(p, point, is_array)),
        }
    }
}
