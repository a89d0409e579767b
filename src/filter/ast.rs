use crate::core::types::{GeoPoint, GeoPolygon, Number};

/// Filter expression AST, produced by `filter::parser::parse_filter` and
/// consumed by `filter::evaluator::Evaluator` (spec.md §5).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Comparison(Comparison),
    Geo(GeoClause),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub values: Vec<FilterValue>,
}

/// Comparison operator as written in a filter string (spec.md §5.1).
/// `Eq` (`:`) matches any of `values`; `ExactEq` (`:=`) additionally
/// requires the field to hold *exactly* that set for array fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    ExactEq,
    NotEq,
    Lt,
    Gt,
    Lte,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(Number),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoClause {
    pub field: String,
    pub predicate: GeoPredicate,
}

/// Geo predicate forms a field's clause may take (spec.md §5.3).
#[derive(Debug, Clone, PartialEq)]
pub enum GeoPredicate {
    Radius {
        center: GeoPoint,
        radius_km: f64,
        /// Explicit `exact_filter_radius:` override, in km. `None` means
        /// the evaluator falls back to the field's own default (10km for
        /// array fields, 0 for scalar fields; see
        /// `filter::geo_filter::exact_filter_radius_km`).
        exact_filter_radius_km: Option<f64>,
    },
    Polygon(GeoPolygon),
    Union(Vec<GeoPredicate>),
}
