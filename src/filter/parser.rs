use nom::character::complete::{alpha1, digit1};
use nom::combinator::{opt, recognize};
use nom::multi::many0_count;
use nom::sequence::pair;
use nom::IResult;

use crate::core::error::{Error, Result};
use crate::core::types::{GeoPoint, GeoPolygon, Number};
use crate::filter::ast::{CompareOp, Comparison, FilterExpr, FilterValue, GeoClause, GeoPredicate};

/// Parse a `filter_by` expression string into a `FilterExpr` tree
/// (spec.md §5). Grammar, loosest to tightest binding:
///   expr   := or_expr
///   or_expr  := and_expr ( "||" and_expr )*
///   and_expr := atom ( "&&" atom )*
///   atom     := "(" expr ")" | comparison | geo_clause
pub fn parse_filter(input: &str) -> Result<FilterExpr> {
    let mut parser = Parser { input };
    let expr = parser.parse_or()?;
    parser.skip_ws();
    if !parser.input.is_empty() {
        return Err(Error::invalid_filter(format!("unexpected trailing input: `{}`", parser.input)));
    }
    Ok(expr)
}

/// The two accepted geo clause forms, named identically in every error
/// message so a caller can recover without re-reading the grammar
/// (spec.md §8 scenario 5).
fn geo_grammar_error(field: &str) -> Error {
    Error::invalid_filter_field(
        field,
        "expected a radius clause like field:([lat,lng], radius: N (km|mi)) or a polygon clause \
         like field:([lat1,lng1, lat2,lng2, …])",
    )
}

fn nan_error(field: &str) -> Error {
    Error::invalid_filter_field(
        field,
        "coordinates must be finite numbers (NaN not allowed); accepted radius form: \
         field:([lat,lng], radius: N (km|mi)); accepted polygon form: \
         field:([lat1,lng1, lat2,lng2, …])",
    )
}

struct Parser<'a> {
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        self.input = self.input.trim_start();
    }

    fn consume(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.input.starts_with(token) {
            self.input = &self.input[token.len()..];
            true
        } else {
            false
        }
    }

    /// Consumes a bare keyword (e.g. `radius`) only if it is not itself a
    /// prefix of a longer identifier.
    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        if self.input.starts_with(keyword) {
            let rest = &self.input[keyword.len()..];
            if rest.chars().next().map_or(true, |c| !c.is_alphanumeric() && c != '_') {
                self.input = rest;
                return true;
            }
        }
        false
    }

    fn parse_or(&mut self) -> Result<FilterExpr> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.consume("||") {
                let right = self.parse_and()?;
                left = FilterExpr::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterExpr> {
        let mut left = self.parse_atom()?;
        loop {
            self.skip_ws();
            if self.consume("&&") {
                let right = self.parse_atom()?;
                left = FilterExpr::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_atom(&mut self) -> Result<FilterExpr> {
        self.skip_ws();
        if self.consume("(") {
            let expr = self.parse_or()?;
            self.skip_ws();
            if !self.consume(")") {
                return Err(Error::invalid_filter("unclosed `(` in filter expression"));
            }
            return Ok(expr);
        }
        self.parse_clause()
    }

    fn parse_clause(&mut self) -> Result<FilterExpr> {
        let field = self.parse_identifier()?;
        self.skip_ws();
        if !self.consume(":") {
            return Err(Error::invalid_filter_field(&field, "expected `:` after field name"));
        }

        self.skip_ws();
        if self.input.starts_with('(') || self.looks_like_geo_union() {
            let predicate = self.parse_geo_predicate(&field)?;
            return Ok(FilterExpr::Geo(GeoClause { field, predicate }));
        }

        let op = self.parse_compare_op();
        let values = self.parse_value_list(&field)?;
        Ok(FilterExpr::Comparison(Comparison { field, op, values }))
    }

    /// A `[` immediately followed (after whitespace) by `(` is the
    /// combined/union geo form; a plain value list never starts a bracket
    /// with a nested paren, so this disambiguates against `tags:[a,b,c]`.
    fn looks_like_geo_union(&self) -> bool {
        self.input.starts_with('[') && self.input[1..].trim_start().starts_with('(')
    }

    fn parse_compare_op(&mut self) -> CompareOp {
        for (token, op) in [
            ("!=", CompareOp::NotEq),
            ("<=", CompareOp::Lte),
            (">=", CompareOp::Gte),
            ("=", CompareOp::ExactEq),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ] {
            if self.consume(token) {
                return op;
            }
        }
        CompareOp::Eq
    }

    fn parse_value_list(&mut self, field: &str) -> Result<Vec<FilterValue>> {
        self.skip_ws();
        if self.consume("[") {
            let mut values = Vec::new();
            loop {
                values.push(self.parse_value(field)?);
                self.skip_ws();
                if self.consume(",") {
                    continue;
                }
                if self.consume("]") {
                    break;
                }
                return Err(Error::invalid_filter_field(field, "expected `,` or `]` in value list"));
            }
            Ok(values)
        } else {
            Ok(vec![self.parse_value(field)?])
        }
    }

    fn parse_value(&mut self, field: &str) -> Result<FilterValue> {
        self.skip_ws();
        if self.consume("true") {
            return Ok(FilterValue::Bool(true));
        }
        if self.consume("false") {
            return Ok(FilterValue::Bool(false));
        }
        if self.input.starts_with('"') {
            return self.parse_quoted_string().map(FilterValue::Text);
        }
        if let Some(number) = self.try_parse_number() {
            return Ok(FilterValue::Number(number));
        }
        let bare = self.parse_bare_token();
        if bare.is_empty() {
            return Err(Error::invalid_filter_field(field, "expected a value"));
        }
        Ok(FilterValue::Text(bare))
    }

    fn parse_quoted_string(&mut self) -> Result<String> {
        self.input = &self.input[1..];
        let end = self.input.find('"').ok_or_else(|| Error::invalid_filter("unterminated quoted string"))?;
        let value = self.input[..end].to_string();
        self.input = &self.input[end + 1..];
        Ok(value)
    }

    fn try_parse_number(&mut self) -> Option<Number> {
        let (rest, matched): (&str, &str) = recognize(pair(
            opt(nom::character::complete::char('-')),
            pair(digit1, opt(pair(nom::character::complete::char('.'), digit1))),
        ))(self.input)
        .ok()?;

        if matched.is_empty() {
            return None;
        }
        self.input = rest;
        if matched.contains('.') {
            matched.parse::<f64>().ok().map(Number::Float)
        } else {
            matched.parse::<i64>().ok().map(Number::Int)
        }
    }

    fn parse_bare_token(&mut self) -> String {
        let end = self.input
            .find(|c: char| c.is_whitespace() || c == ',' || c == ']' || c == ')' || c == '&' || c == '|')
            .unwrap_or(self.input.len());
        let token = self.input[..end].to_string();
        self.input = &self.input[end..];
        token
    }

    fn parse_identifier(&mut self) -> Result<String> {
        self.skip_ws();
        let result: IResult<&str, &str> =
            recognize(pair(alpha1, many0_count(alt_alphanumeric_underscore_dot)))(self.input);
        match result {
            Ok((rest, matched)) => {
                self.input = rest;
                Ok(matched.to_string())
            }
            Err(_) => Err(Error::invalid_filter("expected a field name")),
        }
    }

    /// A number literal, or one of the textual NaN spellings (so coordinate
    /// validation below can reject it with a precise message rather than
    /// having `f64::from_str` silently fail to parse).
    fn try_parse_geo_number(&mut self) -> Option<f64> {
        self.skip_ws();
        for token in ["NaN", "nan", "NAN"] {
            if self.input.starts_with(token) {
                let rest = &self.input[token.len()..];
                if rest.chars().next().map_or(true, |c| !c.is_alphanumeric()) {
                    self.input = rest;
                    return Some(f64::NAN);
                }
            }
        }

        let (rest, matched): (&str, &str) = recognize(pair(
            opt(nom::character::complete::char('-')),
            pair(digit1, opt(pair(nom::character::complete::char('.'), digit1))),
        ))(self.input)
        .ok()?;

        if matched.is_empty() {
            return None;
        }
        self.input = rest;
        matched.parse::<f64>().ok()
    }

    /// `N (km|mi)`, defaulting to `km` when the unit is omitted (legacy
    /// grammar only; the bracketed grammar always names a unit).
    fn parse_distance(&mut self, field: &str) -> Result<f64> {
        self.skip_ws();
        let value = self.try_parse_geo_number().ok_or_else(|| geo_grammar_error(field))?;
        self.skip_ws();
        let unit = self.parse_bare_token();
        let km = match unit.as_str() {
            "km" | "" => value,
            "mi" => value * 1.60934,
            _ => return Err(geo_grammar_error(field)),
        };
        if !km.is_finite() {
            return Err(nan_error(field));
        }
        Ok(km)
    }

    fn parse_number_bracket_list(&mut self, field: &str) -> Result<Vec<f64>> {
        if !self.consume("[") {
            return Err(geo_grammar_error(field));
        }
        let mut numbers = Vec::new();
        loop {
            self.skip_ws();
            let n = self.try_parse_geo_number().ok_or_else(|| geo_grammar_error(field))?;
            numbers.push(n);
            self.skip_ws();
            if self.consume(",") {
                continue;
            }
            if self.consume("]") {
                break;
            }
            return Err(geo_grammar_error(field));
        }
        Ok(numbers)
    }

    /// Entry point for a geo clause's value: either a parenthesized
    /// radius/legacy form, or a top-level `[ (pred), (pred), ... ]` union.
    fn parse_geo_predicate(&mut self, field: &str) -> Result<GeoPredicate> {
        self.skip_ws();
        if self.input.starts_with('[') {
            return self.parse_geo_union(field);
        }
        if !self.consume("(") {
            return Err(geo_grammar_error(field));
        }
        let predicate = self.parse_geo_predicate_body(field)?;
        self.skip_ws();
        if !self.consume(")") {
            return Err(Error::invalid_filter_field(field, "unclosed geo clause"));
        }
        Ok(predicate)
    }

    fn parse_geo_union(&mut self, field: &str) -> Result<GeoPredicate> {
        self.consume("[");
        let mut predicates = Vec::new();
        loop {
            self.skip_ws();
            if !self.consume("(") {
                return Err(geo_grammar_error(field));
            }
            predicates.push(self.parse_geo_predicate_body(field)?);
            self.skip_ws();
            if !self.consume(")") {
                return Err(Error::invalid_filter_field(field, "unclosed geo clause inside union"));
            }
            self.skip_ws();
            if self.consume(",") {
                continue;
            }
            if self.consume("]") {
                break;
            }
            return Err(Error::invalid_filter_field(field, "expected `,` or `]` in geo union"));
        }
        Ok(GeoPredicate::Union(predicates))
    }

    /// The content between a geo clause's parens: a bracketed point-radius
    /// form, a bracketed flat polygon vertex list, or a legacy form.
    fn parse_geo_predicate_body(&mut self, field: &str) -> Result<GeoPredicate> {
        self.skip_ws();
        if self.input.starts_with('[') {
            return self.parse_bracket_geo_body(field);
        }
        self.parse_legacy_geo_body(field)
    }

    fn parse_bracket_geo_body(&mut self, field: &str) -> Result<GeoPredicate> {
        let numbers = self.parse_number_bracket_list(field)?;
        self.skip_ws();

        if self.input.starts_with(',') {
            // [lat,lng], radius: N (km|mi) [, exact_filter_radius: N (km|mi)]
            if numbers.len() != 2 {
                return Err(geo_grammar_error(field));
            }
            self.consume(",");
            self.skip_ws();
            if !self.consume_keyword("radius") {
                return Err(geo_grammar_error(field));
            }
            self.skip_ws();
            if !self.consume(":") {
                return Err(geo_grammar_error(field));
            }
            let radius_km = self.parse_distance(field)?;

            self.skip_ws();
            let mut exact_filter_radius_km = None;
            if self.input.starts_with(',') {
                self.consume(",");
                self.skip_ws();
                if !self.consume_keyword("exact_filter_radius") {
                    return Err(geo_grammar_error(field));
                }
                self.skip_ws();
                if !self.consume(":") {
                    return Err(geo_grammar_error(field));
                }
                exact_filter_radius_km = Some(self.parse_distance(field)?);
            }

            let center = GeoPoint::new(numbers[0], numbers[1]);
            if !center.is_finite() {
                return Err(nan_error(field));
            }
            return Ok(GeoPredicate::Radius { center, radius_km, exact_filter_radius_km });
        }

        // [lat1,lng1, lat2,lng2, ...]
        if numbers.len() < 6 || numbers.len() % 2 != 0 {
            return Err(Error::invalid_filter_field(field, "a polygon needs at least 3 [lat,lng] vertex pairs"));
        }
        let vertices: Vec<GeoPoint> = numbers.chunks(2).map(|pair| GeoPoint::new(pair[0], pair[1])).collect();
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(nan_error(field));
        }
        Ok(GeoPredicate::Polygon(GeoPolygon { vertices }))
    }

    /// Legacy grammar: `lat, lng, N unit` or `(lat1, lng1), (lat2, lng2), ...`.
    fn parse_legacy_geo_body(&mut self, field: &str) -> Result<GeoPredicate> {
        if let Some(first) = self.try_parse_geo_number() {
            self.skip_ws();
            self.consume(",");
            let lng = self.try_parse_geo_number().ok_or_else(|| geo_grammar_error(field))?;
            self.skip_ws();
            self.consume(",");
            let radius_km = self.parse_distance(field)?;
            let center = GeoPoint::new(first, lng);
            if !center.is_finite() {
                return Err(nan_error(field));
            }
            return Ok(GeoPredicate::Radius { center, radius_km, exact_filter_radius_km: None });
        }

        let mut vertices = Vec::new();
        loop {
            self.skip_ws();
            if !self.consume("(") {
                break;
            }
            let lat = self.try_parse_geo_number().ok_or_else(|| geo_grammar_error(field))?;
            self.skip_ws();
            self.consume(",");
            let lng = self.try_parse_geo_number().ok_or_else(|| geo_grammar_error(field))?;
            self.skip_ws();
            if !self.consume(")") {
                return Err(Error::invalid_filter_field(field, "unclosed polygon vertex"));
            }
            vertices.push(GeoPoint::new(lat, lng));
            self.skip_ws();
            if !self.consume(",") {
                break;
            }
        }
        if vertices.len() < 3 {
            return Err(geo_grammar_error(field));
        }
        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(nan_error(field));
        }
        Ok(GeoPredicate::Polygon(GeoPolygon { vertices }))
    }
}

fn alt_alphanumeric_underscore_dot(input: &str) -> IResult<&str, char> {
    let ch = input.chars().next();
    match ch {
        Some(c) if c.is_alphanumeric() || c == '_' || c == '.' => Ok((&input[c.len_utf8()..], c)),
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::AlphaNumeric))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let expr = parse_filter("genre:fiction").unwrap();
        match expr {
            FilterExpr::Comparison(c) => {
                assert_eq!(c.field, "genre");
                assert_eq!(c.op, CompareOp::Eq);
                assert_eq!(c.values, vec![FilterValue::Text("fiction".to_string())]);
            }
            other => panic!("expected Comparison, got {:?}", other),
        }
    }

    #[test]
    fn parses_numeric_range_with_boolean_and() {
        let expr = parse_filter("year:>1999 && year:<=2020").unwrap();
        assert!(matches!(expr, FilterExpr::And(_, _)));
    }

    #[test]
    fn parses_value_list() {
        let expr = parse_filter("tags:=[a,b,c]").unwrap();
        match expr {
            FilterExpr::Comparison(c) => {
                assert_eq!(c.op, CompareOp::ExactEq);
                assert_eq!(c.values.len(), 3);
            }
            other => panic!("expected Comparison, got {:?}", other),
        }
    }

    #[test]
    fn parses_legacy_geo_radius_clause() {
        let expr = parse_filter("location:(40.7128, -74.0060, 5 km)").unwrap();
        match expr {
            FilterExpr::Geo(clause) => {
                assert!(matches!(clause.predicate, GeoPredicate::Radius { .. }));
            }
            other => panic!("expected Geo, got {:?}", other),
        }
    }

    #[test]
    fn parses_bracketed_geo_radius_clause_with_exact_filter_radius() {
        let expr = parse_filter("loc:([-44.50, 170.29], radius: 0.75 km, exact_filter_radius: 5 km)").unwrap();
        match expr {
            FilterExpr::Geo(clause) => match clause.predicate {
                GeoPredicate::Radius { radius_km, exact_filter_radius_km, .. } => {
                    assert!((radius_km - 0.75).abs() < 1e-9);
                    assert_eq!(exact_filter_radius_km, Some(5.0));
                }
                other => panic!("expected Radius, got {:?}", other),
            },
            other => panic!("expected Geo, got {:?}", other),
        }
    }

    #[test]
    fn parses_bracketed_polygon_clause() {
        let expr = parse_filter("loc:([56.33, -65.97, 23.82, -127.82, 10.0, 10.0])").unwrap();
        match expr {
            FilterExpr::Geo(clause) => {
                assert!(matches!(clause.predicate, GeoPredicate::Polygon(_)));
            }
            other => panic!("expected Geo, got {:?}", other),
        }
    }

    #[test]
    fn parses_combined_union_clause() {
        let expr = parse_filter(
            "loc:[([0.0, 0.0], radius: 1 km), ([56.33, -65.97, 23.82, -127.82, 10.0, 10.0])]",
        )
        .unwrap();
        match expr {
            FilterExpr::Geo(clause) => {
                assert!(matches!(clause.predicate, GeoPredicate::Union(ref v) if v.len() == 2));
            }
            other => panic!("expected Geo, got {:?}", other),
        }
    }

    #[test]
    fn nan_coordinates_are_rejected_with_both_accepted_forms_named() {
        let err = parse_filter("loc:([NaN,nan], radius: 1 mi)").unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::InvalidFilter);
        assert!(err.context.contains("radius: N (km|mi)"));
        assert!(err.context.contains("lat1,lng1"));
    }

    #[test]
    fn parses_grouped_or_expression() {
        let expr = parse_filter("(genre:fiction || genre:drama) && year:>2000").unwrap();
        assert!(matches!(expr, FilterExpr::And(_, _)));
    }

    #[test]
    fn rejects_malformed_clause_with_field_in_error() {
        let err = parse_filter("price:").unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::InvalidFilter);
        assert!(err.context.contains("price"));
    }

    #[test]
    fn plain_bracket_value_list_is_not_mistaken_for_a_geo_union() {
        let expr = parse_filter("tags:[a,b]").unwrap();
        assert!(matches!(expr, FilterExpr::Comparison(_)));
    }
}
