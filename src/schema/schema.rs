use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    StringArray,
    Int32,
    Int64,
    Float,
    Bool,
    GeoPoint,
    GeoPointArray,
    GeoPolygon,
    /// Only legal on the wildcard field `.*`; the concrete type is
    /// inferred per-document at projection time.
    Auto,
}

/// A single schema field and its indexing flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldType,
    pub indexed: bool,
    pub faceted: bool,
    pub sortable: bool,
    pub optional: bool,
    pub infix_indexed: bool,
    /// Analyzer registered in `AnalyzerRegistry`; only consulted for
    /// `String`/`StringArray` fields.
    pub analyzer: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        FieldDefinition {
            name: name.into(),
            kind,
            indexed: true,
            faceted: false,
            sortable: false,
            optional: false,
            infix_indexed: false,
            analyzer: None,
        }
    }

    pub fn faceted(mut self) -> Self {
        self.faceted = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn infix(mut self) -> Self {
        self.infix_indexed = true;
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD_FIELD
    }
}

pub const WILDCARD_FIELD: &str = ".*";

/// Ordered set of fields for a collection. Fields may be added or dropped
/// only; kind changes are rejected (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldDefinition>,
    pub default_analyzer: String,
    /// Field used as the collection's `default_sort_value` tie-breaker
    /// signal (e).
    pub default_sorting_field: Option<String>,
}

impl Schema {
    pub fn new() -> Self {
        Schema { fields: Vec::new(), default_analyzer: "standard".to_string(), default_sorting_field: None }
    }

    pub fn with_default_sorting_field(mut self, field: impl Into<String>) -> Self {
        self.default_sorting_field = Some(field.into());
        self
    }

    pub fn add_field(mut self, field: FieldDefinition) -> Result<Self> {
        self.validate_new_field(&field)?;
        self.fields.push(field);
        Ok(self)
    }

    fn validate_new_field(&self, field: &FieldDefinition) -> Result<()> {
        if self.fields.iter().any(|f| f.name == field.name) {
            return Err(Error::conflict(format!("field `{}` already exists in schema", field.name)));
        }
        if field.is_wildcard() {
            if field.kind != FieldType::Auto {
                return Err(Error::conflict("wildcard field `.*` must have kind `auto`"));
            }
            if self.fields.iter().any(|f| f.is_wildcard()) {
                return Err(Error::conflict("schema may declare at most one wildcard field `.*`"));
            }
        }
        Ok(())
    }

    /// Apply an `alter`: add new fields, drop existing fields by name.
    /// Kind changes on an existing field are rejected.
    pub fn alter(&mut self, add: Vec<FieldDefinition>, drop: Vec<String>) -> Result<()> {
        for name in &drop {
            if !self.fields.iter().any(|f| &f.name == name) {
                return Err(Error::not_found(format!("field `{}` not found", name)));
            }
        }
        for field in &add {
            self.validate_new_field(field)?;
        }
        for field in add {
            self.fields.push(field);
        }
        self.fields.retain(|f| !drop.contains(&f.name));
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn wildcard(&self) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.is_wildcard())
    }

    pub fn get_analyzer_for_field(&self, field_name: &str) -> &str {
        self.field(field_name)
            .and_then(|f| f.analyzer.as_deref())
            .unwrap_or(&self.default_analyzer)
    }

    pub fn indexed_string_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.indexed && matches!(f.kind, FieldType::String | FieldType::StringArray))
    }

    pub fn faceted_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.faceted)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_field_name() {
        let schema = Schema::new().add_field(FieldDefinition::new("title", FieldType::String)).unwrap();
        let err = schema.add_field(FieldDefinition::new("title", FieldType::Int32)).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::Conflict);
    }

    #[test]
    fn rejects_second_wildcard_field() {
        let schema = Schema::new()
            .add_field(FieldDefinition::new(WILDCARD_FIELD, FieldType::Auto))
            .unwrap();
        let err = schema.add_field(FieldDefinition::new(WILDCARD_FIELD, FieldType::Auto)).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::Conflict);
    }

    #[test]
    fn alter_drops_field_but_leaves_others() {
        let mut schema = Schema::new()
            .add_field(FieldDefinition::new("title", FieldType::String))
            .unwrap()
            .add_field(FieldDefinition::new("year", FieldType::Int32))
            .unwrap();
        schema.alter(vec![], vec!["title".to_string()]).unwrap();
        assert!(schema.field("title").is_none());
        assert!(schema.field("year").is_some());
    }

    #[test]
    fn alter_on_missing_field_is_not_found() {
        let mut schema = Schema::new();
        let err = schema.alter(vec![], vec!["missing".to_string()]).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::NotFound);
    }
}
