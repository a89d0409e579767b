use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::analysis::analyzer::{Analyzer, AnalyzerRegistry};
use crate::analysis::token::Token;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document, FieldValue};
use crate::index::{GeoPointIndex, GeoPolygonIndex, InvertedIndex, NumericIndex};
use crate::schema::{FieldDefinition, FieldType, Schema};

/// Point-in-time indexed view of one collection's documents, published
/// through `mvcc::controller::MVCCController` and replaced wholesale
/// (clone-on-write) by every committed write (spec.md §6).
#[derive(Clone)]
pub struct CollectionState {
    pub schema: Schema,
    pub documents: HashMap<DocId, Document>,
    pub external_ids: HashMap<String, DocId>,
    pub inverted: HashMap<String, InvertedIndex>,
    pub numeric: HashMap<String, NumericIndex>,
    pub geo_points: HashMap<String, GeoPointIndex>,
    pub geo_polygons: HashMap<String, GeoPolygonIndex>,
}

impl CollectionState {
    pub fn empty(schema: Schema) -> Self {
        CollectionState {
            schema,
            documents: HashMap::new(),
            external_ids: HashMap::new(),
            inverted: HashMap::new(),
            numeric: HashMap::new(),
            geo_points: HashMap::new(),
            geo_polygons: HashMap::new(),
        }
    }

    /// Field definition to index `name` under: its declared definition if
    /// the schema has one, otherwise one synthesized from the wildcard
    /// field and the value's own runtime type (spec.md §3's `.*` field).
    pub fn effective_field<'a>(&'a self, name: &'a str, value: &FieldValue) -> Option<Cow<'a, FieldDefinition>> {
        if let Some(field) = self.schema.field(name) {
            return Some(Cow::Borrowed(field));
        }
        let wildcard = self.schema.wildcard()?;
        let kind = match value {
            FieldValue::Text(_) => FieldType::String,
            FieldValue::TextArray(_) => FieldType::StringArray,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::Int64(_) => FieldType::Int64,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::GeoPoint(_) => FieldType::GeoPoint,
            FieldValue::GeoPointArray(_) => FieldType::GeoPointArray,
            FieldValue::GeoPolygon(_) => FieldType::GeoPolygon,
            FieldValue::Null => return None,
        };
        let mut synthesized = FieldDefinition::new(name, kind);
        synthesized.analyzer = wildcard.analyzer.clone();
        synthesized.infix_indexed = wildcard.infix_indexed;
        synthesized.sortable = matches!(kind, FieldType::Int32 | FieldType::Int64 | FieldType::Float);
        Some(Cow::Owned(synthesized))
    }

    /// Index one document into every per-field structure it touches, and
    /// record it in `documents`/`external_ids`. Callers must have already
    /// coerced `document.fields` against the schema
    /// (`collection::validate::coerce_fields`). `precomputed` supplies
    /// already-tokenized text for fields a caller tokenized ahead of time
    /// (e.g. `collection::collection::Collection::add_batch`'s parallel
    /// tokenization pass); fields absent from it fall back to tokenizing
    /// inline.
    pub fn index_document(
        &mut self,
        document: &Document,
        analyzers: &AnalyzerRegistry,
        precomputed: Option<&HashMap<String, Vec<Token>>>,
    ) -> Result<()> {
        self.index_fields(document, analyzers, precomputed)?;
        self.external_ids.insert(document.external_id.clone(), document.id);
        self.documents.insert(document.id, document.clone());
        Ok(())
    }

    /// Rebuild every derived index from `self.documents` as it currently
    /// stands, without touching `documents`/`external_ids` themselves.
    /// Used during collection recovery once a snapshot has repopulated
    /// the document set (spec.md §7).
    pub fn reindex_all(&mut self, analyzers: &AnalyzerRegistry) -> Result<()> {
        let documents: Vec<Document> = self.documents.values().cloned().collect();
        for document in &documents {
            self.index_fields(document, analyzers, None)?;
        }
        Ok(())
    }

    fn index_fields(
        &mut self,
        document: &Document,
        analyzers: &AnalyzerRegistry,
        precomputed: Option<&HashMap<String, Vec<Token>>>,
    ) -> Result<()> {
        for (name, value) in &document.fields {
            let field = match self.effective_field(name, value) {
                Some(f) => f,
                None => continue,
            };
            if !field.indexed {
                continue;
            }
            let cached_tokens = precomputed.and_then(|p| p.get(&field.name));
            self.index_field_value(document.id, &field, value, analyzers, cached_tokens)?;
        }
        Ok(())
    }

    fn index_field_value(
        &mut self,
        doc_id: DocId,
        field: &FieldDefinition,
        value: &FieldValue,
        analyzers: &AnalyzerRegistry,
        cached_tokens: Option<&Vec<Token>>,
    ) -> Result<()> {
        match value {
            FieldValue::Text(text) => {
                let tokens = match cached_tokens {
                    Some(tokens) => tokens.clone(),
                    None => self.analyzer_for(field, analyzers)?.analyze(text),
                };
                self.inverted.entry(field.name.clone()).or_default().add_document(doc_id, &tokens);
            }
            FieldValue::TextArray(texts) => {
                let tokens = match cached_tokens {
                    Some(tokens) => tokens.clone(),
                    None => self.analyzer_for(field, analyzers)?.analyze_array(texts),
                };
                self.inverted.entry(field.name.clone()).or_default().add_document(doc_id, &tokens);
            }
            FieldValue::Int32(_) | FieldValue::Int64(_) | FieldValue::Float(_) => {
                if let Some(number) = value.as_number() {
                    self.numeric.entry(field.name.clone()).or_default().insert(number, doc_id);
                }
            }
            FieldValue::GeoPoint(point) => {
                self.geo_points.entry(field.name.clone()).or_default().insert(doc_id, *point);
            }
            FieldValue::GeoPointArray(points) => {
                let index = self.geo_points.entry(field.name.clone()).or_default();
                for point in points {
                    index.insert(doc_id, *point);
                }
            }
            FieldValue::GeoPolygon(polygon) => {
                self.geo_polygons.entry(field.name.clone()).or_default().insert(doc_id, polygon.clone());
            }
            FieldValue::Bool(_) | FieldValue::Null => {}
        }
        Ok(())
    }

    fn analyzer_for(&self, field: &FieldDefinition, analyzers: &AnalyzerRegistry) -> Result<Arc<Analyzer>> {
        let name = field.analyzer.as_deref().unwrap_or(&self.schema.default_analyzer);
        analyzers.get(name).ok_or_else(|| Error::not_found(format!("analyzer `{}` not found", name)))
    }

    /// Remove a document's contribution from every index it was indexed
    /// into, and from `documents`/`external_ids`. A no-op if `doc_id`
    /// isn't present.
    pub fn remove_document(&mut self, doc_id: DocId) {
        let document = match self.documents.remove(&doc_id) {
            Some(d) => d,
            None => return,
        };
        self.external_ids.remove(&document.external_id);

        for (name, value) in &document.fields {
            let field = match self.effective_field(name, value) {
                Some(f) => f,
                None => continue,
            };
            match value {
                FieldValue::Text(_) | FieldValue::TextArray(_) => {
                    if let Some(index) = self.inverted.get_mut(field.name.as_str()) {
                        index.remove_document(doc_id);
                    }
                }
                FieldValue::Int32(_) | FieldValue::Int64(_) | FieldValue::Float(_) => {
                    if let Some(number) = value.as_number() {
                        if let Some(index) = self.numeric.get_mut(field.name.as_str()) {
                            index.remove(number, doc_id);
                        }
                    }
                }
                FieldValue::GeoPoint(point) => {
                    if let Some(index) = self.geo_points.get_mut(field.name.as_str()) {
                        index.remove(doc_id, *point);
                    }
                }
                FieldValue::GeoPointArray(points) => {
                    if let Some(index) = self.geo_points.get_mut(field.name.as_str()) {
                        for point in points {
                            index.remove(doc_id, *point);
                        }
                    }
                }
                FieldValue::GeoPolygon(_) => {
                    if let Some(index) = self.geo_polygons.get_mut(field.name.as_str()) {
                        index.remove(doc_id);
                    }
                }
                FieldValue::Bool(_) | FieldValue::Null => {}
            }
        }
    }

    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    /// Project one newly declared field across every existing document
    /// that already carries a value under its name (spec.md §4.1's
    /// `alter`: adding a field scans existing documents and projects it,
    /// rather than requiring a full reindex). A no-op for the wildcard
    /// field itself, which only changes how *future* writes are typed.
    pub fn project_added_field(&mut self, field: &FieldDefinition, analyzers: &AnalyzerRegistry) -> Result<()> {
        if field.name == crate::schema::WILDCARD_FIELD || !field.indexed {
            return Ok(());
        }
        let doc_ids: Vec<DocId> = self.documents.keys().copied().collect();
        for doc_id in doc_ids {
            let value = match self.documents.get(&doc_id).and_then(|d| d.get_field(&field.name)) {
                Some(FieldValue::Null) | None => continue,
                Some(v) => v.clone(),
            };
            self.index_field_value(doc_id, field, &value, analyzers, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn schema() -> Schema {
        Schema::new()
            .add_field(FieldDefinition::new("title", FieldType::String))
            .unwrap()
            .add_field(FieldDefinition::new("year", FieldType::Int32))
            .unwrap()
    }

    fn doc(id: u64, title: &str, year: i32) -> Document {
        let mut d = Document::new(DocId::new(id), id.to_string());
        d.add_field("title".to_string(), FieldValue::Text(title.to_string()));
        d.add_field("year".to_string(), FieldValue::Int32(year));
        d
    }

    #[test]
    fn index_document_populates_text_and_numeric_indexes() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "red car", 2020), &analyzers, None).unwrap();

        assert_eq!(state.doc_count(), 1);
        assert!(state.inverted.get("title").is_some());
        assert_eq!(state.numeric.get("year").unwrap().equal(crate::core::types::Number::Int(2020)), vec![DocId::new(1)]);
    }

    #[test]
    fn remove_document_clears_every_index_it_touched() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "red car", 2020), &analyzers, None).unwrap();
        state.remove_document(DocId::new(1));

        assert_eq!(state.doc_count(), 0);
        assert!(state.external_ids.is_empty());
        assert_eq!(state.numeric.get("year").unwrap().equal(crate::core::types::Number::Int(2020)), Vec::<DocId>::new());
    }

    #[test]
    fn wildcard_field_is_indexed_with_an_inferred_type() {
        let schema = Schema::new().add_field(FieldDefinition::new(crate::schema::WILDCARD_FIELD, FieldType::Auto)).unwrap();
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema);

        let mut d = Document::new(DocId::new(1), "1".to_string());
        d.add_field("rating".to_string(), FieldValue::Float(4.5));
        state.index_document(&d, &analyzers, None).unwrap();

        assert!(state.numeric.contains_key("rating"));
    }
}
