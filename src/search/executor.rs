use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::collection::state::CollectionState;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document, FieldValue, GeoPoint, Number};
use crate::filter::{parse_filter, Evaluator, FilterExpr};
use crate::index::geo::haversine_km;
use crate::index::{InfixMode, Term, TypoDictionary};
use crate::scoring::{compute_proximity, MatchKind, ProximityResult, ScoreSignals};

/// How a single field should be consulted for a query (spec.md §4.6
/// inputs: "per-field weights... typo budget per token, prefix flag per
/// field, infix mode per field").
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub typo_budget: u8,
    pub prefix: bool,
    pub infix_mode: InfixMode,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        FieldSpec { name: name.into(), typo_budget: 1, prefix: true, infix_mode: InfixMode::Off }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub enum SortField {
    Field { name: String, direction: SortDirection },
    GeoDistance { name: String, from: GeoPoint, direction: SortDirection },
}

/// Everything one `CollectionManager::search` call needs (spec.md §4.6,
/// §6's `search` entry point).
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub query_by: Vec<FieldSpec>,
    pub filter_by: Option<String>,
    pub facet_by: Vec<String>,
    pub sort_by: Vec<SortField>,
    pub page: usize,
    pub per_page: usize,
    pub max_candidates: usize,
    pub proximity_window: usize,
    pub highlight_markers: Option<(String, String)>,
    pub deadline: Option<Duration>,
    pub explain: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        SearchRequest {
            query: "*".to_string(),
            query_by: Vec::new(),
            filter_by: None,
            facet_by: Vec::new(),
            sort_by: Vec::new(),
            page: 1,
            per_page: 10,
            max_candidates: 100,
            proximity_window: 5,
            highlight_markers: None,
            deadline: Some(Duration::from_millis(500)),
            explain: false,
        }
    }
}

/// Signal-by-signal breakdown of a hit's score, for debug tooling only —
/// never changes ranked order (spec.md §4.6 supplement, teacher:
/// `search::results::ScoreExplanation`).
#[derive(Debug, Clone)]
pub struct ScoreExplanation {
    pub tokens_matched: u32,
    pub max_match: u32,
    pub min_displacement: u32,
    pub match_kind: MatchKind,
    pub field_priority: u32,
    pub default_sort_value: Number,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: Document,
    pub highlights: HashMap<String, String>,
    pub explanation: Option<ScoreExplanation>,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub found: usize,
    pub hits: Vec<SearchHit>,
    pub facet_counts: HashMap<String, Vec<(String, usize)>>,
    pub search_time_ms: u64,
}

/// Per-query scratch state: the typo dictionaries built for this query's
/// fields and the token expansions derived from them. Owned entirely by
/// one `execute()` call and dropped at every exit path — including the
/// deadline-exceeded early return — so nothing from one query survives
/// into the next (spec.md §9's "scoped resource" design note).
struct QueryArena {
    dictionaries: HashMap<String, TypoDictionary>,
    deadline: Option<Instant>,
}

impl QueryArena {
    fn new(deadline: Option<Duration>) -> Self {
        QueryArena { dictionaries: HashMap::new(), deadline: deadline.map(|d| Instant::now() + d) }
    }

    fn check_deadline(&self) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                return Err(Error::new(ErrorKind::DeadlineExceeded, "query deadline exceeded"));
            }
        }
        Ok(())
    }

    fn dictionary_for<'s>(
        &mut self,
        field: &str,
        state: &'s CollectionState,
        infix_mode: InfixMode,
    ) -> &TypoDictionary {
        self.dictionaries.entry(field.to_string()).or_insert_with(|| match state.inverted.get(field) {
            Some(index) => {
                let terms = index.terms().map(|t| {
                    let text = t.as_str().unwrap_or_default().to_string();
                    (text, index.doc_freq(t) as u32)
                });
                TypoDictionary::build(terms, infix_mode)
            }
            None => TypoDictionary::build(std::iter::empty(), infix_mode),
        })
    }
}

struct FieldContender {
    field_priority: u32,
    tokens_in_field: u32,
    match_kind: MatchKind,
    proximity: ProximityResult,
}

impl FieldContender {
    fn rank_key(&self) -> (std::cmp::Reverse<u32>, std::cmp::Reverse<u32>, u32, std::cmp::Reverse<MatchKind>, u32) {
        (
            std::cmp::Reverse(self.tokens_in_field),
            std::cmp::Reverse(self.proximity.max_match),
            self.proximity.min_displacement,
            std::cmp::Reverse(self.match_kind),
            self.field_priority,
        )
    }
}

/// Expand one query token against a field's typo/prefix/infix dictionary,
/// subject to the caller's typo budget and `max_candidates` bound
/// (spec.md §4.4). Keeps the best `MatchKind` seen per unique surface
/// term — a term can surface from more than one expansion path (e.g. an
/// exact match is also trivially its own prefix).
fn expand_token(dict: &TypoDictionary, token: &str, spec: &FieldSpec, max_candidates: usize) -> HashMap<String, MatchKind> {
    let mut out: HashMap<String, MatchKind> = HashMap::new();
    let mut upgrade = |out: &mut HashMap<String, MatchKind>, term: String, kind: MatchKind| {
        out.entry(term).and_modify(|existing| if kind > *existing { *existing = kind }).or_insert(kind);
    };

    if dict.exact(token).is_some() {
        upgrade(&mut out, token.to_string(), MatchKind::Exact);
    }

    if spec.prefix {
        // spec.md §4.4: candidates are ordered by exact-match-presence first,
        // then by descending frequency, *before* truncation — otherwise a
        // prefix with more than `max_candidates` matches can drop a
        // higher-frequency term in favor of a lower-frequency one depending
        // on the trie's internal child iteration order.
        let mut candidates = dict.prefix_search(token);
        candidates.sort_by(|(term_a, freq_a), (term_b, freq_b)| {
            let exact_a = term_a == token;
            let exact_b = term_b == token;
            exact_b.cmp(&exact_a).then_with(|| freq_b.cmp(freq_a))
        });
        for (term, _freq) in candidates.into_iter().take(max_candidates) {
            upgrade(&mut out, term, MatchKind::Prefix);
        }
    }

    if spec.typo_budget > 0 {
        // The trie walk scores plain Levenshtein distance, which charges 2
        // for a transposition a human typo-tolerance budget should charge
        // 1 for; widen the trie bound by one and let `FuzzyAutomaton`
        // (DFA-backed for budgets <= 2, its own Damerau-Levenshtein routine
        // beyond that) make the authoritative accept/reject call.
        let mut automaton = crate::search::fuzzy::FuzzyAutomaton::new(token.to_string(), spec.typo_budget);
        if spec.typo_budget <= 2 {
            let _ = automaton.build();
        }
        let widened_bound = spec.typo_budget.saturating_add(1);
        for (term, _freq, _trie_distance) in dict.typo_search(token, widened_bound).into_iter().take(max_candidates) {
            if term != token && automaton.matches(&term) {
                upgrade(&mut out, term, MatchKind::Typo);
            }
        }
    }

    let infix_applies = match spec.infix_mode {
        InfixMode::Off => false,
        InfixMode::Always => true,
        InfixMode::Fallback => !out.values().any(|k| *k == MatchKind::Prefix || *k == MatchKind::Exact),
    };
    if infix_applies {
        for (term, _freq) in dict.infix_search(token).into_iter().take(max_candidates) {
            upgrade(&mut out, term, MatchKind::Infix);
        }
    }

    out
}

/// Run one search against a published snapshot. Consumed by
/// `collection::manager::CollectionManager::search` and
/// `CollectionManager::union`.
pub fn execute(
    state: &CollectionState,
    analyzers: &AnalyzerRegistry,
    request: &SearchRequest,
) -> Result<SearchResponse> {
    let started = Instant::now();
    let mut arena = QueryArena::new(request.deadline);

    let filter_expr: Option<FilterExpr> =
        request.filter_by.as_deref().map(parse_filter).transpose()?;
    let evaluator = Evaluator::new(&state.schema);

    let is_wildcard = request.query.trim() == "*";
    let query_tokens: Vec<String> = if is_wildcard {
        Vec::new()
    } else {
        analyzers
            .get("simple")
            .map(|a| a.analyze(&request.query).into_iter().map(|t| t.text).collect())
            .unwrap_or_default()
    };

    arena.check_deadline()?;

    // field -> token index -> (expanded term -> match kind)
    let mut per_field_expansions: HashMap<String, Vec<HashMap<String, MatchKind>>> = HashMap::new();
    if !is_wildcard {
        for field_spec in &request.query_by {
            let dict = arena.dictionary_for(&field_spec.name, state, field_spec.infix_mode);
            let expansions: Vec<HashMap<String, MatchKind>> =
                query_tokens.iter().map(|tok| expand_token(dict, tok, field_spec, request.max_candidates)).collect();
            per_field_expansions.insert(field_spec.name.clone(), expansions);
        }
    }

    arena.check_deadline()?;

    let mut signals_by_doc: HashMap<DocId, ScoreSignals> = HashMap::new();
    let mut matched_spans: HashMap<DocId, HashMap<String, HashSet<String>>> = HashMap::new();

    if is_wildcard {
        for doc_id in state.documents.keys() {
            signals_by_doc.insert(
                *doc_id,
                ScoreSignals {
                    tokens_matched: 0,
                    proximity: ProximityResult::default(),
                    match_kind: MatchKind::Exact,
                    field_priority: 0,
                    default_sort_value: default_sort_value(state, *doc_id),
                    seq_id: *doc_id,
                },
            );
        }
    } else {
        let mut doc_field_positions: HashMap<DocId, HashMap<usize, Vec<Vec<u32>>>> = HashMap::new();
        let mut doc_field_kind: HashMap<DocId, HashMap<usize, MatchKind>> = HashMap::new();
        let mut doc_field_terms: HashMap<DocId, HashMap<usize, HashSet<String>>> = HashMap::new();

        for (field_priority, field_spec) in request.query_by.iter().enumerate() {
            let Some(index) = state.inverted.get(&field_spec.name) else { continue };
            let expansions = match per_field_expansions.get(&field_spec.name) {
                Some(e) => e,
                None => continue,
            };

            for (token_idx, candidates) in expansions.iter().enumerate() {
                if candidates.is_empty() {
                    continue; // "skip" token: zero candidates under budget, query still proceeds.
                }
                for (term_text, kind) in candidates {
                    let term = Term::new(term_text);
                    let Some(postings) = index.term_postings(&term) else { continue };
                    for posting in postings {
                        let per_field = doc_field_positions.entry(posting.doc_id).or_default();
                        let slots = per_field.entry(field_priority).or_insert_with(|| vec![Vec::new(); query_tokens.len()]);
                        slots[token_idx].extend(posting.positions.iter().copied());

                        let kinds = doc_field_kind.entry(posting.doc_id).or_default();
                        kinds.entry(field_priority).and_modify(|k| if *kind > *k { *k = *kind }).or_insert(*kind);

                        doc_field_terms
                            .entry(posting.doc_id)
                            .or_default()
                            .entry(field_priority)
                            .or_default()
                            .insert(term_text.clone());
                    }
                }
            }
        }

        arena.check_deadline()?;

        for (doc_id, per_field) in &doc_field_positions {
            let mut overall_matched_tokens: HashSet<usize> = HashSet::new();
            let mut best: Option<FieldContender> = None;
            let mut best_priority = 0u32;

            for (&field_priority, slots) in per_field {
                for (token_idx, positions) in slots.iter().enumerate() {
                    if !positions.is_empty() {
                        overall_matched_tokens.insert(token_idx);
                    }
                }
                let tokens_in_field = slots.iter().filter(|s| !s.is_empty()).count() as u32;
                let proximity = compute_proximity(slots, request.proximity_window);
                let match_kind = doc_field_kind.get(doc_id).and_then(|m| m.get(&field_priority)).copied().unwrap_or(MatchKind::Infix);

                let contender = FieldContender { field_priority, tokens_in_field, match_kind, proximity };
                let is_better = match &best {
                    None => true,
                    Some(current) => contender.rank_key() < current.rank_key(),
                };
                if is_better {
                    best_priority = field_priority;
                    best = Some(contender);
                }
            }

            let Some(best) = best else { continue };
            signals_by_doc.insert(
                *doc_id,
                ScoreSignals {
                    tokens_matched: overall_matched_tokens.len() as u32,
                    proximity: best.proximity,
                    match_kind: best.match_kind,
                    field_priority: best_priority,
                    default_sort_value: default_sort_value(state, *doc_id),
                    seq_id: *doc_id,
                },
            );
        }

        for (doc_id, per_field) in &doc_field_terms {
            let fields_by_name: HashMap<u32, &str> =
                request.query_by.iter().enumerate().map(|(i, f)| (i as u32, f.name.as_str())).collect();
            let entry = matched_spans.entry(*doc_id).or_default();
            for (field_priority, terms) in per_field {
                if let Some(name) = fields_by_name.get(&(*field_priority as u32)) {
                    entry.entry(name.to_string()).or_default().extend(terms.iter().cloned());
                }
            }
        }
    }

    arena.check_deadline()?;

    // Apply filter by intersecting with the filter evaluator's bitmap of
    // surviving doc ids (spec.md §4.5's "dense bitmap for large" set).
    let mut survivors: Vec<DocId> = if let Some(expr) = &filter_expr {
        let bitmap = evaluator.matching_bitmap(expr, &state.documents)?;
        if is_wildcard {
            bitmap.iter().map(|id| DocId::new(id as u64)).collect()
        } else {
            signals_by_doc.keys().filter(|doc_id| bitmap.contains(doc_id.value() as u32)).copied().collect()
        }
    } else {
        signals_by_doc.keys().copied().collect()
    };

    let facet_counts = compute_facets(state, &filter_expr, &evaluator, &request.facet_by)?;

    arena.check_deadline()?;

    survivors.sort_by(|a, b| {
        if !request.sort_by.is_empty() {
            compare_by_sort_spec(state, &request.sort_by, *a, *b)
        } else {
            let sa = signals_by_doc.get(a);
            let sb = signals_by_doc.get(b);
            match (sa, sb) {
                (Some(x), Some(y)) => x.rank_cmp(y),
                _ => a.cmp(b),
            }
        }
    });

    let found = survivors.len();
    let per_page = request.per_page.max(1);
    let start = request.page.saturating_sub(1) * per_page;
    let page_ids: Vec<DocId> = survivors.into_iter().skip(start).take(per_page).collect();

    let mut hits = Vec::with_capacity(page_ids.len());
    for doc_id in page_ids {
        let document = match state.documents.get(&doc_id) {
            Some(d) => d.clone(),
            None => continue,
        };
        let highlights = match &request.highlight_markers {
            Some((open, close)) => build_highlights(&document, matched_spans.get(&doc_id), analyzers, open, close),
            None => HashMap::new(),
        };
        let explanation = if request.explain {
            signals_by_doc.get(&doc_id).map(|s| ScoreExplanation {
                tokens_matched: s.tokens_matched,
                max_match: s.proximity.max_match,
                min_displacement: s.proximity.min_displacement,
                match_kind: s.match_kind,
                field_priority: s.field_priority,
                default_sort_value: s.default_sort_value,
            })
        } else {
            None
        };
        hits.push(SearchHit { document, highlights, explanation });
    }

    Ok(SearchResponse { found, hits, facet_counts, search_time_ms: started.elapsed().as_millis() as u64 })
}

fn default_sort_value(state: &CollectionState, doc_id: DocId) -> Number {
    let Some(field_name) = state.schema.default_sorting_field.as_deref() else { return Number::Int(0) };
    state
        .documents
        .get(&doc_id)
        .and_then(|d| d.get_field(field_name))
        .and_then(|v| v.as_number())
        .unwrap_or(Number::Int(0))
}

fn compare_by_sort_spec(state: &CollectionState, sort_by: &[SortField], a: DocId, b: DocId) -> Ordering {
    for field in sort_by {
        let ordering = match field {
            SortField::Field { name, direction } => {
                let av = state.documents.get(&a).and_then(|d| d.get_field(name)).and_then(|v| v.as_number());
                let bv = state.documents.get(&b).and_then(|d| d.get_field(name)).and_then(|v| v.as_number());
                compare_undefined_last(av, bv, *direction, |x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal))
            }
            SortField::GeoDistance { name, from, direction } => {
                let ad = state.documents.get(&a).and_then(|d| d.get_field(name)).and_then(as_geo_point).map(|p| haversine_km(&p, from));
                let bd = state.documents.get(&b).and_then(|d| d.get_field(name)).and_then(as_geo_point).map(|p| haversine_km(&p, from));
                compare_undefined_last(ad, bd, *direction, |x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal))
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.cmp(&b)
}

fn as_geo_point(value: &FieldValue) -> Option<GeoPoint> {
    match value {
        FieldValue::GeoPoint(p) => Some(*p),
        _ => None,
    }
}

/// Undefined (missing) values sort last under ASC, first under DESC
/// (spec.md §4.7).
fn compare_undefined_last<T>(
    a: Option<T>,
    b: Option<T>,
    direction: SortDirection,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let natural = cmp(&x, &y);
            if direction == SortDirection::Desc {
                natural.reverse()
            } else {
                natural
            }
        }
        (Some(_), None) => if direction == SortDirection::Asc { Ordering::Less } else { Ordering::Greater },
        (None, Some(_)) => if direction == SortDirection::Asc { Ordering::Greater } else { Ordering::Less },
        (None, None) => Ordering::Equal,
    }
}

fn compute_facets(
    state: &CollectionState,
    filter_expr: &Option<FilterExpr>,
    evaluator: &Evaluator,
    facet_by: &[String],
) -> Result<HashMap<String, Vec<(String, usize)>>> {
    if facet_by.is_empty() {
        return Ok(HashMap::new());
    }

    let filter_survivors: Vec<&Document> = match filter_expr {
        Some(expr) => {
            let bitmap = evaluator.matching_bitmap(expr, &state.documents)?;
            state
                .documents
                .iter()
                .filter(|(doc_id, _)| bitmap.contains(doc_id.value() as u32))
                .map(|(_, document)| document)
                .collect()
        }
        None => state.documents.values().collect(),
    };

    let mut facets: HashMap<String, Vec<(String, usize)>> = HashMap::new();
    for field_name in facet_by {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for document in &filter_survivors {
            if let Some(value) = document.get_field(field_name) {
                for rendered in facet_values(value) {
                    *counts.entry(rendered).or_insert(0) += 1;
                }
            }
        }
        let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        facets.insert(field_name.clone(), ordered);
    }

    Ok(facets)
}

fn facet_values(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::Text(s) => vec![s.clone()],
        FieldValue::TextArray(items) => items.clone(),
        FieldValue::Int32(v) => vec![v.to_string()],
        FieldValue::Int64(v) => vec![v.to_string()],
        FieldValue::Float(v) => vec![v.to_string()],
        FieldValue::Bool(v) => vec![v.to_string()],
        _ => Vec::new(),
    }
}

fn build_highlights(
    document: &Document,
    matched: Option<&HashMap<String, HashSet<String>>>,
    analyzers: &AnalyzerRegistry,
    open: &str,
    close: &str,
) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(matched) = matched else { return out };

    for (field_name, terms) in matched {
        let Some(FieldValue::Text(text)) = document.get_field(field_name) else { continue };
        let Some(analyzer) = analyzers.get("simple") else { continue };
        let tokens = analyzer.analyze(text);

        let mut spans: Vec<(usize, usize)> =
            tokens.iter().filter(|t| terms.contains(&t.text)).map(|t| (t.offset, t.offset + t.length)).collect();
        spans.sort_unstable();

        let mut highlighted = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for (start, end) in spans {
            if start < cursor {
                continue;
            }
            highlighted.push_str(&text[cursor..start]);
            highlighted.push_str(open);
            highlighted.push_str(&text[start..end]);
            highlighted.push_str(close);
            cursor = end;
        }
        highlighted.push_str(&text[cursor..]);
        out.insert(field_name.clone(), highlighted);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::AnalyzerRegistry;
    use crate::core::types::DocId;
    use crate::schema::{FieldDefinition, FieldType, Schema};

    fn schema() -> Schema {
        Schema::new()
            .add_field(FieldDefinition::new("title", FieldType::String))
            .unwrap()
            .add_field(FieldDefinition::new("year", FieldType::Int32).sortable())
            .unwrap()
    }

    fn doc(id: u64, title: &str, year: i32) -> Document {
        let mut d = Document::new(DocId::new(id), id.to_string());
        d.add_field("title".to_string(), FieldValue::Text(title.to_string()));
        d.add_field("year".to_string(), FieldValue::Int32(year));
        d
    }

    #[test]
    fn wildcard_query_with_no_filter_returns_every_document() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "red car", 2020), &analyzers, None).unwrap();
        state.index_document(&doc(2, "blue bike", 2019), &analyzers, None).unwrap();

        let request = SearchRequest { query: "*".to_string(), ..Default::default() };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.found, 2);
    }

    #[test]
    fn empty_collection_returns_zero_found() {
        let analyzers = AnalyzerRegistry::new();
        let state = CollectionState::empty(schema());
        let request = SearchRequest {
            query: "anything".to_string(),
            query_by: vec![FieldSpec::new("title")],
            ..Default::default()
        };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.found, 0);
    }

    #[test]
    fn every_surviving_token_is_independently_searchable() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "red car", 2020), &analyzers, None).unwrap();

        let request = SearchRequest {
            query: "car".to_string(),
            query_by: vec![FieldSpec::new("title")],
            ..Default::default()
        };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.found, 1);
    }

    #[test]
    fn typo_budget_zero_never_matches_an_edited_token() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "looks", 2020), &analyzers, None).unwrap();

        let mut field = FieldSpec::new("title");
        field.typo_budget = 0;
        field.prefix = false;
        let request = SearchRequest { query: "loox".to_string(), query_by: vec![field], ..Default::default() };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.found, 0);
    }

    #[test]
    fn exact_match_ranks_above_typo_match() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "looks", 2020), &analyzers, None).unwrap();
        state.index_document(&doc(2, "loox", 2021), &analyzers, None).unwrap();

        let mut field = FieldSpec::new("title");
        field.typo_budget = 1;
        field.prefix = false;
        let request = SearchRequest { query: "loox".to_string(), query_by: vec![field], ..Default::default() };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.hits[0].document.id, DocId::new(2));
    }

    #[test]
    fn filter_narrows_results() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "red car", 2020), &analyzers, None).unwrap();
        state.index_document(&doc(2, "blue car", 2019), &analyzers, None).unwrap();

        let request = SearchRequest {
            query: "car".to_string(),
            query_by: vec![FieldSpec::new("title")],
            filter_by: Some("year:>2019".to_string()),
            ..Default::default()
        };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.found, 1);
        assert_eq!(response.hits[0].document.id, DocId::new(1));
    }

    #[test]
    fn wildcard_query_is_subject_to_the_filter() {
        let analyzers = AnalyzerRegistry::new();
        let mut state = CollectionState::empty(schema());
        state.index_document(&doc(1, "red car", 2020), &analyzers, None).unwrap();
        state.index_document(&doc(2, "blue bike", 2019), &analyzers, None).unwrap();

        let request =
            SearchRequest { query: "*".to_string(), filter_by: Some("year:>2019".to_string()), ..Default::default() };
        let response = execute(&state, &analyzers, &request).unwrap();
        assert_eq!(response.found, 1);
    }
}
