//! Reference evaluator for the query tree over documents held in memory.
//!
//! Scoring is deliberately simple but keeps the shape of the real backend:
//! filters score a constant 1, text clauses score by the share of query terms
//! found, `best_fields` takes the best field plus `tie_breaker` times the rest,
//! nested clauses average over the matching children and field value factors
//! contribute `modifier(factor * value)`.

use std::cmp::Ordering;

use ahash::AHashMap as HashMap;
use itertools::Itertools;
use rapidfuzz::distance::levenshtein;
use rayon::prelude::*;
use regex::Regex;
use serde_json::json;
use tracing::{debug, instrument};

use super::{BackendError, RawHit, RawHits, RawSearchResponse, SearchBackend, TotalHits};
use crate::{
    document::{GeoPoint, IndexedRestaurant, TagAnnotation, fields},
    query::{
        BoolQuery, FunctionScoreQuery, MultiMatchQuery, MultiMatchType, NestedQuery, Operator,
        Query, ScoreFunction, SearchRequest, SortClause, SortOrder,
    },
};

/// Hits returned when a request does not set a size.
const DEFAULT_SIZE: usize = 10;

/// Holds documents per index and answers search requests over them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    indices: HashMap<String, Vec<IndexedRestaurant>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with a single index holding `docs`.
    pub fn with_documents(
        index: impl Into<String>,
        docs: impl IntoIterator<Item = IndexedRestaurant>,
    ) -> Self {
        let mut backend = Self::new();
        backend
            .indices
            .insert(index.into(), docs.into_iter().collect());
        backend
    }

    pub fn insert(&mut self, index: &str, doc: IndexedRestaurant) {
        self.indices.entry(index.to_string()).or_default().push(doc);
    }

    pub fn len(&self, index: &str) -> usize {
        self.indices.get(index).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }
}

impl SearchBackend for InMemoryBackend {
    #[instrument(name = "In-memory search", level = "debug", skip(self, request))]
    fn search(&self, index: &str, request: &SearchRequest) -> Result<RawSearchResponse, BackendError> {
        let docs = self.indices.get(index).ok_or_else(|| BackendError::Status {
            status: 404,
            body: format!("no such index [{index}]"),
        })?;

        let scored: Vec<Option<(usize, f64)>> = docs
            .par_iter()
            .enumerate()
            .map(|(pos, doc)| {
                evaluate(&request.query, Scope::Restaurant(doc)).map(|s| s.map(|score| (pos, score)))
            })
            .collect::<Result<_, _>>()?;

        let mut matched: Vec<Candidate<'_>> = scored
            .into_iter()
            .flatten()
            .map(|(pos, score)| Candidate::new(&docs[pos], pos, score, &request.sort))
            .collect();
        let total = matched.len() as u64;

        if request.sort.is_empty() {
            matched.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.pos.cmp(&b.pos)));
        } else {
            matched.sort_by(|a, b| compare_sort_keys(a, b, &request.sort));
        }
        matched.truncate(request.size.unwrap_or(DEFAULT_SIZE));

        debug!(total, returned = matched.len(), "Evaluated in-memory search");

        let hits = matched
            .into_iter()
            .map(|c| RawHit {
                id: Some(c.doc.id.to_string()),
                score: Some(c.score),
                source: Some(c.doc.clone()),
                sort: c.sort_keys.iter().map(|k| json!(k)).collect(),
            })
            .collect();

        Ok(RawSearchResponse {
            took: 0,
            hits: RawHits {
                total: Some(TotalHits::Object {
                    value: total,
                    relation: "eq".to_string(),
                }),
                hits,
            },
        })
    }
}

struct Candidate<'a> {
    doc: &'a IndexedRestaurant,
    pos: usize,
    score: f64,
    sort_keys: Vec<f64>,
}

impl<'a> Candidate<'a> {
    fn new(doc: &'a IndexedRestaurant, pos: usize, score: f64, sort: &[SortClause]) -> Self {
        let sort_keys = sort
            .iter()
            .map(|clause| match clause {
                SortClause::Score => score,
                SortClause::GeoDistance { origin, .. } => origin.distance_meters_to(&doc.location),
            })
            .collect();
        Self {
            doc,
            pos,
            score,
            sort_keys,
        }
    }
}

fn compare_sort_keys(a: &Candidate<'_>, b: &Candidate<'_>, sort: &[SortClause]) -> Ordering {
    sort.iter()
        .zip(a.sort_keys.iter().zip(&b.sort_keys))
        .map(|(clause, (ka, kb))| match clause {
            SortClause::Score => kb.total_cmp(ka),
            SortClause::GeoDistance { order, .. } => match order {
                SortOrder::Asc => ka.total_cmp(kb),
                SortOrder::Desc => kb.total_cmp(ka),
            },
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
        .then(a.pos.cmp(&b.pos))
}

/// The document a clause is evaluated against: a restaurant, or one of its
/// tags inside a nested clause.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Restaurant(&'a IndexedRestaurant),
    Tag(&'a TagAnnotation),
}

impl<'a> Scope<'a> {
    fn text(self, field: &str) -> Result<&'a str, BackendError> {
        match (self, field) {
            (Self::Restaurant(r), fields::NAME) => Ok(&r.name),
            (Self::Restaurant(r), fields::ADDRESS) => Ok(&r.address),
            (Self::Restaurant(r), fields::CATEGORY) => Ok(&r.category),
            (Self::Restaurant(r), fields::KAKAO_PLACE_ID) => Ok(&r.kakao_place_id),
            (Self::Tag(t), fields::TAG_NAME) => Ok(&t.tag_name),
            _ => Err(unknown_field(field)),
        }
    }

    fn number(self, field: &str) -> Result<Option<f64>, BackendError> {
        match (self, field) {
            (Self::Tag(t), fields::TAG_AVG_CONFIDENCE) => Ok(t.avg_confidence),
            (Self::Tag(t), fields::TAG_FREQUENCY) => Ok(t.frequency.map(|f| f as f64)),
            _ => Err(unknown_field(field)),
        }
    }

    fn geo(self, field: &str) -> Result<GeoPoint, BackendError> {
        match (self, field) {
            (Self::Restaurant(r), fields::LOCATION) => Ok(r.location),
            _ => Err(unknown_field(field)),
        }
    }
}

fn unknown_field(field: &str) -> BackendError {
    BackendError::Unsupported(format!("field [{field}] is not available in this scope"))
}

/// Score of `query` against `scope`, or `None` if it does not match.
fn evaluate(query: &Query, scope: Scope<'_>) -> Result<Option<f64>, BackendError> {
    let score = match query {
        Query::MatchAll => Some(1.0),
        Query::GeoDistance(q) => {
            let distance = q.center.distance_meters_to(&scope.geo(&q.field)?);
            (distance <= f64::from(q.distance_meters)).then_some(1.0)
        }
        Query::Term(q) => (scope.text(&q.field)? == q.value).then_some(1.0),
        Query::Wildcard(q) => wildcard_regex(&q.pattern)?
            .is_match(scope.text(&q.field)?)
            .then_some(1.0),
        Query::Match(q) => {
            let terms = analyze(&q.query);
            let doc_terms = analyze(scope.text(&q.field)?);
            let found = terms.iter().filter(|t| doc_terms.contains(t)).count();
            (found > 0).then(|| found as f64 / terms.len() as f64)
        }
        Query::MultiMatch(q) => evaluate_multi_match(q, scope)?,
        Query::Bool(q) => evaluate_bool(q, scope)?,
        Query::Nested(q) => evaluate_nested(q, scope)?,
        Query::FunctionScore(q) => evaluate_function_score(q, scope)?,
    };
    Ok(score)
}

fn evaluate_bool(q: &BoolQuery, scope: Scope<'_>) -> Result<Option<f64>, BackendError> {
    for clause in &q.must_not {
        if evaluate(clause, scope)?.is_some() {
            return Ok(None);
        }
    }

    let mut score = 0.0;
    for clause in &q.must {
        match evaluate(clause, scope)? {
            Some(s) => score += s,
            None => return Ok(None),
        }
    }

    let mut should_matched = 0;
    for clause in &q.should {
        if let Some(s) = evaluate(clause, scope)? {
            should_matched += 1;
            score += s;
        }
    }
    let should_required = match q.minimum_should_match {
        Some(msm) => msm.required(q.should.len()),
        None if q.must.is_empty() && !q.should.is_empty() => 1,
        None => 0,
    };
    if should_matched < should_required {
        return Ok(None);
    }

    if q.must.is_empty() && q.should.is_empty() {
        // Only exclusions, or no clauses at all: everything else matches.
        score = 1.0;
    }
    Ok(Some(score))
}

fn evaluate_nested(q: &NestedQuery, scope: Scope<'_>) -> Result<Option<f64>, BackendError> {
    let Scope::Restaurant(restaurant) = scope else {
        return Err(BackendError::Unsupported(
            "nested clauses cannot be nested".to_string(),
        ));
    };
    if q.path != fields::TAGS {
        return Err(unknown_field(&q.path));
    }

    let mut child_scores = Vec::new();
    for tag in &restaurant.tags {
        if let Some(s) = evaluate(&q.query, Scope::Tag(tag))? {
            child_scores.push(s);
        }
    }
    if child_scores.is_empty() {
        return Ok(None);
    }
    Ok(Some(child_scores.iter().sum::<f64>() / child_scores.len() as f64))
}

fn evaluate_function_score(
    q: &FunctionScoreQuery,
    scope: Scope<'_>,
) -> Result<Option<f64>, BackendError> {
    let base = match &q.query {
        Some(inner) => evaluate(inner, scope)?,
        None => Some(1.0),
    };
    let Some(base) = base else {
        return Ok(None);
    };

    let mut product = 1.0;
    for function in &q.functions {
        match function {
            ScoreFunction::FieldValueFactor(fvf) => {
                let value = fvf.apply(scope.number(&fvf.field)?).ok_or_else(|| {
                    BackendError::Unsupported(format!(
                        "missing value for field [{}] and no default given",
                        fvf.field
                    ))
                })?;
                product *= value;
            }
        }
    }
    Ok(Some(base * product))
}

fn evaluate_multi_match(q: &MultiMatchQuery, scope: Scope<'_>) -> Result<Option<f64>, BackendError> {
    let terms = analyze(&q.query);
    if terms.is_empty() {
        return Ok(None);
    }
    let required = match (q.operator, q.minimum_should_match) {
        (Operator::And, _) => terms.len(),
        (Operator::Or, Some(msm)) => msm.required(terms.len()),
        (Operator::Or, None) => 1,
    };

    let mut field_scores = Vec::with_capacity(q.fields.len());
    for field in &q.fields {
        let doc_terms = analyze(scope.text(&field.name)?);
        let weights: Vec<f64> = terms
            .iter()
            .filter_map(|term| {
                let max_edits = q.fuzziness.map_or(0, |f| f.max_edits(term.chars().count()));
                best_term_match(term, &doc_terms, max_edits, q.prefix_length)
            })
            .collect();
        if weights.len() >= required {
            field_scores.push(field.boost * weights.iter().sum::<f64>() / terms.len() as f64);
        }
    }
    if field_scores.is_empty() {
        return Ok(None);
    }

    let score = match q.match_type {
        MultiMatchType::MostFields => field_scores.iter().sum(),
        MultiMatchType::BestFields => {
            let best = field_scores.iter().copied().fold(f64::MIN, f64::max);
            let rest: f64 = field_scores.iter().sum::<f64>() - best;
            best + q.tie_breaker * rest
        }
    };
    Ok(Some(score))
}

/// Weight of the closest document term within `max_edits` of `term`: 1.0 for
/// an exact match, less for each edit. The first `prefix_len` characters must
/// match exactly.
fn best_term_match(term: &str, doc_terms: &[String], max_edits: usize, prefix_len: usize) -> Option<f64> {
    let len = term.chars().count();
    doc_terms
        .iter()
        .filter_map(|candidate| {
            if candidate == term {
                return Some(0);
            }
            if max_edits == 0
                || !term
                    .chars()
                    .take(prefix_len)
                    .eq(candidate.chars().take(prefix_len))
            {
                return None;
            }
            let edits = levenshtein::distance(term.chars(), candidate.chars());
            (edits <= max_edits).then_some(edits)
        })
        .min()
        .map(|edits| 1.0 - edits as f64 / (len + 1) as f64)
}

/// Lowercased alphanumeric tokens.
fn analyze(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Anchored regex equivalent of a `*`/`?` wildcard pattern.
fn wildcard_regex(pattern: &str) -> Result<Regex, BackendError> {
    let body = pattern
        .split('*')
        .map(|part| part.split('?').map(regex::escape).join("."))
        .join(".*");
    Regex::new(&format!("^{body}$"))
        .map_err(|e| BackendError::Unsupported(format!("wildcard pattern {pattern:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        FieldValueFactor, FieldValueModifier, Fuzziness, MinimumShouldMatch, WeightedField,
    };

    fn restaurant(id: i64, name: &str, category: &str, lat: f64, lon: f64) -> IndexedRestaurant {
        IndexedRestaurant {
            id,
            name: name.to_string(),
            address: "서울 강남구".to_string(),
            category: category.to_string(),
            location: GeoPoint::new(lat, lon),
            kakao_place_id: format!("k{id}"),
            tags: vec![],
        }
    }

    fn fuzzy_name_query(text: &str) -> Query {
        Query::MultiMatch(MultiMatchQuery {
            query: text.to_string(),
            fields: vec![WeightedField::new("name", 3.0), WeightedField::new("category", 1.0)],
            match_type: MultiMatchType::BestFields,
            operator: Operator::Or,
            minimum_should_match: Some(MinimumShouldMatch::Percent(70)),
            fuzziness: Some(Fuzziness::Auto),
            prefix_length: 2,
            tie_breaker: 0.3,
        })
    }

    #[test]
    fn test_wildcard_regex_is_anchored_and_escaped() {
        let re = wildcard_regex("*술집*").unwrap();
        assert!(re.is_match("음식점 > 술집 > 호프"));
        assert!(!re.is_match("음식점 > 카페"));

        let re = wildcard_regex("a.b?").unwrap();
        assert!(re.is_match("a.bc"));
        assert!(!re.is_match("axbc"));
        assert!(!re.is_match("a.bcd"));
    }

    #[test]
    fn test_analyze_splits_on_punctuation() {
        assert_eq!(analyze("음식점 > 양식 > 피자"), vec!["음식점", "양식", "피자"]);
        assert_eq!(analyze("Burger-King"), vec!["burger", "king"]);
    }

    #[test]
    fn test_fuzzy_match_respects_prefix() {
        let docs = vec!["burger".to_string()];
        assert!(best_term_match("burgr", &docs, 1, 2).is_some());
        // Edit inside the protected prefix.
        assert!(best_term_match("bxrger", &docs, 2, 2).is_none());
        assert_eq!(best_term_match("burger", &docs, 0, 2), Some(1.0));
    }

    #[test]
    fn test_unknown_index_is_an_error() {
        let backend = InMemoryBackend::new();
        let err = backend
            .search("restaurants", &SearchRequest::new(Query::MatchAll))
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 404, .. }));
    }

    #[test]
    fn test_default_size_and_total() {
        let docs = (0..15).map(|i| restaurant(i, "place", "카페", 37.5, 127.0));
        let backend = InMemoryBackend::with_documents("r", docs);
        let response = backend.search("r", &SearchRequest::new(Query::MatchAll)).unwrap();
        assert_eq!(response.hits.total_value(), 15);
        assert_eq!(response.hits.hits.len(), DEFAULT_SIZE);
    }

    #[test]
    fn test_multi_match_prefers_name_matches() {
        let backend = InMemoryBackend::with_documents(
            "r",
            [
                restaurant(1, "Cafe", "burger", 37.5, 127.0),
                restaurant(2, "Burger House", "양식", 37.5, 127.0),
                restaurant(3, "Noodle Bar", "중식", 37.5, 127.0),
            ],
        );
        let response = backend
            .search("r", &SearchRequest::new(fuzzy_name_query("burger")))
            .unwrap();
        let ids: Vec<i64> = response
            .hits
            .hits
            .iter()
            .map(|h| h.source.as_ref().unwrap().id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_nested_function_score_orders_by_confidence() {
        let mut low = restaurant(1, "low", "카페", 37.5, 127.0);
        low.tags.push(TagAnnotation {
            tag_id: 1,
            tag_name: "cozy".into(),
            avg_confidence: Some(0.2),
            frequency: None,
        });
        let mut high = restaurant(2, "high", "카페", 37.5, 127.0);
        high.tags.push(TagAnnotation {
            tag_id: 1,
            tag_name: "cozy".into(),
            avg_confidence: Some(0.9),
            frequency: None,
        });

        let query = Query::nested(
            "tags",
            BoolQuery::new()
                .must(Query::matching("tags.tagName", "cozy"))
                .should(FunctionScoreQuery {
                    query: None,
                    functions: vec![
                        FieldValueFactor {
                            field: "tags.avgConfidence".into(),
                            factor: 1.5,
                            modifier: FieldValueModifier::Ln,
                            missing: Some(0.1),
                        }
                        .into(),
                    ],
                })
                .into(),
        );
        let backend = InMemoryBackend::with_documents("r", [low, high]);
        let response = backend.search("r", &SearchRequest::new(query)).unwrap();
        let hits = &response.hits.hits;
        assert_eq!(hits[0].source.as_ref().unwrap().id, 2);
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
    }

    #[test]
    fn test_field_outside_scope_is_unsupported() {
        let backend = InMemoryBackend::with_documents("r", [restaurant(1, "a", "b", 0.0, 0.0)]);
        let err = backend
            .search("r", &SearchRequest::new(Query::term("tags.tagName", "x")))
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }
}
