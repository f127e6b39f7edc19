//! Elasticsearch JSON rendering of the query tree.

use serde_json::{Map, Value, json};

use super::{
    BoolQuery, FieldValueFactor, FunctionScoreQuery, MultiMatchQuery, Query, ScoreFunction,
    SearchRequest, SortClause,
};

impl SearchRequest {
    /// Request body for `POST /{index}/_search`.
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.query.to_wire());
        if !self.sort.is_empty() {
            body.insert(
                "sort".into(),
                Value::Array(self.sort.iter().map(SortClause::to_wire).collect()),
            );
        }
        if let Some(size) = self.size {
            body.insert("size".into(), json!(size));
        }
        Value::Object(body)
    }
}

impl Query {
    pub fn to_wire(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::GeoDistance(q) => json!({
                "geo_distance": {
                    "distance": format!("{}m", q.distance_meters),
                    q.field.as_str(): { "lat": q.center.lat, "lon": q.center.lon },
                }
            }),
            Self::Term(q) => json!({ "term": { q.field.as_str(): { "value": q.value } } }),
            Self::Wildcard(q) => json!({ "wildcard": { q.field.as_str(): { "value": q.pattern } } }),
            Self::Match(q) => json!({ "match": { q.field.as_str(): { "query": q.query } } }),
            Self::MultiMatch(q) => multi_match_to_wire(q),
            Self::Bool(q) => bool_to_wire(q),
            Self::Nested(q) => json!({
                "nested": { "path": q.path, "query": q.query.to_wire() }
            }),
            Self::FunctionScore(q) => function_score_to_wire(q),
        }
    }
}

fn clauses(queries: &[Query]) -> Value {
    Value::Array(queries.iter().map(Query::to_wire).collect())
}

fn bool_to_wire(q: &BoolQuery) -> Value {
    let mut inner = Map::new();
    if !q.must.is_empty() {
        inner.insert("must".into(), clauses(&q.must));
    }
    if !q.should.is_empty() {
        inner.insert("should".into(), clauses(&q.should));
    }
    if !q.must_not.is_empty() {
        inner.insert("must_not".into(), clauses(&q.must_not));
    }
    if let Some(msm) = q.minimum_should_match {
        inner.insert("minimum_should_match".into(), json!(msm.to_string()));
    }
    json!({ "bool": inner })
}

fn multi_match_to_wire(q: &MultiMatchQuery) -> Value {
    let mut inner = Map::new();
    inner.insert("query".into(), json!(q.query));
    inner.insert(
        "fields".into(),
        json!(q.fields.iter().map(ToString::to_string).collect::<Vec<_>>()),
    );
    inner.insert("type".into(), json!(q.match_type.as_str()));
    inner.insert("operator".into(), json!(q.operator.as_str()));
    if let Some(msm) = q.minimum_should_match {
        inner.insert("minimum_should_match".into(), json!(msm.to_string()));
    }
    if let Some(fuzziness) = q.fuzziness {
        inner.insert("fuzziness".into(), json!(fuzziness.to_string()));
        inner.insert("prefix_length".into(), json!(q.prefix_length));
    }
    inner.insert("tie_breaker".into(), json!(q.tie_breaker));
    json!({ "multi_match": inner })
}

fn function_score_to_wire(q: &FunctionScoreQuery) -> Value {
    let mut inner = Map::new();
    if let Some(query) = &q.query {
        inner.insert("query".into(), query.to_wire());
    }
    let functions = q
        .functions
        .iter()
        .map(|f| match f {
            ScoreFunction::FieldValueFactor(fvf) => field_value_factor_to_wire(fvf),
        })
        .collect();
    inner.insert("functions".into(), Value::Array(functions));
    json!({ "function_score": inner })
}

fn field_value_factor_to_wire(fvf: &FieldValueFactor) -> Value {
    let mut inner = Map::new();
    inner.insert("field".into(), json!(fvf.field));
    inner.insert("factor".into(), json!(fvf.factor));
    inner.insert("modifier".into(), json!(fvf.modifier.as_str()));
    if let Some(missing) = fvf.missing {
        inner.insert("missing".into(), json!(missing));
    }
    json!({ "field_value_factor": inner })
}

impl SortClause {
    fn to_wire(&self) -> Value {
        match self {
            Self::Score => json!("_score"),
            Self::GeoDistance {
                field,
                origin,
                order,
            } => json!({
                "_geo_distance": {
                    field.as_str(): { "lat": origin.lat, "lon": origin.lon },
                    "order": order.as_str(),
                    "unit": "m",
                }
            }),
        }
    }
}
