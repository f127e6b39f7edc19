//! Backend-neutral query tree.
//!
//! A [`SearchRequest`] is a plain value: a tree of [`Query`] clauses plus sort
//! directives and a size cap. Query construction in [`crate::search`] produces
//! these values; [`wire`] turns them into the Elasticsearch JSON DSL and the
//! in-memory backend evaluates them directly. Nothing in here knows about HTTP.

mod wire;

use std::fmt;
use std::str::FromStr;

use crate::document::GeoPoint;

/// A single clause of a structured query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches every document.
    MatchAll,
    GeoDistance(GeoDistanceQuery),
    Term(TermQuery),
    Wildcard(WildcardQuery),
    Match(MatchQuery),
    MultiMatch(MultiMatchQuery),
    Bool(BoolQuery),
    Nested(NestedQuery),
    FunctionScore(FunctionScoreQuery),
}

impl Query {
    pub fn geo_distance(field: impl Into<String>, center: GeoPoint, distance_meters: u32) -> Self {
        Self::GeoDistance(GeoDistanceQuery {
            field: field.into(),
            center,
            distance_meters,
        })
    }

    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Term(TermQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Wildcard(WildcardQuery {
            field: field.into(),
            pattern: pattern.into(),
        })
    }

    pub fn matching(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::Match(MatchQuery {
            field: field.into(),
            query: query.into(),
        })
    }

    pub fn nested(path: impl Into<String>, query: Self) -> Self {
        Self::Nested(NestedQuery {
            path: path.into(),
            query: Box::new(query),
        })
    }

    /// Returns the bool query if this clause is one.
    pub fn as_bool(&self) -> Option<&BoolQuery> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl From<BoolQuery> for Query {
    fn from(value: BoolQuery) -> Self {
        Self::Bool(value)
    }
}

impl From<MultiMatchQuery> for Query {
    fn from(value: MultiMatchQuery) -> Self {
        Self::MultiMatch(value)
    }
}

impl From<FunctionScoreQuery> for Query {
    fn from(value: FunctionScoreQuery) -> Self {
        Self::FunctionScore(value)
    }
}

/// Documents whose `field` lies within `distance_meters` of `center`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoDistanceQuery {
    pub field: String,
    pub center: GeoPoint,
    pub distance_meters: u32,
}

/// Exact, unanalyzed equality on a keyword field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
}

/// Pattern match with `*` (any run) and `?` (any single character).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String,
}

/// Analyzed full-text match on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    pub field: String,
    pub query: String,
}

/// A field name with a relevance weight, written `name^3` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedField {
    pub name: String,
    pub boost: f64,
}

impl WeightedField {
    pub fn new(name: impl Into<String>, boost: f64) -> Self {
        Self {
            name: name.into(),
            boost,
        }
    }
}

impl fmt::Display for WeightedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if (self.boost - 1.0).abs() < f64::EPSILON {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}^{}", self.name, self.boost)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiMatchType {
    /// Score is the best single field plus `tie_breaker` times the others.
    #[default]
    BestFields,
    MostFields,
}

impl MultiMatchType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BestFields => "best_fields",
            Self::MostFields => "most_fields",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Or,
    And,
}

impl Operator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
        }
    }
}

/// Edit-distance tolerance for fuzzy term matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fuzziness {
    /// Scales with term length: 0 edits up to 2 chars, 1 up to 5, 2 beyond.
    #[default]
    Auto,
    Edits(u8),
}

impl Fuzziness {
    /// Maximum edits allowed for a term of `term_len` characters.
    #[must_use]
    pub const fn max_edits(self, term_len: usize) -> usize {
        match self {
            Self::Auto => match term_len {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
            Self::Edits(n) => n as usize,
        }
    }
}

impl fmt::Display for Fuzziness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("AUTO"),
            Self::Edits(n) => write!(f, "{n}"),
        }
    }
}

/// How many optional clauses (or query terms) must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimumShouldMatch {
    Count(u32),
    /// Percentage of the optional clauses, rounded down.
    Percent(u8),
}

impl MinimumShouldMatch {
    /// Number of the `total` optional clauses that must match. Never below one
    /// when there is at least one clause.
    #[must_use]
    pub fn required(self, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let raw = match self {
            Self::Count(n) => n as usize,
            Self::Percent(p) => total * usize::from(p) / 100,
        };
        raw.clamp(1, total)
    }
}

impl fmt::Display for MinimumShouldMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Percent(p) => write!(f, "{p}%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid minimum_should_match value: {0:?}")]
pub struct ParseMinimumShouldMatchError(String);

impl FromStr for MinimumShouldMatch {
    type Err = ParseMinimumShouldMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || ParseMinimumShouldMatchError(s.to_string());
        if let Some(pct) = trimmed.strip_suffix('%') {
            let value: u8 = pct.trim().parse().map_err(|_| err())?;
            if value > 100 {
                return Err(err());
            }
            Ok(Self::Percent(value))
        } else {
            trimmed.parse().map(Self::Count).map_err(|_| err())
        }
    }
}

/// Fuzzy full-text match across several weighted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatchQuery {
    pub query: String,
    pub fields: Vec<WeightedField>,
    pub match_type: MultiMatchType,
    pub operator: Operator,
    pub minimum_should_match: Option<MinimumShouldMatch>,
    pub fuzziness: Option<Fuzziness>,
    /// Leading characters of every term that must match exactly.
    pub prefix_length: usize,
    pub tie_breaker: f64,
}

/// Boolean combination of clauses.
///
/// `must` clauses are required and scored, `should` clauses add to the score
/// and, when `minimum_should_match` is set, some of them must match.
/// `must_not` clauses exclude documents without scoring.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<MinimumShouldMatch>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: impl Into<Query>) -> Self {
        self.must.push(query.into());
        self
    }

    pub fn should(mut self, query: impl Into<Query>) -> Self {
        self.should.push(query.into());
        self
    }

    pub fn must_not(mut self, query: impl Into<Query>) -> Self {
        self.must_not.push(query.into());
        self
    }

    pub fn minimum_should_match(mut self, msm: MinimumShouldMatch) -> Self {
        self.minimum_should_match = Some(msm);
        self
    }

    /// True when the query has no clauses at all and therefore matches everything.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }
}

/// A query evaluated against each element of an embedded collection.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedQuery {
    pub path: String,
    pub query: Box<Query>,
}

/// Score-only transform of the documents matched by `query` (all when `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionScoreQuery {
    pub query: Option<Box<Query>>,
    pub functions: Vec<ScoreFunction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunction {
    FieldValueFactor(FieldValueFactor),
}

impl From<FieldValueFactor> for ScoreFunction {
    fn from(value: FieldValueFactor) -> Self {
        Self::FieldValueFactor(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldValueModifier {
    #[default]
    None,
    Log,
    Log1p,
    Ln,
    Ln1p,
    Sqrt,
    Square,
}

impl FieldValueModifier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Log => "log",
            Self::Log1p => "log1p",
            Self::Ln => "ln",
            Self::Ln1p => "ln1p",
            Self::Sqrt => "sqrt",
            Self::Square => "square",
        }
    }

    #[must_use]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Self::None => v,
            Self::Log => v.log10(),
            Self::Log1p => (v + 1.0).log10(),
            Self::Ln => v.ln(),
            Self::Ln1p => v.ln_1p(),
            Self::Sqrt => v.sqrt(),
            Self::Square => v * v,
        }
    }
}

/// Boost computed from a numeric document field: `modifier(factor * value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValueFactor {
    pub field: String,
    pub factor: f64,
    pub modifier: FieldValueModifier,
    /// Substitute used when the document has no value for `field`.
    pub missing: Option<f64>,
}

impl FieldValueFactor {
    /// Score contribution for a document whose field holds `value`.
    ///
    /// Returns `None` when the value is absent and no `missing` default is set.
    #[must_use]
    pub fn apply(&self, value: Option<f64>) -> Option<f64> {
        value
            .or(self.missing)
            .map(|v| self.modifier.apply(self.factor * v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortClause {
    /// Relevance score, highest first.
    Score,
    /// Distance in meters between `field` and `origin`.
    GeoDistance {
        field: String,
        origin: GeoPoint,
        order: SortOrder,
    },
}

/// A complete request against one index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: Query,
    pub sort: Vec<SortClause>,
    /// Maximum number of hits; the backend default applies when `None`.
    pub size: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<Query>) -> Self {
        Self {
            query: query.into(),
            sort: Vec::new(),
            size: None,
        }
    }

    pub fn sort_by(mut self, sort: SortClause) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}
