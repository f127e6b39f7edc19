use itertools::Itertools;
use tracing::{debug, instrument};

use super::{Result, ScoreComposer, SearchError};
use crate::{
    config::SearchConfig,
    document::{GeoPoint, Tag, TagId, fields},
    query::{
        BoolQuery, MinimumShouldMatch, MultiMatchQuery, MultiMatchType, Operator, Query,
        SearchRequest, SortClause, SortOrder,
    },
    tags::TagResolver,
};

/// Translates search intent into structured requests against the restaurant index.
pub struct QueryBuilder<'a> {
    config: &'a SearchConfig,
    resolver: &'a dyn TagResolver,
    scores: ScoreComposer,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(config: &'a SearchConfig, resolver: &'a dyn TagResolver) -> Self {
        Self {
            config,
            resolver,
            scores: ScoreComposer::new(config.tag_boost),
        }
    }

    /// Restaurants within `radius_meters` of `point`, nearest first, skipping
    /// the excluded categories.
    pub fn build_geo_query(&self, point: GeoPoint, radius_meters: u32) -> SearchRequest {
        let query = self.config.excluded_categories.iter().fold(
            BoolQuery::new().must(Query::geo_distance(fields::LOCATION, point, radius_meters)),
            |q, pattern| q.must_not(Query::wildcard(fields::CATEGORY, pattern.as_str())),
        );

        SearchRequest::new(query)
            .sort_by(SortClause::GeoDistance {
                field: fields::LOCATION.to_string(),
                origin: point,
                order: SortOrder::Asc,
            })
            .with_size(self.config.result_limit())
    }

    /// Restaurants matching the free text and at least one of the tags.
    ///
    /// Blank text and an empty tag list each drop their clause; with neither
    /// the query matches every restaurant, still capped at the result limit.
    #[instrument(name = "Build relevance query", level = "debug", skip(self))]
    pub fn build_relevance_query(&self, text: Option<&str>, tag_ids: &[TagId]) -> Result<SearchRequest> {
        let mut query = BoolQuery::new();

        if let Some(text_clause) = text.and_then(|t| self.text_clause(t)) {
            query = query.must(text_clause);
        }

        if !tag_ids.is_empty() {
            let tags = self
                .resolver
                .resolve(tag_ids)
                .map_err(SearchError::TagResolution)?;
            debug!(requested = tag_ids.len(), resolved = tags.len(), "Resolved tags");
            if let Some(tag_clause) = self.tags_clause(&tags) {
                query = query.must(tag_clause);
            }
        }

        Ok(SearchRequest::new(query).with_size(self.config.result_limit()))
    }

    /// Exact match on the kakao place id.
    pub fn build_external_id_query(&self, external_id: &str) -> SearchRequest {
        SearchRequest::new(Query::term(fields::KAKAO_PLACE_ID, external_id))
    }

    /// Fuzzy multi-field match for `text`, or `None` when it is blank.
    pub fn text_clause(&self, text: &str) -> Option<Query> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let params = &self.config.text_match;
        Some(
            MultiMatchQuery {
                query: text.to_string(),
                fields: params.fields.clone(),
                match_type: MultiMatchType::BestFields,
                operator: Operator::Or,
                minimum_should_match: Some(params.minimum_should_match),
                fuzziness: Some(params.fuzziness),
                prefix_length: params.prefix_length,
                tie_breaker: params.tie_breaker,
            }
            .into(),
        )
    }

    /// At least one of the per-tag clauses, or `None` when there are no tags.
    pub fn tags_clause(&self, tags: &[Tag]) -> Option<Query> {
        if tags.is_empty() {
            return None;
        }
        let any_tag = tags
            .iter()
            .unique_by(|tag| tag.id)
            .fold(BoolQuery::new(), |q, tag| q.should(self.tag_clause(&tag.name)));
        Some(
            any_tag
                .minimum_should_match(MinimumShouldMatch::Count(1))
                .into(),
        )
    }

    /// Nested clause requiring a tag named `tag_name`, boosted by the tag's
    /// confidence and frequency.
    pub fn tag_clause(&self, tag_name: &str) -> Query {
        let [confidence, frequency] = self.scores.boost_clauses();
        Query::nested(
            fields::TAGS,
            BoolQuery::new()
                .must(Query::matching(fields::TAG_NAME, tag_name))
                .should(confidence)
                .should(frequency)
                .into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::{Fuzziness, Query},
        tags::InMemoryTagResolver,
    };

    fn resolver() -> InMemoryTagResolver {
        InMemoryTagResolver::new([Tag::new(1, "cozy"), Tag::new(2, "spicy")])
    }

    #[test]
    fn test_geo_query_shape() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let builder = QueryBuilder::new(&config, &resolver);
        let point = GeoPoint::new(37.5, 127.03);

        let request = builder.build_geo_query(point, 1000);
        assert_eq!(request.size, Some(100));
        assert_eq!(
            request.sort,
            vec![SortClause::GeoDistance {
                field: "location".into(),
                origin: point,
                order: SortOrder::Asc,
            }]
        );

        let bool_query = request.query.as_bool().unwrap();
        assert_eq!(
            bool_query.must,
            vec![Query::geo_distance("location", point, 1000)]
        );
        assert_eq!(
            bool_query.must_not,
            vec![
                Query::wildcard("category", "*술집*"),
                Query::wildcard("category", "*간식*"),
            ]
        );
        assert!(bool_query.should.is_empty());
    }

    #[test]
    fn test_geo_query_uses_configured_exclusions() {
        let config = SearchConfig::builder()
            .excluded_categories(["*카페*"])
            .max_results(20)
            .build();
        let resolver = resolver();
        let request =
            QueryBuilder::new(&config, &resolver).build_geo_query(GeoPoint::new(0.0, 0.0), 10);
        let bool_query = request.query.as_bool().unwrap();
        assert_eq!(bool_query.must_not, vec![Query::wildcard("category", "*카페*")]);
        assert_eq!(request.size, Some(20));
    }

    #[test]
    fn test_requested_size_never_exceeds_limit() {
        let config = SearchConfig {
            max_results: 500,
            ..SearchConfig::default()
        };
        let resolver = resolver();
        let builder = QueryBuilder::new(&config, &resolver);

        let geo = builder.build_geo_query(GeoPoint::new(37.5, 127.0), 1000);
        assert_eq!(geo.size, Some(100));
        let relevance = builder.build_relevance_query(None, &[]).unwrap();
        assert_eq!(relevance.size, Some(100));
    }

    #[test]
    fn test_repeated_tags_yield_one_clause_each() {
        let config = SearchConfig::default();
        let repeating = |ids: &[TagId]| -> anyhow::Result<Vec<Tag>> {
            Ok(ids.iter().map(|id| Tag::new(*id, format!("tag{id}"))).collect())
        };
        let request = QueryBuilder::new(&config, &repeating)
            .build_relevance_query(None, &[3, 3, 4])
            .unwrap();
        let tags = request.query.as_bool().unwrap().must[0].as_bool().unwrap();
        assert_eq!(tags.should.len(), 2);
    }

    #[test]
    fn test_text_clause_trims_and_skips_blank() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let builder = QueryBuilder::new(&config, &resolver);

        assert!(builder.text_clause("   ").is_none());
        assert!(builder.text_clause("").is_none());

        let Some(Query::MultiMatch(mm)) = builder.text_clause("  피자 맛집 ") else {
            panic!("expected a multi_match clause");
        };
        assert_eq!(mm.query, "피자 맛집");
        assert_eq!(mm.match_type, MultiMatchType::BestFields);
        assert_eq!(mm.operator, Operator::Or);
        assert_eq!(mm.minimum_should_match, Some(MinimumShouldMatch::Percent(70)));
        assert_eq!(mm.fuzziness, Some(Fuzziness::Auto));
        assert_eq!(mm.prefix_length, 2);
        assert_eq!(mm.tie_breaker, 0.3);
    }

    #[test]
    fn test_relevance_query_with_text_and_tags() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let builder = QueryBuilder::new(&config, &resolver);

        let request = builder
            .build_relevance_query(Some("pasta"), &[1, 2])
            .unwrap();
        assert_eq!(request.size, Some(100));
        assert!(request.sort.is_empty());

        let bool_query = request.query.as_bool().unwrap();
        assert_eq!(bool_query.must.len(), 2);
        assert!(matches!(bool_query.must[0], Query::MultiMatch(_)));

        let tags = bool_query.must[1].as_bool().unwrap();
        assert_eq!(tags.minimum_should_match, Some(MinimumShouldMatch::Count(1)));
        assert_eq!(tags.should.len(), 2);
        assert_eq!(tags.should[0], builder.tag_clause("cozy"));
        assert_eq!(tags.should[1], builder.tag_clause("spicy"));
    }

    #[test]
    fn test_tag_clause_shape() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let builder = QueryBuilder::new(&config, &resolver);

        let Query::Nested(nested) = builder.tag_clause("cozy") else {
            panic!("expected nested clause");
        };
        assert_eq!(nested.path, "tags");
        let inner = nested.query.as_bool().unwrap();
        assert_eq!(inner.must, vec![Query::matching("tags.tagName", "cozy")]);
        assert_eq!(inner.should.len(), 2);
        assert!(inner.minimum_should_match.is_none());
    }

    #[test]
    fn test_relevance_query_without_constraints_matches_all() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let builder = QueryBuilder::new(&config, &resolver);

        for request in [
            builder.build_relevance_query(None, &[]).unwrap(),
            builder.build_relevance_query(Some("  "), &[]).unwrap(),
        ] {
            assert!(request.query.as_bool().unwrap().is_empty());
            assert_eq!(request.size, Some(100));
        }
    }

    #[test]
    fn test_unresolvable_tags_add_no_clause() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let request = QueryBuilder::new(&config, &resolver)
            .build_relevance_query(Some("pasta"), &[404])
            .unwrap();
        assert_eq!(request.query.as_bool().unwrap().must.len(), 1);
    }

    #[test]
    fn test_tag_resolution_errors_propagate() {
        let config = SearchConfig::default();
        let failing =
            |_: &[TagId]| -> anyhow::Result<Vec<Tag>> { Err(anyhow::anyhow!("db down")) };
        let err = QueryBuilder::new(&config, &failing)
            .build_relevance_query(None, &[1])
            .unwrap_err();
        assert!(matches!(err, SearchError::TagResolution(_)));
        assert_eq!(err.to_string(), "db down");
    }

    #[test]
    fn test_resolver_not_consulted_without_tags() {
        let config = SearchConfig::default();
        let failing =
            |_: &[TagId]| -> anyhow::Result<Vec<Tag>> { Err(anyhow::anyhow!("db down")) };
        assert!(
            QueryBuilder::new(&config, &failing)
                .build_relevance_query(Some("pasta"), &[])
                .is_ok()
        );
    }

    #[test]
    fn test_external_id_query() {
        let config = SearchConfig::default();
        let resolver = resolver();
        let request = QueryBuilder::new(&config, &resolver).build_external_id_query("12345");
        assert_eq!(request.query, Query::term("kakaoPlaceId", "12345"));
        assert!(request.size.is_none());
    }
}
