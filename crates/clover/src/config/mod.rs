use std::time::Duration;

use crate::{
    document::fields,
    error::CloverError,
    query::{FieldValueModifier, Fuzziness, MinimumShouldMatch, WeightedField},
};

/// Hard ceiling on the number of hits any search may return.
pub const MAX_RESULTS: usize = 100;

const DEFAULT_INDEX: &str = "restaurants";
const DEFAULT_BACKEND_URL: &str = "http://localhost:9200";

/// Bar-type and snack-type venues are never returned by nearby search.
const DEFAULT_EXCLUDED_CATEGORIES: [&str; 2] = ["*술집*", "*간식*"];

/// Parameters of the fuzzy multi-field text clause.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatchParams {
    /// Fields searched, with their relevance weights
    pub fields: Vec<WeightedField>,
    /// Share of query terms that must match
    pub minimum_should_match: MinimumShouldMatch,
    pub fuzziness: Fuzziness,
    /// Leading characters of each term excluded from fuzzy expansion
    pub prefix_length: usize,
    /// Weight of non-best field scores when combining fields
    pub tie_breaker: f64,
}

impl Default for TextMatchParams {
    fn default() -> Self {
        Self {
            fields: vec![
                WeightedField::new(fields::NAME, 3.0),
                WeightedField::new(fields::ADDRESS, 2.0),
                WeightedField::new(fields::CATEGORY, 1.0),
            ],
            minimum_should_match: MinimumShouldMatch::Percent(70),
            fuzziness: Fuzziness::Auto,
            prefix_length: 2,
            tie_breaker: 0.3,
        }
    }
}

/// Weights of the score boosts applied inside each tag clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagBoostParams {
    pub confidence_factor: f64,
    /// Confidence assumed for a tag without one
    pub confidence_missing: f64,
    pub frequency_factor: f64,
    /// Frequency assumed for a tag without one
    pub frequency_missing: f64,
    pub modifier: FieldValueModifier,
}

impl Default for TagBoostParams {
    fn default() -> Self {
        Self {
            confidence_factor: 1.5,
            confidence_missing: 0.1,
            frequency_factor: 1.2,
            frequency_missing: 1.0,
            modifier: FieldValueModifier::Ln,
        }
    }
}

/// Connection settings for the Elasticsearch backend.
///
/// Every request is a single attempt bounded by `request_timeout`; there is no
/// retry, so a slow backend surfaces as an error rather than a late success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Defaults overridden by `CLOVER_ES_URL` and `CLOVER_ES_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, CloverError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CLOVER_ES_URL") {
            config.base_url = url;
        }
        if let Ok(secs) = std::env::var("CLOVER_ES_TIMEOUT_SECS") {
            config.request_timeout = parse_timeout_secs(&secs)?;
        }
        Ok(config)
    }
}

fn parse_timeout_secs(value: &str) -> Result<Duration, CloverError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(CloverError::ConfigError(
            "CLOVER_ES_TIMEOUT_SECS must be at least 1".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(CloverError::ConfigError(format!(
            "CLOVER_ES_TIMEOUT_SECS is not a number: {value}"
        ))),
    }
}

/// Configuration for restaurant search.
///
/// # Examples
///
/// ```rust
/// use clover::SearchConfig;
///
/// let config = SearchConfig::builder()
///     .index("restaurants_v2")
///     .exclude_category("*카페*")
///     .build();
/// assert_eq!(config.excluded_categories.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Name of the index holding restaurant documents
    pub index: String,
    /// Maximum number of hits per search, at most [`MAX_RESULTS`]
    pub max_results: usize,
    /// Category wildcard patterns excluded from nearby search
    pub excluded_categories: Vec<String>,
    pub text_match: TextMatchParams,
    pub tag_boost: TagBoostParams,
    pub backend: BackendConfig,
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// `max_results` as actually applied: between 1 and [`MAX_RESULTS`],
    /// whatever the field holds.
    pub fn result_limit(&self) -> usize {
        self.max_results.clamp(1, MAX_RESULTS)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            max_results: MAX_RESULTS,
            excluded_categories: DEFAULT_EXCLUDED_CATEGORIES
                .iter()
                .map(ToString::to_string)
                .collect(),
            text_match: TextMatchParams::default(),
            tag_boost: TagBoostParams::default(),
            backend: BackendConfig::default(),
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with the production defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Set the index searched
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.config.index = index.into();
        self
    }

    /// Set the maximum number of results; values above [`MAX_RESULTS`] are clamped
    pub fn max_results(mut self, limit: usize) -> Self {
        self.config.max_results = limit.min(MAX_RESULTS);
        self
    }

    /// Add a category wildcard pattern excluded from nearby search
    pub fn exclude_category(mut self, pattern: impl Into<String>) -> Self {
        self.config.excluded_categories.push(pattern.into());
        self
    }

    /// Replace the excluded category patterns
    pub fn excluded_categories<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.excluded_categories = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Configure the text match clause
    pub fn text_match(self) -> TextMatchBuilder {
        TextMatchBuilder::new(self)
    }

    /// Configure the tag boosts
    pub fn tag_boost(self) -> TagBoostBuilder {
        TagBoostBuilder::new(self)
    }

    /// Set the backend base URL
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.backend.base_url = url.into();
        self
    }

    /// Set the total time allowed for one backend request
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend.request_timeout = timeout;
        self
    }

    /// Set the time allowed to establish a backend connection
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend.connect_timeout = timeout;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }

    /// Build the configuration, rejecting values the backend would refuse
    pub fn try_build(self) -> Result<SearchConfig, CloverError> {
        let config = self.config;
        if config.max_results == 0 {
            return Err(CloverError::ConfigError(
                "max_results must be at least 1".to_string(),
            ));
        }
        if config.index.trim().is_empty() {
            return Err(CloverError::ConfigError(
                "index name must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.text_match.tie_breaker) {
            return Err(CloverError::ConfigError(format!(
                "tie_breaker must be within 0.0..=1.0, got {}",
                config.text_match.tie_breaker
            )));
        }
        if config.text_match.fields.is_empty() {
            return Err(CloverError::ConfigError(
                "text match needs at least one field".to_string(),
            ));
        }
        if config.backend.request_timeout.is_zero() {
            return Err(CloverError::ConfigError(
                "request_timeout must be non-zero".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Builder for the fuzzy text match parameters
pub struct TextMatchBuilder {
    parent: SearchConfigBuilder,
}

impl TextMatchBuilder {
    fn new(parent: SearchConfigBuilder) -> Self {
        Self { parent }
    }

    /// Set the weight of a searched field, adding the field if absent
    pub fn field_weight(mut self, name: &str, boost: f64) -> Self {
        let fields = &mut self.parent.config.text_match.fields;
        if let Some(field) = fields.iter_mut().find(|f| f.name == name) {
            field.boost = boost;
        } else {
            fields.push(WeightedField::new(name, boost));
        }
        self
    }

    /// Set the minimum share of terms that must match, e.g. `"70%"` or `"2"`
    pub fn minimum_should_match(mut self, value: &str) -> Result<Self, CloverError> {
        self.parent.config.text_match.minimum_should_match = value
            .parse()
            .map_err(|e| CloverError::ConfigError(format!("{e}")))?;
        Ok(self)
    }

    pub fn fuzziness(mut self, fuzziness: Fuzziness) -> Self {
        self.parent.config.text_match.fuzziness = fuzziness;
        self
    }

    pub fn prefix_length(mut self, len: usize) -> Self {
        self.parent.config.text_match.prefix_length = len;
        self
    }

    pub fn tie_breaker(mut self, tie_breaker: f64) -> Self {
        self.parent.config.text_match.tie_breaker = tie_breaker;
        self
    }

    /// Return to the main configuration builder
    pub fn done(self) -> SearchConfigBuilder {
        self.parent
    }
}

/// Builder for tag boost parameters
pub struct TagBoostBuilder {
    parent: SearchConfigBuilder,
}

impl TagBoostBuilder {
    fn new(parent: SearchConfigBuilder) -> Self {
        Self { parent }
    }

    /// Weight of the average-confidence boost and the value assumed when absent
    pub fn confidence(mut self, factor: f64, missing: f64) -> Self {
        self.parent.config.tag_boost.confidence_factor = factor;
        self.parent.config.tag_boost.confidence_missing = missing;
        self
    }

    /// Weight of the frequency boost and the value assumed when absent
    pub fn frequency(mut self, factor: f64, missing: f64) -> Self {
        self.parent.config.tag_boost.frequency_factor = factor;
        self.parent.config.tag_boost.frequency_missing = missing;
        self
    }

    pub fn modifier(mut self, modifier: FieldValueModifier) -> Self {
        self.parent.config.tag_boost.modifier = modifier;
        self
    }

    /// Return to the main configuration builder
    pub fn done(self) -> SearchConfigBuilder {
        self.parent
    }
}
