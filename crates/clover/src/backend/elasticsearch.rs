use reqwest::Client;
use tokio::runtime::Runtime;
use tracing::{debug, instrument, warn};

use super::{BackendError, RawSearchResponse, SearchBackend};
use crate::{config::BackendConfig, query::SearchRequest};

/// HTTP client for an Elasticsearch-compatible cluster.
///
/// Owns its connection pool and a small tokio runtime for the lifetime of the
/// process; each [`SearchBackend::search`] call blocks on exactly one request.
/// Do not call it from inside an async task.
#[derive(Debug)]
pub struct ElasticsearchBackend {
    client: Client,
    base_url: String,
    runtime: Runtime,
}

impl ElasticsearchBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("clover-es")
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            runtime,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_search(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<RawSearchResponse, BackendError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Search request rejected by backend");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl SearchBackend for ElasticsearchBackend {
    #[instrument(name = "Elasticsearch search", level = "debug", skip(self, request))]
    fn search(&self, index: &str, request: &SearchRequest) -> Result<RawSearchResponse, BackendError> {
        let url = format!("{}/{index}/_search", self.base_url);
        let body = request.to_wire();
        debug!(%url, %body, "Sending search request");
        self.runtime.block_on(self.post_search(&url, &body))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::query::Query;

    fn backend_for(server: &MockServer, timeout: Duration) -> ElasticsearchBackend {
        ElasticsearchBackend::new(&BackendConfig {
            base_url: server.base_url(),
            connect_timeout: Duration::from_secs(1),
            request_timeout: timeout,
        })
        .unwrap()
    }

    #[test]
    fn test_posts_wire_body_to_index_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/restaurants/_search")
                .json_body(json!({"query": {"term": {"kakaoPlaceId": {"value": "42"}}}}));
            then.status(200)
                .json_body(json!({"hits": {"total": {"value": 0, "relation": "eq"}, "hits": []}}));
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let response = backend
            .search("restaurants", &SearchRequest::new(Query::term("kakaoPlaceId", "42")))
            .unwrap();

        mock.assert();
        assert_eq!(response.hits.total_value(), 0);
    }

    #[test]
    fn test_error_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/restaurants/_search");
            then.status(400).body("parsing_exception");
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let err = backend
            .search("restaurants", &SearchRequest::new(Query::MatchAll))
            .unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "parsing_exception");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_body_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/restaurants/_search");
            then.status(200).body("not json");
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let err = backend
            .search("restaurants", &SearchRequest::new(Query::MatchAll))
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn test_slow_backend_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/restaurants/_search");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({"hits": {"hits": []}}));
        });

        let backend = backend_for(&server, Duration::from_millis(200));
        let err = backend
            .search("restaurants", &SearchRequest::new(Query::MatchAll))
            .unwrap_err();
        match err {
            BackendError::Http(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let backend = ElasticsearchBackend::new(&BackendConfig {
            base_url: "http://localhost:9200/".into(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(backend.base_url(), "http://localhost:9200");
    }
}
