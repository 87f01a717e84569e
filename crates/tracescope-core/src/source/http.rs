//! REST API source

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use super::{listing, sort_listings, TraceSource};
use crate::error::{Error, Result};
use crate::models::{RawRows, TraceListing, TraceRow};

/// Trace source reading `GET {base}/traces` and `GET {base}/traces/{id}`
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    /// Create a source for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid source.url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::config(format!("source.url {base_url:?} cannot be a base URL")));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        info!(url = %base, timeout_secs, "Using REST trace source");
        Ok(Self { client, base })
    }

    /// Base URL with `segments` appended as escaped path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl TraceSource for HttpSource {
    async fn list_traces(&self) -> Result<Vec<TraceListing>> {
        let url = self.endpoint(&["traces"]);
        debug!(%url, "Listing traces");

        let rows: Vec<TraceRow> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in &rows {
            match listing(row) {
                Some(entry) => listings.push(entry),
                None => warn!("Trace without id in listing, skipping"),
            }
        }
        sort_listings(&mut listings);
        Ok(listings)
    }

    async fn fetch_trace(&self, trace_id: &str) -> Result<RawRows> {
        let url = self.endpoint(&["traces", trace_id]);
        debug!(%url, "Fetching trace");

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found("trace", trace_id));
        }
        let rows: RawRows = response.error_for_status()?.json().await?;

        debug!(trace_id, rows = rows.len(), "Fetched trace from API");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> HttpSource {
        HttpSource::new(&format!("{}/api/", server.uri()), 5).unwrap()
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let source = HttpSource::new("http://localhost:8080/api/", 5).unwrap();
        assert_eq!(
            source.endpoint(&["traces", "a b/c"]).as_str(),
            "http://localhost:8080/api/traces/a%20b%2Fc"
        );

        let source = HttpSource::new("http://localhost:8080/api", 5).unwrap();
        assert_eq!(
            source.endpoint(&["traces"]).as_str(),
            "http://localhost:8080/api/traces"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(HttpSource::new("not a url", 5), Err(Error::Config(_))));
        assert!(matches!(HttpSource::new("mailto:x@y.z", 5), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_list_traces_skips_rows_without_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/traces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "first", "start_time": "2024-05-01T10:00:00Z"},
                {"id": 2, "name": "second", "start_time": "2024-05-01T11:00:00Z"},
                {"name": "no id"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let listings = source_for(&server).await.list_traces().await.unwrap();
        let ids: Vec<_> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_fetch_trace_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/traces/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trace": {"id": 1},
                "llm_calls": [{"id": "L1", "token_usage": {"total": 12}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/traces/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let source = source_for(&server).await;

        let rows = source.fetch_trace("1").await.unwrap();
        assert_eq!(rows.llm_calls.len(), 1);

        let err = source.fetch_trace("2").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/traces/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source_for(&server).await.fetch_trace("1").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(err.is_retryable());
    }
}
