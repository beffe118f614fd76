use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::MetadataError;
use crate::traits::{LookupRequest, MetadataService};

/// HTTP client for the metadata service.
pub struct MetadataClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl MetadataClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MetadataError> {
        let invalid = |reason: String| MetadataError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("not a base URL".into()));
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn endpoint_url(&self, request: &LookupRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(request.endpoint());
        }
        url
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, MetadataError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(MetadataError::Api {
                status,
                message: body,
            })
        }
    }
}

impl MetadataService for MetadataClient {
    type Error = MetadataError;

    async fn lookup(&self, request: &LookupRequest) -> Result<Value, MetadataError> {
        let url = self.endpoint_url(request);
        debug!(url = %url, title = %request.title(), "metadata lookup");

        let mut builder = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .query(&request.query());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = Self::check_response(builder.send().await?).await?;
        resp.json()
            .await
            .map_err(|e| MetadataError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> MetadataClient {
        MetadataClient::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segment() {
        let movie = LookupRequest::Movie {
            title: "Heat".into(),
        };
        assert_eq!(
            client("http://localhost:8787/api").endpoint_url(&movie).as_str(),
            "http://localhost:8787/api/movie"
        );
        assert_eq!(
            client("http://localhost:8787/api/").endpoint_url(&movie).as_str(),
            "http://localhost:8787/api/movie"
        );
        assert_eq!(
            client("http://localhost:8787").endpoint_url(&movie).as_str(),
            "http://localhost:8787/movie"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = MetadataClient::new("not a url", None, Duration::from_secs(5)).err();
        assert!(matches!(err, Some(MetadataError::InvalidUrl { .. })));

        let err = MetadataClient::new("mailto:someone@example.com", None, Duration::from_secs(5)).err();
        assert!(matches!(err, Some(MetadataError::InvalidUrl { .. })));
    }
}
