//! HTTP client for the statically hosted dataset assets.
//!
//! The site is plain static hosting: no authentication, no query API, just
//! files whose `Last-Modified` header changes when the nightly build
//! republishes them.

use std::time::Duration;

use reqwest::{header, Client, Url};
use tracing::debug;

use super::{ApiError, Network, Resource};

/// Asset client backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AssetClient {
    client: Client,
}

impl AssetClient {
    /// Create a new client. Without a timeout a request may stay pending
    /// until the connection itself gives up.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(url: &str, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, url, &body))
        }
    }
}

impl Network for AssetClient {
    async fn fetch(&self, url: &str) -> Result<Resource, ApiError> {
        let response = self.client.get(url).send().await?;
        let response = Self::check_response(url, response).await?;

        let status = response.status().as_u16();
        let last_modified = header_string(response.headers(), header::LAST_MODIFIED);
        let content_type = header_string(response.headers(), header::CONTENT_TYPE);
        let body = response.bytes().await?.to_vec();
        debug!(url = url, status, bytes = body.len(), ?last_modified, "Fetched asset");

        Ok(Resource {
            url: url.to_string(),
            status,
            last_modified,
            content_type,
            len: body.len(),
            body,
        })
    }
}

fn header_string(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Resolve an asset path against the site base URL.
///
/// The base is treated as a directory even without a trailing slash, so
/// `https://host/points` + `assets/database.txt` gives
/// `https://host/points/assets/database.txt`.
pub fn resolve_url(base: &str, path: &str) -> Result<String, ApiError> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;
    let joined = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))?;
    Ok(joined.to_string())
}
