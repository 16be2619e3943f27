//! Network access for the static site assets.
//!
//! This module provides the `Network` seam the cache worker fetches through,
//! the `Resource` type describing one fetched response, and `AssetClient`,
//! the reqwest-backed implementation used outside of tests.
//!
//! Assets are plain static files; change detection relies solely on the
//! `Last-Modified` header the host sends.

pub mod client;
pub mod error;

use std::future::Future;

use serde::{Deserialize, Serialize};

pub use client::AssetClient;
pub use error::ApiError;

/// A fetched (or cached) response.
///
/// The body is kept out of the serialized form: the cache store writes it
/// next to the metadata as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub url: String,
    pub status: u16,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub len: usize,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Resource {
    pub fn new(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            last_modified: None,
            content_type: None,
            len: body.len(),
            body,
        }
    }

    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }

    /// True when both sides report the same `Last-Modified` (including both absent)
    pub fn same_version_as(&self, other: &Resource) -> bool {
        self.last_modified == other.last_modified
    }
}

/// Something that can fetch a URL over the network.
///
/// `AssetClient` is the production implementation; tests substitute an
/// in-memory fake.
pub trait Network: Clone + Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Resource, ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_version_compares_last_modified() {
        let a = Resource::new("u", vec![1]).with_last_modified("Mon, 01 Jan 2024 00:00:00 GMT");
        let b = Resource::new("u", vec![2]).with_last_modified("Mon, 01 Jan 2024 00:00:00 GMT");
        let c = Resource::new("u", vec![1]).with_last_modified("Tue, 02 Jan 2024 00:00:00 GMT");
        assert!(a.same_version_as(&b));
        assert!(!a.same_version_as(&c));

        // Missing on both sides counts as unchanged
        assert!(Resource::new("u", vec![]).same_version_as(&Resource::new("u", vec![9])));
    }

    #[test]
    fn test_body_not_serialized() {
        let resource = Resource::new("https://example.org/a", vec![1, 2, 3]);
        let json = serde_json::to_string(&resource).unwrap();
        assert!(!json.contains("body"));
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert!(back.body.is_empty());
        assert_eq!(back.len, 3);
    }
}
