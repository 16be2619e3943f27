//! Persistent response cache for offline asset delivery.
//!
//! This module provides the `CacheStore`, a versioned on-disk cache keyed by
//! request URL. Entries never expire; bumping the cache name is the only way
//! to invalidate them, after which `prune_other_generations` removes the old
//! directories.
//!
//! Each entry is a JSON metadata file plus the raw response body.

pub mod store;

pub use store::{CacheStore, CachedData};
