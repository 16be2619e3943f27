//! Fetching, decoding and normalizing the points dataset.
//!
//! This module provides:
//! - `DatasetFetcher`: the provider handed to consumers; it loads documents
//!   through the cache worker and re-emits the dataset when the worker
//!   reports it changed upstream
//! - `DatasetSubscription`: one consumer's stream of dataset updates
//! - date normalization (`parse_date`, `DateField`) shared by all documents

pub mod error;
pub mod fetcher;
pub mod normalize;

pub use error::DatasetError;
pub use fetcher::{DatasetFetcher, DatasetSnapshot, DatasetSubscription, DatasetUpdate, DATASET_PATH, EVENTS_PATH};
pub use normalize::{decode, parse_date, DateField};
