//! Pointsboard core - the data pipeline behind the dance points site.
//!
//! Every asset fetch goes through a cache worker that answers from a
//! persistent cache and refreshes it in the background. The dataset fetcher
//! decodes the MessagePack documents, turns their date strings into
//! timestamps, and re-emits the dataset whenever the worker reports that it
//! changed upstream.

pub mod api;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod models;
pub mod preferences;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod testing;

pub use api::{ApiError, AssetClient, Network, Resource};
pub use cache::CacheStore;
pub use config::Config;
pub use dataset::{DatasetError, DatasetFetcher, DatasetSubscription, DatasetUpdate};
pub use models::{ChunkDancer, Dataset, EventsDocument};
pub use preferences::FavoritesStore;
pub use worker::{CacheWorker, FetchRequest, WorkerMessage};
