//! The cache worker: every asset fetch goes through here.
//!
//! This module provides:
//! - `CacheWorker`: serves responses from the `CacheStore`, revalidating
//!   them against the network in the background
//! - `ClientHandle`/`WorkerMessage`: the channel a page listens on for
//!   "this resource changed upstream" notifications

pub mod cache_worker;
pub mod client;

pub use cache_worker::{
    CacheStrategy, CacheWorker, FetchRequest, Intercepted, ResponseSource, RevalidatePolicy, WorkerOptions,
};
pub use client::{ClientHandle, ClientId, WorkerMessage};
