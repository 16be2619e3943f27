//! Data models for the points dataset.
//!
//! Every record that carries a date is generic over the date type `D`:
//! decoding produces `D = String` (the raw shapes), normalization maps the
//! dates into `DateTime<Utc>`, which is the default parameter. So `Dataset`
//! is the normalized document and `RawDataset` the decoded one.
//!
//! - `Dataset`: the full pre-computed statistics document
//! - `Dancer`, `Placement`: competitor records and their results
//! - `Event`, `UpcomingEvent`, `EventsDocument`: event listings
//! - `DancerChunk`, `ChunkDancer`: the per-bucket dancer documents

pub mod chunk;
pub mod dancer;
pub mod dataset;
pub mod event;

pub use chunk::{bucket_bounds, bucket_path, ChunkDancer, ChunkPlacement, DancerChunk, EventSummary, DANCER_BUCKET_SIZE};
pub use dancer::{Dancer, DivisionPoints, Placement};
pub use dataset::{Dataset, DivisionGainers, DivisionProgression, Gainer, NewDancersBucket, RawDataset, RoleGainers};
pub use event::{Event, EventsDocument, RawEventsDocument, UpcomingEvent};
