//! Decoding documents and turning their date strings into `DateTime<Utc>`.
//!
//! Dates are parsed timezone-neutrally: an explicit offset is honored,
//! anything without one is taken as UTC. A date-only value becomes midnight
//! UTC, so `date_naive()` gives back the calendar date that was written.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;

use super::DatasetError;
use crate::models::{ChunkDancer, Dataset, EventsDocument, RawDataset, RawEventsDocument};

/// Naive timestamp layouts the producer writes, tried in order
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Where in a document a date value lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateField {
    LastUpdated,
    EventDate { event: u32 },
    PlacementDate { dancer: u32, event: u32 },
    UpcomingStart { event: String },
    UpcomingEnd { event: String },
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateField::LastUpdated => write!(f, "last_updated"),
            DateField::EventDate { event } => write!(f, "events[id={}].dates", event),
            DateField::PlacementDate { dancer, event } => {
                write!(f, "dancers[id={}].placements[event={}].date", dancer, event)
            }
            DateField::UpcomingStart { event } => write!(f, "upcoming_events[{}].start_date", event),
            DateField::UpcomingEnd { event } => write!(f, "upcoming_events[{}].end_date", event),
        }
    }
}

/// Parse a date or timestamp string as written by the dataset producer.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub(crate) fn normalize_date(field: DateField, value: String) -> Result<DateTime<Utc>, DatasetError> {
    parse_date(&value).ok_or(DatasetError::InvalidDate { field, value })
}

/// Decode a MessagePack document.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DatasetError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

impl RawDataset {
    pub fn decode(bytes: &[u8]) -> Result<Self, DatasetError> {
        decode(bytes)
    }

    /// Parse every date field. Fails on the first unparseable value.
    pub fn normalize(self) -> Result<Dataset, DatasetError> {
        self.try_map_dates(normalize_date)
    }
}

impl RawEventsDocument {
    pub fn normalize(self) -> Result<EventsDocument, DatasetError> {
        self.try_map_dates(normalize_date)
    }
}

impl ChunkDancer<String> {
    pub fn normalize(self) -> Result<ChunkDancer, DatasetError> {
        self.try_map_dates(normalize_date)
    }
}
