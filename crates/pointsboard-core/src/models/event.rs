use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::DateField;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<D = DateTime<Utc>> {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Every edition of the event, newest first as written by the producer
    #[serde(default)]
    pub dates: Vec<D>,
}

/// An announced event that has not happened yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingEvent<D = DateTime<Utc>> {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    pub start_date: D,
    pub end_date: D,
}

/// The events-only document (`assets/events.txt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventsDocument<D = DateTime<Utc>> {
    #[serde(default)]
    pub events: Vec<Event<D>>,
}

pub type RawEventsDocument = EventsDocument<String>;

impl<D: Ord> Event<D> {
    pub fn latest_date(&self) -> Option<&D> {
        self.dates.iter().max()
    }
}

impl<D> Event<D> {
    pub(crate) fn try_map_dates<T, E, F>(self, f: &mut F) -> Result<Event<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let mut dates = Vec::with_capacity(self.dates.len());
        for date in self.dates {
            dates.push(f(DateField::EventDate { event: self.id }, date)?);
        }
        Ok(Event {
            id: self.id,
            name: self.name,
            location: self.location,
            url: self.url,
            dates,
        })
    }
}

impl<D> UpcomingEvent<D> {
    pub(crate) fn try_map_dates<T, E, F>(self, f: &mut F) -> Result<UpcomingEvent<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let start_date = f(DateField::UpcomingStart { event: self.name.clone() }, self.start_date)?;
        let end_date = f(DateField::UpcomingEnd { event: self.name.clone() }, self.end_date)?;
        Ok(UpcomingEvent {
            name: self.name,
            location: self.location,
            latitude: self.latitude,
            longitude: self.longitude,
            url: self.url,
            event_type: self.event_type,
            start_date,
            end_date,
        })
    }
}

impl<D> EventsDocument<D> {
    pub fn event(&self, id: u32) -> Option<&Event<D>> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn try_map_dates<T, E, F>(self, mut f: F) -> Result<EventsDocument<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let mut events = Vec::with_capacity(self.events.len());
        for event in self.events {
            events.push(event.try_map_dates(&mut f)?);
        }
        Ok(EventsDocument { events })
    }
}
