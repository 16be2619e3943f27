use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dancer::Dancer;
use super::event::{Event, UpcomingEvent};
use crate::dataset::DateField;

/// Name shown for ids missing from the role/division tables
const UNKNOWN_NAME: &str = "Unknown";

/// The pre-computed statistics document (`assets/database.txt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset<D = DateTime<Utc>> {
    pub last_updated: D,
    #[serde(default)]
    pub roles: BTreeMap<u32, String>,
    #[serde(default)]
    pub divisions: BTreeMap<u32, String>,
    #[serde(default)]
    pub dancers: Vec<Dancer<D>>,
    #[serde(default)]
    pub events: Vec<Event<D>>,
    #[serde(default)]
    pub top_dancers_by_points_gained_recently: Vec<DivisionGainers>,
    #[serde(default)]
    pub past_events_that_may_be_recurring: Vec<u32>,
    #[serde(default)]
    pub new_dancers_over_time: Vec<NewDancersBucket>,
    /// Skill divisions from entry level upward
    #[serde(default)]
    pub ordered_skill_divisions: Vec<u32>,
    #[serde(default)]
    pub dancers_count: usize,
    #[serde(default)]
    pub events_count: usize,
    #[serde(default)]
    pub upcoming_events: Vec<UpcomingEvent<D>>,
    #[serde(default)]
    pub division_progression: DivisionProgression,
}

/// The dataset as decoded, before dates are parsed.
pub type RawDataset = Dataset<String>;

/// Recent top point-gainers in one division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionGainers {
    pub division: u32,
    #[serde(default)]
    pub roles: Vec<RoleGainers>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGainers {
    pub role: u32,
    #[serde(default)]
    pub dancers: Vec<Gainer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gainer {
    pub points: u32,
    // Spelled this way by the producer
    pub wscdid: u32,
}

/// Count of first-time competitors, keyed by a display label such as `'19`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDancersBucket {
    pub key: String,
    pub value: u32,
}

/// Days taken to move from each skill division to the next.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DivisionProgression {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<i64>>,
}

impl<D> Dataset<D> {
    pub fn dancer(&self, id: u32) -> Option<&Dancer<D>> {
        self.dancers.iter().find(|d| d.id == id)
    }

    pub fn event(&self, id: u32) -> Option<&Event<D>> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn role_name(&self, id: u32) -> &str {
        self.roles.get(&id).map(String::as_str).unwrap_or(UNKNOWN_NAME)
    }

    pub fn division_name(&self, id: u32) -> &str {
        self.divisions.get(&id).map(String::as_str).unwrap_or(UNKNOWN_NAME)
    }

    /// Ids of every dancer, in document order.
    pub fn dancer_ids(&self) -> Vec<u32> {
        self.dancers.iter().map(|d| d.id).collect()
    }

    /// Rebuild the document with every date field passed through `f`.
    /// Everything else is moved across untouched.
    pub fn try_map_dates<T, E, F>(self, mut f: F) -> Result<Dataset<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let last_updated = f(DateField::LastUpdated, self.last_updated)?;

        let mut dancers = Vec::with_capacity(self.dancers.len());
        for dancer in self.dancers {
            dancers.push(dancer.try_map_dates(&mut f)?);
        }

        let mut events = Vec::with_capacity(self.events.len());
        for event in self.events {
            events.push(event.try_map_dates(&mut f)?);
        }

        let mut upcoming_events = Vec::with_capacity(self.upcoming_events.len());
        for upcoming in self.upcoming_events {
            upcoming_events.push(upcoming.try_map_dates(&mut f)?);
        }

        Ok(Dataset {
            last_updated,
            roles: self.roles,
            divisions: self.divisions,
            dancers,
            events,
            top_dancers_by_points_gained_recently: self.top_dancers_by_points_gained_recently,
            past_events_that_may_be_recurring: self.past_events_that_may_be_recurring,
            new_dancers_over_time: self.new_dancers_over_time,
            ordered_skill_divisions: self.ordered_skill_divisions,
            dancers_count: self.dancers_count,
            events_count: self.events_count,
            upcoming_events,
            division_progression: self.division_progression,
        })
    }
}
