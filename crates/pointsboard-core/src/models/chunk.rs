//! Per-bucket dancer documents.
//!
//! Dancers are split into files of `DANCER_BUCKET_SIZE` consecutive ids
//! (`assets/chunks/dancers_40-60.txt` holds ids 40..=59). The producer
//! denormalizes these records: roles and divisions are names, and each
//! placement embeds a summary of its event.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::DateField;

pub const DANCER_BUCKET_SIZE: u32 = 20;

/// Directory holding the bucket files, relative to the site root
const CHUNK_DIR: &str = "assets/chunks";

/// First id of the bucket holding `id`, and the first id of the next one.
/// Widened so the last bucket's upper bound still fits past `u32::MAX`.
pub fn bucket_bounds(id: u32) -> (u64, u64) {
    let size = u64::from(DANCER_BUCKET_SIZE);
    let bottom = (u64::from(id) / size) * size;
    (bottom, bottom + size)
}

/// Asset path of the bucket holding `id`.
pub fn bucket_path(id: u32) -> String {
    let (bottom, top) = bucket_bounds(id);
    format!("{}/dancers_{}-{}.txt", CHUNK_DIR, bottom, top)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DancerChunk<D = DateTime<Utc>> {
    #[serde(default)]
    pub dancers: Vec<ChunkDancer<D>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDancer<D = DateTime<Utc>> {
    pub id: u32,
    pub primary_role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub placements: Vec<ChunkPlacement<D>>,
    /// Division names the dancer may enter, keyed by role name
    #[serde(default)]
    pub divisions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlacement<D = DateTime<Utc>> {
    pub role: String,
    pub result: String,
    #[serde(default)]
    pub points: u32,
    pub event: EventSummary,
    pub date: D,
    pub division: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl<D> DancerChunk<D> {
    /// Take the record with this id out of the bucket.
    pub fn find(self, id: u32) -> Option<ChunkDancer<D>> {
        self.dancers.into_iter().find(|d| d.id == id)
    }
}

impl<D> ChunkDancer<D> {
    pub fn try_map_dates<T, E, F>(self, mut f: F) -> Result<ChunkDancer<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let mut placements = Vec::with_capacity(self.placements.len());
        for placement in self.placements {
            let field = DateField::PlacementDate {
                dancer: self.id,
                event: placement.event.id,
            };
            placements.push(ChunkPlacement {
                date: f(field, placement.date)?,
                role: placement.role,
                result: placement.result,
                points: placement.points,
                event: placement.event,
                division: placement.division,
            });
        }
        Ok(ChunkDancer {
            id: self.id,
            primary_role: self.primary_role,
            name: self.name,
            placements,
            divisions: self.divisions,
        })
    }
}
