use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::DateField;

/// One dancer's result at one event, in one role and division.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement<D = DateTime<Utc>> {
    pub role: u32,
    pub result: String,
    #[serde(default)]
    pub points: u32,
    pub event: u32,
    pub date: D,
    pub division: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dancer<D = DateTime<Utc>> {
    pub id: u32,
    #[serde(default)]
    pub pro: bool,
    pub primary_role: u32,
    #[serde(default)]
    pub first: String,
    #[serde(default)]
    pub last: String,
    // Newer builds write a single combined name instead of first/last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub placements: Vec<Placement<D>>,
    /// Divisions the dancer may currently enter, per role id
    #[serde(default)]
    pub divisions: BTreeMap<u32, Vec<u32>>,
}

/// Points accumulated in one (role, division) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisionPoints {
    pub role: u32,
    pub division: u32,
    pub points: u32,
}

impl<D> Placement<D> {
    pub(crate) fn try_map_dates<T, E, F>(self, dancer: u32, f: &mut F) -> Result<Placement<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let date = f(
            DateField::PlacementDate {
                dancer,
                event: self.event,
            },
            self.date,
        )?;
        Ok(Placement {
            role: self.role,
            result: self.result,
            points: self.points,
            event: self.event,
            date,
            division: self.division,
        })
    }
}

impl<D> Dancer<D> {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("{} {}", self.first, self.last).trim().to_string(),
        }
    }

    /// Total points per (role, division), in order of first appearance.
    pub fn points_by_division(&self) -> Vec<DivisionPoints> {
        let mut totals: Vec<DivisionPoints> = Vec::new();
        for placement in &self.placements {
            match totals
                .iter_mut()
                .find(|t| t.role == placement.role && t.division == placement.division)
            {
                Some(total) => total.points += placement.points,
                None => totals.push(DivisionPoints {
                    role: placement.role,
                    division: placement.division,
                    points: placement.points,
                }),
            }
        }
        totals
    }

    pub(crate) fn try_map_dates<T, E, F>(self, f: &mut F) -> Result<Dancer<T>, E>
    where
        F: FnMut(DateField, D) -> Result<T, E>,
    {
        let id = self.id;
        let mut placements = Vec::with_capacity(self.placements.len());
        for placement in self.placements {
            placements.push(placement.try_map_dates(id, &mut *f)?);
        }
        Ok(Dancer {
            id,
            pro: self.pro,
            primary_role: self.primary_role,
            first: self.first,
            last: self.last,
            name: self.name,
            placements,
            divisions: self.divisions,
        })
    }
}
