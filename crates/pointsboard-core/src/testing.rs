//! In-memory doubles shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use serde::Serialize;
use tokio::sync::Notify;

use crate::api::{ApiError, Network, Resource};
use crate::models::{
    Dancer, Dataset, DivisionGainers, DivisionProgression, Event, Gainer, NewDancersBucket, Placement, RawDataset,
    RoleGainers, UpcomingEvent,
};

#[derive(Clone)]
enum Route {
    Serve(Resource),
    Fail,
}

#[derive(Default)]
struct FakeState {
    routes: HashMap<String, Route>,
    calls: HashMap<String, usize>,
    gates: HashMap<String, Arc<Notify>>,
}

/// Network double: serves canned responses per URL and counts requests.
/// Unknown URLs answer `NotFound`, failing ones a 503 `ServerError`.
#[derive(Clone, Default)]
pub(crate) struct FakeNetwork {
    state: Arc<Mutex<FakeState>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn serve(&self, url: &str, last_modified: &str, body: Vec<u8>) {
        let resource = Resource::new(url, body).with_last_modified(last_modified);
        self.state.lock().unwrap().routes.insert(url.to_string(), Route::Serve(resource));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.state.lock().unwrap().routes.insert(url.to_string(), Route::Fail);
    }

    /// Hold the next request for `url` until the returned gate is notified.
    /// The response is chosen when the request arrives, not when it is
    /// released.
    pub(crate) fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().gates.insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.state.lock().unwrap().calls.get(url).copied().unwrap_or(0)
    }
}

impl Network for FakeNetwork {
    async fn fetch(&self, url: &str) -> Result<Resource, ApiError> {
        let (route, gate) = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(url.to_string()).or_default() += 1;
            (state.routes.get(url).cloned(), state.gates.remove(url))
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match route {
            Some(Route::Serve(resource)) => Ok(resource),
            Some(Route::Fail) => Err(ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, url, "")),
            None => Err(ApiError::NotFound(url.to_string())),
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    rmp_serde::to_vec_named(value).unwrap()
}

/// A small dataset shaped like the producer's output: one follower (id 47)
/// with two placements, two events, and every aggregate populated.
pub(crate) fn sample_raw_dataset(last_updated: &str) -> RawDataset {
    Dataset {
        last_updated: last_updated.to_string(),
        roles: BTreeMap::from([
            (1, "Leader".to_string()),
            (2, "Follower".to_string()),
            (3, "Switch".to_string()),
        ]),
        divisions: BTreeMap::from([
            (3, "Newcomer".to_string()),
            (4, "Novice".to_string()),
            (5, "Intermediate".to_string()),
        ]),
        dancers: vec![Dancer {
            id: 47,
            pro: false,
            primary_role: 2,
            first: "Robin".to_string(),
            last: "Vale".to_string(),
            name: None,
            placements: vec![
                Placement {
                    role: 2,
                    result: "1".to_string(),
                    points: 15,
                    event: 12,
                    date: "2023-06-01".to_string(),
                    division: 4,
                },
                Placement {
                    role: 2,
                    result: "F".to_string(),
                    points: 1,
                    event: 9,
                    date: "2022-11-01".to_string(),
                    division: 3,
                },
            ],
            divisions: BTreeMap::from([(2, vec![4, 5])]),
        }],
        events: vec![
            Event {
                id: 12,
                name: "Liberty Swing".to_string(),
                location: Some("New Brunswick, NJ".to_string()),
                url: Some("https://example.org/events/liberty".to_string()),
                dates: vec!["2023-06-01".to_string(), "2022-06-01".to_string()],
            },
            Event {
                id: 9,
                name: "Halloween Swingthing".to_string(),
                location: Some("Phoenix, AZ".to_string()),
                url: None,
                dates: vec!["2022-11-01".to_string()],
            },
        ],
        top_dancers_by_points_gained_recently: vec![DivisionGainers {
            division: 4,
            roles: vec![RoleGainers {
                role: 2,
                dancers: vec![Gainer { points: 15, wscdid: 47 }],
            }],
        }],
        past_events_that_may_be_recurring: vec![9],
        new_dancers_over_time: vec![NewDancersBucket {
            key: "'22".to_string(),
            value: 1,
        }],
        ordered_skill_divisions: vec![3, 4, 5],
        dancers_count: 1,
        events_count: 2,
        upcoming_events: vec![UpcomingEvent {
            name: "Swing Fling".to_string(),
            location: Some("Washington, D.C., US".to_string()),
            latitude: Some(38.9),
            longitude: Some(-77.03),
            url: None,
            event_type: Some("Registry".to_string()),
            start_date: "2024-07-11T00:00:00".to_string(),
            end_date: "2024-07-14T00:00:00".to_string(),
        }],
        division_progression: DivisionProgression {
            labels: vec!["Newcomer".to_string(), "Novice".to_string()],
            data: vec![vec![120, 300], vec![400]],
        },
    }
}
