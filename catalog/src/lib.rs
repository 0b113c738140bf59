#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod stops;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use self::stops::{load_stops, HeadingStops, RouteStops, Stop};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteID(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopID(pub u32);

/// A route-specific directional code ("N"/"S", "E"/"W"). Not a compass bearing
/// in general; just a label for one half of a round trip.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Heading(pub String);

impl std::fmt::Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only reference data describing every route's stops. Loaded once at the
/// start of a run; nothing mutates it afterwards.
pub struct Catalog {
    pub routes: BTreeMap<RouteID, RouteStops>,
}

impl Catalog {
    /// Groups raw stop rows by route and validates each one. Routes failing
    /// validation are dropped with an error; their stop events will show up
    /// later as skipped routes.
    pub fn build(stops: Vec<Stop>) -> Self {
        let mut per_route: BTreeMap<RouteID, Vec<Stop>> = BTreeMap::new();
        for stop in stops {
            per_route
                .entry(stop.route_id)
                .or_insert_with(Vec::new)
                .push(stop);
        }

        let mut routes = BTreeMap::new();
        for (route_id, rows) in per_route {
            match RouteStops::new(route_id, rows) {
                Ok(route) => {
                    routes.insert(route_id, route);
                }
                Err(err) => {
                    error!("Dropping invalid definition for {:?}: {}", route_id, err);
                }
            }
        }
        Self { routes }
    }

    pub fn route(&self, id: RouteID) -> Option<&RouteStops> {
        self.routes.get(&id)
    }

    /// Reads every CSV file directly under `dir` (the stop definitions are
    /// maintained one hand-made spreadsheet per route) and concatenates them.
    pub fn load_dir(dir: &Path) -> Result<Vec<Stop>> {
        let mut stops = Vec::new();
        for entry in fs_err::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let rows = load_stops(fs_err::File::open(&path)?)?;
            info!("Read {} stop rows from {}", rows.len(), path.display());
            stops.extend(rows);
        }
        Ok(stops)
    }
}
