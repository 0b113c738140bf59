use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use catalog::RouteID;

use crate::{ingest, BusNumber, DriverID, RunStats, StopEvent, VehicleID};

/// Driver schedule exports are named like `DASH-B_VehiclesThatRanRoute_2018-10.txt`.
pub const ASSIGNMENT_FILE_MARKER: &str = "_VehiclesThatRanRoute_";

/// The dispatch system's synthetic drivers, used for equipment tests, carry
/// this badge/name and must never reach the products.
const TEST_DATA_MARKER: &str = "TEST";

/// A driver-vehicle-route binding for one shift segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub vehicle_assignment_id: u32,
    pub vehicle_id: VehicleID,
    pub route_id: RouteID,
    pub driver_id: DriverID,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub bus_number: BusNumber,
    // Carried through to the store for roster lookups; the pipeline itself
    // only uses driver_id
    pub first_name: String,
    pub last_name: String,
    pub badge_number: String,
}

impl Assignment {
    /// Containment policy: an event belongs to the window iff its departure
    /// falls in `[start_time, end_time)`. Half-open so back-to-back windows
    /// never claim the same event twice.
    pub fn contains(&self, event: &StopEvent) -> bool {
        self.start_time <= event.departed_at && event.departed_at < self.end_time
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Assignment>> {
    let mut assignments = Vec::new();
    for rec in csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader)
        .deserialize()
    {
        let rec: Record = rec?;
        assignments.push(Assignment {
            vehicle_assignment_id: rec.vehicle_assignment_id,
            vehicle_id: rec.vehicle_id,
            route_id: rec.route_id,
            driver_id: rec.driver_id,
            start_time: ingest::parse_minutes(&rec.start_time)?,
            end_time: ingest::parse_minutes(&rec.end_time)?,
            bus_number: rec.bus_number,
            first_name: rec.first_name,
            last_name: rec.last_name,
            badge_number: rec.badge_number,
        });
    }
    Ok(assignments)
}

pub fn load_dir(dir: &Path, stats: &mut RunStats) -> Result<Vec<Assignment>> {
    let mut assignments = Vec::new();
    for path in ingest::find_files(dir, ASSIGNMENT_FILE_MARKER)? {
        match fs_err::File::open(&path)
            .map_err(anyhow::Error::from)
            .and_then(|f| load(f))
        {
            Ok(mut batch) => {
                info!("Read {} assignments from {}", batch.len(), path.display());
                assignments.append(&mut batch);
            }
            Err(err) => {
                error!("Skipping {}: {}", path.display(), err);
                stats.files_skipped += 1;
            }
        }
    }
    Ok(clean(assignments, stats))
}

/// Drops inverted windows, test-data rows, and duplicates (a shift spanning
/// midnight appears once in each day's export), then sorts by window.
pub fn clean(assignments: Vec<Assignment>, stats: &mut RunStats) -> Vec<Assignment> {
    let mut kept = Vec::new();
    for a in assignments {
        if a.start_time >= a.end_time {
            stats.rows_quarantined += 1;
            continue;
        }
        if a.first_name == TEST_DATA_MARKER
            || a.last_name == TEST_DATA_MARKER
            || a.badge_number == TEST_DATA_MARKER
        {
            stats.rows_quarantined += 1;
            continue;
        }
        kept.push(a);
    }
    kept.sort_by_key(|a| (a.start_time, a.end_time, a.vehicle_assignment_id));
    kept.dedup_by(|a, b| a == b);
    kept
}

#[derive(Deserialize)]
struct Record {
    vehicle_assignment_id: u32,
    vehicle_id: VehicleID,
    route_id: RouteID,
    driver_id: DriverID,
    start_time: String,
    end_time: String,
    bus_number: BusNumber,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    badge_number: String,
}
