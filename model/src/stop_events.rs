use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use catalog::{RouteID, StopID};

use crate::{ingest, RunStats, VehicleID};

/// Monthly AVL exports are named like `DASH-B_StopTimes_2018-10.txt`.
pub const STOP_EVENT_FILE_MARKER: &str = "_StopTimes_";

/// One observation of a vehicle arriving at and departing a stop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopEvent {
    pub route_id: RouteID,
    pub vehicle_id: VehicleID,
    /// None when the AVL system couldn't resolve the location to a stop
    pub stop_id: Option<StopID>,
    pub arrived_at: NaiveDateTime,
    pub departed_at: NaiveDateTime,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Parses one tab-delimited export. A malformed file fails here and the
/// caller decides whether to skip it; rows violating the arrival/departure
/// invariant are quarantined individually.
pub fn load<R: std::io::Read>(reader: R, stats: &mut RunStats) -> Result<Vec<StopEvent>> {
    let mut events = Vec::new();
    for rec in csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader)
        .deserialize()
    {
        let rec: Record = rec?;
        let arrived_at = ingest::parse_minutes(&rec.arrived_at)?;
        let departed_at = ingest::parse_minutes(&rec.departed_at)?;
        if arrived_at > departed_at {
            debug!(
                "Quarantining stop event for vehicle {:?} that departs before it arrives",
                rec.vehicle_id
            );
            stats.rows_quarantined += 1;
            continue;
        }
        events.push(StopEvent {
            route_id: rec.route_id,
            vehicle_id: rec.vehicle_id,
            stop_id: rec.stop_id,
            arrived_at,
            departed_at,
            latitude: rec.latitude,
            longitude: rec.longitude,
        });
    }
    Ok(events)
}

/// Concatenates every stop-event export under `dir`, then deduplicates and
/// sorts the result. One unreadable file skips that file only.
pub fn load_dir(dir: &Path, stats: &mut RunStats) -> Result<Vec<StopEvent>> {
    let mut events = Vec::new();
    for path in ingest::find_files(dir, STOP_EVENT_FILE_MARKER)? {
        match fs_err::File::open(&path)
            .map_err(anyhow::Error::from)
            .and_then(|f| load(f, stats))
        {
            Ok(mut batch) => {
                info!("Read {} stop events from {}", batch.len(), path.display());
                events.append(&mut batch);
            }
            Err(err) => {
                error!("Skipping {}: {}", path.display(), err);
                stats.files_skipped += 1;
            }
        }
    }
    dedupe_and_sort(&mut events);
    Ok(events)
}

/// The export files overlap at month boundaries, so records of the same
/// physical stop appear more than once. Exact duplicates are dropped; the
/// remainder is sorted the way segmentation expects.
pub fn dedupe_and_sort(events: &mut Vec<StopEvent>) {
    events.sort_by_key(|ev| {
        (
            ev.route_id,
            ev.vehicle_id,
            ev.arrived_at,
            ev.departed_at,
            ev.stop_id,
        )
    });
    events.dedup_by(|a, b| a == b);
}

#[derive(Deserialize)]
struct Record {
    route_id: RouteID,
    vehicle_id: VehicleID,
    stop_id: Option<StopID>,
    arrived_at: String,
    departed_at: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}
