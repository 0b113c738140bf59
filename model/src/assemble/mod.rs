mod assign;
mod products;
mod segment;

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use catalog::{Catalog, Heading, RouteID};

use crate::{
    Assignment, BusNumber, DriverID, RunStats, StopEvent, VehicleID, WarningEvent,
};

pub use self::assign::attach_warnings;
pub use self::products::{hotspot_geojson, hotspot_rows, longitudinal_rows, HotspotRow, LongitudinalRow};
pub use self::segment::segment;

/// One directional traversal of a route between two terminal-stop visits.
/// Built by the segmenter, enriched with warnings, then projected into the
/// two products; never persisted as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct Trip {
    pub route_id: RouteID,
    pub route_name: String,
    pub heading: Heading,
    pub vehicle_id: VehicleID,
    pub driver_id: DriverID,
    pub bus_number: BusNumber,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Intermediate stops observed in this trip's heading
    pub stop_count: usize,
    pub warnings: Vec<WarningEvent>,
}

/// Reconstructs every trip in the batch: for each route seen in the stop
/// events, for each vehicle/driver/window assigned to it, segment that
/// window's events. Each (route, vehicle, driver, window) tuple is
/// independent; problems there drop that tuple's trips, never the run.
///
/// `stop_events` must already be sorted by (route, vehicle, arrived,
/// departed), which the loaders and the store both guarantee.
pub fn build_trips(
    catalog: &Catalog,
    stop_events: &[StopEvent],
    assignments: &[Assignment],
    stats: &mut RunStats,
) -> Vec<Trip> {
    let event_routes: BTreeSet<RouteID> = stop_events.iter().map(|ev| ev.route_id).collect();

    let mut trips = Vec::new();
    for route_id in event_routes {
        let route = match catalog.route(route_id) {
            Some(route) => route,
            None => {
                warn!("Stop events reference {:?}, which has no stop definition; skipping", route_id);
                stats.routes_skipped += 1;
                continue;
            }
        };

        for assignment in assignments.iter().filter(|a| a.route_id == route_id) {
            // A bus on this route for this driver won't switch routes and
            // back within one window, so the window's events are exactly
            // this route+vehicle filtered by time.
            let window_events: Vec<&StopEvent> = stop_events
                .iter()
                .filter(|ev| {
                    ev.route_id == route_id
                        && ev.vehicle_id == assignment.vehicle_id
                        && assignment.contains(ev)
                })
                .collect();

            stats.windows_processed += 1;
            debug!(
                "route {:?}, vehicle {:?}, driver {:?}, {} events in [{}, {})",
                route_id,
                assignment.vehicle_id,
                assignment.driver_id,
                window_events.len(),
                assignment.start_time,
                assignment.end_time
            );

            trips.extend(segment(route, assignment, &window_events, stats));
        }
    }
    trips
}
