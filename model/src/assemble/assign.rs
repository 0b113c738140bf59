use std::collections::BTreeMap;

use crate::{BusNumber, RunStats, Timetable, Trip, WarningEvent};

/// Attaches each warning to the trip it happened on, keyed by fleet number
/// and a half-open time window: `start_time <= loc_time < end_time`. The
/// upper bound is exclusive so a warning co-timed with a boundary can only
/// belong to the later trip; the lower bound is inclusive to keep warnings
/// co-timed with a trip's start.
///
/// This is a read-only scan over the warning set. Trips receive copies of
/// their matches; the warnings themselves are never consumed, so no trip's
/// query can starve another's. Returns the warnings that matched no trip, for
/// audit -- they are never recovered automatically.
pub fn attach_warnings(
    trips: &mut [Trip],
    warnings: &[WarningEvent],
    stats: &mut RunStats,
) -> Vec<WarningEvent> {
    let mut by_bus: BTreeMap<BusNumber, Vec<usize>> = BTreeMap::new();
    for (idx, trip) in trips.iter().enumerate() {
        by_bus.entry(trip.bus_number).or_insert_with(Vec::new).push(idx);
    }

    // Trips of one bus from non-overlapping assignments can't overlap in
    // time. When they do anyway, matching below stays deterministic, but
    // it's worth counting.
    for indices in by_bus.values() {
        let mut timetable = Timetable::new();
        for &idx in indices {
            let window = (trips[idx].start_time, trips[idx].end_time);
            if timetable.is_free(window) {
                timetable.assign(window, idx);
            } else {
                stats.overlapping_trip_windows += 1;
            }
        }
    }

    let mut unassigned = Vec::new();
    for warning in warnings {
        let candidates: Vec<usize> = by_bus
            .get(&warning.bus_number)
            .map(|indices| {
                indices
                    .iter()
                    .copied()
                    .filter(|&idx| {
                        trips[idx].start_time <= warning.loc_time
                            && warning.loc_time < trips[idx].end_time
                    })
                    .collect()
            })
            .unwrap_or_default();

        match candidates.len() {
            0 => {
                stats.warnings_unassigned += 1;
                unassigned.push(warning.clone());
            }
            1 => {
                stats.warnings_matched += 1;
                trips[candidates[0]].warnings.push(warning.clone());
            }
            _ => {
                // Only possible when trip windows overlap. Resolve to the
                // trip whose start is nearest below the warning.
                stats.warnings_ambiguous += 1;
                stats.warnings_matched += 1;
                let winner = candidates
                    .into_iter()
                    .max_by_key(|&idx| trips[idx].start_time)
                    .unwrap();
                trips[winner].warnings.push(warning.clone());
            }
        }
    }
    unassigned
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use catalog::{Heading, RouteID};

    use super::*;
    use crate::{DriverID, VehicleID, WarningKind};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 10, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn trip(bus: u32, start: NaiveDateTime, end: NaiveDateTime) -> Trip {
        Trip {
            route_id: RouteID(7),
            route_name: "DASH B".to_string(),
            heading: Heading("N".to_string()),
            vehicle_id: VehicleID(324),
            driver_id: DriverID(9),
            bus_number: BusNumber(bus),
            start_time: start,
            end_time: end,
            stop_count: 2,
            warnings: Vec::new(),
        }
    }

    fn warning(bus: u32, loc_time: NaiveDateTime) -> WarningEvent {
        WarningEvent {
            bus_number: BusNumber(bus),
            loc_time,
            kind: WarningKind::PcwLeftFront,
            address: "Main St".to_string(),
            latitude: 34.05,
            longitude: -118.25,
        }
    }

    #[test]
    fn matches_by_bus_and_half_open_window() {
        let mut trips = vec![
            trip(42, at(8, 2), at(8, 15)),
            trip(42, at(8, 17), at(8, 30)),
            trip(43, at(8, 0), at(9, 0)),
        ];
        let warnings = vec![
            warning(42, at(8, 10)),  // inside the first trip
            warning(42, at(8, 15)),  // at the boundary: in neither
            warning(42, at(8, 17)),  // exactly at the second trip's start
            warning(42, at(8, 45)),  // after both
            warning(99, at(8, 10)),  // unknown bus
        ];
        let mut stats = RunStats::new();
        let unassigned = attach_warnings(&mut trips, &warnings, &mut stats);

        assert_eq!(trips[0].warnings.len(), 1);
        assert_eq!(trips[0].warnings[0].loc_time, at(8, 10));
        assert_eq!(trips[1].warnings.len(), 1);
        assert_eq!(trips[1].warnings[0].loc_time, at(8, 17));
        assert!(trips[2].warnings.is_empty());

        assert_eq!(stats.warnings_matched, 2);
        assert_eq!(stats.warnings_unassigned, 3);
        assert_eq!(unassigned.len(), 3);
        assert_eq!(stats.warnings_ambiguous, 0);
        assert_eq!(stats.overlapping_trip_windows, 0);
    }

    #[test]
    fn resolves_overlapping_windows_to_the_nearest_start() {
        let mut trips = vec![
            trip(42, at(8, 0), at(9, 0)),
            trip(42, at(8, 30), at(9, 30)),
        ];
        let warnings = vec![warning(42, at(8, 45))];
        let mut stats = RunStats::new();
        let unassigned = attach_warnings(&mut trips, &warnings, &mut stats);

        assert!(unassigned.is_empty());
        assert!(trips[0].warnings.is_empty());
        assert_eq!(trips[1].warnings.len(), 1);
        assert_eq!(stats.warnings_ambiguous, 1);
        assert_eq!(stats.overlapping_trip_windows, 1);
    }

    #[test]
    fn rerunning_assignment_is_idempotent() {
        let mut first = vec![trip(42, at(8, 0), at(9, 0))];
        let mut second = first.clone();
        let warnings = vec![warning(42, at(8, 30)), warning(42, at(10, 0))];

        let mut stats1 = RunStats::new();
        let mut stats2 = RunStats::new();
        let unassigned1 = attach_warnings(&mut first, &warnings, &mut stats1);
        let unassigned2 = attach_warnings(&mut second, &warnings, &mut stats2);

        assert_eq!(first, second);
        assert_eq!(unassigned1, unassigned2);
        assert_eq!(stats1, stats2);
    }
}
