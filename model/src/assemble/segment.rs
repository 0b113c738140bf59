use catalog::RouteStops;

use crate::{Assignment, RunStats, StopEvent, Trip};

/// Candidate segments with fewer events than this are likely duplicate
/// records of one physical stop, not a real trip.
const MIN_SEGMENT_EVENTS: usize = 2;

/// Cuts one assignment window's chronologically sorted stop events into
/// directional trips.
///
/// Every visit to the route's terminal stop is a cut point, plus virtual
/// boundaries at both ends of the window so trips truncated by a shift
/// change are still kept. Each candidate segment between consecutive cut
/// points either yields one or two trips or is dropped with a diagnostic
/// counter; dropping is never fatal.
pub fn segment(
    route: &RouteStops,
    assignment: &Assignment,
    events: &[&StopEvent],
    stats: &mut RunStats,
) -> Vec<Trip> {
    if events.len() < MIN_SEGMENT_EVENTS {
        if !events.is_empty() {
            stats.segments_short += 1;
        }
        return Vec::new();
    }

    let mut cuts = vec![0];
    for (idx, ev) in events.iter().enumerate() {
        if ev.stop_id == Some(route.terminal_stop) {
            cuts.push(idx);
        }
    }
    cuts.push(events.len() - 1);
    cuts.dedup();

    let mut trips = Vec::new();
    for pair in cuts.windows(2) {
        segment_candidate(route, assignment, &events[pair[0]..=pair[1]], stats, &mut trips);
    }
    stats.trips_emitted += trips.len();
    trips
}

fn segment_candidate(
    route: &RouteStops,
    assignment: &Assignment,
    events: &[&StopEvent],
    stats: &mut RunStats,
    trips: &mut Vec<Trip>,
) {
    if events.len() < MIN_SEGMENT_EVENTS {
        stats.segments_short += 1;
        return;
    }
    // A full round trip visits every stop once plus the closing terminal
    // visit; more events means we missed a terminal and glued trips together.
    if events.len() > route.total_stops() + 1 {
        stats.segments_oversized += 1;
        return;
    }

    // Classify the interior by heading membership. The first and last events
    // are terminal visits or window boundaries, not evidence of direction.
    let mut first_run = Vec::new();
    let mut second_run = Vec::new();
    for (idx, ev) in events.iter().enumerate().take(events.len() - 1).skip(1) {
        let stop_id = match ev.stop_id {
            Some(x) => x,
            None => {
                stats.segments_invalid += 1;
                return;
            }
        };
        match (
            route.headings[0].contains(stop_id),
            route.headings[1].contains(stop_id),
        ) {
            (true, false) => first_run.push(idx),
            (false, true) => second_run.push(idx),
            // In neither heading, or a route definition that lists the stop
            // in both
            _ => {
                stats.segments_invalid += 1;
                return;
            }
        }
    }

    let first_ev = events[0];
    let last_ev = events[events.len() - 1];
    let trip = |heading_idx: usize, start, end, stop_count| Trip {
        route_id: route.route_id,
        route_name: route.route_name.clone(),
        heading: route.headings[heading_idx].heading.clone(),
        vehicle_id: first_ev.vehicle_id,
        driver_id: assignment.driver_id,
        bus_number: assignment.bus_number,
        start_time: start,
        end_time: end,
        stop_count,
        warnings: Vec::new(),
    };

    let emitted = match (first_run.is_empty(), second_run.is_empty()) {
        (false, false) => {
            // Two directional runs share this segment. They only form a
            // clean round trip if one strictly precedes the other.
            if first_run.last() < second_run.first() {
                let switch = events[*first_run.last().unwrap()];
                vec![
                    trip(0, first_ev.departed_at, switch.arrived_at, first_run.len()),
                    trip(1, switch.departed_at, last_ev.arrived_at, second_run.len()),
                ]
            } else if second_run.last() < first_run.first() {
                let switch = events[*second_run.last().unwrap()];
                vec![
                    trip(1, first_ev.departed_at, switch.arrived_at, second_run.len()),
                    trip(0, switch.departed_at, last_ev.arrived_at, first_run.len()),
                ]
            } else {
                stats.segments_interleaved += 1;
                return;
            }
        }
        // One heading only: a one-way trip, possibly truncated by the window
        (false, true) if first_run.len() >= MIN_SEGMENT_EVENTS => {
            vec![trip(0, first_ev.departed_at, last_ev.arrived_at, first_run.len())]
        }
        (true, false) if second_run.len() >= MIN_SEGMENT_EVENTS => {
            vec![trip(1, first_ev.departed_at, last_ev.arrived_at, second_run.len())]
        }
        _ => {
            stats.segments_interleaved += 1;
            return;
        }
    };

    for t in emitted {
        if t.start_time < t.end_time {
            trips.push(t);
        } else {
            stats.trips_degenerate += 1;
        }
    }
}
