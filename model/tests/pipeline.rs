//! End-to-end run over a small synthetic day: ingest through the store,
//! reconstruct trips, assign warnings, build both products.

use chrono::{NaiveDate, NaiveDateTime};

use catalog::{Catalog, Heading, RouteID, Stop, StopID};
use model::{
    attach_warnings, build_trips, hotspot_rows, longitudinal_rows, Assignment, BusNumber,
    DriverID, IfExists, RunStats, StopEvent, Store, VehicleID, WarningEvent, WarningKind,
};

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2018, 10, 3)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn stop(id: u32, heading: &str, seq: u32, terminal: bool) -> Stop {
    Stop {
        route_id: RouteID(7),
        route_name: "DASH B".to_string(),
        stop_id: StopID(id),
        heading: Heading(heading.to_string()),
        sequence: seq,
        is_terminal: terminal,
    }
}

fn event(stop: Option<u32>, arrived: NaiveDateTime, departed: NaiveDateTime) -> StopEvent {
    StopEvent {
        route_id: RouteID(7),
        vehicle_id: VehicleID(324),
        stop_id: stop.map(StopID),
        arrived_at: arrived,
        departed_at: departed,
        latitude: None,
        longitude: None,
    }
}

fn warning(kind: WarningKind, loc_time: NaiveDateTime) -> WarningEvent {
    WarningEvent {
        bus_number: BusNumber(15301),
        loc_time,
        kind,
        address: "Main St".to_string(),
        latitude: 34.05,
        longitude: -118.25,
    }
}

fn assignment(id: u32, driver: u32, start: NaiveDateTime, end: NaiveDateTime) -> Assignment {
    Assignment {
        vehicle_assignment_id: id,
        vehicle_id: VehicleID(324),
        route_id: RouteID(7),
        driver_id: DriverID(driver),
        start_time: start,
        end_time: end,
        bus_number: BusNumber(15301),
        first_name: "Pat".to_string(),
        last_name: "Doe".to_string(),
        badge_number: "4421".to_string(),
    }
}

fn fixture() -> (Vec<Stop>, Vec<StopEvent>, Vec<Assignment>, Vec<WarningEvent>) {
    let stops = vec![
        stop(100, "N", 1, true),
        stop(101, "N", 2, false),
        stop(102, "N", 3, false),
        stop(103, "S", 1, false),
        stop(104, "S", 2, false),
    ];
    // One clean round trip: north to the far end, back south
    let events = vec![
        event(Some(100), at(8, 0), at(8, 2)),
        event(Some(101), at(8, 5), at(8, 5)),
        event(Some(102), at(8, 10), at(8, 10)),
        event(Some(100), at(8, 15), at(8, 17)),
        event(Some(103), at(8, 20), at(8, 20)),
        event(Some(104), at(8, 25), at(8, 25)),
        event(Some(100), at(8, 30), at(8, 30)),
    ];
    let assignments = vec![assignment(55, 9, at(6, 0), at(14, 0))];
    let warnings = vec![
        warning(WarningKind::PcwLeftFront, at(8, 10)),
        warning(WarningKind::PcwLeftFront, at(8, 20)),
        // Exactly at the southbound trip's inclusive start
        warning(WarningKind::BrakingAggressive, at(8, 17)),
        // At the northbound trip's exclusive upper bound: falls in the gap
        // between trips
        warning(WarningKind::PdzRight, at(8, 15)),
        // Outside any trip
        warning(WarningKind::BrakingDangerous, at(11, 0)),
    ];
    (stops, events, assignments, warnings)
}

#[test]
fn builds_both_products_from_the_store() {
    let (stops, events, assignments, warnings) = fixture();

    let mut store = Store::open_in_memory().unwrap();
    store.write_route_stops(&stops, IfExists::Replace).unwrap();
    store.write_stop_events(&events, IfExists::Replace).unwrap();
    store
        .write_assignments(&assignments, IfExists::Replace)
        .unwrap();
    store.write_warnings(&warnings, IfExists::Replace).unwrap();

    let catalog = Catalog::build(store.read_route_stops().unwrap());
    let events = store.read_stop_events().unwrap();
    let assignments = store.read_assignments().unwrap();
    let warnings = store.read_warnings().unwrap();

    let mut stats = RunStats::new();
    let mut trips = build_trips(&catalog, &events, &assignments, &mut stats);
    let unassigned = attach_warnings(&mut trips, &warnings, &mut stats);

    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].heading, Heading("N".to_string()));
    assert_eq!(trips[0].start_time, at(8, 2));
    assert_eq!(trips[0].end_time, at(8, 15));
    assert_eq!(trips[0].stop_count, 2);
    assert_eq!(trips[1].heading, Heading("S".to_string()));
    assert_eq!(trips[1].start_time, at(8, 17));
    assert_eq!(trips[1].end_time, at(8, 30));
    assert!(trips.iter().all(|t| t.start_time < t.end_time));

    // 08:10 on the northbound trip; 08:17 and 08:20 on the southbound; the
    // 08:15 and 11:00 warnings match nothing
    assert_eq!(trips[0].warnings.len(), 1);
    assert_eq!(trips[1].warnings.len(), 2);
    assert_eq!(unassigned.len(), 2);
    assert_eq!(stats.warnings_unassigned, 2);

    let hotspot = hotspot_rows(&trips);
    let longitudinal = longitudinal_rows(&trips);
    assert_eq!(hotspot.len(), 3);
    assert_eq!(longitudinal.len(), 2);
    for (trip, row) in trips.iter().zip(longitudinal.iter()) {
        assert_eq!(row.warning_total(), trip.warnings.len());
    }

    store.write_hotspot_product(&hotspot, "hotspot_data_product").unwrap();
    store
        .write_longitudinal_product(&longitudinal, "longitudinal_data_product")
        .unwrap();
    let counts = store.table_counts().unwrap();
    assert!(counts.contains(&("hotspot_data_product".to_string(), 3)));
    assert!(counts.contains(&("longitudinal_data_product".to_string(), 2)));
}

#[test]
fn rerunning_the_pipeline_is_idempotent() {
    let (stops, events, assignments, warnings) = fixture();
    let catalog = Catalog::build(stops);

    let run = || {
        let mut stats = RunStats::new();
        let mut trips = build_trips(&catalog, &events, &assignments, &mut stats);
        attach_warnings(&mut trips, &warnings, &mut stats);
        (hotspot_rows(&trips), longitudinal_rows(&trips), stats)
    };
    let (hotspot1, longitudinal1, stats1) = run();
    let (hotspot2, longitudinal2, stats2) = run();
    assert_eq!(hotspot1, hotspot2);
    assert_eq!(longitudinal1, longitudinal2);
    assert_eq!(stats1, stats2);
}

#[test]
fn back_to_back_windows_never_share_an_event() {
    // A longer northbound leg so the truncated first window still holds a
    // recognizable trip
    let catalog = Catalog::build(vec![
        stop(100, "N", 1, true),
        stop(101, "N", 2, false),
        stop(102, "N", 3, false),
        stop(105, "N", 4, false),
        stop(103, "S", 1, false),
        stop(104, "S", 2, false),
    ]);

    // Shift change at 08:17: the terminal event departing then belongs to the
    // second window only
    let events = vec![
        event(Some(100), at(8, 0), at(8, 2)),
        event(Some(101), at(8, 5), at(8, 5)),
        event(Some(102), at(8, 8), at(8, 8)),
        event(Some(105), at(8, 12), at(8, 12)),
        event(Some(100), at(8, 15), at(8, 17)),
        event(Some(103), at(8, 20), at(8, 20)),
        event(Some(104), at(8, 25), at(8, 25)),
        event(Some(100), at(8, 30), at(8, 30)),
    ];
    let assignments = vec![
        assignment(1, 9, at(6, 0), at(8, 17)),
        assignment(2, 10, at(8, 17), at(14, 0)),
    ];

    let mut stats = RunStats::new();
    let trips = build_trips(&catalog, &events, &assignments, &mut stats);

    // Each window reconstructs its own one-heading trip, under its own driver
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].driver_id, DriverID(9));
    assert_eq!(trips[0].heading, Heading("N".to_string()));
    assert_eq!(trips[0].start_time, at(8, 2));
    assert_eq!(trips[0].end_time, at(8, 12));
    assert_eq!(trips[1].driver_id, DriverID(10));
    assert_eq!(trips[1].heading, Heading("S".to_string()));
    assert_eq!(trips[1].start_time, at(8, 17));
    assert_eq!(trips[1].end_time, at(8, 30));

    // And no boundary event is double-counted across the windows
    assert_eq!(trips[0].stop_count + trips[1].stop_count, 4);
}

#[test]
fn routes_without_definitions_are_skipped() {
    let (stops, mut events, mut assignments, _) = fixture();
    let catalog = Catalog::build(stops);

    // A second route with no catalog entry
    for ev in events.clone() {
        events.push(StopEvent {
            route_id: RouteID(99),
            ..ev
        });
    }
    assignments.push(Assignment {
        route_id: RouteID(99),
        ..assignments[0].clone()
    });

    let mut stats = RunStats::new();
    let trips = build_trips(&catalog, &events, &assignments, &mut stats);
    assert_eq!(trips.len(), 2);
    assert_eq!(stats.routes_skipped, 1);
}
