#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod assemble;
pub mod assignments;
mod ingest;
mod stats;
pub mod stop_events;
mod store;
mod timetable;
pub mod warnings;

use serde::{Deserialize, Serialize};

pub use self::assemble::{
    attach_warnings, build_trips, hotspot_geojson, hotspot_rows, longitudinal_rows, segment,
    HotspotRow, LongitudinalRow, Trip,
};
pub use self::assignments::Assignment;
pub use self::stats::RunStats;
pub use self::stop_events::StopEvent;
pub use self::store::{IfExists, Store};
pub use self::timetable::Timetable;
pub use self::warnings::{WarningEvent, WarningKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleID(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DriverID(pub u32);

/// The fleet number painted on the bus. The safety system reports this, not
/// the AVL vehicle_id, so warning matching keys on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusNumber(pub u32);

impl std::fmt::Display for BusNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
