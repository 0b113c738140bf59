use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ingest, BusNumber, RunStats};

/// Records where the telematics unit lost fix report this prefix in the
/// address field; their coordinates describe somewhere the bus used to be.
const STALE_POSITION_MARKER: &str = "Last known:";

/// Some export revisions append ` - StatusTimeOpen: ...` to the name.
const STATUS_TIME_SUFFIX: &str = " - StatusTimeOpen:";

/// The closed set of alert categories the safety system emits. The variant
/// order here fixes the column order of the longitudinal product.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningKind {
    PedestrianCollision,
    PedestrianInRange,
    PcwLeftFront,
    PcwLeftRear,
    PcwRightRear,
    PdzLeftFront,
    PdzLeftRear,
    PdzRight,
    BrakingAggressive,
    BrakingDangerous,
}

impl WarningKind {
    pub const ALL: [WarningKind; 10] = [
        WarningKind::PedestrianCollision,
        WarningKind::PedestrianInRange,
        WarningKind::PcwLeftFront,
        WarningKind::PcwLeftRear,
        WarningKind::PcwRightRear,
        WarningKind::PdzLeftFront,
        WarningKind::PdzLeftRear,
        WarningKind::PdzRight,
        WarningKind::BrakingAggressive,
        WarningKind::BrakingDangerous,
    ];

    /// The exact source string, also used as a product column name.
    pub fn as_str(self) -> &'static str {
        match self {
            WarningKind::PedestrianCollision => "ME - Pedestrian Collision Warning",
            WarningKind::PedestrianInRange => "ME - Pedestrian In Range Warning",
            WarningKind::PcwLeftFront => "PCW-LF",
            WarningKind::PcwLeftRear => "PCW-LR",
            WarningKind::PcwRightRear => "PCW-RR",
            WarningKind::PdzLeftFront => "PDZ - Left Front",
            WarningKind::PdzLeftRear => "PDZ-LR",
            WarningKind::PdzRight => "PDZ-R",
            WarningKind::BrakingAggressive => "Safety - Braking - Aggressive",
            WarningKind::BrakingDangerous => "Safety - Braking - Dangerous",
        }
    }

    pub fn parse(raw: &str) -> Option<WarningKind> {
        // Strip the StatusTimeOpen suffix first; the prefix is the real name
        let name = match raw.find(STATUS_TIME_SUFFIX) {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        WarningKind::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for WarningKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WarningKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        WarningKind::parse(&raw)
            .ok_or_else(|| D::Error::custom(format!("unknown warning name {:?}", raw)))
    }
}

/// One safety-system alert. Immutable once ingested; trips receive copies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WarningEvent {
    pub bus_number: BusNumber,
    pub loc_time: NaiveDateTime,
    pub kind: WarningKind,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Parses one warning export. Rows that fail the schema (unknown category,
/// stale position, unparseable vehicle name or coordinates) are quarantined,
/// not guessed at.
pub fn load<R: std::io::Read>(reader: R, stats: &mut RunStats) -> Result<Vec<WarningEvent>> {
    let mut warnings = Vec::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if rec.address.contains(STALE_POSITION_MARKER) {
            stats.rows_quarantined += 1;
            continue;
        }
        let kind = match rec.warning_name.as_deref().and_then(WarningKind::parse) {
            Some(kind) => kind,
            None => {
                stats.rows_quarantined += 1;
                continue;
            }
        };
        let loc_time = match rec.loc_time.as_deref().map(ingest::parse_seconds) {
            Some(Ok(t)) => t,
            _ => {
                stats.rows_quarantined += 1;
                continue;
            }
        };
        let bus_number = match bus_number_from_vehicle_name(&rec.vehicle_name) {
            Some(n) => n,
            None => {
                debug!("Quarantining warning with vehicle name {:?}", rec.vehicle_name);
                stats.rows_quarantined += 1;
                continue;
            }
        };
        let (latitude, longitude) = match (rec.latitude, rec.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                stats.rows_quarantined += 1;
                continue;
            }
        };
        warnings.push(WarningEvent {
            bus_number,
            loc_time,
            kind,
            address: rec.address,
            latitude,
            longitude,
        });
    }
    Ok(warnings)
}

/// Concatenates every file directly under `dir` (the warnings directory only
/// holds warning exports), then deduplicates and sorts.
pub fn load_dir(dir: &Path, stats: &mut RunStats) -> Result<Vec<WarningEvent>> {
    let mut warnings = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match fs_err::File::open(&path)
            .map_err(anyhow::Error::from)
            .and_then(|f| load(f, stats))
        {
            Ok(mut batch) => {
                info!("Read {} warnings from {}", batch.len(), path.display());
                warnings.append(&mut batch);
            }
            Err(err) => {
                error!("Skipping {}: {}", path.display(), err);
                stats.files_skipped += 1;
            }
        }
    }
    dedupe_and_sort(&mut warnings);
    Ok(warnings)
}

pub fn dedupe_and_sort(warnings: &mut Vec<WarningEvent>) {
    warnings.sort_by_key(|w| (w.loc_time, w.bus_number, w.kind));
    warnings.dedup_by(|a, b| a == b);
}

/// The export's vehicle name is free text like "Bus 15301"; the trailing
/// integer is the fleet number.
fn bus_number_from_vehicle_name(name: &str) -> Option<BusNumber> {
    name.split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .map(BusNumber)
}

#[derive(Deserialize)]
struct Record {
    #[serde(default)]
    loc_time: Option<String>,
    #[serde(alias = "bus_number")]
    vehicle_name: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    warning_name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}
