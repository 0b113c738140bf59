use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use catalog::{Heading, RouteID, Stop, StopID};

use crate::{
    Assignment, BusNumber, DriverID, HotspotRow, LongitudinalRow, StopEvent, VehicleID,
    WarningEvent, WarningKind,
};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Poor performance has been observed when adding more than one million
// records in a single transaction
const INSERT_CHUNK_SIZE: usize = 1_000_000;

/// What to do when an import targets a table that already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IfExists {
    Replace,
    Append,
}

impl std::str::FromStr for IfExists {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "replace" => Ok(IfExists::Replace),
            "append" => Ok(IfExists::Append),
            x => bail!("Unknown if-exists policy {:?}; use replace or append", x),
        }
    }
}

/// The SQLite database holding the four source tables and the two products.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn write_route_stops(&mut self, stops: &[Stop], if_exists: IfExists) -> Result<()> {
        self.prepare_table(
            "route_stop",
            "CREATE TABLE route_stop (
                route_id INTEGER NOT NULL,
                route_name TEXT NOT NULL,
                stop_id INTEGER NOT NULL,
                heading TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                is_terminal INTEGER NOT NULL
            )",
            if_exists,
        )?;
        for chunk in stops.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO route_stop VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for stop in chunk {
                    stmt.execute(params![
                        stop.route_id.0,
                        stop.route_name,
                        stop.stop_id.0,
                        stop.heading.0,
                        stop.sequence,
                        stop.is_terminal as i64,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    pub fn read_route_stops(&self) -> Result<Vec<Stop>> {
        let mut stmt = self.conn.prepare(
            "SELECT route_id, route_name, stop_id, heading, sequence, is_terminal
             FROM route_stop ORDER BY route_id, heading, sequence",
        )?;
        let mut stops = Vec::new();
        for row in stmt.query_map([], |row| {
            Ok(Stop {
                route_id: RouteID(row.get(0)?),
                route_name: row.get(1)?,
                stop_id: StopID(row.get(2)?),
                heading: Heading(row.get(3)?),
                sequence: row.get(4)?,
                is_terminal: row.get::<_, i64>(5)? != 0,
            })
        })? {
            stops.push(row?);
        }
        Ok(stops)
    }

    pub fn write_stop_events(&mut self, events: &[StopEvent], if_exists: IfExists) -> Result<()> {
        self.prepare_table(
            "stop_time",
            "CREATE TABLE stop_time (
                route_id INTEGER NOT NULL,
                vehicle_id INTEGER NOT NULL,
                stop_id INTEGER,
                arrived_at TEXT NOT NULL,
                departed_at TEXT NOT NULL,
                latitude REAL,
                longitude REAL
            )",
            if_exists,
        )?;
        for chunk in events.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO stop_time VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for ev in chunk {
                    stmt.execute(params![
                        ev.route_id.0,
                        ev.vehicle_id.0,
                        ev.stop_id.map(|id| id.0),
                        ts(ev.arrived_at),
                        ts(ev.departed_at),
                        ev.latitude,
                        ev.longitude,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Returns stop events sorted the way segmentation expects. The text
    /// timestamp format sorts chronologically.
    pub fn read_stop_events(&self) -> Result<Vec<StopEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT route_id, vehicle_id, stop_id, arrived_at, departed_at, latitude, longitude
             FROM stop_time ORDER BY route_id, vehicle_id, arrived_at, departed_at",
        )?;
        let mut raw = Vec::new();
        for row in stmt.query_map([], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, Option<u32>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
            ))
        })? {
            raw.push(row?);
        }

        let mut events = Vec::new();
        for (route_id, vehicle_id, stop_id, arrived_at, departed_at, latitude, longitude) in raw {
            events.push(StopEvent {
                route_id: RouteID(route_id),
                vehicle_id: VehicleID(vehicle_id),
                stop_id: stop_id.map(StopID),
                arrived_at: parse_ts(&arrived_at)?,
                departed_at: parse_ts(&departed_at)?,
                latitude,
                longitude,
            });
        }
        Ok(events)
    }

    pub fn write_assignments(
        &mut self,
        assignments: &[Assignment],
        if_exists: IfExists,
    ) -> Result<()> {
        self.prepare_table(
            "vehicle_assignment",
            "CREATE TABLE vehicle_assignment (
                vehicle_assignment_id INTEGER NOT NULL,
                vehicle_id INTEGER NOT NULL,
                route_id INTEGER NOT NULL,
                driver_id INTEGER NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                bus_number INTEGER NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                badge_number TEXT NOT NULL
            )",
            if_exists,
        )?;
        for chunk in assignments.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO vehicle_assignment VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )?;
                for a in chunk {
                    stmt.execute(params![
                        a.vehicle_assignment_id,
                        a.vehicle_id.0,
                        a.route_id.0,
                        a.driver_id.0,
                        ts(a.start_time),
                        ts(a.end_time),
                        a.bus_number.0,
                        a.first_name,
                        a.last_name,
                        a.badge_number,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    pub fn read_assignments(&self) -> Result<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT vehicle_assignment_id, vehicle_id, route_id, driver_id, start_time,
                    end_time, bus_number, first_name, last_name, badge_number
             FROM vehicle_assignment ORDER BY start_time, end_time",
        )?;
        let mut raw = Vec::new();
        for row in stmt.query_map([], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, u32>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })? {
            raw.push(row?);
        }

        let mut assignments = Vec::new();
        for (id, vehicle, route, driver, start, end, bus, first, last, badge) in raw {
            assignments.push(Assignment {
                vehicle_assignment_id: id,
                vehicle_id: VehicleID(vehicle),
                route_id: RouteID(route),
                driver_id: DriverID(driver),
                start_time: parse_ts(&start)?,
                end_time: parse_ts(&end)?,
                bus_number: BusNumber(bus),
                first_name: first,
                last_name: last,
                badge_number: badge,
            });
        }
        Ok(assignments)
    }

    pub fn write_warnings(&mut self, warnings: &[WarningEvent], if_exists: IfExists) -> Result<()> {
        self.prepare_table(
            "warning",
            "CREATE TABLE warning (
                loc_time TEXT NOT NULL,
                bus_number INTEGER NOT NULL,
                address TEXT NOT NULL,
                warning_name TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL
            )",
            if_exists,
        )?;
        for chunk in warnings.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO warning VALUES (?1, ?2, ?3, ?4, ?5, ?6)")?;
                for w in chunk {
                    stmt.execute(params![
                        ts(w.loc_time),
                        w.bus_number.0,
                        w.address,
                        w.kind.as_str(),
                        w.latitude,
                        w.longitude,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    pub fn read_warnings(&self) -> Result<Vec<WarningEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT loc_time, bus_number, address, warning_name, latitude, longitude
             FROM warning ORDER BY loc_time, bus_number",
        )?;
        let mut raw = Vec::new();
        for row in stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })? {
            raw.push(row?);
        }

        let mut warnings = Vec::new();
        for (loc_time, bus, address, name, latitude, longitude) in raw {
            let kind = WarningKind::parse(&name)
                .ok_or_else(|| anyhow!("warning table has unknown category {:?}", name))?;
            warnings.push(WarningEvent {
                bus_number: BusNumber(bus),
                loc_time: parse_ts(&loc_time)?,
                kind,
                address,
                latitude,
                longitude,
            });
        }
        Ok(warnings)
    }

    /// Products are always rebuilt whole, so this is a full-table replace.
    pub fn write_hotspot_product(&mut self, rows: &[HotspotRow], table: &str) -> Result<()> {
        self.prepare_table(
            table,
            &format!(
                "CREATE TABLE \"{}\" (
                    route_name TEXT NOT NULL,
                    route_id INTEGER NOT NULL,
                    heading TEXT NOT NULL,
                    driver_id INTEGER NOT NULL,
                    vehicle_id INTEGER NOT NULL,
                    bus_number INTEGER NOT NULL,
                    loc_time TEXT NOT NULL,
                    warning_name TEXT NOT NULL,
                    latitude REAL NOT NULL,
                    longitude REAL NOT NULL
                )",
                table
            ),
            IfExists::Replace,
        )?;
        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO \"{}\" VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    table
                ))?;
                for row in chunk {
                    stmt.execute(params![
                        row.route_name,
                        row.route_id.0,
                        row.heading.0,
                        row.driver_id.0,
                        row.vehicle_id.0,
                        row.bus_number.0,
                        ts(row.loc_time),
                        row.warning_name.as_str(),
                        row.latitude,
                        row.longitude,
                    ])?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    pub fn write_longitudinal_product(
        &mut self,
        rows: &[LongitudinalRow],
        table: &str,
    ) -> Result<()> {
        let category_columns: Vec<String> = WarningKind::ALL
            .into_iter()
            .map(|kind| format!("\"{}\" INTEGER NOT NULL", kind.as_str()))
            .collect();
        self.prepare_table(
            table,
            &format!(
                "CREATE TABLE \"{}\" (
                    route_name TEXT NOT NULL,
                    route_id INTEGER NOT NULL,
                    heading TEXT NOT NULL,
                    driver_id INTEGER NOT NULL,
                    vehicle_id INTEGER NOT NULL,
                    bus_number INTEGER NOT NULL,
                    start_time TEXT NOT NULL,
                    end_time TEXT NOT NULL,
                    {}
                )",
                table,
                category_columns.join(",\n                    ")
            ),
            IfExists::Replace,
        )?;
        let placeholders: Vec<String> = (1..=8 + WarningKind::ALL.len())
            .map(|i| format!("?{}", i))
            .collect();
        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO \"{}\" VALUES ({})",
                    table,
                    placeholders.join(", ")
                ))?;
                for row in chunk {
                    let mut values: Vec<rusqlite::types::Value> = vec![
                        row.route_name.clone().into(),
                        (row.route_id.0 as i64).into(),
                        row.heading.0.clone().into(),
                        (row.driver_id.0 as i64).into(),
                        (row.vehicle_id.0 as i64).into(),
                        (row.bus_number.0 as i64).into(),
                        ts(row.start_time).into(),
                        ts(row.end_time).into(),
                    ];
                    for kind in WarningKind::ALL {
                        values.push((row.count(kind) as i64).into());
                    }
                    stmt.execute(rusqlite::params_from_iter(values))?;
                }
            }
            tx.commit()?;
        }
        Ok(())
    }

    /// Row counts for every table, for the summary command.
    pub fn table_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let mut names = Vec::new();
        for row in stmt.query_map([], |row| row.get::<_, String>(0))? {
            names.push(row?);
        }

        let mut counts = Vec::new();
        for name in names {
            let count: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", name), [], |row| {
                    row.get(0)
                })?;
            counts.push((name, count));
        }
        Ok(counts)
    }

    fn prepare_table(&self, table: &str, create: &str, if_exists: IfExists) -> Result<()> {
        match if_exists {
            IfExists::Replace => {
                self.conn
                    .execute(&format!("DROP TABLE IF EXISTS \"{}\"", table), [])?;
                self.conn.execute(create, [])?;
            }
            IfExists::Append => {
                let exists: bool = self.conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get::<_, i64>(0).map(|n| n > 0),
                )?;
                if !exists {
                    self.conn.execute(create, [])?;
                }
            }
        }
        Ok(())
    }
}

fn ts(t: NaiveDateTime) -> String {
    t.format(DATETIME_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|err| anyhow!("Bad stored timestamp {:?}: {}", raw, err))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 10, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn round_trips_stop_events() {
        let mut store = Store::open_in_memory().unwrap();
        let events = vec![StopEvent {
            route_id: RouteID(7),
            vehicle_id: VehicleID(324),
            stop_id: Some(StopID(100)),
            arrived_at: at(8, 0),
            departed_at: at(8, 2),
            latitude: Some(34.05),
            longitude: None,
        }];
        store.write_stop_events(&events, IfExists::Replace).unwrap();
        assert_eq!(store.read_stop_events().unwrap(), events);
    }

    #[test]
    fn round_trips_warnings() {
        let mut store = Store::open_in_memory().unwrap();
        let warnings = vec![WarningEvent {
            bus_number: BusNumber(15301),
            loc_time: at(8, 10),
            kind: WarningKind::PdzLeftRear,
            address: "Main St".to_string(),
            latitude: 34.05,
            longitude: -118.25,
        }];
        store.write_warnings(&warnings, IfExists::Replace).unwrap();
        assert_eq!(store.read_warnings().unwrap(), warnings);
    }

    #[test]
    fn append_accumulates_and_replace_starts_over() {
        let mut store = Store::open_in_memory().unwrap();
        let warning = WarningEvent {
            bus_number: BusNumber(15301),
            loc_time: at(8, 10),
            kind: WarningKind::PcwRightRear,
            address: "Main St".to_string(),
            latitude: 34.05,
            longitude: -118.25,
        };
        store
            .write_warnings(std::slice::from_ref(&warning), IfExists::Append)
            .unwrap();
        store
            .write_warnings(std::slice::from_ref(&warning), IfExists::Append)
            .unwrap();
        assert_eq!(store.read_warnings().unwrap().len(), 2);

        store
            .write_warnings(std::slice::from_ref(&warning), IfExists::Replace)
            .unwrap();
        assert_eq!(store.read_warnings().unwrap().len(), 1);
    }

    #[test]
    fn counts_every_table() {
        let mut store = Store::open_in_memory().unwrap();
        store.write_stop_events(&[], IfExists::Replace).unwrap();
        store.write_warnings(&[], IfExists::Replace).unwrap();
        let counts = store.table_counts().unwrap();
        assert_eq!(
            counts,
            vec![("stop_time".to_string(), 0), ("warning".to_string(), 0)]
        );
    }
}
