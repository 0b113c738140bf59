use anyhow::Result;
use chrono::NaiveDateTime;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde::Serialize;

use catalog::{Heading, RouteID};

use crate::{BusNumber, DriverID, Trip, VehicleID, WarningKind};

/// One row of the hotspot product: a single warning tagged with the trip it
/// happened on, for geospatial hotspot analysis.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HotspotRow {
    pub route_name: String,
    pub route_id: RouteID,
    pub heading: Heading,
    pub driver_id: DriverID,
    pub vehicle_id: VehicleID,
    pub bus_number: BusNumber,
    pub loc_time: NaiveDateTime,
    pub warning_name: WarningKind,
    pub latitude: f64,
    pub longitude: f64,
}

/// One row of the longitudinal product: a trip with its warnings rolled up
/// into per-category counts, for trend analysis over time. The serde renames
/// are the exact output column names.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LongitudinalRow {
    pub route_name: String,
    pub route_id: RouteID,
    pub heading: Heading,
    pub driver_id: DriverID,
    pub vehicle_id: VehicleID,
    pub bus_number: BusNumber,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(rename = "ME - Pedestrian Collision Warning")]
    pub pedestrian_collision: u16,
    #[serde(rename = "ME - Pedestrian In Range Warning")]
    pub pedestrian_in_range: u16,
    #[serde(rename = "PCW-LF")]
    pub pcw_left_front: u16,
    #[serde(rename = "PCW-LR")]
    pub pcw_left_rear: u16,
    #[serde(rename = "PCW-RR")]
    pub pcw_right_rear: u16,
    #[serde(rename = "PDZ - Left Front")]
    pub pdz_left_front: u16,
    #[serde(rename = "PDZ-LR")]
    pub pdz_left_rear: u16,
    #[serde(rename = "PDZ-R")]
    pub pdz_right: u16,
    #[serde(rename = "Safety - Braking - Aggressive")]
    pub braking_aggressive: u16,
    #[serde(rename = "Safety - Braking - Dangerous")]
    pub braking_dangerous: u16,
}

impl LongitudinalRow {
    pub fn count(&self, kind: WarningKind) -> u16 {
        match kind {
            WarningKind::PedestrianCollision => self.pedestrian_collision,
            WarningKind::PedestrianInRange => self.pedestrian_in_range,
            WarningKind::PcwLeftFront => self.pcw_left_front,
            WarningKind::PcwLeftRear => self.pcw_left_rear,
            WarningKind::PcwRightRear => self.pcw_right_rear,
            WarningKind::PdzLeftFront => self.pdz_left_front,
            WarningKind::PdzLeftRear => self.pdz_left_rear,
            WarningKind::PdzRight => self.pdz_right,
            WarningKind::BrakingAggressive => self.braking_aggressive,
            WarningKind::BrakingDangerous => self.braking_dangerous,
        }
    }

    pub fn warning_total(&self) -> usize {
        WarningKind::ALL
            .into_iter()
            .map(|kind| self.count(kind) as usize)
            .sum()
    }
}

/// One row per (trip, attached warning) pair; trips without warnings
/// contribute nothing. Pure projection, no I/O.
pub fn hotspot_rows(trips: &[Trip]) -> Vec<HotspotRow> {
    let mut rows = Vec::new();
    for trip in trips {
        for warning in &trip.warnings {
            rows.push(HotspotRow {
                route_name: trip.route_name.clone(),
                route_id: trip.route_id,
                heading: trip.heading.clone(),
                driver_id: trip.driver_id,
                vehicle_id: trip.vehicle_id,
                bus_number: trip.bus_number,
                loc_time: warning.loc_time,
                warning_name: warning.kind,
                latitude: warning.latitude,
                longitude: warning.longitude,
            });
        }
    }
    rows
}

/// One row per trip, whether or not anything went wrong on it. Pure
/// projection, no I/O, independent of hotspot_rows.
pub fn longitudinal_rows(trips: &[Trip]) -> Vec<LongitudinalRow> {
    trips
        .iter()
        .map(|trip| {
            let count = |kind: WarningKind| {
                trip.warnings.iter().filter(|w| w.kind == kind).count() as u16
            };
            LongitudinalRow {
                route_name: trip.route_name.clone(),
                route_id: trip.route_id,
                heading: trip.heading.clone(),
                driver_id: trip.driver_id,
                vehicle_id: trip.vehicle_id,
                bus_number: trip.bus_number,
                start_time: trip.start_time,
                end_time: trip.end_time,
                pedestrian_collision: count(WarningKind::PedestrianCollision),
                pedestrian_in_range: count(WarningKind::PedestrianInRange),
                pcw_left_front: count(WarningKind::PcwLeftFront),
                pcw_left_rear: count(WarningKind::PcwLeftRear),
                pcw_right_rear: count(WarningKind::PcwRightRear),
                pdz_left_front: count(WarningKind::PdzLeftFront),
                pdz_left_rear: count(WarningKind::PdzLeftRear),
                pdz_right: count(WarningKind::PdzRight),
                braking_aggressive: count(WarningKind::BrakingAggressive),
                braking_dangerous: count(WarningKind::BrakingDangerous),
            }
        })
        .collect()
}

/// The hotspot rows as a GeoJSON point collection, for dropping straight
/// into map tooling.
pub fn hotspot_geojson(rows: &[HotspotRow]) -> Result<GeoJson> {
    let mut features = Vec::new();
    for row in rows {
        let mut properties = serde_json::Map::new();
        properties.insert("route_name".to_string(), row.route_name.clone().into());
        properties.insert("heading".to_string(), row.heading.0.clone().into());
        properties.insert("bus_number".to_string(), row.bus_number.0.into());
        properties.insert(
            "warning_name".to_string(),
            row.warning_name.as_str().into(),
        );
        properties.insert("loc_time".to_string(), row.loc_time.to_string().into());
        features.push(Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                row.longitude,
                row.latitude,
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }))
}
