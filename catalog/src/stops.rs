use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Heading, RouteID, StopID};

/// One row of the stop-definition source: a stop's position within one
/// heading of one route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub route_id: RouteID,
    pub route_name: String,
    pub stop_id: StopID,
    pub heading: Heading,
    /// 1-based position within this heading's ordered stop list
    pub sequence: u32,
    pub is_terminal: bool,
}

/// The ordered stops of one heading, with a set for cheap membership checks.
pub struct HeadingStops {
    pub heading: Heading,
    pub stops: Vec<Stop>,
    ids: BTreeSet<StopID>,
}

impl HeadingStops {
    fn new(heading: Heading, mut stops: Vec<Stop>) -> Result<Self> {
        stops.sort_by_key(|s| s.sequence);
        for (idx, stop) in stops.iter().enumerate() {
            if stop.sequence as usize != idx + 1 {
                bail!(
                    "heading {} has sequence {} at position {}; sequences must be contiguous from 1",
                    heading,
                    stop.sequence,
                    idx + 1
                );
            }
        }
        let ids: BTreeSet<StopID> = stops.iter().map(|s| s.stop_id).collect();
        if ids.len() != stops.len() {
            bail!("heading {} lists some stop twice", heading);
        }
        Ok(Self {
            heading,
            stops,
            ids,
        })
    }

    pub fn contains(&self, stop_id: StopID) -> bool {
        self.ids.contains(&stop_id)
    }
}

/// A route's full stop definition: exactly two headings sharing one terminal
/// stop, where round trips begin/end and drivers change shifts.
pub struct RouteStops {
    pub route_id: RouteID,
    pub route_name: String,
    pub terminal_stop: StopID,
    pub headings: [HeadingStops; 2],
}

impl RouteStops {
    pub fn new(route_id: RouteID, rows: Vec<Stop>) -> Result<Self> {
        if rows.is_empty() {
            bail!("no stops");
        }
        let route_name = rows[0].route_name.clone();
        if let Some(other) = rows.iter().find(|r| r.route_name != route_name) {
            bail!(
                "inconsistent route names {:?} and {:?}",
                route_name,
                other.route_name
            );
        }

        let terminals: Vec<StopID> = rows
            .iter()
            .filter(|r| r.is_terminal)
            .map(|r| r.stop_id)
            .collect();
        if terminals.len() != 1 {
            bail!("expected exactly one terminal stop, found {:?}", terminals);
        }
        let terminal_stop = terminals[0];

        let mut headings: Vec<Heading> = rows.iter().map(|r| r.heading.clone()).collect();
        headings.sort();
        headings.dedup();
        if headings.len() != 2 {
            bail!("expected exactly two headings, found {:?}", headings);
        }

        let split = |heading: &Heading| {
            HeadingStops::new(
                heading.clone(),
                rows.iter()
                    .filter(|r| &r.heading == heading)
                    .cloned()
                    .collect(),
            )
        };
        let first = split(&headings[0])?;
        let second = split(&headings[1])?;

        // Membership must be unambiguous; a stop served in both directions
        // would make heading classification contradictory.
        if let Some(shared) = first.ids.intersection(&second.ids).next() {
            bail!("{:?} appears in both headings", shared);
        }
        if !first.contains(terminal_stop) && !second.contains(terminal_stop) {
            bail!("terminal {:?} is not one of the route's stops", terminal_stop);
        }

        Ok(Self {
            route_id,
            route_name,
            terminal_stop,
            headings: [first, second],
        })
    }

    /// Total stops across both headings; an upper bound on how many distinct
    /// stops a single round trip can visit.
    pub fn total_stops(&self) -> usize {
        self.headings.iter().map(|h| h.stops.len()).sum()
    }

    pub fn heading_of(&self, stop_id: StopID) -> Option<&Heading> {
        self.headings
            .iter()
            .find(|h| h.contains(stop_id))
            .map(|h| &h.heading)
    }
}

pub fn load_stops<R: std::io::Read>(reader: R) -> Result<Vec<Stop>> {
    let mut stops = Vec::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        stops.push(Stop {
            route_id: rec.route_id,
            route_name: rec.route_name,
            stop_id: rec.stop_id,
            heading: rec.heading,
            sequence: rec.sequence,
            is_terminal: parse_flag(&rec.is_terminal)?,
        });
    }
    Ok(stops)
}

// Spreadsheet exports write booleans inconsistently
fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        x => bail!("Unknown boolean value {:?}", x),
    }
}

#[derive(Deserialize)]
struct Record {
    route_id: RouteID,
    route_name: String,
    stop_id: StopID,
    heading: Heading,
    sequence: u32,
    is_terminal: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(route: u32, id: u32, heading: &str, seq: u32, terminal: bool) -> Stop {
        Stop {
            route_id: RouteID(route),
            route_name: "DASH B".to_string(),
            stop_id: StopID(id),
            heading: Heading(heading.to_string()),
            sequence: seq,
            is_terminal: terminal,
        }
    }

    #[test]
    fn builds_a_valid_route() {
        let route = RouteStops::new(
            RouteID(1),
            vec![
                stop(1, 100, "N", 1, true),
                stop(1, 101, "N", 2, false),
                stop(1, 102, "N", 3, false),
                stop(1, 103, "S", 1, false),
                stop(1, 104, "S", 2, false),
            ],
        )
        .unwrap();
        assert_eq!(route.terminal_stop, StopID(100));
        assert_eq!(route.total_stops(), 5);
        assert_eq!(
            route.heading_of(StopID(103)),
            Some(&Heading("S".to_string()))
        );
        assert_eq!(route.heading_of(StopID(999)), None);
    }

    #[test]
    fn rejects_missing_or_duplicate_terminals() {
        let no_terminal = RouteStops::new(
            RouteID(1),
            vec![stop(1, 100, "N", 1, false), stop(1, 101, "S", 1, false)],
        );
        assert!(no_terminal.is_err());

        let two_terminals = RouteStops::new(
            RouteID(1),
            vec![stop(1, 100, "N", 1, true), stop(1, 101, "S", 1, true)],
        );
        assert!(two_terminals.is_err());
    }

    #[test]
    fn rejects_sequence_gaps() {
        let gap = RouteStops::new(
            RouteID(1),
            vec![
                stop(1, 100, "N", 1, true),
                stop(1, 101, "N", 3, false),
                stop(1, 102, "S", 1, false),
            ],
        );
        assert!(gap.is_err());
    }

    #[test]
    fn rejects_overlapping_headings() {
        let shared = RouteStops::new(
            RouteID(1),
            vec![
                stop(1, 100, "N", 1, true),
                stop(1, 101, "N", 2, false),
                stop(1, 101, "S", 1, false),
            ],
        );
        assert!(shared.is_err());
    }

    #[test]
    fn loads_csv_rows() {
        let raw = "route_id,route_name,stop_id,heading,sequence,is_terminal\n\
                   1,DASH B,100,N,1,True\n\
                   1,DASH B,101,N,2,False\n";
        let stops = load_stops(raw.as_bytes()).unwrap();
        assert_eq!(stops.len(), 2);
        assert!(stops[0].is_terminal);
        assert!(!stops[1].is_terminal);
    }

    #[test]
    fn build_drops_invalid_routes() {
        let catalog = crate::Catalog::build(vec![
            stop(1, 100, "N", 1, true),
            stop(1, 101, "S", 1, false),
            // Route 2 has no terminal
            stop(2, 200, "N", 1, false),
            stop(2, 201, "S", 1, false),
        ]);
        assert!(catalog.route(RouteID(1)).is_some());
        assert!(catalog.route(RouteID(2)).is_none());
    }
}
