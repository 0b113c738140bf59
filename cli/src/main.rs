#[macro_use]
extern crate log;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use structopt::StructOpt;

use catalog::Catalog;
use model::{
    assignments, attach_warnings, build_trips, hotspot_geojson, hotspot_rows, longitudinal_rows,
    stop_events, warnings, IfExists, RunStats, Store, WarningEvent,
};

#[derive(StructOpt)]
#[structopt(name = "safety-data")]
struct Args {
    /// The SQLite database holding source and product tables
    #[structopt(long, default_value = "ituran_synchromatics_data.sqlite")]
    db: PathBuf,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Load the per-route stop definition CSVs into the route_stop table
    ImportRouteStops {
        #[structopt(long, default_value = "route_stops")]
        data_dir: PathBuf,
    },
    /// Walk a directory tree of monthly AVL exports and load every stop-event
    /// file into the stop_time table
    ImportStopEvents {
        #[structopt(long, default_value = "data_sources")]
        data_dir: PathBuf,
    },
    /// Walk a directory tree of driver schedule exports and load every
    /// assignment file into the vehicle_assignment table
    ImportAssignments {
        #[structopt(long, default_value = "data_sources")]
        data_dir: PathBuf,
    },
    /// Load safety-system warning exports into the warning table
    ImportWarnings {
        #[structopt(long, default_value = "warnings")]
        data_dir: PathBuf,
        /// "append" accumulates across invocations, "replace" starts over
        #[structopt(long, default_value = "append")]
        if_exists: IfExists,
    },
    /// Reconstruct trips, assign warnings, and write both product tables
    BuildProducts {
        #[structopt(long, default_value = "hotspot_data_product")]
        hotspot_table: String,
        #[structopt(long, default_value = "longitudinal_data_product")]
        longitudinal_table: String,
        /// Also write warnings that matched no trip to this CSV for inspection
        #[structopt(long)]
        unassigned_csv: Option<PathBuf>,
        /// Also write the hotspot rows as a GeoJSON point collection
        #[structopt(long)]
        hotspot_geojson: Option<PathBuf>,
    },
    /// Print row counts for every table in the database
    Summarize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::from_args();
    let mut stats = RunStats::new();

    match args.cmd {
        Command::ImportRouteStops { data_dir } => {
            let rows = Catalog::load_dir(&data_dir)?;
            // Validate now so bad definitions surface at import time, not
            // during the product build
            let catalog = Catalog::build(rows.clone());
            info!(
                "{} routes validated from {} stop rows",
                catalog.routes.len(),
                rows.len()
            );
            let mut store = Store::open(&args.db)?;
            store.write_route_stops(&rows, IfExists::Replace)?;
        }
        Command::ImportStopEvents { data_dir } => {
            let events = stop_events::load_dir(&data_dir, &mut stats)?;
            info!("{} stop events after dedup", events.len());
            let mut store = Store::open(&args.db)?;
            store.write_stop_events(&events, IfExists::Replace)?;
            info!("{}", stats);
        }
        Command::ImportAssignments { data_dir } => {
            let assignments = assignments::load_dir(&data_dir, &mut stats)?;
            info!("{} assignments after cleaning", assignments.len());
            let mut store = Store::open(&args.db)?;
            store.write_assignments(&assignments, IfExists::Replace)?;
            info!("{}", stats);
        }
        Command::ImportWarnings { data_dir, if_exists } => {
            let warnings = warnings::load_dir(&data_dir, &mut stats)?;
            info!("{} warnings after cleaning", warnings.len());
            let mut store = Store::open(&args.db)?;
            store.write_warnings(&warnings, if_exists)?;
            info!("{}", stats);
        }
        Command::BuildProducts {
            hotspot_table,
            longitudinal_table,
            unassigned_csv,
            hotspot_geojson: geojson_path,
        } => {
            let mut store = Store::open(&args.db)?;
            let catalog = Catalog::build(store.read_route_stops()?);
            let events = store.read_stop_events()?;
            let assignments = store.read_assignments()?;
            let warnings = store.read_warnings()?;
            info!(
                "Loaded {} routes, {} stop events, {} assignments, {} warnings",
                catalog.routes.len(),
                events.len(),
                assignments.len(),
                warnings.len()
            );

            let mut trips = build_trips(&catalog, &events, &assignments, &mut stats);
            let unassigned = attach_warnings(&mut trips, &warnings, &mut stats);

            let hotspot = hotspot_rows(&trips);
            let longitudinal = longitudinal_rows(&trips);
            store.write_hotspot_product(&hotspot, &hotspot_table)?;
            store.write_longitudinal_product(&longitudinal, &longitudinal_table)?;
            info!(
                "Wrote {} hotspot rows and {} longitudinal rows",
                hotspot.len(),
                longitudinal.len()
            );

            if let Some(path) = unassigned_csv {
                write_unassigned_csv(&path, &unassigned)?;
                info!("Wrote {} unassigned warnings to {}", unassigned.len(), path.display());
            }
            if let Some(path) = geojson_path {
                let geojson = hotspot_geojson(&hotspot)?;
                fs_err::write(&path, serde_json::to_string_pretty(&geojson)?)?;
                info!("Wrote hotspot GeoJSON to {}", path.display());
            }
            info!("{}", stats);
        }
        Command::Summarize => {
            let store = Store::open(&args.db)?;
            for (table, count) in store.table_counts()? {
                println!("{}: {} rows", table, count);
            }
        }
    }
    Ok(())
}

fn write_unassigned_csv(path: &Path, unassigned: &[WarningEvent]) -> Result<()> {
    let mut out = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut out);
        for warning in unassigned {
            writer.serialize(warning)?;
        }
        writer.flush()?;
    }
    fs_err::File::create(path)?.write_all(&out)?;
    Ok(())
}
