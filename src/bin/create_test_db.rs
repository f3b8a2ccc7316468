use std::path::Path;

use rusqlite::Connection;
use vampire_drain_api::adapters::db::{
    DbError, NewCarRecord, NewChargingProcessRecord, NewDriveRecord, NewPositionRecord,
    NewStateRecord, insert_car, insert_charging_process, insert_drive, insert_position,
    insert_state, open_connection, run_migrations, schema_version,
};

const DEMO_CAR_ID: i64 = 1;
const DEMO_DAYS: u32 = 7;

fn main() {
    if let Err(error) = run() {
        eprintln!("failed to create test db: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut path = "./data/drain_test.db".to_string();
    let mut force = false;
    let mut seed = false;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--path" => {
                let Some(value) = args.get(index + 1) else {
                    return Err("--path requires a value".to_string());
                };
                path = value.clone();
                index += 2;
            }
            "--force" => {
                force = true;
                index += 1;
            }
            "--seed" => {
                seed = true;
                index += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    let path_ref = Path::new(&path);
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create parent directory: {error}"))?;
    }

    if force && path_ref.exists() {
        std::fs::remove_file(path_ref)
            .map_err(|error| format!("failed to remove existing db file: {error}"))?;
    }

    let mut connection = open_connection(&path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;
    let version = schema_version(&connection).map_err(|error| error.to_string())?;

    if seed {
        let transaction = connection
            .transaction()
            .map_err(|error| error.to_string())?;
        seed_demo_car(&transaction).map_err(|error| error.to_string())?;
        transaction.commit().map_err(|error| error.to_string())?;
        println!("seeded demo car {DEMO_CAR_ID} with {DEMO_DAYS} days of activity");
    }

    println!("created/updated test db at: {path}");
    println!("schema version: {version}");
    Ok(())
}

/// One commute per day, parked all day, then charged overnight. The car sleeps
/// for most of each parked stretch.
fn seed_demo_car(connection: &Connection) -> Result<(), DbError> {
    insert_car(
        connection,
        &NewCarRecord {
            id: DEMO_CAR_ID,
            name: Some("Demo Model 3".to_string()),
            efficiency: Some(0.153),
        },
    )?;

    let mut odometer = 12_000.0_f64;
    for day in 1..=DEMO_DAYS {
        let date = format!("2026-03-{day:02}");
        let lost_km = 3.0 + f64::from(day % 3);

        let drive_start = insert_position(
            connection,
            &position(&format!("{date}T07:30:00.000Z"), 90, odometer),
        )?;
        odometer += 24.0;
        let drive_end = insert_position(
            connection,
            &position(&format!("{date}T08:05:00.000Z"), 84, odometer),
        )?;
        insert_drive(
            connection,
            &NewDriveRecord {
                car_id: DEMO_CAR_ID,
                start_position_id: drive_start,
                end_position_id: Some(drive_end),
                start_date: format!("{date}T07:30:00.000Z"),
                end_date: Some(format!("{date}T08:05:00.000Z")),
                start_ideal_range_km: Some(420.0),
                end_ideal_range_km: Some(392.0),
                start_rated_range_km: Some(405.0),
                end_rated_range_km: Some(378.0),
                start_km: odometer - 24.0,
                end_km: Some(odometer),
            },
        )?;

        insert_state(
            connection,
            &NewStateRecord {
                car_id: DEMO_CAR_ID,
                state: "asleep".to_string(),
                start_date: format!("{date}T08:40:00.000Z"),
                end_date: Some(format!("{date}T18:30:00.000Z")),
            },
        )?;

        let charge_position = insert_position(
            connection,
            &position(&format!("{date}T19:00:00.000Z"), 83, odometer),
        )?;
        insert_charging_process(
            connection,
            &NewChargingProcessRecord {
                car_id: DEMO_CAR_ID,
                position_id: charge_position,
                start_date: format!("{date}T19:00:00.000Z"),
                end_date: Some(format!("{date}T22:30:00.000Z")),
                start_ideal_range_km: Some(392.0 - lost_km),
                end_ideal_range_km: Some(430.0),
                start_rated_range_km: Some(378.0 - lost_km),
                end_rated_range_km: Some(415.0),
                start_battery_level: Some(83),
                end_battery_level: Some(90),
            },
        )?;
    }

    Ok(())
}

fn position(date: &str, battery_level: i64, odometer: f64) -> NewPositionRecord {
    NewPositionRecord {
        car_id: DEMO_CAR_ID,
        date: date.to_string(),
        battery_level: Some(battery_level),
        usable_battery_level: Some(battery_level),
        odometer,
    }
}

fn print_help() {
    println!("create_test_db");
    println!();
    println!("Usage:");
    println!("  cargo run --bin create_test_db -- [--path <file>] [--force] [--seed]");
    println!();
    println!("Options:");
    println!("  --path <file>   target sqlite file (default: ./data/drain_test.db)");
    println!("  --force         delete existing file before creating");
    println!("  --seed          insert a demo car with a week of drives, charges and sleep");
}
