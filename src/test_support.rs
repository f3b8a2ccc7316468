use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::adapters::db::{
    NewCarRecord, NewChargingProcessRecord, NewDriveRecord, NewPositionRecord, NewStateRecord,
    insert_car, insert_charging_process, insert_drive, insert_position, insert_state,
    open_connection, run_migrations,
};

static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn utc(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("test timestamp should parse")
        .with_timezone(&Utc)
}

pub fn open_test_connection(test_name: &str) -> Connection {
    let template = ensure_template_db();
    let test_db_path = unique_test_db_path(test_name);

    if let Some(parent) = test_db_path.parent() {
        std::fs::create_dir_all(parent).expect("test db dir should be creatable");
    }

    std::fs::copy(&template, &test_db_path).expect("template db should be copied");
    open_connection(test_db_path.to_string_lossy().as_ref()).expect("test db should open")
}

/// Start/end values of one recorded drive or charge.
pub struct ActivitySample {
    pub start: String,
    pub end: String,
    pub range_km: (f64, f64),
    pub battery_level: (i64, i64),
    pub usable_battery_level: (i64, i64),
    pub odometer_km: (f64, f64),
}

pub fn seed_car(connection: &Connection, car_id: i64, efficiency: Option<f64>) {
    insert_car(
        connection,
        &NewCarRecord {
            id: car_id,
            name: Some(format!("car-{car_id}")),
            efficiency,
        },
    )
    .expect("car insert should succeed");
}

pub fn seed_drive(connection: &Connection, car_id: i64, sample: &ActivitySample) {
    let start_position_id = insert_position(
        connection,
        &NewPositionRecord {
            car_id,
            date: sample.start.clone(),
            battery_level: Some(sample.battery_level.0),
            usable_battery_level: Some(sample.usable_battery_level.0),
            odometer: sample.odometer_km.0,
        },
    )
    .expect("start position insert should succeed");
    let end_position_id = insert_position(
        connection,
        &NewPositionRecord {
            car_id,
            date: sample.end.clone(),
            battery_level: Some(sample.battery_level.1),
            usable_battery_level: Some(sample.usable_battery_level.1),
            odometer: sample.odometer_km.1,
        },
    )
    .expect("end position insert should succeed");

    insert_drive(
        connection,
        &NewDriveRecord {
            car_id,
            start_position_id,
            end_position_id: Some(end_position_id),
            start_date: sample.start.clone(),
            end_date: Some(sample.end.clone()),
            start_ideal_range_km: Some(sample.range_km.0 + 10.0),
            end_ideal_range_km: Some(sample.range_km.1 + 10.0),
            start_rated_range_km: Some(sample.range_km.0),
            end_rated_range_km: Some(sample.range_km.1),
            start_km: sample.odometer_km.0,
            end_km: Some(sample.odometer_km.1),
        },
    )
    .expect("drive insert should succeed");
}

pub fn seed_charge(connection: &Connection, car_id: i64, sample: &ActivitySample) {
    let position_id = insert_position(
        connection,
        &NewPositionRecord {
            car_id,
            date: sample.start.clone(),
            battery_level: Some(sample.battery_level.0),
            usable_battery_level: Some(sample.usable_battery_level.0),
            odometer: sample.odometer_km.0,
        },
    )
    .expect("position insert should succeed");

    insert_charging_process(
        connection,
        &NewChargingProcessRecord {
            car_id,
            position_id,
            start_date: sample.start.clone(),
            end_date: Some(sample.end.clone()),
            start_ideal_range_km: Some(sample.range_km.0 + 10.0),
            end_ideal_range_km: Some(sample.range_km.1 + 10.0),
            start_rated_range_km: Some(sample.range_km.0),
            end_rated_range_km: Some(sample.range_km.1),
            start_battery_level: Some(sample.battery_level.0),
            end_battery_level: Some(sample.battery_level.1),
        },
    )
    .expect("charge insert should succeed");
}

pub fn seed_state(connection: &Connection, car_id: i64, state: &str, start: &str, end: &str) {
    insert_state(
        connection,
        &NewStateRecord {
            car_id,
            state: state.to_string(),
            start_date: start.to_string(),
            end_date: Some(end.to_string()),
        },
    )
    .expect("state insert should succeed");
}

fn ensure_template_db() -> PathBuf {
    static TEMPLATE_PATH: OnceLock<PathBuf> = OnceLock::new();

    TEMPLATE_PATH
        .get_or_init(|| {
            let template_path = std::env::var("TEST_DB_TEMPLATE_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_template_path);

            if let Some(parent) = template_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).expect("template parent dir should be creatable");
            }

            let mut connection = open_connection(template_path.to_string_lossy().as_ref())
                .expect("template db opens");
            run_migrations(&mut connection).expect("template migrations should succeed");

            template_path
        })
        .clone()
}

fn default_template_path() -> PathBuf {
    Path::new("./target/testdb/drain_template.db").to_path_buf()
}

fn unique_test_db_path(test_name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let counter = TEST_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    Path::new("./target/testdb")
        .join(format!("{test_name}-{now}-{counter}.sqlite"))
        .to_path_buf()
}
