use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use crate::domain::models::{
    ChargeEvent, DrainSettings, DriveEvent, PreferredRange, RangeReading, StateInterval,
    TimeWindow, UnitOfLength, Vehicle, VehicleState,
};

pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    r#"
CREATE TABLE IF NOT EXISTS cars (
    id INTEGER PRIMARY KEY,
    name TEXT,
    efficiency REAL
);

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    unit_of_length TEXT NOT NULL DEFAULT 'km',
    preferred_range TEXT NOT NULL DEFAULT 'rated'
);

CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    car_id INTEGER NOT NULL REFERENCES cars (id),
    date TEXT NOT NULL,
    battery_level INTEGER,
    usable_battery_level INTEGER,
    odometer REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS charging_processes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    car_id INTEGER NOT NULL REFERENCES cars (id),
    position_id INTEGER NOT NULL REFERENCES positions (id),
    start_date TEXT NOT NULL,
    end_date TEXT,
    start_ideal_range_km REAL,
    end_ideal_range_km REAL,
    start_rated_range_km REAL,
    end_rated_range_km REAL,
    start_battery_level INTEGER,
    end_battery_level INTEGER
);

CREATE TABLE IF NOT EXISTS drives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    car_id INTEGER NOT NULL REFERENCES cars (id),
    start_position_id INTEGER NOT NULL REFERENCES positions (id),
    end_position_id INTEGER REFERENCES positions (id),
    start_date TEXT NOT NULL,
    end_date TEXT,
    start_ideal_range_km REAL,
    end_ideal_range_km REAL,
    start_rated_range_km REAL,
    end_rated_range_km REAL,
    start_km REAL NOT NULL,
    end_km REAL
);

CREATE TABLE IF NOT EXISTS states (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    car_id INTEGER NOT NULL REFERENCES cars (id),
    state TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT
);

CREATE INDEX IF NOT EXISTS idx_charging_processes_car_start
ON charging_processes (car_id, start_date);

CREATE INDEX IF NOT EXISTS idx_drives_car_start
ON drives (car_id, start_date);

CREATE INDEX IF NOT EXISTS idx_states_car_state_start
ON states (car_id, state, start_date);
"#,
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {current}; latest supported is {latest}")]
    UnsupportedSchemaVersion { current: u32, latest: u32 },
    #[error("invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },
    #[error("invalid value for setting {name}: {value}")]
    UnknownSetting { name: &'static str, value: String },
}

pub fn open_connection(path: &str) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::from)
}

pub fn run_migrations(connection: &mut Connection) -> Result<(), DbError> {
    let current_version = schema_version(connection)?;

    if current_version > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            current: current_version,
            latest: LATEST_SCHEMA_VERSION,
        });
    }

    let transaction = connection.transaction()?;

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            transaction.execute_batch(sql)?;
            transaction.pragma_update(None, "user_version", version)?;
        }
    }

    transaction.commit()?;

    Ok(())
}

pub fn schema_version(connection: &Connection) -> Result<u32, DbError> {
    let version = connection.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Timestamps are stored as RFC 3339 UTC text with millisecond precision, which
/// keeps lexical and chronological order identical.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: &'static str, value: String) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| DbError::InvalidTimestamp { column, value })
}

fn window_bounds(window: &TimeWindow) -> (Option<String>, Option<String>) {
    (
        window.from.map(format_timestamp),
        window.to.map(format_timestamp),
    )
}

pub fn find_vehicle(connection: &Connection, car_id: i64) -> Result<Option<Vehicle>, DbError> {
    let vehicle = connection
        .query_row(
            "SELECT id, name, efficiency FROM cars WHERE id = ?1",
            params![car_id],
            |row| {
                Ok(Vehicle {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    efficiency: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(vehicle)
}

pub fn load_settings(connection: &Connection) -> Result<DrainSettings, DbError> {
    let raw: Option<(String, String)> = connection
        .query_row(
            "SELECT unit_of_length, preferred_range FROM settings WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((unit_of_length, preferred_range)) = raw else {
        return Ok(DrainSettings::default());
    };

    Ok(DrainSettings {
        unit_of_length: UnitOfLength::parse(&unit_of_length).ok_or_else(|| {
            DbError::UnknownSetting {
                name: "unit_of_length",
                value: unit_of_length.clone(),
            }
        })?,
        preferred_range: PreferredRange::parse(&preferred_range).ok_or_else(|| {
            DbError::UnknownSetting {
                name: "preferred_range",
                value: preferred_range.clone(),
            }
        })?,
    })
}

struct RawCharge {
    start_date: String,
    end_date: String,
    start_range: RangeReading,
    end_range: RangeReading,
    start_battery_level: Option<i64>,
    end_battery_level: Option<i64>,
    start_usable_battery_level: Option<i64>,
    odometer_km: f64,
}

/// Completed charging sessions whose start falls inside `window`, in store order.
pub fn list_charge_events(
    connection: &Connection,
    car_id: i64,
    window: &TimeWindow,
) -> Result<Vec<ChargeEvent>, DbError> {
    let (from, to) = window_bounds(window);
    let mut statement = connection.prepare(
        "SELECT c.start_date, c.end_date,
                c.start_ideal_range_km, c.end_ideal_range_km,
                c.start_rated_range_km, c.end_rated_range_km,
                c.start_battery_level, c.end_battery_level,
                p.usable_battery_level, p.odometer
         FROM charging_processes c
         JOIN positions p ON c.position_id = p.id
         WHERE c.car_id = ?1
           AND c.end_date IS NOT NULL
           AND (?2 IS NULL OR c.start_date >= ?2)
           AND (?3 IS NULL OR c.start_date <= ?3)
         ORDER BY c.start_date ASC, c.id ASC",
    )?;

    let rows = statement.query_map(params![car_id, from, to], |row| {
        Ok(RawCharge {
            start_date: row.get(0)?,
            end_date: row.get(1)?,
            start_range: RangeReading {
                ideal_km: row.get(2)?,
                rated_km: row.get(4)?,
            },
            end_range: RangeReading {
                ideal_km: row.get(3)?,
                rated_km: row.get(5)?,
            },
            start_battery_level: row.get(6)?,
            end_battery_level: row.get(7)?,
            start_usable_battery_level: row.get(8)?,
            odometer_km: row.get(9)?,
        })
    })?;

    let mut charges = Vec::new();
    for row in rows {
        let raw = row?;
        charges.push(ChargeEvent {
            start_date: parse_timestamp("charging_processes.start_date", raw.start_date)?,
            end_date: parse_timestamp("charging_processes.end_date", raw.end_date)?,
            start_range: raw.start_range,
            end_range: raw.end_range,
            start_battery_level: raw.start_battery_level,
            end_battery_level: raw.end_battery_level,
            start_usable_battery_level: raw.start_usable_battery_level,
            odometer_km: raw.odometer_km,
        });
    }

    Ok(charges)
}

struct RawDrive {
    start_date: String,
    end_date: String,
    start_range: RangeReading,
    end_range: RangeReading,
    start_battery_level: Option<i64>,
    end_battery_level: Option<i64>,
    start_usable_battery_level: Option<i64>,
    end_usable_battery_level: Option<i64>,
    start_km: f64,
    end_km: f64,
}

fn read_drive_row(row: &Row<'_>) -> rusqlite::Result<RawDrive> {
    Ok(RawDrive {
        start_date: row.get(0)?,
        end_date: row.get(1)?,
        start_range: RangeReading {
            ideal_km: row.get(2)?,
            rated_km: row.get(4)?,
        },
        end_range: RangeReading {
            ideal_km: row.get(3)?,
            rated_km: row.get(5)?,
        },
        start_battery_level: row.get(6)?,
        end_battery_level: row.get(7)?,
        start_usable_battery_level: row.get(8)?,
        end_usable_battery_level: row.get(9)?,
        start_km: row.get(10)?,
        end_km: row.get(11)?,
    })
}

/// Completed drives whose start falls inside `window`, in store order.
pub fn list_drive_events(
    connection: &Connection,
    car_id: i64,
    window: &TimeWindow,
) -> Result<Vec<DriveEvent>, DbError> {
    let (from, to) = window_bounds(window);
    let mut statement = connection.prepare(
        "SELECT d.start_date, d.end_date,
                d.start_ideal_range_km, d.end_ideal_range_km,
                d.start_rated_range_km, d.end_rated_range_km,
                sp.battery_level, ep.battery_level,
                sp.usable_battery_level, ep.usable_battery_level,
                d.start_km, d.end_km
         FROM drives d
         JOIN positions sp ON d.start_position_id = sp.id
         JOIN positions ep ON d.end_position_id = ep.id
         WHERE d.car_id = ?1
           AND d.end_date IS NOT NULL
           AND d.end_km IS NOT NULL
           AND (?2 IS NULL OR d.start_date >= ?2)
           AND (?3 IS NULL OR d.start_date <= ?3)
         ORDER BY d.start_date ASC, d.id ASC",
    )?;

    let rows = statement.query_map(params![car_id, from, to], read_drive_row)?;

    let mut drives = Vec::new();
    for row in rows {
        let raw = row?;
        drives.push(DriveEvent {
            start_date: parse_timestamp("drives.start_date", raw.start_date)?,
            end_date: parse_timestamp("drives.end_date", raw.end_date)?,
            start_range: raw.start_range,
            end_range: raw.end_range,
            start_battery_level: raw.start_battery_level,
            end_battery_level: raw.end_battery_level,
            start_usable_battery_level: raw.start_usable_battery_level,
            end_usable_battery_level: raw.end_usable_battery_level,
            start_km: raw.start_km,
            end_km: raw.end_km,
        });
    }

    Ok(drives)
}

/// Closed asleep/offline states that lie entirely inside `window`, ordered by start.
pub fn list_standby_states(
    connection: &Connection,
    car_id: i64,
    window: &TimeWindow,
) -> Result<Vec<StateInterval>, DbError> {
    let (from, to) = window_bounds(window);
    let mut statement = connection.prepare(
        "SELECT state, start_date, end_date
         FROM states
         WHERE car_id = ?1
           AND state IN ('asleep', 'offline')
           AND end_date IS NOT NULL
           AND (?2 IS NULL OR start_date >= ?2)
           AND (?3 IS NULL OR end_date <= ?3)
         ORDER BY start_date ASC, id ASC",
    )?;

    let rows = statement.query_map(params![car_id, from, to], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut states = Vec::new();
    for row in rows {
        let (state, start_date, end_date) = row?;
        states.push(StateInterval {
            state: VehicleState::parse(&state),
            start_date: parse_timestamp("states.start_date", start_date)?,
            end_date: parse_timestamp("states.end_date", end_date)?,
        });
    }

    Ok(states)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCarRecord {
    pub id: i64,
    pub name: Option<String>,
    pub efficiency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPositionRecord {
    pub car_id: i64,
    pub date: String,
    pub battery_level: Option<i64>,
    pub usable_battery_level: Option<i64>,
    pub odometer: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChargingProcessRecord {
    pub car_id: i64,
    pub position_id: i64,
    pub start_date: String,
    pub end_date: Option<String>,
    pub start_ideal_range_km: Option<f64>,
    pub end_ideal_range_km: Option<f64>,
    pub start_rated_range_km: Option<f64>,
    pub end_rated_range_km: Option<f64>,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDriveRecord {
    pub car_id: i64,
    pub start_position_id: i64,
    pub end_position_id: Option<i64>,
    pub start_date: String,
    pub end_date: Option<String>,
    pub start_ideal_range_km: Option<f64>,
    pub end_ideal_range_km: Option<f64>,
    pub start_rated_range_km: Option<f64>,
    pub end_rated_range_km: Option<f64>,
    pub start_km: f64,
    pub end_km: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStateRecord {
    pub car_id: i64,
    pub state: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

pub fn insert_car(connection: &Connection, new_car: &NewCarRecord) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO cars (id, name, efficiency) VALUES (?1, ?2, ?3)",
        params![new_car.id, new_car.name, new_car.efficiency],
    )?;

    Ok(new_car.id)
}

pub fn upsert_settings(connection: &Connection, settings: &DrainSettings) -> Result<(), DbError> {
    connection.execute(
        "INSERT INTO settings (id, unit_of_length, preferred_range) VALUES (1, ?1, ?2)
         ON CONFLICT (id) DO UPDATE SET
             unit_of_length = excluded.unit_of_length,
             preferred_range = excluded.preferred_range",
        params![
            settings.unit_of_length.as_str(),
            settings.preferred_range.as_str()
        ],
    )?;

    Ok(())
}

pub fn insert_position(
    connection: &Connection,
    new_position: &NewPositionRecord,
) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO positions (car_id, date, battery_level, usable_battery_level, odometer) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new_position.car_id,
            new_position.date,
            new_position.battery_level,
            new_position.usable_battery_level,
            new_position.odometer,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn insert_charging_process(
    connection: &Connection,
    new_charge: &NewChargingProcessRecord,
) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO charging_processes (
             car_id, position_id, start_date, end_date,
             start_ideal_range_km, end_ideal_range_km, start_rated_range_km, end_rated_range_km,
             start_battery_level, end_battery_level
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            new_charge.car_id,
            new_charge.position_id,
            new_charge.start_date,
            new_charge.end_date,
            new_charge.start_ideal_range_km,
            new_charge.end_ideal_range_km,
            new_charge.start_rated_range_km,
            new_charge.end_rated_range_km,
            new_charge.start_battery_level,
            new_charge.end_battery_level,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn insert_drive(connection: &Connection, new_drive: &NewDriveRecord) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO drives (
             car_id, start_position_id, end_position_id, start_date, end_date,
             start_ideal_range_km, end_ideal_range_km, start_rated_range_km, end_rated_range_km,
             start_km, end_km
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            new_drive.car_id,
            new_drive.start_position_id,
            new_drive.end_position_id,
            new_drive.start_date,
            new_drive.end_date,
            new_drive.start_ideal_range_km,
            new_drive.end_ideal_range_km,
            new_drive.start_rated_range_km,
            new_drive.end_rated_range_km,
            new_drive.start_km,
            new_drive.end_km,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}

pub fn insert_state(connection: &Connection, new_state: &NewStateRecord) -> Result<i64, DbError> {
    connection.execute(
        "INSERT INTO states (car_id, state, start_date, end_date) VALUES (?1, ?2, ?3, ?4)",
        params![
            new_state.car_id,
            new_state.state,
            new_state.start_date,
            new_state.end_date,
        ],
    )?;

    Ok(connection.last_insert_rowid())
}
