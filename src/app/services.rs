use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

use crate::adapters::db;
use crate::adapters::db::DbError;
use crate::domain::drain::{DrainInput, compute_vampire_drain};
use crate::domain::models::{
    PageRequest, TimeWindow, UnitOfLength, VampireDrainRecord, Vehicle,
};

#[derive(Debug, Error)]
pub enum DrainError {
    #[error("car {0} not found")]
    VehicleNotFound(i64),
    #[error("no vampire drain data for car {0}")]
    EmptyResult(i64),
    #[error("database lock poisoned")]
    DbLockPoisoned,
    #[error("database operation failed: {0}")]
    DataAccess(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainQuery {
    pub car_id: i64,
    pub window: TimeWindow,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VampireDrainReport {
    pub vehicle: Vehicle,
    pub unit_of_length: UnitOfLength,
    /// Qualifying records across all pages.
    pub total_records: usize,
    pub records: Vec<VampireDrainRecord>,
}

pub trait VampireDrainQueryHandler {
    fn vampire_drain(&self, query: &DrainQuery) -> Result<VampireDrainReport, DrainError>;
}

#[derive(Clone)]
pub struct SqliteDrainService {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDrainService {
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DrainError>,
    ) -> Result<T, DrainError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| DrainError::DbLockPoisoned)?;
        op(&connection)
    }
}

impl VampireDrainQueryHandler for SqliteDrainService {
    fn vampire_drain(&self, query: &DrainQuery) -> Result<VampireDrainReport, DrainError> {
        let car_id = query.car_id;

        let (vehicle, settings, charges, drives, states) = self.with_connection(|connection| {
            let vehicle =
                db::find_vehicle(connection, car_id)?.ok_or(DrainError::VehicleNotFound(car_id))?;
            let settings = db::load_settings(connection)?;
            let charges = db::list_charge_events(connection, car_id, &query.window)?;
            let drives = db::list_drive_events(connection, car_id, &query.window)?;
            let states = db::list_standby_states(connection, car_id, &query.window)?;
            Ok((vehicle, settings, charges, drives, states))
        })?;

        tracing::debug!(
            car_id,
            charges = charges.len(),
            drives = drives.len(),
            states = states.len(),
            "loaded car timeline"
        );

        let records = compute_vampire_drain(&DrainInput {
            charges: &charges,
            drives: &drives,
            states: &states,
            settings,
            efficiency: vehicle.efficiency,
        });

        if records.is_empty() {
            return Err(DrainError::EmptyResult(car_id));
        }

        let total_records = records.len();
        Ok(VampireDrainReport {
            vehicle,
            unit_of_length: settings.unit_of_length,
            total_records,
            records: query.page.apply(records),
        })
    }
}
