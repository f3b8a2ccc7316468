use chrono::{DateTime, Utc};

use crate::domain::models::{ChargeEvent, DriveEvent, PreferredRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Charge,
    Drive,
}

/// A period in which the car's range and odometer are explained by an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupiedInterval {
    pub kind: ActivityKind,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_range_km: Option<f64>,
    pub end_range_km: Option<f64>,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
    pub start_usable_battery_level: Option<i64>,
    pub end_usable_battery_level: Option<i64>,
    pub start_odometer_km: f64,
    pub end_odometer_km: f64,
}

impl OccupiedInterval {
    pub fn from_charge(charge: &ChargeEvent, preferred: PreferredRange) -> Self {
        Self {
            kind: ActivityKind::Charge,
            start_date: charge.start_date,
            end_date: charge.end_date,
            start_range_km: charge.start_range.select(preferred),
            end_range_km: charge.end_range.select(preferred),
            start_battery_level: charge.start_battery_level,
            end_battery_level: charge.end_battery_level,
            start_usable_battery_level: charge.start_usable_battery_level,
            end_usable_battery_level: None,
            start_odometer_km: charge.odometer_km,
            end_odometer_km: charge.odometer_km,
        }
    }

    pub fn from_drive(drive: &DriveEvent, preferred: PreferredRange) -> Self {
        Self {
            kind: ActivityKind::Drive,
            start_date: drive.start_date,
            end_date: drive.end_date,
            start_range_km: drive.start_range.select(preferred),
            end_range_km: drive.end_range.select(preferred),
            start_battery_level: drive.start_battery_level,
            end_battery_level: drive.end_battery_level,
            start_usable_battery_level: drive.start_usable_battery_level,
            end_usable_battery_level: drive.end_usable_battery_level,
            start_odometer_km: drive.start_km,
            end_odometer_km: drive.end_km,
        }
    }
}

/// Merges charges and drives into one sequence ordered by `start_date`
/// ascending. The sort is stable and nothing is deduplicated: intervals that
/// share a start date keep their input order, charges first.
pub fn merge_timeline(
    charges: &[ChargeEvent],
    drives: &[DriveEvent],
    preferred: PreferredRange,
) -> Vec<OccupiedInterval> {
    let mut timeline: Vec<OccupiedInterval> = charges
        .iter()
        .map(|charge| OccupiedInterval::from_charge(charge, preferred))
        .chain(
            drives
                .iter()
                .map(|drive| OccupiedInterval::from_drive(drive, preferred)),
        )
        .collect();

    timeline.sort_by_key(|interval| interval.start_date);
    timeline
}
