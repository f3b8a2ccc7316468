use chrono::{DateTime, Duration, Utc};

use crate::domain::timeline::OccupiedInterval;

/// The parked time between the end of one activity and the start of the next.
#[derive(Debug, Clone, PartialEq)]
pub struct IdleGap {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_range_km: Option<f64>,
    pub end_range_km: Option<f64>,
    pub start_odometer_km: f64,
    pub end_odometer_km: f64,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
    /// Exact length of the gap; negative when the activities overlap.
    pub duration: Duration,
    /// The usable ceiling is below the reported level when the next activity
    /// starts, so range loss across the gap cannot be trusted.
    pub reduced_range: bool,
}

impl IdleGap {
    fn between(previous: &OccupiedInterval, current: &OccupiedInterval) -> Self {
        let reduced_range = match (
            current.start_battery_level,
            current.start_usable_battery_level,
        ) {
            (Some(level), Some(usable)) => level > usable,
            _ => false,
        };

        Self {
            start_date: previous.end_date,
            end_date: current.start_date,
            start_range_km: previous.end_range_km,
            end_range_km: current.start_range_km,
            start_odometer_km: previous.end_odometer_km,
            end_odometer_km: current.start_odometer_km,
            start_battery_level: previous.end_battery_level,
            end_battery_level: current.start_battery_level,
            duration: current.start_date - previous.end_date,
            reduced_range,
        }
    }

    /// Range lost across the gap; `None` when either end has no reading.
    pub fn range_loss_km(&self) -> Option<f64> {
        Some(self.start_range_km? - self.end_range_km?)
    }

    /// Whole seconds, truncated toward zero, as reported to clients.
    pub fn duration_seconds(&self) -> i64 {
        self.duration.num_seconds()
    }

    pub fn hours(&self) -> f64 {
        self.duration.num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn odometer_delta_km(&self) -> f64 {
        self.end_odometer_km - self.start_odometer_km
    }
}

/// Walks an ascending timeline and returns one gap per adjacent pair, ordered
/// most recent first. A timeline with fewer than two intervals has no gaps.
pub fn extract_gaps(timeline: &[OccupiedInterval]) -> Vec<IdleGap> {
    let mut gaps = Vec::with_capacity(timeline.len().saturating_sub(1));
    let mut previous: Option<&OccupiedInterval> = None;

    for current in timeline {
        if let Some(previous) = previous {
            gaps.push(IdleGap::between(previous, current));
        }
        previous = Some(current);
    }

    gaps.sort_by(|left, right| right.start_date.cmp(&left.start_date));
    gaps
}
