use chrono::{DateTime, Duration, Utc};

use crate::domain::gaps::{IdleGap, extract_gaps};
use crate::domain::models::{
    ChargeEvent, DrainSettings, DriveEvent, StateInterval, UnitOfLength, VampireDrainRecord,
};
use crate::domain::timeline::merge_timeline;
use crate::domain::units::convert_km;

/// Gaps must be strictly longer than this to count as standby.
pub const MIN_IDLE_SECONDS: i64 = 6 * 60 * 60;
/// A gap in which the odometer moved this far hides an unlogged drive.
pub const MAX_ODOMETER_DELTA_KM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrainParameters {
    pub efficiency: Option<f64>,
    pub unit_of_length: UnitOfLength,
}

#[derive(Debug, Clone, Copy)]
pub struct DrainInput<'a> {
    pub charges: &'a [ChargeEvent],
    pub drives: &'a [DriveEvent],
    pub states: &'a [StateInterval],
    pub settings: DrainSettings,
    pub efficiency: Option<f64>,
}

/// Asleep and offline intervals sorted by start date, so each gap only scans
/// the states that can fall inside it.
#[derive(Debug, Clone, Default)]
pub struct StandbyIndex {
    spans: Vec<(DateTime<Utc>, DateTime<Utc>)>,
}

impl StandbyIndex {
    pub fn new(states: &[StateInterval]) -> Self {
        let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = states
            .iter()
            .filter(|state| state.state.is_standby() && state.start_date <= state.end_date)
            .map(|state| (state.start_date, state.end_date))
            .collect();
        spans.sort_by_key(|span| span.0);
        Self { spans }
    }

    /// Seconds of standby fully contained in `[start, end]`. Overlapping or
    /// duplicated states are summed as they are.
    pub fn seconds_within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let first = self.spans.partition_point(|span| span.0 < start);

        self.spans[first..]
            .iter()
            .take_while(|span| span.0 <= end)
            .filter(|span| span.1 <= end)
            .map(|span| (span.1 - span.0).num_seconds())
            .sum()
    }
}

pub fn qualifies(gap: &IdleGap) -> bool {
    gap.duration > Duration::seconds(MIN_IDLE_SECONDS)
        && gap.range_loss_km().is_some_and(|loss| loss >= 0.0)
        && gap.odometer_delta_km() < MAX_ODOMETER_DELTA_KM
}

pub fn evaluate_gap(
    gap: &IdleGap,
    standby: &StandbyIndex,
    parameters: &DrainParameters,
) -> Option<VampireDrainRecord> {
    if !qualifies(gap) {
        return None;
    }
    let range_loss = gap.range_loss_km()?;

    let duration_seconds = gap.duration_seconds();
    let raw_standby = standby.seconds_within(gap.start_date, gap.end_date);
    let standby_seconds = if raw_standby > duration_seconds {
        tracing::warn!(
            start_date = %gap.start_date,
            end_date = %gap.end_date,
            standby_seconds = raw_standby,
            duration_seconds,
            "standby states exceed gap duration; clamping"
        );
        duration_seconds
    } else {
        raw_standby
    };

    let mut record = VampireDrainRecord {
        start_date: gap.start_date,
        end_date: gap.end_date,
        duration_seconds,
        standby_seconds,
        reduced_range: gap.reduced_range,
        soc_diff: None,
        consumption_kwh: None,
        avg_power_w: None,
        range_lost_per_hour: None,
        range_diff: None,
    };

    if gap.reduced_range {
        return Some(record);
    }

    let hours = gap.hours();
    let unit = parameters.unit_of_length;

    record.soc_diff = match (gap.start_battery_level, gap.end_battery_level) {
        (Some(start), Some(end)) => Some(-(start - end).max(0)),
        _ => None,
    };
    record.range_diff = Some(convert_km(range_loss, unit));
    record.range_lost_per_hour = Some(convert_km(range_loss / hours, unit));
    record.consumption_kwh = parameters.efficiency.map(|efficiency| range_loss * efficiency);
    record.avg_power_w = record
        .consumption_kwh
        .map(|consumption| consumption / hours * 1000.0);

    Some(record)
}

/// Evaluates gaps in the order given, dropping the ones that do not qualify.
pub fn evaluate_gaps(
    gaps: &[IdleGap],
    states: &[StateInterval],
    parameters: &DrainParameters,
) -> Vec<VampireDrainRecord> {
    let standby = StandbyIndex::new(states);
    gaps.iter()
        .filter_map(|gap| evaluate_gap(gap, &standby, parameters))
        .collect()
}

/// Full pipeline for one car: merge, extract gaps, evaluate. Records come back
/// most recent first and unpaginated.
pub fn compute_vampire_drain(input: &DrainInput<'_>) -> Vec<VampireDrainRecord> {
    let timeline = merge_timeline(input.charges, input.drives, input.settings.preferred_range);
    let gaps = extract_gaps(&timeline);
    let parameters = DrainParameters {
        efficiency: input.efficiency,
        unit_of_length: input.settings.unit_of_length,
    };

    let records = evaluate_gaps(&gaps, input.states, &parameters);
    tracing::debug!(
        intervals = timeline.len(),
        gaps = gaps.len(),
        records = records.len(),
        "vampire drain pipeline evaluated"
    );
    records
}
