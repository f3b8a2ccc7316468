use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitOfLength {
    #[default]
    Km,
    Mi,
}

impl UnitOfLength {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "km" => Some(Self::Km),
            "mi" => Some(Self::Mi),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Km => "km",
            Self::Mi => "mi",
        }
    }
}

/// Which range estimate feeds the drain computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreferredRange {
    #[default]
    Rated,
    Ideal,
}

impl PreferredRange {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "rated" => Some(Self::Rated),
            "ideal" => Some(Self::Ideal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rated => "rated",
            Self::Ideal => "ideal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainSettings {
    pub unit_of_length: UnitOfLength,
    pub preferred_range: PreferredRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub name: Option<String>,
    /// kWh per km of range; unknown for vehicles that never completed a calibrating charge.
    pub efficiency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeReading {
    pub ideal_km: Option<f64>,
    pub rated_km: Option<f64>,
}

impl RangeReading {
    pub fn select(&self, preferred: PreferredRange) -> Option<f64> {
        match preferred {
            PreferredRange::Rated => self.rated_km,
            PreferredRange::Ideal => self.ideal_km,
        }
    }
}

/// A completed charging session. Charging does not move the car, so one
/// odometer reading covers both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeEvent {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_range: RangeReading,
    pub end_range: RangeReading,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
    pub start_usable_battery_level: Option<i64>,
    pub odometer_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriveEvent {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub start_range: RangeReading,
    pub end_range: RangeReading,
    pub start_battery_level: Option<i64>,
    pub end_battery_level: Option<i64>,
    pub start_usable_battery_level: Option<i64>,
    pub end_usable_battery_level: Option<i64>,
    pub start_km: f64,
    pub end_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    Online,
    Offline,
    Asleep,
    Driving,
    Charging,
    Updating,
    Other,
}

impl VehicleState {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "online" => Self::Online,
            "offline" => Self::Offline,
            "asleep" => Self::Asleep,
            "driving" => Self::Driving,
            "charging" => Self::Charging,
            "updating" => Self::Updating,
            _ => Self::Other,
        }
    }

    pub fn is_standby(self) -> bool {
        matches!(self, Self::Asleep | Self::Offline)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateInterval {
    pub state: VehicleState,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Inclusive bounds on activity start dates. Both ends open means all time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    /// `page` is 1-based; 0 is read as the first page.
    pub fn from_page(page: u32, show: u32) -> Self {
        let limit = show.max(1);
        Self {
            limit,
            offset: page.saturating_sub(1).saturating_mul(limit),
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VampireDrainRecord {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_seconds: i64,
    pub standby_seconds: i64,
    pub reduced_range: bool,
    pub soc_diff: Option<i64>,
    pub consumption_kwh: Option<f64>,
    pub avg_power_w: Option<f64>,
    pub range_lost_per_hour: Option<f64>,
    pub range_diff: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::{PageRequest, PreferredRange, RangeReading, UnitOfLength, VehicleState};

    #[test]
    fn page_request_is_one_based() {
        assert_eq!(
            PageRequest::from_page(1, 100),
            PageRequest {
                limit: 100,
                offset: 0
            }
        );
        assert_eq!(
            PageRequest::from_page(3, 20),
            PageRequest {
                limit: 20,
                offset: 40
            }
        );
        assert_eq!(PageRequest::from_page(0, 20).offset, 0);
    }

    #[test]
    fn page_request_slices_after_offset() {
        let page = PageRequest::from_page(2, 2);
        assert_eq!(page.apply(vec![1, 2, 3, 4, 5]), vec![3, 4]);
        assert!(PageRequest::from_page(4, 2).apply(vec![1, 2, 3]).is_empty());
    }

    #[test]
    fn selects_preferred_range() {
        let reading = RangeReading {
            ideal_km: Some(310.0),
            rated_km: Some(300.0),
        };
        assert_eq!(reading.select(PreferredRange::Rated), Some(300.0));
        assert_eq!(reading.select(PreferredRange::Ideal), Some(310.0));
    }

    #[test]
    fn parses_store_enums() {
        assert_eq!(UnitOfLength::parse("mi"), Some(UnitOfLength::Mi));
        assert_eq!(UnitOfLength::parse("furlong"), None);
        assert_eq!(PreferredRange::parse(" ideal "), Some(PreferredRange::Ideal));
        assert_eq!(PreferredRange::Ideal.as_str(), "ideal");
        assert_eq!(
            PreferredRange::parse(PreferredRange::Rated.as_str()),
            Some(PreferredRange::Rated)
        );
        assert_eq!(VehicleState::parse("asleep"), VehicleState::Asleep);
        assert_eq!(VehicleState::parse("suspended"), VehicleState::Other);
        assert!(VehicleState::Offline.is_standby());
        assert!(!VehicleState::Online.is_standby());
    }
}
