use crate::domain::models::UnitOfLength;

pub const KM_PER_MILE: f64 = 1.60934;

pub fn convert_km(value_km: f64, unit: UnitOfLength) -> f64 {
    match unit {
        UnitOfLength::Km => value_km,
        UnitOfLength::Mi => value_km / KM_PER_MILE,
    }
}
