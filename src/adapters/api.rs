use actix_web::{
    HttpResponse, Responder, error::InternalError, get, http::StatusCode, web,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::app::services::{
    DrainError, DrainQuery, SqliteDrainService, VampireDrainQueryHandler, VampireDrainReport,
};
use crate::domain::models::{PageRequest, TimeWindow, VampireDrainRecord};

const VAMPIRE_DRAIN_ERROR_MESSAGE: &str = "Unable to load vampire drain data.";

#[derive(Clone)]
pub struct ApiState {
    pub drain_queries: SqliteDrainService,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct VampireDrainParams {
    pub page: Option<u32>,
    pub show: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VampireDrainResponse {
    pub drive_id: i64,
    pub start_date: String,
    pub end_date: String,
    pub duration: i64,
    pub period: i64,
    pub standby_seconds: i64,
    pub soc_diff: Option<i64>,
    pub has_reduced_range: bool,
    pub consumption: Option<f64>,
    pub avg_power: Option<f64>,
    pub range_lost_per_hour_km: Option<f64>,
    pub range_diff_km: Option<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CarResponse {
    pub car_id: i64,
    pub car_name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UnitsResponse {
    pub unit_of_length: &'static str,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VampireDrainData {
    pub car: CarResponse,
    pub vampire_drain: Vec<VampireDrainResponse>,
    pub total: usize,
    pub units: UnitsResponse,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: &'static str,
    pub details: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl From<&VampireDrainRecord> for VampireDrainResponse {
    fn from(record: &VampireDrainRecord) -> Self {
        Self {
            drive_id: 0,
            start_date: format_date(record.start_date),
            end_date: format_date(record.end_date),
            duration: record.duration_seconds,
            period: 0,
            standby_seconds: record.standby_seconds,
            soc_diff: record.soc_diff,
            has_reduced_range: record.reduced_range,
            consumption: record.consumption_kwh,
            avg_power: record.avg_power_w,
            range_lost_per_hour_km: record.range_lost_per_hour,
            range_diff_km: record.range_diff,
        }
    }
}

impl From<VampireDrainReport> for VampireDrainData {
    fn from(report: VampireDrainReport) -> Self {
        Self {
            car: CarResponse {
                car_id: report.vehicle.id,
                car_name: report.vehicle.name,
            },
            vampire_drain: report
                .records
                .iter()
                .map(VampireDrainResponse::from)
                .collect(),
            total: report.total_records,
            units: UnitsResponse {
                unit_of_length: report.unit_of_length.as_str(),
            },
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(query_config())
        .service(health)
        .service(get_vampire_drain_endpoint);
}

/// Malformed query strings (e.g. `page=-1`) get the same error envelope as
/// the other parameter checks instead of actix's plain-text rejection.
fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|error, _req| {
        let details = error.to_string();
        InternalError::from_response(
            error,
            error_response(StatusCode::BAD_REQUEST, "invalid_parameter", details),
        )
        .into()
    })
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/api/v1/cars/{car_id}/vampire_drain")]
async fn get_vampire_drain_endpoint(
    state: web::Data<ApiState>,
    path: web::Path<i64>,
    params: web::Query<VampireDrainParams>,
) -> impl Responder {
    let car_id = path.into_inner();

    let window = match parse_window(&params) {
        Ok(window) => window,
        Err(details) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_parameter", details);
        }
    };

    let show = params
        .show
        .unwrap_or(state.default_page_size)
        .clamp(1, state.max_page_size);
    let query = DrainQuery {
        car_id,
        window,
        page: PageRequest::from_page(params.page.unwrap_or(1), show),
    };

    match state.drain_queries.vampire_drain(&query) {
        Ok(report) => HttpResponse::Ok().json(DataEnvelope {
            data: VampireDrainData::from(report),
        }),
        Err(error) => drain_error_response(car_id, error),
    }
}

fn parse_window(params: &VampireDrainParams) -> Result<TimeWindow, String> {
    let window = TimeWindow {
        from: parse_date_param("start_date", params.start_date.as_deref())?,
        to: parse_date_param("end_date", params.end_date.as_deref())?,
    };

    if window.is_inverted() {
        return Err("start_date must not be after end_date".to_string());
    }

    Ok(window)
}

fn parse_date_param(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    DateTime::parse_from_rfc3339(raw)
        .map(|value| Some(value.with_timezone(&Utc)))
        .map_err(|error| format!("{name} must be an RFC 3339 timestamp: {error}"))
}

fn format_date(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn drain_error_response(car_id: i64, error: DrainError) -> HttpResponse {
    let (status, code) = match &error {
        DrainError::VehicleNotFound(_) => (StatusCode::NOT_FOUND, "vehicle_not_found"),
        DrainError::EmptyResult(_) => (StatusCode::NOT_FOUND, "no_data"),
        DrainError::DbLockPoisoned | DrainError::DataAccess(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "data_access_error")
        }
    };

    if status.is_server_error() {
        tracing::warn!(car_id, error = %error, "vampire drain query failed");
    } else {
        tracing::debug!(car_id, error = %error, "vampire drain query returned no records");
    }

    error_response(status, code, error.to_string())
}

fn error_response(status: StatusCode, code: &'static str, details: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorEnvelope {
        error: ErrorBody {
            code,
            message: VAMPIRE_DRAIN_ERROR_MESSAGE,
            details,
        },
    })
}
