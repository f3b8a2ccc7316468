pub mod config;
mod error;
mod logging;
mod runtime;
pub mod services;

pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        db_path = %config.db_path,
        http_bind = %config.http_bind,
        default_page_size = config.default_page_size,
        max_page_size = config.max_page_size,
        cors_allowed_origin = config.cors_allowed_origin.as_deref().unwrap_or("*"),
        "application bootstrap initialized"
    );

    runtime::run(config)
}
