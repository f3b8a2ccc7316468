use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::{open_connection, run_migrations, schema_version};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::services::SqliteDrainService;

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let mut connection = open_connection(&config.db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;
    let version = schema_version(&connection).map_err(AppError::database_init)?;

    tracing::info!(db_path = %config.db_path, schema_version = version, "event store ready");

    let shared_connection = Arc::new(Mutex::new(connection));
    let api_state = ApiState {
        drain_queries: SqliteDrainService::new(Arc::clone(&shared_connection)),
        default_page_size: config.default_page_size,
        max_page_size: config.max_page_size,
    };
    let cors_allowed_origin = config.cors_allowed_origin.clone();

    tracing::info!(bind = %config.http_bind, "http server starting");

    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .wrap(build_cors(cors_allowed_origin.as_deref()))
                    .app_data(web::Data::new(api_state.clone()))
                    .configure(configure_routes)
            })
            .bind(&config.http_bind)?
            .run()
            .await
        })
        .map_err(AppError::runtime)
}

fn build_cors(allowed_origin: Option<&str>) -> Cors {
    let cors = Cors::default().allowed_methods(vec!["GET"]).max_age(3600);

    match allowed_origin {
        Some(origin) => cors.allowed_origin(origin),
        None => cors.allow_any_origin(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{App, http::StatusCode, http::header, test, web};

    use crate::adapters::api::{ApiState, configure_routes};
    use crate::app::services::SqliteDrainService;
    use crate::test_support::open_test_connection;

    use super::build_cors;

    fn state(name: &str) -> ApiState {
        ApiState {
            drain_queries: SqliteDrainService::new(Arc::new(Mutex::new(open_test_connection(
                name,
            )))),
            default_page_size: 100,
            max_page_size: 500,
        }
    }

    #[actix_web::test]
    async fn cors_echoes_configured_origin() {
        let app = test::init_service(
            App::new()
                .wrap(build_cors(Some("https://grafana.local")))
                .app_data(web::Data::new(state("cors-configured")))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header((header::ORIGIN, "https://grafana.local"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some("https://grafana.local")
        );
    }

    #[actix_web::test]
    async fn cors_allows_any_origin_when_unset() {
        let app = test::init_service(
            App::new()
                .wrap(build_cors(None))
                .app_data(web::Data::new(state("cors-any")))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header((header::ORIGIN, "https://dashboard.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
