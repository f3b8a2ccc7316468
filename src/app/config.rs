use crate::app::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub http_bind: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        if let Err(error) = dotenvy::dotenv()
            && !error.not_found()
        {
            return Err(AppError::config(format!("failed to load .env file: {error}")));
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_page_size = parse_or_default(&lookup, "MAX_PAGE_SIZE", 500_u32)?;
        if max_page_size == 0 {
            return Err(AppError::config("MAX_PAGE_SIZE must be at least 1"));
        }

        let default_page_size = parse_or_default(&lookup, "DEFAULT_PAGE_SIZE", 100_u32)?;
        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(AppError::config(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE",
            ));
        }

        Ok(Self {
            db_path: non_empty(&lookup, "DB_PATH")
                .unwrap_or_else(|| "/var/lib/teslamate/drain.db".to_string()),
            http_bind: non_empty(&lookup, "HTTP_BIND")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            default_page_size,
            max_page_size,
            cors_allowed_origin: non_empty(&lookup, "CORS_ALLOWED_ORIGIN"),
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
