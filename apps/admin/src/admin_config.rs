use std::env;
use std::time::Duration;

use grantry_core::{AppError, AppResult, OrgId};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub operation_timeout: Option<Duration>,
    pub org_id: OrgId,
}

impl AdminConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let max_connections = parse_env_u32("GRANTRY_DB_MAX_CONNECTIONS", 5)?;
        if max_connections == 0 {
            return Err(AppError::Validation(
                "GRANTRY_DB_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        let operation_timeout = optional_env_u64("GRANTRY_OPERATION_TIMEOUT_MS")?
            .map(|value| {
                if value == 0 {
                    return Err(AppError::Validation(
                        "GRANTRY_OPERATION_TIMEOUT_MS must be greater than zero".to_owned(),
                    ));
                }
                Ok(Duration::from_millis(value))
            })
            .transpose()?;

        let org_id = match optional_env_i64("GRANTRY_ORG_ID")? {
            Some(value) => OrgId::new(value)?,
            None => OrgId::new(1)?,
        };

        Ok(Self {
            database_url,
            max_connections,
            operation_timeout,
            org_id,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match non_empty_env(name) {
        Some(value) => value
            .parse::<u32>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        None => Ok(default),
    }
}

fn optional_env_u64(name: &str) -> AppResult<Option<u64>> {
    non_empty_env(name)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}

fn optional_env_i64(name: &str) -> AppResult<Option<i64>> {
    non_empty_env(name)
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
}
