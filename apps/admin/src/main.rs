//! Grantry operator command-line entry point.

#![forbid(unsafe_code)]

mod admin_command;
mod admin_config;

use std::sync::Arc;

use clap::Parser;
use grantry_application::{
    GetResourcesPermissionsQuery, ResourcePermissionService, SetResourcePermissionsCommand,
};
use grantry_core::{AppError, AppResult};
use grantry_domain::resolve_scope;
use grantry_infrastructure::PostgresResourcePermissionRepository;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::admin_command::{AdminCli, AdminCommand, SetTarget};
use crate::admin_config::{AdminConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = AdminCli::parse();
    let config = AdminConfig::load()?;
    let pool = connect_and_migrate(&config).await?;

    match cli.command {
        AdminCommand::Migrate => {
            info!("database migrations applied successfully");
            Ok(())
        }
        AdminCommand::Set {
            kind,
            actor,
            resource,
            resource_id,
            actions,
        } => {
            let target = kind.target(actor.as_str())?;
            let scope = resolve_scope(&resource, &resource_id);
            let command = SetResourcePermissionsCommand {
                actions,
                resource,
                resource_id,
            };
            let service = build_service(pool, &config);

            let permission = match target {
                SetTarget::User(user_id) => {
                    service
                        .set_user_resource_permissions(config.org_id, user_id, command)
                        .await?
                }
                SetTarget::Team(team_id) => {
                    service
                        .set_team_resource_permissions(config.org_id, team_id, command)
                        .await?
                }
                SetTarget::Builtin(role) => {
                    service
                        .set_builtin_resource_permissions(config.org_id, role.as_str(), command)
                        .await?
                }
            };

            info!(
                org_id = %config.org_id,
                scope = %scope,
                revoked = permission.is_none(),
                "resource permissions set"
            );
            print_json(&permission)
        }
        AdminCommand::Get {
            resource,
            resource_ids,
            actions,
        } => {
            let service = build_service(pool, &config);
            let permissions = service
                .get_resources_permissions(
                    config.org_id,
                    GetResourcesPermissionsQuery {
                        actions,
                        resource,
                        resource_ids: resource_ids.into_inner(),
                    },
                )
                .await?;

            info!(
                org_id = %config.org_id,
                count = permissions.len(),
                "resource permissions loaded"
            );
            print_json(&permissions)
        }
    }
}

async fn connect_and_migrate(config: &AdminConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_service(pool: PgPool, config: &AdminConfig) -> ResourcePermissionService {
    let repository = Arc::new(PostgresResourcePermissionRepository::new(pool));
    let service = ResourcePermissionService::new(repository);

    match config.operation_timeout {
        Some(timeout) => service.with_operation_timeout(timeout),
        None => service,
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| {
        AppError::Internal(format!("failed to render permissions as JSON: {error}"))
    })?;
    println!("{rendered}");
    Ok(())
}
