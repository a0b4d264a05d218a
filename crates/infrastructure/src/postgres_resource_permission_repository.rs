use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;

use grantry_application::{
    ResourcePermission, ResourcePermissionRepository, ResourcePermissionsQuery,
    SetActorPermissionsInput, SetInstancePermissionsInput,
};
use grantry_core::{AppError, AppResult, OrgId};
use grantry_domain::{ActionSet, ActorRef};

mod managed_roles;
mod query;
mod reconcile;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed repository for resource-level grants.
#[derive(Clone)]
pub struct PostgresResourcePermissionRepository {
    pool: PgPool,
}

impl PostgresResourcePermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::storage("failed to begin transaction", error))
    }
}

#[derive(Debug, Clone, FromRow)]
struct ManagedRoleRow {
    id: i64,
    name: String,
}

#[derive(Debug, FromRow)]
struct ScopedPermissionRow {
    role_id: i64,
    role_name: String,
    scope: String,
    action: String,
    user_id: Option<i64>,
    team_id: Option<i64>,
    builtin_role: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl ResourcePermissionRepository for PostgresResourcePermissionRepository {
    async fn set_actor_permissions(
        &self,
        org_id: OrgId,
        input: SetActorPermissionsInput,
    ) -> AppResult<Option<ResourcePermission>> {
        let mut transaction = self.begin().await?;

        let permission = reconcile::reconcile_actor(
            &mut transaction,
            org_id,
            input.actor,
            &input.instance,
            &input.actions,
        )
        .await?;

        transaction
            .commit()
            .await
            .map_err(|error| AppError::storage("failed to commit transaction", error))?;

        Ok(permission)
    }

    async fn set_instance_permissions(
        &self,
        org_id: OrgId,
        input: SetInstancePermissionsInput,
    ) -> AppResult<Vec<ResourcePermission>> {
        let mut grants = input.grants;
        // Stable lock order across concurrent batches on the same instance.
        grants.sort_by(|left, right| left.actor.cmp(&right.actor));

        let mut transaction = self.begin().await?;
        let mut permissions = Vec::with_capacity(grants.len());

        for grant in &grants {
            if let Some(permission) = reconcile::reconcile_actor(
                &mut transaction,
                org_id,
                grant.actor,
                &input.instance,
                &grant.actions,
            )
            .await?
            {
                permissions.push(permission);
            }
        }

        transaction
            .commit()
            .await
            .map_err(|error| AppError::storage("failed to commit transaction", error))?;

        debug!(
            org_id = %org_id,
            scope = %input.instance.scope(),
            actors = grants.len(),
            granted = permissions.len(),
            "reconciled resource permissions batch"
        );

        Ok(permissions)
    }

    async fn list_resources_permissions(
        &self,
        org_id: OrgId,
        query: ResourcePermissionsQuery,
    ) -> AppResult<Vec<ResourcePermission>> {
        self.list_resources_permissions_impl(org_id, query).await
    }
}

/// Groups permission rows by (role, scope) into caller-facing aggregates.
///
/// `scope_index` maps every scope of interest to the resource id that produced it;
/// rows for other scopes are ignored.
fn aggregate_permissions(
    rows: Vec<ScopedPermissionRow>,
    resource: &str,
    scope_index: &HashMap<String, String>,
) -> AppResult<Vec<ResourcePermission>> {
    let mut positions: HashMap<(i64, String), usize> = HashMap::new();
    let mut permissions: Vec<ResourcePermission> = Vec::new();

    for row in rows {
        let Some(resource_id) = scope_index.get(row.scope.as_str()) else {
            continue;
        };

        let key = (row.role_id, row.scope.clone());
        if let Some(position) = positions.get(&key) {
            let permission = &mut permissions[*position];
            permission.actions.insert(row.action);
            permission.created = permission.created.min(row.created_at);
            permission.updated = permission.updated.max(row.updated_at);
            continue;
        }

        let actor = stored_actor(&row)?;
        positions.insert(key, permissions.len());
        permissions.push(ResourcePermission {
            role_id: row.role_id,
            role_name: row.role_name,
            actor,
            resource: resource.to_owned(),
            resource_id: resource_id.clone(),
            scope: row.scope,
            actions: ActionSet::from_stored([row.action]),
            created: row.created_at,
            updated: row.updated_at,
        });
    }

    Ok(permissions)
}

fn stored_actor(row: &ScopedPermissionRow) -> AppResult<ActorRef> {
    ActorRef::from_parts(row.user_id, row.team_id, row.builtin_role.as_deref()).map_err(|error| {
        AppError::Internal(format!(
            "invalid stored binding for managed role '{}': {error}",
            row.role_name
        ))
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return true;
    }

    false
}
