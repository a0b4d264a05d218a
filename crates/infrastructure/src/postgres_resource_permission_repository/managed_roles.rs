use sqlx::Acquire;
use uuid::Uuid;

use grantry_domain::managed_role_name;

use super::*;

/// Returns the managed role anchoring `actor` on `resource`, creating it on first use.
///
/// Creation runs under a savepoint. When a concurrent transaction wins the
/// unique constraint, the savepoint is discarded and the winner is read back once.
pub(super) async fn ensure_managed_role(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    actor: ActorRef,
    resource: &str,
) -> AppResult<ManagedRoleRow> {
    if let Some(role) = find_managed_role(transaction, org_id, actor, resource).await? {
        return Ok(role);
    }

    match create_managed_role(transaction, org_id, actor, resource).await {
        Ok(role) => {
            debug!(
                org_id = %org_id,
                role_id = role.id,
                role_name = %role.name,
                "created managed role"
            );
            Ok(role)
        }
        Err(error) if is_unique_violation(&error) => {
            debug!(
                org_id = %org_id,
                actor = %actor,
                resource,
                "managed role created concurrently, reusing existing role"
            );

            find_managed_role(transaction, org_id, actor, resource)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "managed role for '{actor}' on '{resource}' in organization \
                         '{org_id}' could not be resolved after a concurrent create"
                    ))
                })
        }
        Err(error) => Err(AppError::storage(
            format!("failed to create managed role for '{actor}' on '{resource}'"),
            error,
        )),
    }
}

async fn find_managed_role(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    actor: ActorRef,
    resource: &str,
) -> AppResult<Option<ManagedRoleRow>> {
    sqlx::query_as::<_, ManagedRoleRow>(
        r#"
        SELECT roles.id, roles.name
        FROM managed_role_bindings AS bindings
        INNER JOIN managed_roles AS roles
            ON roles.id = bindings.role_id
        WHERE bindings.org_id = $1
            AND bindings.resource = $2
            AND bindings.user_id IS NOT DISTINCT FROM $3
            AND bindings.team_id IS NOT DISTINCT FROM $4
            AND bindings.builtin_role IS NOT DISTINCT FROM $5
        LIMIT 1
        "#,
    )
    .bind(org_id.as_i64())
    .bind(resource)
    .bind(actor.user_id().map(|user_id| user_id.as_i64()))
    .bind(actor.team_id().map(|team_id| team_id.as_i64()))
    .bind(actor.builtin_role().map(|role| role.as_str()))
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::storage(
            format!("failed to resolve managed role for '{actor}' on '{resource}'"),
            error,
        )
    })
}

async fn create_managed_role(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    actor: ActorRef,
    resource: &str,
) -> Result<ManagedRoleRow, sqlx::Error> {
    let mut savepoint = Acquire::begin(&mut *transaction).await?;

    let role = sqlx::query_as::<_, ManagedRoleRow>(
        r#"
        INSERT INTO managed_roles (uid, org_id, name, resource)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id.as_i64())
    .bind(managed_role_name(&actor, resource))
    .bind(resource)
    .fetch_one(&mut *savepoint)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO managed_role_bindings (
            role_id, org_id, resource, user_id, team_id, builtin_role
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(role.id)
    .bind(org_id.as_i64())
    .bind(resource)
    .bind(actor.user_id().map(|user_id| user_id.as_i64()))
    .bind(actor.team_id().map(|team_id| team_id.as_i64()))
    .bind(actor.builtin_role().map(|role| role.as_str()))
    .execute(&mut *savepoint)
    .await?;

    savepoint.commit().await?;

    Ok(role)
}
