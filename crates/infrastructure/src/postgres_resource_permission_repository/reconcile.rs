use grantry_domain::{PermissionDiff, ResourceInstance};

use super::managed_roles::ensure_managed_role;
use super::*;

/// Moves one actor's stored grants on `instance` to `desired` inside `transaction`.
pub(super) async fn reconcile_actor(
    transaction: &mut Transaction<'_, Postgres>,
    org_id: OrgId,
    actor: ActorRef,
    instance: &ResourceInstance,
    desired: &ActionSet,
) -> AppResult<Option<ResourcePermission>> {
    let scope = instance.scope();
    let role = ensure_managed_role(transaction, org_id, actor, instance.resource()).await?;

    lock_role_scope(transaction, role.id, scope.as_str()).await?;

    let current = current_actions(transaction, role.id, scope.as_str()).await?;
    let diff = PermissionDiff::between(&current, desired);

    if desired.is_empty() {
        let removed = delete_scope_permissions(transaction, role.id, scope.as_str()).await?;
        if removed > 0 {
            touch_role(transaction, role.id).await?;
        }

        debug!(
            org_id = %org_id,
            role_id = role.id,
            scope = %scope,
            removed,
            "revoked resource permissions"
        );
        return Ok(None);
    }

    if !diff.to_remove.is_empty() {
        sqlx::query(
            r#"
            DELETE FROM managed_permissions
            WHERE role_id = $1
                AND scope = $2
                AND action = ANY($3)
            "#,
        )
        .bind(role.id)
        .bind(scope.as_str())
        .bind(diff.to_remove.as_slice())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::storage(
                format!("failed to remove permissions on scope '{scope}'"),
                error,
            )
        })?;
    }

    if !diff.to_add.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO managed_permissions (role_id, action, scope)
            SELECT $1, action, $3
            FROM UNNEST($2::TEXT[]) AS action
            ON CONFLICT (role_id, action, scope) DO NOTHING
            "#,
        )
        .bind(role.id)
        .bind(diff.to_add.as_slice())
        .bind(scope.as_str())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::storage(
                format!("failed to add permissions on scope '{scope}'"),
                error,
            )
        })?;
    }

    if !diff.is_empty() {
        touch_role(transaction, role.id).await?;
    }

    debug!(
        org_id = %org_id,
        role_id = role.id,
        scope = %scope,
        added = diff.to_add.len(),
        removed = diff.to_remove.len(),
        "reconciled resource permissions"
    );

    let rows = sqlx::query_as::<_, ScopedPermissionRow>(
        r#"
        SELECT
            permissions.role_id,
            roles.name AS role_name,
            permissions.scope,
            permissions.action,
            bindings.user_id,
            bindings.team_id,
            bindings.builtin_role,
            permissions.created_at,
            permissions.updated_at
        FROM managed_permissions AS permissions
        INNER JOIN managed_roles AS roles
            ON roles.id = permissions.role_id
        INNER JOIN managed_role_bindings AS bindings
            ON bindings.role_id = roles.id
        WHERE permissions.role_id = $1
            AND permissions.scope = $2
        ORDER BY permissions.action
        "#,
    )
    .bind(role.id)
    .bind(scope.as_str())
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::storage(
            format!("failed to read back permissions on scope '{scope}'"),
            error,
        )
    })?;

    let scope_index = HashMap::from([(scope.clone(), instance.resource_id().to_owned())]);
    let permission = aggregate_permissions(rows, instance.resource(), &scope_index)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::Internal(format!(
                "managed role '{}' holds no permissions on scope '{scope}' after reconcile",
                role.name
            ))
        })?;

    Ok(Some(permission))
}

/// Serializes writers of the same (role, scope) until the transaction ends.
async fn lock_role_scope(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: i64,
    scope: &str,
) -> AppResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($2, $1))")
        .bind(role_id)
        .bind(scope)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::storage(format!("failed to lock scope '{scope}'"), error)
        })?;

    Ok(())
}

async fn current_actions(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: i64,
    scope: &str,
) -> AppResult<ActionSet> {
    let actions = sqlx::query_scalar::<_, String>(
        r#"
        SELECT action
        FROM managed_permissions
        WHERE role_id = $1
            AND scope = $2
        "#,
    )
    .bind(role_id)
    .bind(scope)
    .fetch_all(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::storage(format!("failed to read permissions on scope '{scope}'"), error)
    })?;

    Ok(ActionSet::from_stored(actions))
}

async fn delete_scope_permissions(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: i64,
    scope: &str,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM managed_permissions
        WHERE role_id = $1
            AND scope = $2
        "#,
    )
    .bind(role_id)
    .bind(scope)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::storage(
            format!("failed to revoke permissions on scope '{scope}'"),
            error,
        )
    })?;

    Ok(result.rows_affected())
}

async fn touch_role(transaction: &mut Transaction<'_, Postgres>, role_id: i64) -> AppResult<()> {
    sqlx::query("UPDATE managed_roles SET updated_at = now() WHERE id = $1")
        .bind(role_id)
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::storage("failed to update managed role", error))?;

    Ok(())
}
