use super::*;

impl PostgresResourcePermissionRepository {
    pub(super) async fn list_resources_permissions_impl(
        &self,
        org_id: OrgId,
        query: ResourcePermissionsQuery,
    ) -> AppResult<Vec<ResourcePermission>> {
        let scope_index = query.scope_index();
        if scope_index.is_empty() {
            return Ok(Vec::new());
        }
        let scopes: Vec<String> = scope_index.keys().cloned().collect();

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
            WHERE roles.org_id = $1
                AND permissions.scope = ANY($2)
            ORDER BY permissions.role_id, permissions.scope, permissions.action
            "#,
        )
        .bind(org_id.as_i64())
        .bind(scopes.as_slice())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::storage(
                format!(
                    "failed to list '{}' permissions in organization '{org_id}'",
                    query.resource()
                ),
                error,
            )
        })?;

        let permissions = aggregate_permissions(rows, query.resource(), &scope_index)?;

        Ok(permissions
            .into_iter()
            .filter(|permission| permission.grants_all(query.actions()))
            .collect())
    }
}
