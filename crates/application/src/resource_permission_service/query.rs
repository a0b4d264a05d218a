use crate::resource_permission_ports::{
    GetResourcesPermissionsQuery, ResourcePermission, ResourcePermissionsQuery,
};

use super::*;

impl ResourcePermissionService {
    /// Lists the grants of every actor on the requested resource instances.
    ///
    /// Result order is unspecified.
    pub async fn get_resources_permissions(
        &self,
        org_id: OrgId,
        query: GetResourcesPermissionsQuery,
    ) -> AppResult<Vec<ResourcePermission>> {
        let query = ResourcePermissionsQuery::from_query(query)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.with_deadline(
            "get resources permissions",
            org_id,
            self.repository.list_resources_permissions(org_id, query),
        )
        .await
    }

    /// Lists the grants of every actor on a single resource instance.
    pub async fn get_resource_permissions(
        &self,
        org_id: OrgId,
        resource: &str,
        resource_id: &str,
    ) -> AppResult<Vec<ResourcePermission>> {
        self.get_resources_permissions(
            org_id,
            GetResourcesPermissionsQuery {
                actions: Vec::new(),
                resource: resource.to_owned(),
                resource_ids: vec![resource_id.to_owned()],
            },
        )
        .await
    }
}
