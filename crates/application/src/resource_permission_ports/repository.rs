use async_trait::async_trait;

use grantry_core::{AppResult, OrgId};

use super::inputs::{
    ResourcePermissionsQuery, SetActorPermissionsInput, SetInstancePermissionsInput,
};
use super::view::ResourcePermission;

/// Repository port for resource-level grants anchored on managed roles.
///
/// Implementations apply every write atomically: either all row changes of a call become
/// visible or none do.
#[async_trait]
pub trait ResourcePermissionRepository: Send + Sync {
    /// Reconciles one actor's grants on one instance to the desired action set.
    ///
    /// Returns `None` when the desired set is empty and the grants were revoked.
    async fn set_actor_permissions(
        &self,
        org_id: OrgId,
        input: SetActorPermissionsInput,
    ) -> AppResult<Option<ResourcePermission>>;

    /// Reconciles several actors' grants on one instance in a single transaction.
    ///
    /// Returns the aggregates of every actor that still holds grants.
    async fn set_instance_permissions(
        &self,
        org_id: OrgId,
        input: SetInstancePermissionsInput,
    ) -> AppResult<Vec<ResourcePermission>>;

    /// Lists grants of every actor kind on the requested instances.
    async fn list_resources_permissions(
        &self,
        org_id: OrgId,
        query: ResourcePermissionsQuery,
    ) -> AppResult<Vec<ResourcePermission>>;
}
