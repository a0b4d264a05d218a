use std::str::FromStr;

use grantry_domain::{ActorRef, BuiltinRole, TeamId, UserId};

use crate::resource_permission_ports::{
    ResourcePermission, SetActorPermissionsInput, SetInstancePermissionsInput,
    SetResourcePermissionsBatchCommand, SetResourcePermissionsCommand,
};

use super::*;

impl ResourcePermissionService {
    /// Declares the actions a user holds on one resource instance.
    ///
    /// Returns `None` when the command revokes every grant.
    pub async fn set_user_resource_permissions(
        &self,
        org_id: OrgId,
        user_id: UserId,
        command: SetResourcePermissionsCommand,
    ) -> AppResult<Option<ResourcePermission>> {
        self.set_actor_resource_permissions(org_id, ActorRef::User(user_id), command)
            .await
    }

    /// Declares the actions a team holds on one resource instance.
    pub async fn set_team_resource_permissions(
        &self,
        org_id: OrgId,
        team_id: TeamId,
        command: SetResourcePermissionsCommand,
    ) -> AppResult<Option<ResourcePermission>> {
        self.set_actor_resource_permissions(org_id, ActorRef::Team(team_id), command)
            .await
    }

    /// Declares the actions a builtin role holds on one resource instance.
    ///
    /// `builtin_role` must be a known role name such as `Viewer`.
    pub async fn set_builtin_resource_permissions(
        &self,
        org_id: OrgId,
        builtin_role: &str,
        command: SetResourcePermissionsCommand,
    ) -> AppResult<Option<ResourcePermission>> {
        let role = BuiltinRole::from_str(builtin_role)?;
        self.set_actor_resource_permissions(org_id, ActorRef::BuiltinRole(role), command)
            .await
    }

    /// Declares the actions any actor holds on one resource instance.
    pub async fn set_actor_resource_permissions(
        &self,
        org_id: OrgId,
        actor: ActorRef,
        command: SetResourcePermissionsCommand,
    ) -> AppResult<Option<ResourcePermission>> {
        let input = SetActorPermissionsInput::from_command(actor, command)?;

        self.with_deadline(
            "set resource permissions",
            org_id,
            self.repository.set_actor_permissions(org_id, input),
        )
        .await
    }

    /// Declares the actions of several actors on one resource instance atomically.
    ///
    /// Actors whose desired set is empty lose their grants and are absent from
    /// the result.
    pub async fn set_resource_permissions(
        &self,
        org_id: OrgId,
        command: SetResourcePermissionsBatchCommand,
    ) -> AppResult<Vec<ResourcePermission>> {
        let input = SetInstancePermissionsInput::from_command(command)?;
        if input.grants.is_empty() {
            return Ok(Vec::new());
        }

        self.with_deadline(
            "set resource permissions batch",
            org_id,
            self.repository.set_instance_permissions(org_id, input),
        )
        .await
    }
}
