use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use grantry_application::{
    ResourcePermission, ResourcePermissionRepository, ResourcePermissionsQuery,
    SetActorPermissionsInput, SetInstancePermissionsInput,
};
use grantry_core::{AppResult, OrgId};
use grantry_domain::{ActionSet, ActorRef, PermissionDiff, ResourceInstance, managed_role_name};


#[derive(Debug, Clone)]
struct StoredRole {
    org_id: OrgId,
    name: String,
    actor: ActorRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredPermission {
    id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

type PermissionKey = (i64, String, String);

#[derive(Debug, Default)]
struct InMemoryState {
    next_role_id: i64,
    next_permission_id: i64,
    roles: HashMap<i64, StoredRole>,
    bindings: HashMap<(OrgId, ActorRef, String), i64>,
    permissions: BTreeMap<PermissionKey, StoredPermission>,
}

/// In-memory resource permission repository.
///
/// Every call holds one lock for its whole duration, which gives each write the
/// same all-or-nothing visibility as a database transaction.
#[derive(Debug, Default)]
pub struct InMemoryResourcePermissionRepository {
    state: Mutex<InMemoryState>,
}

impl InMemoryResourcePermissionRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InMemoryState {
    fn ensure_role(&mut self, org_id: OrgId, actor: ActorRef, resource: &str) -> i64 {
        let key = (org_id, actor, resource.to_owned());
        if let Some(role_id) = self.bindings.get(&key) {
            return *role_id;
        }

        self.next_role_id += 1;
        let role_id = self.next_role_id;
        self.roles.insert(
            role_id,
            StoredRole {
                org_id,
                name: managed_role_name(&actor, resource),
                actor,
            },
        );
        self.bindings.insert(key, role_id);
        role_id
    }

    fn actions_on(&self, role_id: i64, scope: &str) -> ActionSet {
        self.permissions
            .keys()
            .filter(|(stored_role_id, stored_scope, _)| {
                *stored_role_id == role_id && stored_scope == scope
            })
            .map(|(_, _, action)| action.clone())
            .collect()
    }

    fn reconcile(
        &mut self,
        org_id: OrgId,
        actor: ActorRef,
        instance: &ResourceInstance,
        desired: &ActionSet,
    ) -> Option<ResourcePermission> {
        let scope = instance.scope();
        let role_id = self.ensure_role(org_id, actor, instance.resource());
        let diff = PermissionDiff::between(&self.actions_on(role_id, scope.as_str()), desired);

        for action in diff.to_remove {
            self.permissions.remove(&(role_id, scope.clone(), action));
        }

        let now = Utc::now();
        for action in diff.to_add {
            self.next_permission_id += 1;
            self.permissions.insert(
                (role_id, scope.clone(), action),
                StoredPermission {
                    id: self.next_permission_id,
                    created_at: now,
                    updated_at: now,
                },
            );
        }

        self.aggregate(role_id, scope.as_str(), instance.resource(), instance.resource_id())
    }

    fn aggregate(
        &self,
        role_id: i64,
        scope: &str,
        resource: &str,
        resource_id: &str,
    ) -> Option<ResourcePermission> {
        let role = self.roles.get(&role_id)?;
        let mut rows = self
            .permissions
            .iter()
            .filter(|((stored_role_id, stored_scope, _), _)| {
                *stored_role_id == role_id && stored_scope == scope
            })
            .peekable();
        let (_, first) = rows.peek()?;
        let mut created = first.created_at;
        let mut updated = first.updated_at;
        let mut actions = ActionSet::default();

        for ((_, _, action), stored) in rows {
            actions.insert(action.clone());
            created = created.min(stored.created_at);
            updated = updated.max(stored.updated_at);
        }

        Some(ResourcePermission {
            role_id,
            role_name: role.name.clone(),
            actor: role.actor,
            resource: resource.to_owned(),
            resource_id: resource_id.to_owned(),
            scope: scope.to_owned(),
            actions,
            created,
            updated,
        })
    }
}

#[async_trait]
impl ResourcePermissionRepository for InMemoryResourcePermissionRepository {
    async fn set_actor_permissions(
        &self,
        org_id: OrgId,
        input: SetActorPermissionsInput,
    ) -> AppResult<Option<ResourcePermission>> {
        let mut state = self.state.lock().await;
        Ok(state.reconcile(org_id, input.actor, &input.instance, &input.actions))
    }

    async fn set_instance_permissions(
        &self,
        org_id: OrgId,
        input: SetInstancePermissionsInput,
    ) -> AppResult<Vec<ResourcePermission>> {
        let mut state = self.state.lock().await;

        Ok(input
            .grants
            .iter()
            .filter_map(|grant| {
                state.reconcile(org_id, grant.actor, &input.instance, &grant.actions)
            })
            .collect())
    }

    async fn list_resources_permissions(
        &self,
        org_id: OrgId,
        query: ResourcePermissionsQuery,
    ) -> AppResult<Vec<ResourcePermission>> {
        let state = self.state.lock().await;
        let scope_index = query.scope_index();

        let mut permissions = Vec::new();
        for (role_id, role) in &state.roles {
            if role.org_id != org_id {
                continue;
            }

            for (scope, resource_id) in &scope_index {
                if let Some(permission) = state.aggregate(
                    *role_id,
                    scope.as_str(),
                    query.resource(),
                    resource_id.as_str(),
                ) && permission.grants_all(query.actions())
                {
                    permissions.push(permission);
                }
            }
        }

        Ok(permissions)
    }
}
