use std::collections::{BTreeSet, HashMap};

use grantry_core::{AppError, AppResult, NonEmptyString};
use grantry_domain::{ActionSet, ActorRef, ResourceInstance, resolve_scope};

use super::commands::{
    GetResourcesPermissionsQuery, SetResourcePermissionsBatchCommand,
    SetResourcePermissionsCommand,
};

/// Validated single-actor reconciliation request handed to repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetActorPermissionsInput {
    /// Actor whose grants are reconciled.
    pub actor: ActorRef,
    /// Target resource instance.
    pub instance: ResourceInstance,
    /// Desired deduplicated actions.
    pub actions: ActionSet,
}

impl SetActorPermissionsInput {
    /// Validates a caller command for one actor.
    pub fn from_command(
        actor: ActorRef,
        command: SetResourcePermissionsCommand,
    ) -> AppResult<Self> {
        Ok(Self {
            actor,
            instance: ResourceInstance::new(command.resource, command.resource_id)?,
            actions: ActionSet::new(command.actions)?,
        })
    }
}

/// Desired actions of one actor within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorGrant {
    /// Actor receiving the grants.
    pub actor: ActorRef,
    /// Desired deduplicated actions.
    pub actions: ActionSet,
}

/// Validated multi-actor reconciliation request for one resource instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetInstancePermissionsInput {
    /// Target resource instance.
    pub instance: ResourceInstance,
    /// Grants with unique actors.
    pub grants: Vec<ActorGrant>,
}

impl SetInstancePermissionsInput {
    /// Validates a batch command, rejecting repeated actors.
    pub fn from_command(command: SetResourcePermissionsBatchCommand) -> AppResult<Self> {
        let instance = ResourceInstance::new(command.resource, command.resource_id)?;
        let mut seen = BTreeSet::new();
        let mut grants = Vec::with_capacity(command.grants.len());

        for grant in command.grants {
            if !seen.insert(grant.actor) {
                return Err(AppError::Validation(format!(
                    "actor '{}' appears more than once for scope '{}'",
                    grant.actor,
                    instance.scope()
                )));
            }

            grants.push(ActorGrant {
                actor: grant.actor,
                actions: ActionSet::new(grant.actions)?,
            });
        }

        Ok(Self { instance, grants })
    }
}

/// Validated bulk lookup handed to repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePermissionsQuery {
    resource: NonEmptyString,
    resource_ids: Vec<NonEmptyString>,
    actions: ActionSet,
}

impl ResourcePermissionsQuery {
    /// Validates a caller query. Repeated resource ids collapse into one.
    pub fn from_query(query: GetResourcesPermissionsQuery) -> AppResult<Self> {
        let resource = NonEmptyString::for_field("resource", query.resource)?;
        let mut seen = BTreeSet::new();
        let mut resource_ids = Vec::with_capacity(query.resource_ids.len());

        for resource_id in query.resource_ids {
            let resource_id = NonEmptyString::for_field("resource id", resource_id)?;
            if seen.insert(resource_id.clone()) {
                resource_ids.push(resource_id);
            }
        }

        Ok(Self {
            resource,
            resource_ids,
            actions: ActionSet::new(query.actions)?,
        })
    }

    /// Returns the resource kind.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the requested instance ids.
    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.resource_ids.iter().map(NonEmptyString::as_str)
    }

    /// Returns the required action filter.
    #[must_use]
    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Returns whether the query targets no instance at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_ids.is_empty()
    }

    /// Maps each requested scope back to the resource id that produced it.
    #[must_use]
    pub fn scope_index(&self) -> HashMap<String, String> {
        self.resource_ids()
            .map(|resource_id| {
                (
                    resolve_scope(self.resource(), resource_id),
                    resource_id.to_owned(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use grantry_core::AppError;
    use grantry_domain::{ActorRef, BuiltinRole};

    use super::{ResourcePermissionsQuery, SetInstancePermissionsInput};
    use crate::resource_permission_ports::{
        ActorPermissionsCommand, GetResourcesPermissionsQuery, SetResourcePermissionsBatchCommand,
    };

    #[test]
    fn query_collapses_repeated_ids_and_indexes_scopes() {
        let query = ResourcePermissionsQuery::from_query(GetResourcesPermissionsQuery {
            actions: Vec::new(),
            resource: "datasources".to_owned(),
            resource_ids: vec!["1".to_owned(), "2".to_owned(), "1".to_owned()],
        });
        assert!(query.is_ok());
        let index = query.map(|query| query.scope_index()).unwrap_or_default();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("datasources:id:2").map(String::as_str), Some("2"));
    }

    #[test]
    fn query_rejects_blank_resource_ids() {
        let query = ResourcePermissionsQuery::from_query(GetResourcesPermissionsQuery {
            actions: Vec::new(),
            resource: "datasources".to_owned(),
            resource_ids: vec!["1".to_owned(), String::new()],
        });
        assert!(matches!(query, Err(AppError::Validation(_))));
    }

    #[test]
    fn batch_command_rejects_non_positive_actor_ids_when_decoded() {
        for actor in [r#"{"kind":"user","id":-3}"#, r#"{"kind":"team","id":0}"#] {
            let json = format!(
                r#"{{"resource":"datasources","resource_id":"1","grants":[{{"actor":{actor},"actions":["datasources:query"]}}]}}"#
            );
            let command = serde_json::from_str::<SetResourcePermissionsBatchCommand>(&json);
            assert!(command.is_err_and(|error| error.to_string().contains("must be positive")));
        }

        let valid = serde_json::from_str::<SetResourcePermissionsBatchCommand>(
            r#"{"resource":"datasources","resource_id":"1","grants":[{"actor":{"kind":"user","id":3},"actions":["datasources:query"]}]}"#,
        );
        assert!(valid.is_ok());
        let input = valid.map_err(|_| ()).and_then(|command| {
            SetInstancePermissionsInput::from_command(command).map_err(|_| ())
        });
        assert!(input.is_ok());
    }

    #[test]
    fn batch_rejects_repeated_actor() {
        let actor = ActorRef::BuiltinRole(BuiltinRole::Viewer);
        let input = SetInstancePermissionsInput::from_command(SetResourcePermissionsBatchCommand {
            resource: "datasources".to_owned(),
            resource_id: "1".to_owned(),
            grants: vec![
                ActorPermissionsCommand {
                    actor,
                    actions: vec!["datasources:query".to_owned()],
                },
                ActorPermissionsCommand {
                    actor,
                    actions: Vec::new(),
                },
            ],
        });
        assert!(matches!(input, Err(AppError::Validation(_))));
    }
}
