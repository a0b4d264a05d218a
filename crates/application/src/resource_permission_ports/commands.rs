use grantry_domain::ActorRef;
use serde::Deserialize;

/// Declares the complete set of actions one actor should hold on a resource instance.
///
/// An empty `actions` list revokes every grant the actor holds on the instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetResourcePermissionsCommand {
    /// Desired actions; duplicates are ignored.
    pub actions: Vec<String>,
    /// Resource kind, e.g. `datasources`.
    pub resource: String,
    /// Resource instance identifier.
    pub resource_id: String,
}

/// Desired actions for one actor inside a batch command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActorPermissionsCommand {
    /// Actor receiving the grants.
    pub actor: ActorRef,
    /// Desired actions; empty revokes.
    pub actions: Vec<String>,
}

/// Declares desired actions for several actors on one resource instance at once.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SetResourcePermissionsBatchCommand {
    /// Resource kind.
    pub resource: String,
    /// Resource instance identifier.
    pub resource_id: String,
    /// Per-actor desired actions. Each actor may appear once.
    pub grants: Vec<ActorPermissionsCommand>,
}

/// Bulk lookup of grants across many instances of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct GetResourcesPermissionsQuery {
    /// Required actions; when non-empty only grants holding all of them are returned.
    pub actions: Vec<String>,
    /// Resource kind.
    pub resource: String,
    /// Resource instance identifiers.
    pub resource_ids: Vec<String>,
}
