use chrono::{DateTime, Utc};
use grantry_domain::{ActionSet, ActorRef};
use serde::Serialize;

/// Aggregated grants one actor holds on one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePermission {
    /// Managed role backing the grants.
    pub role_id: i64,
    /// Deterministic managed role name.
    pub role_name: String,
    /// Actor holding the grants.
    pub actor: ActorRef,
    /// Resource kind.
    pub resource: String,
    /// Resource instance identifier.
    pub resource_id: String,
    /// Canonical scope of the instance.
    pub scope: String,
    /// Full granted action set.
    pub actions: ActionSet,
    /// Earliest creation time among the aggregated rows.
    pub created: DateTime<Utc>,
    /// Latest update time among the aggregated rows.
    pub updated: DateTime<Utc>,
}

impl ResourcePermission {
    /// Returns whether every required action is granted.
    #[must_use]
    pub fn grants_all(&self, required: &ActionSet) -> bool {
        self.actions.is_superset(required)
    }
}
