use grantry_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Returns the canonical scope for one resource instance.
///
/// Scopes always take the shape `<resource>:id:<resource_id>`.
#[must_use]
pub fn resolve_scope(resource: &str, resource_id: &str) -> String {
    format!("{resource}:id:{resource_id}")
}

/// A validated resource instance, e.g. datasource `1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceInstance {
    resource: NonEmptyString,
    resource_id: NonEmptyString,
}

impl ResourceInstance {
    /// Creates a resource instance from a resource kind and an instance id.
    pub fn new(resource: impl Into<String>, resource_id: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            resource: NonEmptyString::for_field("resource", resource)?,
            resource_id: NonEmptyString::for_field("resource id", resource_id)?,
        })
    }

    /// Returns the resource kind.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns the instance identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }

    /// Returns the canonical scope of this instance.
    #[must_use]
    pub fn scope(&self) -> String {
        resolve_scope(self.resource(), self.resource_id())
    }
}
