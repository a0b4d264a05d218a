//! Application services and ports.

#![forbid(unsafe_code)]

mod resource_permission_ports;
mod resource_permission_service;

pub use resource_permission_ports::{
    ActorGrant, ActorPermissionsCommand, GetResourcesPermissionsQuery, ResourcePermission,
    ResourcePermissionRepository, ResourcePermissionsQuery, SetActorPermissionsInput,
    SetInstancePermissionsInput, SetResourcePermissionsBatchCommand,
    SetResourcePermissionsCommand,
};
pub use resource_permission_service::ResourcePermissionService;
