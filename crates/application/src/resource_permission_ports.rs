mod commands;
mod inputs;
mod repository;
mod view;

pub use commands::{
    ActorPermissionsCommand, GetResourcesPermissionsQuery, SetResourcePermissionsBatchCommand,
    SetResourcePermissionsCommand,
};
pub use inputs::{
    ActorGrant, ResourcePermissionsQuery, SetActorPermissionsInput, SetInstancePermissionsInput,
};
pub use repository::ResourcePermissionRepository;
pub use view::ResourcePermission;
