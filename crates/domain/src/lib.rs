//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action;
mod actor;
mod managed_role;
mod scope;

pub use action::{ActionSet, PermissionDiff};
pub use actor::{ActorKind, ActorRef, BuiltinRole, TeamId, UserId};
pub use managed_role::managed_role_name;
pub use scope::{ResourceInstance, resolve_scope};
