use crate::ActorRef;

// Prefix shared by every system-managed role name.
const MANAGED_ROLE_PREFIX: &str = "managed";

/// Returns the deterministic name of the role anchoring an actor's grants on a resource kind.
#[must_use]
pub fn managed_role_name(actor: &ActorRef, resource: &str) -> String {
    format!(
        "{MANAGED_ROLE_PREFIX}:{}:{}:{resource}",
        actor.kind().plural(),
        actor.name_segment()
    )
}
