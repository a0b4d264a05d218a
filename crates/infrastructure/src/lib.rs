//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_resource_permission_repository;
mod postgres_resource_permission_repository;

pub use in_memory_resource_permission_repository::InMemoryResourcePermissionRepository;
pub use postgres_resource_permission_repository::PostgresResourcePermissionRepository;
