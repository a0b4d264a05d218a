use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use grantry_core::{AppError, AppResult, OrgId};

use crate::resource_permission_ports::ResourcePermissionRepository;

mod query;
mod set;


/// Application service exposing resource permission management to callers.
///
/// Commands are validated before any storage access. The service keeps no
/// permission state of its own, so callers caching grants must invalidate
/// them after every set call.
#[derive(Clone)]
pub struct ResourcePermissionService {
    repository: Arc<dyn ResourcePermissionRepository>,
    operation_timeout: Option<Duration>,
}

impl ResourcePermissionService {
    /// Creates a new service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn ResourcePermissionRepository>) -> Self {
        Self {
            repository,
            operation_timeout: None,
        }
    }

    /// Bounds every storage call by a deadline.
    ///
    /// A call that misses the deadline is dropped, which rolls back its
    /// transaction.
    #[must_use]
    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = Some(operation_timeout);
        self
    }

    async fn with_deadline<T, F>(&self, operation: &str, org_id: OrgId, future: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let Some(limit) = self.operation_timeout else {
            return future.await;
        };

        tokio::time::timeout(limit, future).await.map_err(|_| {
            AppError::Internal(format!(
                "{operation} timed out after {}ms in organization '{org_id}'",
                limit.as_millis()
            ))
        })?
    }
}
