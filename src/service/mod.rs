//! Issue lifecycle and relationship engine.
//!
//! [`IssueService`] is the only entry point. Each operation takes plain request
//! data, runs against the sea-orm connection it owns, and returns a hydrated
//! [`IssueResponse`](crate::model::IssueResponse) or an [`AppError`].
//! Multi-statement mutations run inside one transaction; an operation future
//! that is dropped or times out rolls its transaction back.

mod duplicate;
mod lifecycle;
mod query;
mod relation;
mod scope;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sea_orm::DatabaseConnection;
use tracing::error;
use crate::configuration::Settings;
use crate::model::AppError;

pub use lifecycle::apply_update;

/// Source of primary keys for new rows.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Time-ordered UUIDv7 ids, so rows sort in creation order by id.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::now_v7().to_string()
    }
}

#[derive(Clone)]
pub struct IssueService {
    db: DatabaseConnection,
    ids: Arc<dyn IdGenerator>,
    operation_timeout: Option<Duration>,
}

impl IssueService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            ids: Arc::new(UuidGenerator),
            operation_timeout: None,
        }
    }

    pub fn from_settings(db: DatabaseConnection, settings: &Settings) -> Self {
        Self::new(db).with_operation_timeout(settings.operation_timeout)
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Bounds every operation; expiry surfaces as [`AppError::DeadlineExceeded`].
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let result = match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(AppError::DeadlineExceeded { operation })),
            None => fut.await,
        };

        if let Err(err @ (AppError::Persistence { .. } | AppError::DeadlineExceeded { .. })) = &result {
            error!(operation, error = %err, "operation failed");
        }
        result
    }
}
