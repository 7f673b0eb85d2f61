//! Shareable handle to the live connection pool

use std::sync::Arc;

use duplex_common::DatabaseDriver;
use parking_lot::Mutex;
use sea_orm::{DatabaseConnection, DbErr};
use tracing::{info, warn};

/// Opaque, cheaply clonable handle to a pooled connection.
///
/// Only the connector constructs handles, and only after a successful ping.
/// Clones share the same pool; [`DatabaseHandle::close`] releases it once for
/// all of them.
#[derive(Clone)]
pub struct DatabaseHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    driver: DatabaseDriver,
    connection: Mutex<Option<DatabaseConnection>>,
}

impl DatabaseHandle {
    pub(crate) fn new(connection: DatabaseConnection, driver: DatabaseDriver) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                driver,
                connection: Mutex::new(Some(connection)),
            }),
        }
    }

    pub fn driver(&self) -> DatabaseDriver {
        self.inner.driver
    }

    /// The pooled connection, or `None` once the handle has been closed.
    pub fn connection(&self) -> Option<DatabaseConnection> {
        self.inner.connection.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.connection.lock().is_none()
    }

    /// Round-trip to the data store.
    pub async fn ping(&self) -> Result<(), DbErr> {
        match self.connection() {
            Some(connection) => connection.ping().await,
            None => Err(DbErr::Custom("database handle is closed".to_string())),
        }
    }

    /// Release the pool. Returns `true` if this call closed it, `false` if it
    /// was already closed.
    pub async fn close(&self) -> bool {
        let connection = self.inner.connection.lock().take();
        match connection {
            Some(connection) => {
                if let Err(e) = connection.close().await {
                    warn!(error = %e, "Error while closing database pool");
                }
                info!(driver = %self.inner.driver, "Database pool closed");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("driver", &self.inner.driver)
            .field("closed", &self.is_closed())
            .finish()
    }
}
