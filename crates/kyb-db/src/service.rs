//! Service layer hosting every repository method.
//!
//! `KybService` wraps `KybDb`. All repo methods are implemented as
//! `impl KybService` blocks in `repos/`.

use kyb_config::DatabaseConfig;

use crate::KybDb;
use crate::error::DatabaseError;

pub struct KybService {
    db: KybDb,
}

impl KybService {
    /// Create a service over a local database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: KybDb::open_local(db_path).await?,
        })
    }

    /// Open the database the configuration points at: remote when a URL and
    /// token are set, otherwise the local path.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db = if config.is_remote() {
            tracing::info!(url = %config.url, "opening remote database");
            KybDb::open_remote(&config.url, &config.auth_token).await?
        } else {
            tracing::debug!(path = %config.path, "opening local database");
            KybDb::open_local(&config.path).await?
        };
        Ok(Self { db })
    }

    #[must_use]
    pub const fn from_db(db: KybDb) -> Self {
        Self { db }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &KybDb {
        &self.db
    }
}
