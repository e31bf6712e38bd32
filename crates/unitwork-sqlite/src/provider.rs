//! The SQLite [`SessionProvider`].

use std::sync::Arc;

use unitwork::{BackendError, ConfigError, OptionMap, Session, SessionProvider};

use crate::pool::{create_pool, DbPool};
use crate::session::SqliteSession;
use crate::settings::{SqliteProviderSettings, SqliteSessionSettings};

/// Manufactures [`SqliteSession`]s out of a connection pool.
///
/// Immutable after construction and shared read-only by every scope.
#[derive(Debug)]
pub struct SqliteProvider {
    pool: DbPool,
}

impl SqliteProvider {
    /// Opens `target` and builds the provider, validating `options` against
    /// the provider's fixed vocabulary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] / [`ConfigError::InvalidOptions`]
    /// for a bad option map, or [`ConfigError::Provider`] when the pool
    /// cannot be created.
    pub fn connect(target: &str, options: &OptionMap) -> Result<Arc<Self>, ConfigError> {
        let settings = SqliteProviderSettings::from_options(options)?;
        let pool = create_pool(target, &settings)
            .map_err(|error| ConfigError::Provider(Box::new(error)))?;
        tracing::debug!(
            db = target,
            pool_max_size = settings.pool_max_size,
            wal = settings.wal,
            "sqlite session provider ready"
        );
        Ok(Arc::new(Self { pool }))
    }

    /// Wraps an existing pool, e.g. one shared with schema bootstrap code.
    pub fn from_pool(pool: DbPool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// A connector suitable for
    /// [`SessionManagerBuilder::build_with`](unitwork::SessionManagerBuilder::build_with).
    pub fn connector(
    ) -> impl FnOnce(&str, &OptionMap) -> Result<Arc<dyn SessionProvider>, ConfigError> {
        |target, options| {
            let provider: Arc<dyn SessionProvider> = Self::connect(target, options)?;
            Ok(provider)
        }
    }
}

impl SessionProvider for SqliteProvider {
    fn new_session(&self, options: &OptionMap) -> Result<Box<dyn Session>, BackendError> {
        let settings = SqliteSessionSettings::from_options(options)?;
        let conn = self.pool.get()?;
        let session = SqliteSession::begin(conn, settings)?;
        Ok(Box::new(session))
    }

    fn validate_session_options(&self, options: &OptionMap) -> Result<(), ConfigError> {
        SqliteSessionSettings::from_options(options).map(|_| ())
    }
}
