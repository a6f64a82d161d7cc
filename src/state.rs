use std::sync::Arc;

use crate::config::Config;
use crate::db::connection::Connector;
use crate::db::pool::ConnectionPool;
use crate::db::postgres::PgConnector;
use crate::services::sessions::SessionStore;

/// The application's state, cloned into every handler.
///
/// Generic over the store driver; production runs on `PgConnector`.
pub struct AppState<C: Connector = PgConnector> {
    /// The database connection pool.
    pub pool: Arc<ConnectionPool<C>>,
    /// The active login sessions.
    pub sessions: Arc<SessionStore>,
    /// The application's configuration.
    pub config: Arc<Config>,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            sessions: Arc::clone(&self.sessions),
            config: Arc::clone(&self.config),
        }
    }
}

impl AppState {
    /// Creates a new `AppState` and pre-populates the connection pool.
    ///
    /// An unreachable database does not fail startup; requests fail with 500
    /// until connections can be opened.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    pub async fn new(config: &Config) -> Self {
        let pool = ConnectionPool::connect(
            PgConnector,
            config.connect_params(),
            config.db_pool_size,
        )
        .await;
        tracing::info!("✅ PostgreSQL pool initialized (max {})", config.db_pool_size);

        let sessions = SessionStore::new(config.session_inactivity);
        tracing::info!(
            "✅ Session store initialized ({}h inactivity window)",
            config.session_inactivity.num_hours()
        );

        Self::from_parts(config.clone(), pool, sessions)
    }

    /// A state whose pool has no connections yet, for tests and tooling.
    pub fn unconnected(config: Config) -> Self {
        let pool = ConnectionPool::new(PgConnector, config.connect_params(), config.db_pool_size);
        let sessions = SessionStore::new(config.session_inactivity);
        Self::from_parts(config, pool, sessions)
    }
}

impl<C: Connector> AppState<C> {
    /// Assembles a state from already-built parts. Nothing is connected.
    pub fn from_parts(config: Config, pool: ConnectionPool<C>, sessions: SessionStore) -> Self {
        Self {
            pool: Arc::new(pool),
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}
