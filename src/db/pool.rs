use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::db::connection::{ConnectParams, Connection, Connector, Lease};
use crate::db::statement::{Record, Statement};
use crate::error::{AppError, Result};

/// A bounded pool of store connections.
///
/// Connections either sit in the idle set or are lent out. Pooled connections
/// (idle plus lent) never exceed `max_size`. When the idle set is empty the
/// caller gets a freshly opened overflow connection; on release it is adopted
/// only if the pool has room, and closed otherwise.
///
/// The idle lock is held only for a pop or a push. Liveness checks and
/// reconnects run on connections already removed from the shared state.
pub struct ConnectionPool<C: Connector> {
    connector: Arc<C>,
    params: Arc<ConnectParams>,
    idle: Mutex<VecDeque<Connection<C>>>,
    lent: Arc<AtomicUsize>,
    max_size: usize,
    shut_down: AtomicBool,
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates an empty pool. Call `prefill` to open the idle connections.
    pub fn new(connector: C, params: ConnectParams, max_size: usize) -> Self {
        Self {
            connector: Arc::new(connector),
            params: Arc::new(params),
            idle: Mutex::new(VecDeque::with_capacity(max_size)),
            lent: Arc::new(AtomicUsize::new(0)),
            max_size,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Creates a pool and pre-populates its idle set.
    pub async fn connect(connector: C, params: ConnectParams, max_size: usize) -> Self {
        let pool = Self::new(connector, params, max_size);
        let opened = pool.prefill().await;
        tracing::info!(
            "✅ Connection pool ready: {}/{} idle connections to {}:{}/{}",
            opened,
            max_size,
            pool.params.host,
            pool.params.port,
            pool.params.database
        );
        pool
    }

    /// Opens connections until the pool is full. Failures are logged and
    /// skipped. Returns the number of connections added.
    pub async fn prefill(&self) -> usize {
        let mut added = 0;
        while self.idle_count() + self.lent_count() < self.max_size {
            let mut conn = self.fresh();
            if let Err(e) = conn.open().await {
                tracing::warn!("Failed to pre-populate pool connection: {}", e);
                break;
            }

            let mut idle = self.idle.lock();
            if idle.len() + self.lent_count() >= self.max_size {
                break;
            }
            idle.push_back(conn);
            added += 1;
        }
        added
    }

    fn fresh(&self) -> Connection<C> {
        Connection::new(Arc::clone(&self.connector), Arc::clone(&self.params))
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Pooled connections currently lent out. Overflow connections are not
    /// counted.
    pub fn lent_count(&self) -> usize {
        self.lent.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Returns a usable connection.
    ///
    /// Pops an idle connection when there is one and repairs it if dead;
    /// otherwise opens an overflow connection. Fails with `PoolExhausted` only
    /// when that fresh open fails.
    pub async fn acquire(&self) -> Result<Connection<C>> {
        if self.is_shut_down() {
            return Err(AppError::PoolExhausted("pool is shut down".to_string()));
        }

        let pooled = {
            let mut idle = self.idle.lock();
            idle.pop_front().map(|mut conn| {
                conn.lease = Some(Lease::new(&self.lent));
                conn
            })
        };

        if let Some(mut conn) = pooled {
            if conn.is_alive().await || conn.reconnect().await {
                return Ok(conn);
            }
            tracing::warn!("Discarding pooled connection that could not be repaired");
            drop(conn);
        }

        let mut conn = self.fresh();
        conn.open().await.map_err(|e| {
            tracing::error!("❌ Failed to open connection: {}", e);
            AppError::PoolExhausted(e.to_string())
        })?;
        tracing::debug!("Opened overflow connection (idle set empty)");
        Ok(conn)
    }

    /// Returns a connection to the pool.
    ///
    /// Dead connections, connections released mid-transaction, and
    /// connections for which the pool has no room are closed instead.
    pub async fn release(&self, mut conn: Connection<C>) {
        drop(conn.lease.take());

        if conn.in_transaction() {
            tracing::warn!("Closing connection released with an open transaction");
            conn.close();
            return;
        }
        if self.is_shut_down() {
            conn.close();
            return;
        }

        if !conn.is_alive().await {
            tracing::debug!("Discarding dead connection on release");
            conn.close();
            return;
        }

        let rejected = {
            let mut idle = self.idle.lock();
            if idle.len() + self.lent_count() < self.max_size {
                idle.push_back(conn);
                None
            } else {
                Some(conn)
            }
        };

        if let Some(mut conn) = rejected {
            tracing::debug!("Pool at capacity, closing overflow connection");
            conn.close();
        }
    }

    /// Closes every idle connection. Connections still lent out are closed
    /// when released. Returns the number closed.
    pub fn shutdown(&self) -> usize {
        self.shut_down.store(true, Ordering::SeqCst);
        let drained: Vec<Connection<C>> = self.idle.lock().drain(..).collect();
        let count = drained.len();
        for mut conn in drained {
            conn.close();
        }
        tracing::info!("Connection pool shut down, {} idle connections closed", count);
        count
    }

    /// Borrows a connection for a single write statement.
    pub async fn execute(&self, statement: &Statement) -> Result<u64> {
        let mut conn = self.acquire().await?;
        let result = conn.execute(statement).await;
        self.release(conn).await;
        result
    }

    /// Borrows a connection for a single read statement.
    pub async fn query(&self, statement: &Statement) -> Result<Vec<Record>> {
        let mut conn = self.acquire().await?;
        let result = conn.query(statement).await;
        self.release(conn).await;
        result
    }

    pub async fn query_opt(&self, statement: &Statement) -> Result<Option<Record>> {
        Ok(self.query(statement).await?.into_iter().next())
    }

    /// Runs a multi-statement script on one borrowed connection.
    pub async fn batch(&self, sql: &str) -> Result<()> {
        let mut conn = self.acquire().await?;
        let result = conn.batch(sql).await;
        self.release(conn).await;
        result
    }
}
