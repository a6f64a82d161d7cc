use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::db::statement::{Record, Statement};
use crate::error::{AppError, Result};

/// Parameters used to open every connection of a pool.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Zeroizing<String>,
    pub database: String,
    /// Bound on opening a connection.
    pub connect_timeout: Duration,
    /// Bound on a single store round-trip.
    pub statement_timeout: Duration,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .finish()
    }
}

/// Driver-level operations on a raw store handle.
///
/// Implementations must not retry: reconnection is decided by `Connection`.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Handle: Send + 'static;

    async fn connect(&self, params: &ConnectParams) -> Result<Self::Handle>;

    /// Cheap liveness check. Returns `false` instead of failing.
    async fn ping(&self, handle: &mut Self::Handle) -> bool;

    async fn execute(&self, handle: &mut Self::Handle, statement: &Statement) -> Result<u64>;

    async fn query(&self, handle: &mut Self::Handle, statement: &Statement)
        -> Result<Vec<Record>>;

    /// Runs unparameterized SQL, possibly several statements.
    async fn batch(&self, handle: &mut Self::Handle, sql: &str) -> Result<()>;

    fn close(&self, handle: Self::Handle) {
        drop(handle);
    }
}

/// Marks a connection as lent out by a pool. Dropping it returns the slot.
pub(crate) struct Lease {
    lent: Arc<AtomicUsize>,
}

impl Lease {
    /// Must be called while the pool's idle lock is held.
    pub(crate) fn new(lent: &Arc<AtomicUsize>) -> Self {
        lent.fetch_add(1, Ordering::SeqCst);
        Self {
            lent: Arc::clone(lent),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.lent.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A single link to the store.
pub struct Connection<C: Connector> {
    connector: Arc<C>,
    params: Arc<ConnectParams>,
    handle: Option<C::Handle>,
    in_transaction: bool,
    pub(crate) lease: Option<Lease>,
}

impl<C: Connector> Connection<C> {
    /// Creates a closed connection bound to `params`.
    pub fn new(connector: Arc<C>, params: Arc<ConnectParams>) -> Self {
        Self {
            connector,
            params,
            handle: None,
            in_transaction: false,
            lease: None,
        }
    }

    /// Establishes the underlying link. An already open link is replaced.
    pub async fn open(&mut self) -> Result<()> {
        self.close();

        let timeout = self.params.connect_timeout;
        let handle = tokio::time::timeout(timeout, self.connector.connect(&self.params))
            .await
            .map_err(|_| {
                AppError::ConnectFailure(format!("connect timed out after {:?}", timeout))
            })??;

        self.handle = Some(handle);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether this connection counts against its pool's size.
    pub fn is_pooled(&self) -> bool {
        self.lease.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Pings the link. Never fails.
    pub async fn is_alive(&mut self) -> bool {
        let timeout = self.params.statement_timeout;
        match self.handle.as_mut() {
            Some(handle) => tokio::time::timeout(timeout, self.connector.ping(handle))
                .await
                .unwrap_or(false),
            None => false,
        }
    }

    /// Closes then reopens the link.
    pub async fn reconnect(&mut self) -> bool {
        self.in_transaction = false;
        match self.open().await {
            Ok(()) => {
                tracing::debug!("Reconnected to {}:{}", self.params.host, self.params.port);
                true
            }
            Err(e) => {
                tracing::warn!("Reconnect failed: {}", e);
                false
            }
        }
    }

    /// Releases the underlying handle. Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.connector.close(handle);
        }
    }

    /// Repairs a dead link with exactly one reconnect attempt.
    ///
    /// A link that dies inside a transaction is not repaired: the work of the
    /// transaction is already lost.
    async fn ensure_live(&mut self) -> Result<()> {
        if self.is_alive().await {
            return Ok(());
        }

        if self.in_transaction {
            self.in_transaction = false;
            return Err(AppError::QueryFailure(
                "connection lost during transaction".to_string(),
            ));
        }

        if !self.reconnect().await {
            return Err(AppError::ConnectFailure(
                "connection is dead and reconnect failed".to_string(),
            ));
        }

        Ok(())
    }

    fn timed_out(&self) -> AppError {
        AppError::QueryFailure(format!(
            "statement timed out after {:?}",
            self.params.statement_timeout
        ))
    }

    /// Runs a write statement and returns the affected row count.
    pub async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        statement.check_arity()?;
        self.ensure_live().await?;

        let timeout = self.params.statement_timeout;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| AppError::ConnectFailure("connection is closed".to_string()))?;

        let outcome =
            tokio::time::timeout(timeout, self.connector.execute(handle, statement)).await;
        outcome.unwrap_or_else(|_| Err(self.timed_out()))
    }

    /// Runs a read statement.
    pub async fn query(&mut self, statement: &Statement) -> Result<Vec<Record>> {
        statement.check_arity()?;
        self.ensure_live().await?;

        let timeout = self.params.statement_timeout;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| AppError::ConnectFailure("connection is closed".to_string()))?;

        let outcome = tokio::time::timeout(timeout, self.connector.query(handle, statement)).await;
        outcome.unwrap_or_else(|_| Err(self.timed_out()))
    }

    /// Runs a read statement expected to return at most one row.
    pub async fn query_opt(&mut self, statement: &Statement) -> Result<Option<Record>> {
        Ok(self.query(statement).await?.into_iter().next())
    }

    /// Runs unparameterized SQL such as schema scripts.
    pub async fn batch(&mut self, sql: &str) -> Result<()> {
        self.ensure_live().await?;

        let timeout = self.params.statement_timeout;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| AppError::ConnectFailure("connection is closed".to_string()))?;

        let outcome = tokio::time::timeout(timeout, self.connector.batch(handle, sql)).await;
        outcome.unwrap_or_else(|_| Err(self.timed_out()))
    }

    pub async fn begin(&mut self) -> Result<()> {
        self.batch("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    /// A failed commit leaves the connection marked as inside a transaction,
    /// so the pool closes it on release.
    pub async fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Same contract as `commit`: the flag only clears once the store has
    /// acknowledged the rollback.
    pub async fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Commits when `result` is `Ok`, rolls back otherwise.
    pub async fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if self.in_transaction {
                    if let Err(rollback_error) = self.rollback().await {
                        tracing::warn!("Rollback failed: {}", rollback_error);
                    }
                }
                Err(e)
            }
        }
    }
}

impl<C: Connector> Drop for Connection<C> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{FakeConnector, params};

    fn connection(connector: &Arc<FakeConnector>) -> Connection<FakeConnector> {
        Connection::new(Arc::clone(connector), Arc::new(params()))
    }

    #[tokio::test]
    async fn open_and_close_are_tracked() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);

        assert!(!conn.is_alive().await);
        conn.open().await.unwrap();
        assert!(conn.is_alive().await);

        conn.close();
        conn.close();
        assert!(!conn.is_open());
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn open_fails_when_store_unreachable() {
        let connector = Arc::new(FakeConnector::default());
        connector.set_reachable(false);
        let mut conn = connection(&connector);

        let err = conn.open().await.unwrap_err();
        assert!(matches!(err, AppError::ConnectFailure(_)));
    }

    #[tokio::test]
    async fn execute_reconnects_a_dead_link_once() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();

        connector.kill_all();
        let affected = conn
            .execute(&Statement::new("UPDATE users SET email = $1").bind("a@b.cn"))
            .await
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(connector.opened(), 2);
    }

    #[tokio::test]
    async fn execute_fails_when_reconnect_fails() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();

        connector.kill_all();
        connector.set_reachable(false);
        let err = conn.query(&Statement::new("SELECT 1")).await.unwrap_err();

        assert!(matches!(err, AppError::ConnectFailure(_)));
    }

    #[tokio::test]
    async fn statement_errors_are_not_retried() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();

        let err = conn.execute(&Statement::new("FAIL")).await.unwrap_err();

        assert!(matches!(err, AppError::QueryFailure(_)));
        assert_eq!(connector.statements(), 1);
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn arity_is_checked_before_any_io() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();

        let err = conn
            .query(&Statement::new("SELECT * FROM users WHERE user_id = $1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QueryFailure(_)));
        assert_eq!(connector.statements(), 0);
    }

    #[tokio::test]
    async fn dead_link_inside_transaction_is_not_repaired() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();
        conn.begin().await.unwrap();

        connector.kill_all();
        let err = conn.execute(&Statement::new("DELETE FROM users")).await.unwrap_err();

        assert!(matches!(err, AppError::QueryFailure(_)));
        assert!(!conn.in_transaction());
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn finish_rolls_back_on_error() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();
        conn.begin().await.unwrap();

        let result: Result<()> = conn
            .finish(Err(AppError::Validation("bad".to_string())))
            .await;

        assert!(result.is_err());
        assert!(!conn.in_transaction());
        assert_eq!(connector.batches(), vec!["BEGIN".to_string(), "ROLLBACK".to_string()]);
    }

    #[tokio::test]
    async fn failed_rollback_keeps_transaction_flag() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();
        conn.begin().await.unwrap();
        connector.fail_batch("ROLLBACK");

        let result: Result<()> = conn
            .finish(Err(AppError::Validation("bad".to_string())))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(conn.in_transaction());
    }

    #[tokio::test]
    async fn failed_commit_keeps_transaction_flag() {
        let connector = Arc::new(FakeConnector::default());
        let mut conn = connection(&connector);
        conn.open().await.unwrap();
        conn.begin().await.unwrap();
        connector.fail_batch("COMMIT");

        let err = conn.finish(Ok(7)).await.unwrap_err();

        assert!(matches!(err, AppError::QueryFailure(_)));
        assert!(conn.in_transaction());
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", params());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("s3cret"));
    }
}
