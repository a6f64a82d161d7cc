//! In-memory `Connector` used by the pool and connection tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::db::connection::{ConnectParams, Connector};
use crate::db::statement::{Record, SqlValue, Statement};
use crate::error::{AppError, Result};

pub fn params() -> ConnectParams {
    ConnectParams {
        host: "db.internal".to_string(),
        port: 5432,
        user: "hospital".to_string(),
        password: Zeroizing::new("s3cret".to_string()),
        database: "hospital_db".to_string(),
        connect_timeout: Duration::from_secs(1),
        statement_timeout: Duration::from_secs(1),
    }
}

#[derive(Default)]
struct FakeState {
    unreachable: bool,
    generation: u64,
    opened: usize,
    closed: usize,
    live: usize,
    peak_live: usize,
    statements: usize,
    batches: Vec<String>,
    failing_batch: Option<String>,
}

/// Handles die when `kill_all` bumps the generation they were opened in.
pub struct FakeHandle {
    generation: u64,
}

#[derive(Default)]
pub struct FakeConnector {
    state: Mutex<FakeState>,
}

impl FakeConnector {
    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unreachable = !reachable;
    }

    /// Silently kills every handle opened so far.
    pub fn kill_all(&self) {
        self.state.lock().generation += 1;
    }

    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.state.lock().closed
    }

    pub fn live(&self) -> usize {
        self.state.lock().live
    }

    pub fn peak_live(&self) -> usize {
        self.state.lock().peak_live
    }

    pub fn statements(&self) -> usize {
        self.state.lock().statements
    }

    /// Makes every later batch with exactly this SQL fail.
    pub fn fail_batch(&self, sql: &str) {
        self.state.lock().failing_batch = Some(sql.to_string());
    }

    pub fn batches(&self) -> Vec<String> {
        self.state.lock().batches.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Handle = FakeHandle;

    async fn connect(&self, _params: &ConnectParams) -> Result<FakeHandle> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(AppError::ConnectFailure("connection refused".to_string()));
        }
        state.opened += 1;
        state.live += 1;
        state.peak_live = state.peak_live.max(state.live);
        Ok(FakeHandle {
            generation: state.generation,
        })
    }

    async fn ping(&self, handle: &mut FakeHandle) -> bool {
        handle.generation == self.state.lock().generation
    }

    async fn execute(&self, _handle: &mut FakeHandle, statement: &Statement) -> Result<u64> {
        self.state.lock().statements += 1;
        if statement.sql().starts_with("FAIL") {
            return Err(AppError::QueryFailure("syntax error".to_string()));
        }
        Ok(1)
    }

    async fn query(&self, _handle: &mut FakeHandle, statement: &Statement) -> Result<Vec<Record>> {
        self.state.lock().statements += 1;
        if statement.sql().starts_with("FAIL") {
            return Err(AppError::QueryFailure("syntax error".to_string()));
        }
        Ok(vec![Record::new(vec![(
            "n".to_string(),
            SqlValue::Int(statement.params().len() as i64),
        )])])
    }

    async fn batch(&self, _handle: &mut FakeHandle, sql: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.batches.push(sql.to_string());
        if state.failing_batch.as_deref() == Some(sql) {
            return Err(AppError::QueryFailure("server closed the connection".to_string()));
        }
        Ok(())
    }

    fn close(&self, _handle: FakeHandle) {
        let mut state = self.state.lock();
        state.closed += 1;
        state.live -= 1;
    }
}
