//! Scripted in-memory store for driving handlers end to end.
#![allow(dead_code)]

use async_trait::async_trait;
use hospital_records::{
    db::{
        connection::{ConnectParams, Connector},
        statement::{Record, SqlValue, Statement},
    },
    error::{AppError, Result},
};
use parking_lot::Mutex;
use std::sync::Arc;

enum Outcome {
    Rows(Vec<Record>),
    Fail,
}

#[derive(Default)]
struct Script {
    rules: Vec<(String, Outcome)>,
    statements: Vec<String>,
    batches: Vec<String>,
}

/// Answers each statement with the first rule whose fragment occurs in its
/// SQL. Unmatched queries return no rows; unmatched writes affect one row.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn on(&self, fragment: &str, rows: Vec<Record>) -> &Self {
        let rule = (fragment.to_string(), Outcome::Rows(rows));
        self.script.lock().rules.push(rule);
        self
    }

    pub fn fail_on(&self, fragment: &str) -> &Self {
        self.script.lock().rules.push((fragment.to_string(), Outcome::Fail));
        self
    }

    /// Statements whose SQL contains `fragment`.
    pub fn ran(&self, fragment: &str) -> usize {
        let script = self.script.lock();
        script.statements.iter().filter(|sql| sql.contains(fragment)).count()
    }

    pub fn batches(&self) -> Vec<String> {
        self.script.lock().batches.clone()
    }

    fn answer(&self, statement: &Statement) -> Result<Vec<Record>> {
        let mut script = self.script.lock();
        script.statements.push(statement.sql().to_string());
        let rule = script
            .rules
            .iter()
            .find(|(fragment, _)| statement.sql().contains(fragment.as_str()));
        match rule {
            Some((_, Outcome::Rows(rows))) => Ok(rows.clone()),
            Some((fragment, Outcome::Fail)) => Err(AppError::QueryFailure(format!(
                "scripted failure on {}",
                fragment
            ))),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Handle = ();

    async fn connect(&self, _params: &ConnectParams) -> Result<()> {
        Ok(())
    }

    async fn ping(&self, _handle: &mut ()) -> bool {
        true
    }

    async fn execute(&self, _handle: &mut (), statement: &Statement) -> Result<u64> {
        let rows = self.answer(statement)?;
        Ok(rows.len().max(1) as u64)
    }

    async fn query(&self, _handle: &mut (), statement: &Statement) -> Result<Vec<Record>> {
        self.answer(statement)
    }

    async fn batch(&self, _handle: &mut (), sql: &str) -> Result<()> {
        self.script.lock().batches.push(sql.to_string());
        Ok(())
    }
}

/// Builds one row from `(column, value)` pairs.
pub fn row(columns: &[(&str, SqlValue)]) -> Record {
    Record::new(
        columns
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    )
}

pub fn text(value: &str) -> SqlValue {
    SqlValue::Text(value.to_string())
}
