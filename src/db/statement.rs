use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{AppError, Result};

/// A value bound to a statement placeholder or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A parameterized statement.
///
/// Untrusted input only ever travels in `params`; the SQL text uses
/// positional `$n` placeholders.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds the next positional parameter.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// The highest `$n` placeholder referenced by the SQL text.
    pub fn placeholder_count(&self) -> usize {
        let bytes = self.sql.as_bytes();
        let mut highest = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                if end > start {
                    if let Ok(n) = self.sql[start..end].parse::<usize>() {
                        highest = highest.max(n);
                    }
                }
                i = end.max(start);
            } else {
                i += 1;
            }
        }
        highest
    }

    /// Fails when the bound parameters do not match the placeholders.
    pub fn check_arity(&self) -> Result<()> {
        let expected = self.placeholder_count();
        if expected != self.params.len() {
            return Err(AppError::QueryFailure(format!(
                "statement expects {} parameters, {} bound",
                expected,
                self.params.len()
            )));
        }
        Ok(())
    }
}

/// One result row: column name to value, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn value(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    fn required(&self, name: &str) -> Result<&SqlValue> {
        self.value(name)
            .ok_or_else(|| AppError::MissingData(name.to_string()))
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.required(name)? {
            SqlValue::Int(v) => Ok(*v),
            _ => Err(AppError::MissingData(name.to_string())),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64> {
        match self.required(name)? {
            SqlValue::Float(v) => Ok(*v),
            SqlValue::Int(v) => Ok(*v as f64),
            _ => Err(AppError::MissingData(name.to_string())),
        }
    }

    /// Reads a textual column. Dates and timestamps are rendered as
    /// `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS`.
    pub fn text(&self, name: &str) -> Result<String> {
        self.opt_text(name)?
            .ok_or_else(|| AppError::MissingData(name.to_string()))
    }

    pub fn opt_text(&self, name: &str) -> Result<Option<String>> {
        match self.required(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(v) => Ok(Some(v.clone())),
            SqlValue::Date(v) => Ok(Some(v.format("%Y-%m-%d").to_string())),
            SqlValue::Timestamp(v) => Ok(Some(v.format("%Y-%m-%d %H:%M:%S").to_string())),
            _ => Err(AppError::MissingData(name.to_string())),
        }
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate> {
        match self.required(name)? {
            SqlValue::Date(v) => Ok(*v),
            SqlValue::Timestamp(v) => Ok(v.date()),
            _ => Err(AppError::MissingData(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_highest_placeholder() {
        let st = Statement::new("SELECT * FROM users WHERE username = $1 OR email = $2 OR id = $1");
        assert_eq!(st.placeholder_count(), 2);
        assert_eq!(Statement::new("SELECT 1").placeholder_count(), 0);
        assert_eq!(Statement::new("SELECT '$' || $10").placeholder_count(), 10);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let st = Statement::new("SELECT * FROM users WHERE user_id = $1");
        assert!(st.check_arity().is_err());
        assert!(st.bind(7_i64).check_arity().is_ok());
    }

    #[test]
    fn optional_binds_become_null() {
        let st = Statement::new("UPDATE users SET email = $1")
            .bind(None::<String>);
        assert_eq!(st.params(), &[SqlValue::Null]);
    }

    #[test]
    fn record_accessors_report_missing_columns() {
        let date = NaiveDate::from_ymd_opt(1990, 4, 2).unwrap();
        let record = Record::new(vec![
            ("user_id".to_string(), SqlValue::Int(42)),
            ("email".to_string(), SqlValue::Null),
            ("birth_date".to_string(), SqlValue::Date(date)),
        ]);

        assert_eq!(record.int("user_id").unwrap(), 42);
        assert_eq!(record.opt_text("email").unwrap(), None);
        assert_eq!(record.text("birth_date").unwrap(), "1990-04-02");
        assert_eq!(record.date("birth_date").unwrap(), date);
        assert!(matches!(record.int("missing"), Err(AppError::MissingData(_))));
        assert!(matches!(record.text("email"), Err(AppError::MissingData(_))));
    }
}
