use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres_types::{IsNull, ToSql, Type, to_sql_checked};
use tokio::task::JoinHandle;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};

use crate::db::connection::{ConnectParams, Connector};
use crate::db::statement::{Record, SqlValue, Statement};
use crate::error::{AppError, Result};

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(v) => v.to_sql_checked(ty, out),
            SqlValue::Int(v) => {
                if *ty == Type::INT2 {
                    i16::try_from(*v)?.to_sql_checked(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*v)?.to_sql_checked(ty, out)
                } else {
                    v.to_sql_checked(ty, out)
                }
            }
            SqlValue::Float(v) => v.to_sql_checked(ty, out),
            SqlValue::Text(v) => v.to_sql_checked(ty, out),
            SqlValue::Date(v) => v.to_sql_checked(ty, out),
            SqlValue::Timestamp(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Maps a driver error, keeping uniqueness violations distinguishable.
fn map_pg_error(e: tokio_postgres::Error) -> AppError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return AppError::Conflict("Record already exists".to_string());
    }
    if e.is_closed() {
        return AppError::ConnectFailure(e.to_string());
    }
    AppError::QueryFailure(e.to_string())
}

fn column_value(
    row: &Row,
    idx: usize,
    ty: &Type,
) -> std::result::Result<SqlValue, tokio_postgres::Error> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| SqlValue::Int(i64::from(v)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| SqlValue::Int(i64::from(v)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| SqlValue::Float(f64::from(v)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Float)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::Date)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?.map(SqlValue::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| SqlValue::Timestamp(v.naive_utc()))
    } else {
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// A helper function to map a `tokio_postgres::Row` to a `Record`.
fn row_to_record(row: &Row) -> Result<Record> {
    let mut columns = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).map_err(|e| {
            AppError::MissingData(format!("{} ({}): {}", column.name(), column.type_(), e))
        })?;
        columns.push((column.name().to_string(), value));
    }
    Ok(Record::new(columns))
}

fn bound_params(statement: &Statement) -> Vec<&(dyn ToSql + Sync)> {
    statement
        .params()
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect()
}

/// A live PostgreSQL client and the task driving its socket.
pub struct PgHandle {
    client: Client,
    driver: JoinHandle<()>,
}

/// Opens PostgreSQL connections with `tokio-postgres`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgHandle;

    async fn connect(&self, params: &ConnectParams) -> Result<PgHandle> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&params.host)
            .port(params.port)
            .user(&params.user)
            .password(params.password.as_bytes())
            .dbname(&params.database)
            .application_name("hospital-records")
            .connect_timeout(params.connect_timeout);

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            tracing::error!("❌ PostgreSQL connect failed: {}", e);
            AppError::ConnectFailure(e.to_string())
        })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("PostgreSQL connection closed: {}", e);
            }
        });

        Ok(PgHandle { client, driver })
    }

    async fn ping(&self, handle: &mut PgHandle) -> bool {
        !handle.client.is_closed() && handle.client.simple_query("SELECT 1").await.is_ok()
    }

    async fn execute(&self, handle: &mut PgHandle, statement: &Statement) -> Result<u64> {
        let params = bound_params(statement);
        handle
            .client
            .execute(statement.sql(), &params)
            .await
            .map_err(map_pg_error)
    }

    async fn query(&self, handle: &mut PgHandle, statement: &Statement) -> Result<Vec<Record>> {
        let params = bound_params(statement);
        let rows = handle
            .client
            .query(statement.sql(), &params)
            .await
            .map_err(map_pg_error)?;
        rows.iter().map(row_to_record).collect()
    }

    async fn batch(&self, handle: &mut PgHandle, sql: &str) -> Result<()> {
        handle.client.batch_execute(sql).await.map_err(map_pg_error)
    }

    fn close(&self, handle: PgHandle) {
        handle.driver.abort();
        drop(handle.client);
    }
}
