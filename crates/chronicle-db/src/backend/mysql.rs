//! `MySQL` / `MariaDB` backend (feature `mysql`).

use chronicle_settings::DatabaseSettings;
use r2d2_mysql::MySqlConnectionManager;
use r2d2_mysql::mysql::prelude::Queryable;
use r2d2_mysql::mysql::{self, Opts, OptsBuilder, Params, Transaction, TxOpts, Value};

use super::{Backend, Conn, Row, SqlTx, SqlValue};
use crate::dialect::Dialect;
use crate::errors::{DbError, Result};

/// `MySQL` server backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct MySql;

impl Backend for MySql {
    const DIALECT: Dialect = Dialect::MySql;

    type Manager = MySqlConnectionManager;

    type Tx<'c> = Transaction<'c>;

    fn manager(dsn: &str, _settings: &DatabaseSettings) -> Result<Self::Manager> {
        let opts = Opts::from_url(dsn).map_err(|e| DbError::Config(format!("mysql dsn: {e}")))?;
        Ok(MySqlConnectionManager::new(OptsBuilder::from_opts(opts)))
    }

    fn ping(conn: &mut Conn<Self>) -> Result<()> {
        conn.query_drop("SELECT 1")?;
        Ok(())
    }

    fn begin(conn: &mut Conn<Self>) -> Result<Self::Tx<'_>> {
        Ok(conn.start_transaction(TxOpts::default())?)
    }
}

fn to_params(params: &[SqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(
        params
            .iter()
            .map(|p| match p {
                SqlValue::Null => Value::NULL,
                SqlValue::Integer(n) => Value::Int(*n),
                SqlValue::Real(f) => Value::Double(*f),
                SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
                SqlValue::Bool(b) => Value::Int(i64::from(*b)),
            })
            .collect(),
    )
}

fn decode_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::NULL => SqlValue::Null,
        Value::Int(n) => SqlValue::Integer(*n),
        Value::UInt(n) => SqlValue::Integer(
            i64::try_from(*n).map_err(|_| DbError::Decode(format!("integer out of range: {n}")))?,
        ),
        Value::Float(f) => SqlValue::Real(f64::from(*f)),
        Value::Double(f) => SqlValue::Real(*f),
        Value::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(b).into_owned()),
        other => return Err(DbError::Decode(format!("unsupported mysql value {other:?}"))),
    })
}

fn decode_row(row: &mysql::Row) -> Result<Row> {
    (0..row.len())
        .map(|i| row.as_ref(i).map_or(Ok(SqlValue::Null), decode_value))
        .collect::<Result<Vec<_>>>()
        .map(Row::new)
}

impl SqlTx for Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        Queryable::exec_drop(self, sql, to_params(params))?;
        Ok(self.affected_rows())
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let rows: Vec<mysql::Row> = Queryable::exec(self, sql, to_params(params))?;
        rows.iter().map(decode_row).collect()
    }

    fn commit(self) -> Result<()> {
        Transaction::commit(self)?;
        Ok(())
    }
}
