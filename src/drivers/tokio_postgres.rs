use std::collections::VecDeque;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::StreamExt;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row, RowStream, Statement};

use crate::error::{RdaxError, Result};
use crate::traits::{DatabaseDriver, GeneratedKeys, ParameterBinder, PreparedStatement, RawResult};
use crate::types::{BinaryStream, CharStream, ColumnMeta, ColumnType, SqlValue};

type NativeParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL driver implementation using tokio-postgres.
pub struct TokioPostgresDriver {
    client: Arc<Client>,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| RdaxError::ConnectionFailed(e.to_string()))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection closed with error");
            }
        });

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn prepare(&self, sql: &str, keys: GeneratedKeys) -> Result<Box<dyn PreparedStatement>> {
        let mut native_sql = number_placeholders(sql);
        match &keys {
            GeneratedKeys::None => {}
            GeneratedKeys::All => native_sql.push_str(" RETURNING *"),
            GeneratedKeys::Columns(columns) => {
                native_sql.push_str(" RETURNING ");
                native_sql.push_str(&columns.join(", "));
            }
        }

        let statement = self
            .client
            .prepare(&native_sql)
            .await
            .map_err(|e| RdaxError::QueryFailed(e.to_string()))?;

        Ok(Box::new(PostgresStatement {
            client: Arc::clone(&self.client),
            statement,
            keys,
            params: Vec::new(),
            identities: None,
        }))
    }
}

/// Replaces each `?` outside quoted text with `$1`, `$2`, ...
fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut next = 1;
    for c in sql.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                out.push(c);
            }
            (Some(_), c) => out.push(c),
            (None, '\'') | (None, '"') => {
                quote = Some(c);
                out.push(c);
            }
            (None, '?') => {
                out.push('$');
                out.push_str(&next.to_string());
                next += 1;
            }
            (None, c) => out.push(c),
        }
    }
    out
}

struct PostgresStatement {
    client: Arc<Client>,
    statement: Statement,
    keys: GeneratedKeys,
    params: Vec<Option<SqlValue>>,
    identities: Option<VecDeque<Row>>,
}

impl PostgresStatement {
    fn set(&mut self, position: usize, value: SqlValue) -> Result<()> {
        if position == 0 || position > self.statement.params().len() {
            return Err(RdaxError::bind(
                position,
                format!(
                    "statement has {} parameter(s)",
                    self.statement.params().len()
                ),
            ));
        }
        if self.params.len() < position {
            self.params.resize(position, None);
        }
        self.params[position - 1] = Some(value);
        Ok(())
    }

    /// Converts bound values to the types the server inferred for each
    /// parameter.
    fn native_params(&self) -> Result<Vec<NativeParam>> {
        self.statement
            .params()
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                let value = self
                    .params
                    .get(i)
                    .and_then(Option::as_ref)
                    .ok_or_else(|| RdaxError::bind(i + 1, "parameter not bound"))?;
                to_native(value, ty).map_err(|reason| RdaxError::bind(i + 1, reason))
            })
            .collect()
    }

    fn columns(&self) -> Vec<ColumnMeta> {
        self.statement
            .columns()
            .iter()
            .map(|c| ColumnMeta::new(c.name(), column_type(c.type_())))
            .collect()
    }
}

fn borrowed(params: &[NativeParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

impl ParameterBinder for PostgresStatement {
    fn bind_null(&mut self, position: usize) -> Result<()> {
        self.set(position, SqlValue::Null)
    }

    fn bind_bool(&mut self, position: usize, value: bool) -> Result<()> {
        self.set(position, SqlValue::Bool(value))
    }

    fn bind_i8(&mut self, position: usize, value: i8) -> Result<()> {
        self.set(position, SqlValue::Int8(value))
    }

    fn bind_i16(&mut self, position: usize, value: i16) -> Result<()> {
        self.set(position, SqlValue::Int16(value))
    }

    fn bind_i32(&mut self, position: usize, value: i32) -> Result<()> {
        self.set(position, SqlValue::Int32(value))
    }

    fn bind_i64(&mut self, position: usize, value: i64) -> Result<()> {
        self.set(position, SqlValue::Int64(value))
    }

    fn bind_f32(&mut self, position: usize, value: f32) -> Result<()> {
        self.set(position, SqlValue::Float32(value))
    }

    fn bind_f64(&mut self, position: usize, value: f64) -> Result<()> {
        self.set(position, SqlValue::Float64(value))
    }

    fn bind_decimal(&mut self, position: usize, value: Decimal) -> Result<()> {
        self.set(position, SqlValue::Decimal(value))
    }

    fn bind_text(&mut self, position: usize, value: String) -> Result<()> {
        self.set(position, SqlValue::Text(value))
    }

    fn bind_bytes(&mut self, position: usize, value: Vec<u8>) -> Result<()> {
        self.set(position, SqlValue::Bytes(value))
    }

    fn bind_date(&mut self, position: usize, value: NaiveDate) -> Result<()> {
        self.set(position, SqlValue::Date(value))
    }

    fn bind_time(&mut self, position: usize, value: NaiveTime) -> Result<()> {
        self.set(position, SqlValue::Time(value))
    }

    fn bind_timestamp(&mut self, position: usize, value: DateTime<Utc>) -> Result<()> {
        self.set(position, SqlValue::Timestamp(value))
    }

    // Large objects are read up front; the wire protocol sends whole values.
    fn bind_binary_stream(&mut self, position: usize, value: BinaryStream) -> Result<()> {
        let bytes = value
            .read_all()
            .map_err(|e| RdaxError::bind(position, e.to_string()))?;
        self.set(position, SqlValue::Bytes(bytes))
    }

    fn bind_char_stream(&mut self, position: usize, value: CharStream) -> Result<()> {
        let text = value
            .read_all()
            .map_err(|e| RdaxError::bind(position, e.to_string()))?;
        self.set(position, SqlValue::Text(text))
    }
}

#[async_trait]
impl PreparedStatement for PostgresStatement {
    async fn execute_query(&mut self) -> Result<Box<dyn RawResult>> {
        let params = self.native_params()?;
        let stream = self
            .client
            .query_raw(&self.statement, borrowed(&params))
            .await
            .map_err(|e| RdaxError::QueryFailed(e.to_string()))?;

        Ok(Box::new(PostgresResult {
            columns: self.columns(),
            rows: Rows::Stream(Box::pin(stream)),
            current: None,
        }))
    }

    async fn execute_update(&mut self) -> Result<u64> {
        let params = self.native_params()?;
        let params = borrowed(&params);

        if !self.keys.is_requested() {
            return self
                .client
                .execute(&self.statement, &params)
                .await
                .map_err(|e| RdaxError::QueryFailed(e.to_string()));
        }

        // RETURNING turns the update into a query; its rows are the identities.
        let rows = self
            .client
            .query(&self.statement, &params)
            .await
            .map_err(|e| RdaxError::QueryFailed(e.to_string()))?;
        let count = rows.len() as u64;
        self.identities = Some(rows.into());
        Ok(count)
    }

    async fn generated_identities(&mut self) -> Result<Option<Box<dyn RawResult>>> {
        let columns = self.columns();
        Ok(self.identities.take().map(|rows| {
            Box::new(PostgresResult {
                columns,
                rows: Rows::Buffered(rows),
                current: None,
            }) as Box<dyn RawResult>
        }))
    }

    fn close(&mut self) {
        self.params.clear();
        self.identities = None;
    }
}

enum Rows {
    Stream(Pin<Box<RowStream>>),
    Buffered(VecDeque<Row>),
    Closed,
}

struct PostgresResult {
    columns: Vec<ColumnMeta>,
    rows: Rows,
    current: Option<Row>,
}

#[async_trait]
impl RawResult for PostgresResult {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    async fn next(&mut self) -> Result<bool> {
        self.current = match &mut self.rows {
            Rows::Stream(stream) => stream
                .next()
                .await
                .transpose()
                .map_err(|e| RdaxError::QueryFailed(e.to_string()))?,
            Rows::Buffered(rows) => rows.pop_front(),
            Rows::Closed => return Err(RdaxError::QueryFailed("result is closed".to_string())),
        };
        Ok(self.current.is_some())
    }

    fn value(&self, index: usize) -> Result<SqlValue> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| RdaxError::QueryFailed("no current row".to_string()))?;
        let column = row
            .columns()
            .get(index)
            .ok_or_else(|| RdaxError::ColumnNotFound(format!("index {}", index)))?;
        read_value(row, index, column.type_())
    }

    fn close(&mut self) {
        self.rows = Rows::Closed;
        self.current = None;
    }
}

/// Maps a server type to the column type the registry converts from.
fn column_type(ty: &Type) -> ColumnType {
    match *ty {
        Type::BOOL => ColumnType::Boolean,
        Type::CHAR => ColumnType::TinyInt,
        Type::INT2 => ColumnType::SmallInt,
        Type::INT4 => ColumnType::Integer,
        Type::INT8 | Type::OID => ColumnType::BigInt,
        Type::FLOAT4 => ColumnType::Real,
        Type::FLOAT8 => ColumnType::Double,
        Type::NUMERIC => ColumnType::Numeric,
        Type::TEXT | Type::VARCHAR | Type::NAME | Type::UNKNOWN => ColumnType::VarChar,
        Type::BPCHAR => ColumnType::Char,
        Type::BYTEA => ColumnType::VarBinary,
        Type::DATE => ColumnType::Date,
        Type::TIME => ColumnType::Time,
        Type::TIMESTAMP => ColumnType::Timestamp,
        Type::TIMESTAMPTZ => ColumnType::TimestampWithTimezone,
        _ => ColumnType::Other(ty.oid() as i32),
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize, wrap: fn(T) -> SqlValue) -> Result<SqlValue> {
    row.try_get::<_, Option<T>>(index)
        .map(|v| v.map_or(SqlValue::Null, wrap))
        .map_err(|e| RdaxError::QueryFailed(e.to_string()))
}

fn read_value(row: &Row, index: usize, ty: &Type) -> Result<SqlValue> {
    match *ty {
        Type::BOOL => get(row, index, SqlValue::Bool),
        Type::CHAR => get(row, index, SqlValue::Int8),
        Type::INT2 => get(row, index, SqlValue::Int16),
        Type::INT4 => get(row, index, SqlValue::Int32),
        Type::INT8 => get(row, index, SqlValue::Int64),
        Type::OID => get(row, index, |v: u32| SqlValue::Int64(v.into())),
        Type::FLOAT4 => get(row, index, SqlValue::Float32),
        Type::FLOAT8 => get(row, index, SqlValue::Float64),
        Type::NUMERIC => get(row, index, SqlValue::Decimal),
        Type::TEXT | Type::VARCHAR | Type::NAME | Type::UNKNOWN | Type::BPCHAR => {
            get(row, index, SqlValue::Text)
        }
        Type::BYTEA => get(row, index, SqlValue::Bytes),
        Type::DATE => get(row, index, SqlValue::Date),
        Type::TIME => get(row, index, SqlValue::Time),
        Type::TIMESTAMP => get(row, index, |v: NaiveDateTime| SqlValue::Timestamp(v.and_utc())),
        Type::TIMESTAMPTZ => get(row, index, SqlValue::Timestamp),
        _ => Err(RdaxError::QueryFailed(format!(
            "unsupported column type {}",
            ty.name()
        ))),
    }
}

/// A null that the server accepts for any parameter type.
#[derive(Debug)]
struct NullParam;

impl ToSql for NullParam {
    fn to_sql(
        &self,
        _ty: &Type,
        _out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Converts a bound value to a native parameter of the server type `ty`,
/// widening or narrowing numbers where the server expects another width.
fn to_native(value: &SqlValue, ty: &Type) -> std::result::Result<NativeParam, String> {
    let native: NativeParam = match value {
        SqlValue::Null => Box::new(NullParam),
        SqlValue::Bool(v) => Box::new(*v),
        SqlValue::Int8(v) => integer(i64::from(*v), ty)?,
        SqlValue::Int16(v) => integer(i64::from(*v), ty)?,
        SqlValue::Int32(v) => integer(i64::from(*v), ty)?,
        SqlValue::Int64(v) => integer(*v, ty)?,
        SqlValue::Int128(v) => decimal(
            Decimal::try_from_i128_with_scale(*v, 0).map_err(|e| e.to_string())?,
            ty,
        )?,
        SqlValue::Float32(v) => float(f64::from(*v), ty)?,
        SqlValue::Float64(v) => float(*v, ty)?,
        SqlValue::Decimal(v) => decimal(*v, ty)?,
        SqlValue::Text(v) => Box::new(v.clone()),
        SqlValue::Chars(v) => Box::new(v.iter().collect::<String>()),
        SqlValue::Bytes(v) => Box::new(v.clone()),
        SqlValue::Date(v) => Box::new(*v),
        SqlValue::Time(v) => Box::new(*v),
        SqlValue::Timestamp(v) if *ty == Type::TIMESTAMP => Box::new(v.naive_utc()),
        SqlValue::Timestamp(v) => Box::new(*v),
        SqlValue::BinaryStream(v) => Box::new(v.read_all().map_err(|e| e.to_string())?),
        SqlValue::CharStream(v) => Box::new(v.read_all().map_err(|e| e.to_string())?),
    };
    Ok(native)
}

fn integer(v: i64, ty: &Type) -> std::result::Result<NativeParam, String> {
    let native: NativeParam = match *ty {
        Type::CHAR => Box::new(i8::try_from(v).map_err(|e| e.to_string())?),
        Type::INT2 => Box::new(i16::try_from(v).map_err(|e| e.to_string())?),
        Type::INT4 => Box::new(i32::try_from(v).map_err(|e| e.to_string())?),
        Type::FLOAT4 => Box::new(v as f32),
        Type::FLOAT8 => Box::new(v as f64),
        Type::NUMERIC => Box::new(Decimal::from(v)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => Box::new(v.to_string()),
        _ => Box::new(v),
    };
    Ok(native)
}

fn float(v: f64, ty: &Type) -> std::result::Result<NativeParam, String> {
    let native: NativeParam = match *ty {
        Type::FLOAT4 => Box::new(v as f32),
        Type::NUMERIC => {
            Box::new(Decimal::from_f64(v).ok_or_else(|| format!("{} is not a finite decimal", v))?)
        }
        _ => Box::new(v),
    };
    Ok(native)
}

fn decimal(v: Decimal, ty: &Type) -> std::result::Result<NativeParam, String> {
    let out_of_range = || format!("{} is out of range for {}", v, ty.name());
    let native: NativeParam = match *ty {
        Type::INT2 => Box::new(v.trunc().to_i16().ok_or_else(out_of_range)?),
        Type::INT4 => Box::new(v.trunc().to_i32().ok_or_else(out_of_range)?),
        Type::INT8 => Box::new(v.trunc().to_i64().ok_or_else(out_of_range)?),
        Type::FLOAT4 => Box::new(v.to_f32().ok_or_else(out_of_range)?),
        Type::FLOAT8 => Box::new(v.to_f64().ok_or_else(out_of_range)?),
        Type::TEXT | Type::VARCHAR => Box::new(v.to_string()),
        _ => Box::new(v),
    };
    Ok(native)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_placeholders() {
        assert_eq!(
            number_placeholders("select * from t where a = ? and b in (?,?)"),
            "select * from t where a = $1 and b in ($2,$3)"
        );
    }

    #[test]
    fn test_number_placeholders_skips_quoted_text() {
        assert_eq!(
            number_placeholders("select '?', \"q?\" from t where a = ?"),
            "select '?', \"q?\" from t where a = $1"
        );
    }

    #[test]
    fn test_column_type_mapping() {
        assert_eq!(column_type(&Type::INT4), ColumnType::Integer);
        assert_eq!(column_type(&Type::BPCHAR), ColumnType::Char);
        assert_eq!(column_type(&Type::NUMERIC), ColumnType::Numeric);
        assert_eq!(
            column_type(&Type::JSON),
            ColumnType::Other(Type::JSON.oid() as i32)
        );
    }

    #[test]
    fn test_integer_narrowing_checks_range() {
        assert!(integer(5, &Type::INT2).is_ok());
        assert!(integer(i64::from(i16::MAX) + 1, &Type::INT2).is_err());
    }

    #[test]
    fn test_decimal_to_integer_param_truncates() {
        let v = Decimal::new(1237, 1);
        assert!(decimal(v, &Type::INT4).is_ok());
        assert!(decimal(Decimal::MAX, &Type::INT4).is_err());
    }
}
