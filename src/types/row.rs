use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::error::{RdaxError, Result};
use crate::registry::TypeRegistry;
use crate::traits::{PreparedStatement, RawResult, ValueObject};
use crate::types::{ColumnMeta, ColumnType, FromSqlValue, SqlValue, TargetType};

/// Lifecycle of a [`ResultRows`] cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No row has been requested yet.
    Unopened,
    /// Positioned on a row.
    Open,
    /// The last row has been passed.
    Exhausted,
    /// Closed, either explicitly or on drop.
    Closed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CursorState::Unopened => "unopened",
            CursorState::Open => "open",
            CursorState::Exhausted => "exhausted",
            CursorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Something that addresses a column: a 0-based index or a label.
/// Labels match case-insensitively.
pub trait ColumnIndex {
    fn index(&self, labels: &[String]) -> Result<usize>;
}

impl ColumnIndex for usize {
    fn index(&self, labels: &[String]) -> Result<usize> {
        if *self < labels.len() {
            Ok(*self)
        } else {
            Err(RdaxError::ColumnNotFound(format!(
                "index {} (result has {} columns)",
                self,
                labels.len()
            )))
        }
    }
}

impl ColumnIndex for str {
    fn index(&self, labels: &[String]) -> Result<usize> {
        let wanted = self.to_lowercase();
        labels
            .iter()
            .position(|label| *label == wanted)
            .ok_or_else(|| RdaxError::ColumnNotFound(self.to_string()))
    }
}

impl ColumnIndex for String {
    fn index(&self, labels: &[String]) -> Result<usize> {
        self.as_str().index(labels)
    }
}

impl<T: ColumnIndex + ?Sized> ColumnIndex for &T {
    fn index(&self, labels: &[String]) -> Result<usize> {
        (**self).index(labels)
    }
}

/// A forward-only cursor over a query result.
///
/// Values are read from the current row and coerced through the
/// [`TypeRegistry`] to the requested host type. The cursor owns the raw result
/// and the statement that produced it, and releases both on [`close`] or drop.
///
/// [`close`]: ResultRows::close
pub struct ResultRows {
    result: Option<Box<dyn RawResult>>,
    statement: Option<Box<dyn PreparedStatement>>,
    columns: Vec<ColumnMeta>,
    labels: Vec<String>,
    registry: Arc<TypeRegistry>,
    allow_nulls: bool,
    state: CursorState,
}

impl ResultRows {
    pub fn new(
        result: Box<dyn RawResult>,
        statement: Option<Box<dyn PreparedStatement>>,
        registry: Arc<TypeRegistry>,
        allow_nulls: bool,
    ) -> Self {
        let columns = result.columns().to_vec();
        let labels = columns.iter().map(|c| c.label.to_lowercase()).collect();
        Self {
            result: Some(result),
            statement,
            columns,
            labels,
            registry,
            allow_nulls,
            state: CursorState::Unopened,
        }
    }

    /// Moves to the next row. Returns `false` once the rows are exhausted,
    /// and keeps returning `false` after that.
    pub async fn advance(&mut self) -> Result<bool> {
        match self.state {
            CursorState::Closed => {
                return Err(RdaxError::CursorState {
                    state: CursorState::Closed,
                })
            }
            CursorState::Exhausted => return Ok(false),
            CursorState::Unopened | CursorState::Open => {}
        }
        let result = self.result.as_mut().ok_or(RdaxError::CursorState {
            state: CursorState::Closed,
        })?;
        if result.next().await? {
            self.state = CursorState::Open;
            Ok(true)
        } else {
            self.state = CursorState::Exhausted;
            Ok(false)
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether null database values are returned as `Null` rather than as
    /// their column type's zero equivalent.
    pub fn allow_nulls(&self) -> bool {
        self.allow_nulls
    }

    /// Reads a column of the current row as `T`.
    ///
    /// Read into `Option<T>` when the column may be null; reading a null into
    /// a plain `T` fails.
    pub fn get<T: FromSqlValue>(&self, column: impl ColumnIndex) -> Result<T> {
        let index = self.resolve(column)?;
        let value = self.coerce_column(index, T::target())?;
        let kind = value.kind_name();
        T::from_sql_value(value).ok_or_else(|| {
            RdaxError::coercion(
                self.columns[index].column_type,
                T::target(),
                format!("cannot read {} as {}", kind, type_name::<T>()),
            )
        })
    }

    /// Reads a column of the current row coerced to `target`.
    pub fn get_as(&self, column: impl ColumnIndex, target: TargetType) -> Result<SqlValue> {
        let index = self.resolve(column)?;
        self.coerce_column(index, target)
    }

    /// Reads a column as the default host type of its column type.
    pub fn get_value(&self, column: impl ColumnIndex) -> Result<SqlValue> {
        let index = self.resolve(column)?;
        let column_type = self.columns[index].column_type;
        let target = column_type.default_target().ok_or_else(|| {
            RdaxError::coercion(column_type, TargetType::Void, "no default host type")
        })?;
        self.coerce_column(index, target)
    }

    /// Materializes the current row as a value object. The object's fields
    /// map onto the result columns by position.
    pub fn get_object<V: ValueObject>(&self) -> Result<V> {
        self.current()?;
        let fields = V::fields();
        if fields.len() != self.columns.len() {
            return Err(RdaxError::ShapeMismatch {
                expected: fields.len(),
                actual: self.columns.len(),
            });
        }
        for (field, column) in fields.iter().zip(&self.columns) {
            if !self.registry.is_compatible(column.column_type, field.target) {
                return Err(RdaxError::coercion(
                    column.column_type,
                    field.target,
                    format!("incompatible with field '{}'", field.name),
                ));
            }
        }
        let values = fields
            .iter()
            .enumerate()
            .map(|(index, field)| self.coerce_column(index, field.target))
            .collect::<Result<Vec<_>>>()?;
        V::from_values(values)
    }

    /// Reads a binary column fully. A null reads as an empty buffer.
    pub fn blob(&self, column: impl ColumnIndex) -> Result<Vec<u8>> {
        self.get::<Option<Vec<u8>>>(column)
            .map(Option::unwrap_or_default)
    }

    /// Reads a character column fully. A null reads as an empty string.
    pub fn clob(&self, column: impl ColumnIndex) -> Result<String> {
        self.get::<Option<String>>(column)
            .map(Option::unwrap_or_default)
    }

    /// Reads a timestamp column as wall-clock time at `offset`.
    pub fn date_time(&self, column: impl ColumnIndex, offset: FixedOffset) -> Result<NaiveDateTime> {
        let instant: DateTime<Utc> = self.get(column)?;
        Ok(instant.with_timezone(&offset).naive_local())
    }

    /// Releases the raw result and its statement. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        if let Some(mut result) = self.result.take() {
            result.close();
        }
        if let Some(mut statement) = self.statement.take() {
            statement.close();
        }
        self.state = CursorState::Closed;
        tracing::trace!("result rows closed");
    }

    fn current(&self) -> Result<&dyn RawResult> {
        match (self.state, self.result.as_deref()) {
            (CursorState::Open, Some(result)) => Ok(result),
            (CursorState::Open, None) => Err(RdaxError::CursorState {
                state: CursorState::Closed,
            }),
            (state, _) => Err(RdaxError::CursorState { state }),
        }
    }

    fn resolve(&self, column: impl ColumnIndex) -> Result<usize> {
        self.current()?;
        column.index(&self.labels)
    }

    /// Raw value at `index`, with fixed-width character data padded to the
    /// column's declared width.
    fn fetch(&self, index: usize) -> Result<SqlValue> {
        let raw = self.current()?.value(index)?;
        let meta = &self.columns[index];
        let value = match (meta.column_type, raw) {
            (ColumnType::Char, SqlValue::Text(text)) => {
                SqlValue::Chars(pad(text.chars().collect(), meta.width))
            }
            (ColumnType::Char, SqlValue::Chars(chars)) => SqlValue::Chars(pad(chars, meta.width)),
            (_, raw) => raw,
        };
        Ok(value)
    }

    fn coerce_column(&self, index: usize, target: TargetType) -> Result<SqlValue> {
        let column_type = self.columns[index].column_type;
        if !self.registry.is_compatible(column_type, target) {
            return Err(RdaxError::coercion(
                column_type,
                target,
                "no conversion registered",
            ));
        }
        let raw = self.fetch(index)?;
        if raw.is_null() && self.allow_nulls {
            return Ok(SqlValue::Null);
        }
        self.registry.coerce(raw, column_type, target)
    }
}

fn pad(mut chars: Vec<char>, width: Option<usize>) -> Vec<char> {
    if let Some(width) = width {
        if chars.len() < width {
            chars.resize(width, ' ');
        }
    }
    chars
}

impl Drop for ResultRows {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ResultRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultRows")
            .field("columns", &self.columns)
            .field("allow_nulls", &self.allow_nulls)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::InMemoryResult;
    use crate::traits::{Field, FieldReader};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn rows(columns: Vec<ColumnMeta>, data: Vec<Vec<SqlValue>>, allow_nulls: bool) -> ResultRows {
        ResultRows::new(
            Box::new(InMemoryResult::new(columns, data)),
            None,
            Arc::new(TypeRegistry::standard()),
            allow_nulls,
        )
    }

    fn price_rows(allow_nulls: bool) -> ResultRows {
        rows(
            vec![
                ColumnMeta::new("ID", ColumnType::Integer),
                ColumnMeta::new("Price", ColumnType::Decimal),
            ],
            vec![
                vec![SqlValue::Int32(1), SqlValue::Decimal(Decimal::from_str("123.7").unwrap())],
                vec![SqlValue::Int32(2), SqlValue::Null],
            ],
            allow_nulls,
        )
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mut cursor = price_rows(true);
        assert_eq!(cursor.state(), CursorState::Unopened);
        assert!(matches!(
            cursor.get::<i32>(0),
            Err(RdaxError::CursorState {
                state: CursorState::Unopened
            })
        ));

        assert!(cursor.advance().await.unwrap());
        assert_eq!(cursor.state(), CursorState::Open);
        assert!(cursor.advance().await.unwrap());
        assert!(!cursor.advance().await.unwrap());
        assert_eq!(cursor.state(), CursorState::Exhausted);
        assert!(!cursor.advance().await.unwrap());
        assert!(matches!(
            cursor.get::<i32>(0),
            Err(RdaxError::CursorState {
                state: CursorState::Exhausted
            })
        ));

        cursor.close();
        cursor.close();
        assert_eq!(cursor.state(), CursorState::Closed);
        assert!(matches!(
            cursor.advance().await,
            Err(RdaxError::CursorState {
                state: CursorState::Closed
            })
        ));
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let mut cursor = price_rows(true);
        cursor.advance().await.unwrap();

        assert_eq!(cursor.get::<i64>("price").unwrap(), 123);
        assert_eq!(cursor.get::<String>("PRICE").unwrap(), "123.7");
        assert_eq!(cursor.get::<i32>(0).unwrap(), 1);
        assert_eq!(
            cursor.get_value(1).unwrap(),
            SqlValue::Decimal(Decimal::from_str("123.7").unwrap())
        );
        assert!(matches!(
            cursor.get::<i32>("missing"),
            Err(RdaxError::ColumnNotFound(_))
        ));
        assert!(matches!(cursor.get::<i32>(5), Err(RdaxError::ColumnNotFound(_))));
    }

    #[tokio::test]
    async fn test_null_allowed() {
        let mut cursor = price_rows(true);
        cursor.advance().await.unwrap();
        cursor.advance().await.unwrap();

        assert_eq!(cursor.get::<Option<i64>>(1).unwrap(), None);
        assert_eq!(cursor.get_as(1, TargetType::Int64).unwrap(), SqlValue::Null);
        assert!(matches!(cursor.get::<i64>(1), Err(RdaxError::Coercion { .. })));
    }

    #[tokio::test]
    async fn test_null_suppressed() {
        let mut cursor = price_rows(false);
        cursor.advance().await.unwrap();
        cursor.advance().await.unwrap();

        assert_eq!(cursor.get::<i64>(1).unwrap(), 0);
        assert_eq!(cursor.get::<Option<i64>>(1).unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_unregistered_pair_fails() {
        let mut cursor = price_rows(true);
        cursor.advance().await.unwrap();
        assert!(matches!(
            cursor.get_as(1, TargetType::Date),
            Err(RdaxError::Coercion { .. })
        ));
    }

    #[tokio::test]
    async fn test_fixed_width_char_padding() {
        let mut cursor = rows(
            vec![ColumnMeta::new("code", ColumnType::Char).with_width(5)],
            vec![vec![SqlValue::from("ab")]],
            true,
        );
        cursor.advance().await.unwrap();
        assert_eq!(cursor.get::<String>(0).unwrap(), "ab   ");
        assert_eq!(cursor.get::<Vec<char>>(0).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_date_time_at_offset() {
        let instant = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut cursor = rows(
            vec![ColumnMeta::new("at", ColumnType::Timestamp)],
            vec![vec![SqlValue::Timestamp(instant)]],
            true,
        );
        cursor.advance().await.unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            cursor.date_time(0, offset).unwrap().to_string(),
            "2024-03-01 14:00:00"
        );
    }

    #[tokio::test]
    async fn test_blob_and_clob_null_read_empty() {
        let mut cursor = rows(
            vec![
                ColumnMeta::new("data", ColumnType::VarBinary),
                ColumnMeta::new("body", ColumnType::VarChar),
            ],
            vec![vec![SqlValue::Null, SqlValue::Null]],
            true,
        );
        cursor.advance().await.unwrap();
        assert!(cursor.blob(0).unwrap().is_empty());
        assert_eq!(cursor.clob(1).unwrap(), "");
    }

    #[derive(Debug, PartialEq)]
    struct Priced {
        id: i32,
        price: Option<Decimal>,
    }

    impl ValueObject for Priced {
        fn fields() -> &'static [Field] {
            const FIELDS: &[Field] = &[
                Field::new("id", TargetType::Int32),
                Field::new("price", TargetType::Decimal),
            ];
            FIELDS
        }

        fn values(&self) -> Vec<SqlValue> {
            vec![self.id.into(), self.price.into()]
        }

        fn from_values(values: Vec<SqlValue>) -> Result<Self> {
            let mut reader = FieldReader::new(Self::fields(), values);
            Ok(Priced {
                id: reader.next()?,
                price: reader.next()?,
            })
        }
    }

    struct Single {
        _id: i32,
    }

    impl ValueObject for Single {
        fn fields() -> &'static [Field] {
            const FIELDS: &[Field] = &[Field::new("id", TargetType::Int32)];
            FIELDS
        }

        fn values(&self) -> Vec<SqlValue> {
            vec![self._id.into()]
        }

        fn from_values(values: Vec<SqlValue>) -> Result<Self> {
            let mut reader = FieldReader::new(Self::fields(), values);
            Ok(Single { _id: reader.next()? })
        }
    }

    #[tokio::test]
    async fn test_get_object() {
        let mut cursor = price_rows(true);
        cursor.advance().await.unwrap();
        assert_eq!(
            cursor.get_object::<Priced>().unwrap(),
            Priced {
                id: 1,
                price: Some(Decimal::from_str("123.7").unwrap()),
            }
        );
        cursor.advance().await.unwrap();
        assert_eq!(
            cursor.get_object::<Priced>().unwrap(),
            Priced { id: 2, price: None }
        );
    }

    #[tokio::test]
    async fn test_get_object_shape_mismatch() {
        let mut cursor = price_rows(true);
        cursor.advance().await.unwrap();
        assert!(matches!(
            cursor.get_object::<Single>(),
            Err(RdaxError::ShapeMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }
}
