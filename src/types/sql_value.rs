use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

/// Represents a SQL value in a driver-agnostic way, in both directions:
/// parameters handed to the bind stage and raw values read back from a result.
/// Drivers are responsible for converting these to and from their native types.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Text(String),
    /// Fixed-width character data, one element per character.
    Chars(Vec<char>),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<Utc>),
    BinaryStream(BinaryStream),
    CharStream(CharStream),
}

/// The host representation a caller asks a column value to be coerced into.
///
/// There is one variant per [`SqlValue`] kind, plus `Void`, which stands for
/// "the database value is absent" when looking up null equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Float32,
    Float64,
    Decimal,
    Text,
    Chars,
    Bytes,
    Date,
    Time,
    Timestamp,
    BinaryStream,
    CharStream,
    Void,
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetType::Bool => "bool",
            TargetType::Int8 => "i8",
            TargetType::Int16 => "i16",
            TargetType::Int32 => "i32",
            TargetType::Int64 => "i64",
            TargetType::Int128 => "i128",
            TargetType::Float32 => "f32",
            TargetType::Float64 => "f64",
            TargetType::Decimal => "decimal",
            TargetType::Text => "text",
            TargetType::Chars => "chars",
            TargetType::Bytes => "bytes",
            TargetType::Date => "date",
            TargetType::Time => "time",
            TargetType::Timestamp => "timestamp",
            TargetType::BinaryStream => "binary stream",
            TargetType::CharStream => "character stream",
            TargetType::Void => "void",
        };
        f.write_str(name)
    }
}

impl SqlValue {
    /// Returns the target type matching this value's kind, or `None` for `Null`.
    pub fn kind(&self) -> Option<TargetType> {
        let kind = match self {
            SqlValue::Null => return None,
            SqlValue::Bool(_) => TargetType::Bool,
            SqlValue::Int8(_) => TargetType::Int8,
            SqlValue::Int16(_) => TargetType::Int16,
            SqlValue::Int32(_) => TargetType::Int32,
            SqlValue::Int64(_) => TargetType::Int64,
            SqlValue::Int128(_) => TargetType::Int128,
            SqlValue::Float32(_) => TargetType::Float32,
            SqlValue::Float64(_) => TargetType::Float64,
            SqlValue::Decimal(_) => TargetType::Decimal,
            SqlValue::Text(_) => TargetType::Text,
            SqlValue::Chars(_) => TargetType::Chars,
            SqlValue::Bytes(_) => TargetType::Bytes,
            SqlValue::Date(_) => TargetType::Date,
            SqlValue::Time(_) => TargetType::Time,
            SqlValue::Timestamp(_) => TargetType::Timestamp,
            SqlValue::BinaryStream(_) => TargetType::BinaryStream,
            SqlValue::CharStream(_) => TargetType::CharStream,
        };
        Some(kind)
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> String {
        match self.kind() {
            Some(kind) => kind.to_string(),
            None => "null".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

/// Streams compare equal only when they share the same underlying reader.
impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        use SqlValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int8(a), Int8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (Int128(a), Int128(b)) => a == b,
            (Float32(a), Float32(b)) => a == b,
            (Float64(a), Float64(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Chars(a), Chars(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (BinaryStream(a), BinaryStream(b)) => a.same_stream(b),
            (CharStream(a), CharStream(b)) => a.same_stream(b),
            _ => false,
        }
    }
}

type SharedReader = Arc<Mutex<Box<dyn Read + Send>>>;

fn lock(reader: &SharedReader) -> MutexGuard<'_, Box<dyn Read + Send>> {
    reader.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A handle to a stream of bytes, typically a BLOB column or a BLOB parameter.
///
/// Clones share the underlying reader: reading through one clone advances all.
#[derive(Clone)]
pub struct BinaryStream {
    reader: SharedReader,
}

impl BinaryStream {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    /// A stream that is immediately at end of data.
    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Cursor::new(bytes))
    }

    /// Drains the remaining bytes of the stream.
    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        lock(&self.reader).read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn same_stream(&self, other: &BinaryStream) -> bool {
        Arc::ptr_eq(&self.reader, &other.reader)
    }
}

impl Read for BinaryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        lock(&self.reader).read(buf)
    }
}

impl fmt::Debug for BinaryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryStream").finish_non_exhaustive()
    }
}

/// A handle to a stream of UTF-8 text, typically a CLOB column or parameter.
///
/// Clones share the underlying reader.
#[derive(Clone)]
pub struct CharStream {
    reader: SharedReader,
}

impl CharStream {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    pub fn empty() -> Self {
        Self::new(io::empty())
    }

    pub fn from_string(text: String) -> Self {
        Self::new(Cursor::new(text.into_bytes()))
    }

    /// Drains the remaining text of the stream.
    pub fn read_all(&self) -> io::Result<String> {
        let mut buf = String::new();
        lock(&self.reader).read_to_string(&mut buf)?;
        Ok(buf)
    }

    pub fn same_stream(&self, other: &CharStream) -> bool {
        Arc::ptr_eq(&self.reader, &other.reader)
    }
}

impl Read for CharStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        lock(&self.reader).read(buf)
    }
}

impl fmt::Debug for CharStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharStream").finish_non_exhaustive()
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i8> for SqlValue {
    fn from(value: i8) -> Self {
        SqlValue::Int8(value)
    }
}

impl From<i16> for SqlValue {
    fn from(value: i16) -> Self {
        SqlValue::Int16(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int64(value)
    }
}

impl From<i128> for SqlValue {
    fn from(value: i128) -> Self {
        SqlValue::Int128(value)
    }
}

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        SqlValue::Float32(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float64(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        SqlValue::Decimal(value)
    }
}

impl From<Vec<char>> for SqlValue {
    fn from(value: Vec<char>) -> Self {
        SqlValue::Chars(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        SqlValue::Bytes(value.to_vec())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(value: NaiveTime) -> Self {
        SqlValue::Time(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<BinaryStream> for SqlValue {
    fn from(value: BinaryStream) -> Self {
        SqlValue::BinaryStream(value)
    }
}

impl From<CharStream> for SqlValue {
    fn from(value: CharStream) -> Self {
        SqlValue::CharStream(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}
