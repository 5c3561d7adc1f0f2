use std::fmt;

use super::TargetType;

/// The declared type of a relational column.
///
/// Codes follow the JDBC `java.sql.Types` numbering so that drivers exposing
/// that numbering can be mapped with [`ColumnType::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    BigInt,
    Binary,
    Bit,
    Blob,
    Boolean,
    Char,
    Clob,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    LongNVarChar,
    LongVarBinary,
    LongVarChar,
    NChar,
    NClob,
    Null,
    Numeric,
    NVarChar,
    Real,
    SmallInt,
    Time,
    TimeWithTimezone,
    Timestamp,
    TimestampWithTimezone,
    TinyInt,
    VarBinary,
    VarChar,
    /// A type code with no dedicated variant.
    Other(i32),
}

const NAMED: [(ColumnType, i32, &str); 29] = [
    (ColumnType::BigInt, -5, "BIGINT"),
    (ColumnType::Binary, -2, "BINARY"),
    (ColumnType::Bit, -7, "BIT"),
    (ColumnType::Blob, 2004, "BLOB"),
    (ColumnType::Boolean, 16, "BOOLEAN"),
    (ColumnType::Char, 1, "CHAR"),
    (ColumnType::Clob, 2005, "CLOB"),
    (ColumnType::Date, 91, "DATE"),
    (ColumnType::Decimal, 3, "DECIMAL"),
    (ColumnType::Double, 8, "DOUBLE"),
    (ColumnType::Float, 6, "FLOAT"),
    (ColumnType::Integer, 4, "INTEGER"),
    (ColumnType::LongNVarChar, -16, "LONGNVARCHAR"),
    (ColumnType::LongVarBinary, -4, "LONGVARBINARY"),
    (ColumnType::LongVarChar, -1, "LONGVARCHAR"),
    (ColumnType::NChar, -15, "NCHAR"),
    (ColumnType::NClob, 2011, "NCLOB"),
    (ColumnType::Null, 0, "NULL"),
    (ColumnType::Numeric, 2, "NUMERIC"),
    (ColumnType::NVarChar, -9, "NVARCHAR"),
    (ColumnType::Real, 7, "REAL"),
    (ColumnType::SmallInt, 5, "SMALLINT"),
    (ColumnType::Time, 92, "TIME"),
    (ColumnType::TimeWithTimezone, 2013, "TIME_WITH_TIMEZONE"),
    (ColumnType::Timestamp, 93, "TIMESTAMP"),
    (ColumnType::TimestampWithTimezone, 2014, "TIMESTAMP_WITH_TIMEZONE"),
    (ColumnType::TinyInt, -6, "TINYINT"),
    (ColumnType::VarBinary, -3, "VARBINARY"),
    (ColumnType::VarChar, 12, "VARCHAR"),
];

impl ColumnType {
    /// Returns the numeric type code.
    pub fn code(self) -> i32 {
        match self {
            ColumnType::Other(code) => code,
            named => NAMED
                .iter()
                .find(|(t, _, _)| *t == named)
                .map(|(_, code, _)| *code)
                .unwrap_or_default(),
        }
    }

    /// Maps a numeric type code to a column type; unknown codes become `Other`.
    pub fn from_code(code: i32) -> Self {
        NAMED
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| *t)
            .unwrap_or(ColumnType::Other(code))
    }

    /// The host type a column value is returned as when the caller does not ask
    /// for a specific one.
    pub fn default_target(self) -> Option<TargetType> {
        let target = match self {
            ColumnType::BigInt => TargetType::Int64,
            ColumnType::Binary | ColumnType::VarBinary | ColumnType::LongVarBinary => {
                TargetType::Bytes
            }
            ColumnType::Bit | ColumnType::Boolean => TargetType::Bool,
            ColumnType::Blob => TargetType::BinaryStream,
            ColumnType::Char => TargetType::Chars,
            ColumnType::Clob | ColumnType::NClob => TargetType::CharStream,
            ColumnType::Date => TargetType::Date,
            ColumnType::Decimal | ColumnType::Numeric => TargetType::Decimal,
            ColumnType::Double | ColumnType::Float => TargetType::Float64,
            ColumnType::Integer => TargetType::Int32,
            ColumnType::LongNVarChar
            | ColumnType::LongVarChar
            | ColumnType::NChar
            | ColumnType::NVarChar
            | ColumnType::VarChar => TargetType::Text,
            ColumnType::Real => TargetType::Float32,
            ColumnType::SmallInt => TargetType::Int16,
            ColumnType::Time | ColumnType::TimeWithTimezone => TargetType::Time,
            ColumnType::Timestamp | ColumnType::TimestampWithTimezone => TargetType::Timestamp,
            ColumnType::TinyInt => TargetType::Int8,
            ColumnType::Null => TargetType::Void,
            ColumnType::Other(_) => return None,
        };
        Some(target)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Other(code) => write!(f, "OTHER({})", code),
            named => {
                let name = NAMED
                    .iter()
                    .find(|(t, _, _)| t == named)
                    .map(|(_, _, name)| *name)
                    .unwrap_or("OTHER");
                f.write_str(name)
            }
        }
    }
}

/// Metadata for one column of a raw result.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    /// Column label as reported by the driver
    pub label: String,
    pub column_type: ColumnType,
    /// Declared width for fixed-width character columns, when the driver knows it
    pub width: Option<usize>,
}

impl ColumnMeta {
    pub fn new(label: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            label: label.into(),
            column_type,
            width: None,
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }
}
