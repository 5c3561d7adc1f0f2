use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use super::{BinaryStream, CharStream, SqlValue, TargetType};

/// A host type that a column value can be read into.
///
/// `target()` names the registry conversion used to produce the value, so a
/// typed accessor always asks for the canonical representation of `Self`.
/// `Option<T>` reads the same target as `T` and maps a null to `None`.
pub trait FromSqlValue: Sized {
    fn target() -> TargetType;

    /// Unwraps an already-coerced value. Returns `None` when the value is not
    /// of the expected kind, including `Null` for non-optional types.
    fn from_sql_value(value: SqlValue) -> Option<Self>;
}

macro_rules! from_sql_value {
    ($ty:ty, $variant:ident) => {
        impl FromSqlValue for $ty {
            fn target() -> TargetType {
                TargetType::$variant
            }

            fn from_sql_value(value: SqlValue) -> Option<Self> {
                match value {
                    SqlValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

from_sql_value!(bool, Bool);
from_sql_value!(i8, Int8);
from_sql_value!(i16, Int16);
from_sql_value!(i32, Int32);
from_sql_value!(i64, Int64);
from_sql_value!(i128, Int128);
from_sql_value!(f32, Float32);
from_sql_value!(f64, Float64);
from_sql_value!(Decimal, Decimal);
from_sql_value!(String, Text);
from_sql_value!(Vec<char>, Chars);
from_sql_value!(Vec<u8>, Bytes);
from_sql_value!(NaiveDate, Date);
from_sql_value!(NaiveTime, Time);
from_sql_value!(DateTime<Utc>, Timestamp);
from_sql_value!(BinaryStream, BinaryStream);
from_sql_value!(CharStream, CharStream);

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn target() -> TargetType {
        T::target()
    }

    fn from_sql_value(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => Some(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}
