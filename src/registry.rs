//! Conversions from raw column values to host representations.
//!
//! The registry is a two-level table keyed by the column's declared
//! [`ColumnType`] and the requested [`TargetType`]. Each cell is a plain
//! function over a non-null raw value. The `Void` cell of a column type yields
//! the zero equivalent of that column type, used when the database value is
//! absent and null results are suppressed.
//!
//! Build one registry at start-up with [`TypeRegistry::standard`] and share it
//! read-only (`Arc<TypeRegistry>`); nothing in this crate keeps a global copy.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{RdaxError, Result};
use crate::types::{BinaryStream, CharStream, ColumnType, SqlValue, TargetType};

/// A conversion cell. Receives the raw value (never `Null`, except for `Void`
/// cells) and returns the converted value or a reason for failing.
pub type Converter = fn(SqlValue) -> std::result::Result<SqlValue, String>;

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    conversions: HashMap<ColumnType, HashMap<TargetType, Converter>>,
}

impl TypeRegistry {
    /// A registry with no conversions at all.
    pub fn empty() -> Self {
        Self {
            conversions: HashMap::new(),
        }
    }

    /// The registry with every built-in conversion.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        register_decimals(&mut registry);
        register_integers(&mut registry);
        register_floats(&mut registry);
        register_booleans(&mut registry);
        register_temporals(&mut registry);
        register_text(&mut registry);
        register_binary(&mut registry);
        register_streams(&mut registry);
        registry.register(ColumnType::Null, TargetType::Void, |_| Ok(SqlValue::Null));
        registry
    }

    /// Adds or replaces the conversion for `(from, to)`.
    pub fn register(&mut self, from: ColumnType, to: TargetType, converter: Converter) {
        self.conversions
            .entry(from)
            .or_default()
            .insert(to, converter);
    }

    /// Checks whether a value of column type `from` can be converted to `to`.
    pub fn is_compatible(&self, from: ColumnType, to: TargetType) -> bool {
        self.converter(from, to).is_some()
    }

    pub fn converter(&self, from: ColumnType, to: TargetType) -> Option<Converter> {
        self.conversions.get(&from)?.get(&to).copied()
    }

    /// Converts a raw value of column type `source` to `target`.
    ///
    /// A `Null` input is first replaced by the column type's void equivalent,
    /// which is returned as is for `TargetType::Void` and otherwise converted
    /// to `target` like any other raw value.
    pub fn coerce(&self, value: SqlValue, source: ColumnType, target: TargetType) -> Result<SqlValue> {
        let value = if value.is_null() {
            let zero = self.apply(SqlValue::Null, source, TargetType::Void)?;
            if target == TargetType::Void || zero.is_null() {
                return Ok(zero);
            }
            zero
        } else {
            value
        };
        self.apply(value, source, target)
    }

    fn apply(&self, value: SqlValue, source: ColumnType, target: TargetType) -> Result<SqlValue> {
        let convert = self
            .converter(source, target)
            .ok_or_else(|| RdaxError::coercion(source, target, "no registered conversion"))?;
        convert(value).map_err(|reason| RdaxError::coercion(source, target, reason))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

type Cell<T> = std::result::Result<T, String>;

fn unexpected(expected: &str, found: &SqlValue) -> String {
    format!("expected a {} value, found {}", expected, found.kind_name())
}

fn out_of_range(value: impl std::fmt::Display, target: &str) -> String {
    format!("{} is out of range for {}", value, target)
}

fn decimal(value: SqlValue) -> Cell<Decimal> {
    match value {
        SqlValue::Decimal(d) => Ok(d),
        other => Err(unexpected("decimal", &other)),
    }
}

// Integer readers accept any narrower integer kind, since widening is exact.
fn int64(value: SqlValue) -> Cell<i64> {
    match value {
        SqlValue::Int8(v) => Ok(v.into()),
        SqlValue::Int16(v) => Ok(v.into()),
        SqlValue::Int32(v) => Ok(v.into()),
        SqlValue::Int64(v) => Ok(v),
        other => Err(unexpected("i64", &other)),
    }
}

fn int32(value: SqlValue) -> Cell<i32> {
    match value {
        SqlValue::Int8(v) => Ok(v.into()),
        SqlValue::Int16(v) => Ok(v.into()),
        SqlValue::Int32(v) => Ok(v),
        other => Err(unexpected("i32", &other)),
    }
}

fn int16(value: SqlValue) -> Cell<i16> {
    match value {
        SqlValue::Int8(v) => Ok(v.into()),
        SqlValue::Int16(v) => Ok(v),
        other => Err(unexpected("i16", &other)),
    }
}

fn int8(value: SqlValue) -> Cell<i8> {
    match value {
        SqlValue::Int8(v) => Ok(v),
        other => Err(unexpected("i8", &other)),
    }
}

fn float64(value: SqlValue) -> Cell<f64> {
    match value {
        SqlValue::Float32(v) => Ok(v.into()),
        SqlValue::Float64(v) => Ok(v),
        other => Err(unexpected("f64", &other)),
    }
}

fn float32(value: SqlValue) -> Cell<f32> {
    match value {
        SqlValue::Float32(v) => Ok(v),
        other => Err(unexpected("f32", &other)),
    }
}

fn boolean(value: SqlValue) -> Cell<bool> {
    match value {
        SqlValue::Bool(v) => Ok(v),
        other => Err(unexpected("bool", &other)),
    }
}

fn text(value: SqlValue) -> Cell<String> {
    match value {
        SqlValue::Text(v) => Ok(v),
        SqlValue::Chars(v) => Ok(v.into_iter().collect()),
        other => Err(unexpected("text", &other)),
    }
}

fn chars(value: SqlValue) -> Cell<Vec<char>> {
    match value {
        SqlValue::Chars(v) => Ok(v),
        SqlValue::Text(v) => Ok(v.chars().collect()),
        other => Err(unexpected("chars", &other)),
    }
}

fn bytes(value: SqlValue) -> Cell<Vec<u8>> {
    match value {
        SqlValue::Bytes(v) => Ok(v),
        other => Err(unexpected("bytes", &other)),
    }
}

fn date(value: SqlValue) -> Cell<NaiveDate> {
    match value {
        SqlValue::Date(v) => Ok(v),
        other => Err(unexpected("date", &other)),
    }
}

fn time(value: SqlValue) -> Cell<NaiveTime> {
    match value {
        SqlValue::Time(v) => Ok(v),
        other => Err(unexpected("time", &other)),
    }
}

fn timestamp(value: SqlValue) -> Cell<DateTime<Utc>> {
    match value {
        SqlValue::Timestamp(v) => Ok(v),
        other => Err(unexpected("timestamp", &other)),
    }
}

fn binary_stream(value: SqlValue) -> Cell<BinaryStream> {
    match value {
        SqlValue::BinaryStream(v) => Ok(v),
        SqlValue::Bytes(v) => Ok(BinaryStream::from_bytes(v)),
        other => Err(unexpected("binary stream", &other)),
    }
}

fn char_stream(value: SqlValue) -> Cell<CharStream> {
    match value {
        SqlValue::CharStream(v) => Ok(v),
        SqlValue::Text(v) => Ok(CharStream::from_string(v)),
        other => Err(unexpected("character stream", &other)),
    }
}

/// Reads big-endian two's complement bytes as a signed integer. No bytes
/// read as zero, so the empty void value converts like any other.
fn int128_from_be(raw: &[u8]) -> Cell<i128> {
    if raw.is_empty() {
        return Ok(0);
    }
    if raw.len() > 16 {
        return Err(format!("{} bytes is out of range for i128", raw.len()));
    }
    let fill = if raw[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - raw.len()..].copy_from_slice(raw);
    Ok(i128::from_be_bytes(buf))
}

// DECIMAL and NUMERIC: narrowing to integers truncates toward zero.
fn register_decimals(registry: &mut TypeRegistry) {
    for source in [ColumnType::Decimal, ColumnType::Numeric] {
        registry.register(source, TargetType::Int128, |v| {
            let d = decimal(v)?.trunc();
            d.to_i128()
                .map(SqlValue::Int128)
                .ok_or_else(|| out_of_range(d, "i128"))
        });
        registry.register(source, TargetType::Int64, |v| {
            let d = decimal(v)?.trunc();
            d.to_i64()
                .map(SqlValue::Int64)
                .ok_or_else(|| out_of_range(d, "i64"))
        });
        registry.register(source, TargetType::Int32, |v| {
            let d = decimal(v)?.trunc();
            d.to_i32()
                .map(SqlValue::Int32)
                .ok_or_else(|| out_of_range(d, "i32"))
        });
        registry.register(source, TargetType::Int16, |v| {
            let d = decimal(v)?.trunc();
            d.to_i16()
                .map(SqlValue::Int16)
                .ok_or_else(|| out_of_range(d, "i16"))
        });
        registry.register(source, TargetType::Float64, |v| {
            let d = decimal(v)?;
            d.to_f64()
                .map(SqlValue::Float64)
                .ok_or_else(|| out_of_range(d, "f64"))
        });
        registry.register(source, TargetType::Float32, |v| {
            let d = decimal(v)?;
            d.to_f32()
                .map(SqlValue::Float32)
                .ok_or_else(|| out_of_range(d, "f32"))
        });
        registry.register(source, TargetType::Text, |v| {
            Ok(SqlValue::Text(decimal(v)?.to_string()))
        });
        registry.register(source, TargetType::Decimal, |v| Ok(SqlValue::Decimal(decimal(v)?)));
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Decimal(Decimal::ZERO)));
    }
}

fn register_integers(registry: &mut TypeRegistry) {
    let bigint = ColumnType::BigInt;
    registry.register(bigint, TargetType::Int128, |v| Ok(SqlValue::Int128(int64(v)?.into())));
    registry.register(bigint, TargetType::Int64, |v| Ok(SqlValue::Int64(int64(v)?)));
    registry.register(bigint, TargetType::Int32, |v| {
        let n = int64(v)?;
        i32::try_from(n)
            .map(SqlValue::Int32)
            .map_err(|_| out_of_range(n, "i32"))
    });
    registry.register(bigint, TargetType::Int16, |v| {
        let n = int64(v)?;
        i16::try_from(n)
            .map(SqlValue::Int16)
            .map_err(|_| out_of_range(n, "i16"))
    });
    registry.register(bigint, TargetType::Float64, |v| Ok(SqlValue::Float64(int64(v)? as f64)));
    registry.register(bigint, TargetType::Float32, |v| Ok(SqlValue::Float32(int64(v)? as f32)));
    registry.register(bigint, TargetType::Decimal, |v| Ok(SqlValue::Decimal(int64(v)?.into())));
    registry.register(bigint, TargetType::Text, |v| Ok(SqlValue::Text(int64(v)?.to_string())));
    registry.register(bigint, TargetType::Void, |_| Ok(SqlValue::Int64(0)));

    let integer = ColumnType::Integer;
    registry.register(integer, TargetType::Int128, |v| Ok(SqlValue::Int128(int32(v)?.into())));
    registry.register(integer, TargetType::Int64, |v| Ok(SqlValue::Int64(int32(v)?.into())));
    registry.register(integer, TargetType::Int32, |v| Ok(SqlValue::Int32(int32(v)?)));
    registry.register(integer, TargetType::Int16, |v| {
        let n = int32(v)?;
        i16::try_from(n)
            .map(SqlValue::Int16)
            .map_err(|_| out_of_range(n, "i16"))
    });
    registry.register(integer, TargetType::Int8, |v| {
        let n = int32(v)?;
        i8::try_from(n)
            .map(SqlValue::Int8)
            .map_err(|_| out_of_range(n, "i8"))
    });
    registry.register(integer, TargetType::Float64, |v| Ok(SqlValue::Float64(int32(v)?.into())));
    registry.register(integer, TargetType::Float32, |v| Ok(SqlValue::Float32(int32(v)? as f32)));
    registry.register(integer, TargetType::Decimal, |v| Ok(SqlValue::Decimal(int32(v)?.into())));
    registry.register(integer, TargetType::Text, |v| Ok(SqlValue::Text(int32(v)?.to_string())));
    registry.register(integer, TargetType::Void, |_| Ok(SqlValue::Int32(0)));

    let smallint = ColumnType::SmallInt;
    registry.register(smallint, TargetType::Int128, |v| Ok(SqlValue::Int128(int16(v)?.into())));
    registry.register(smallint, TargetType::Int64, |v| Ok(SqlValue::Int64(int16(v)?.into())));
    registry.register(smallint, TargetType::Int32, |v| Ok(SqlValue::Int32(int16(v)?.into())));
    registry.register(smallint, TargetType::Int16, |v| Ok(SqlValue::Int16(int16(v)?)));
    registry.register(smallint, TargetType::Int8, |v| {
        let n = int16(v)?;
        i8::try_from(n)
            .map(SqlValue::Int8)
            .map_err(|_| out_of_range(n, "i8"))
    });
    registry.register(smallint, TargetType::Float64, |v| Ok(SqlValue::Float64(int16(v)?.into())));
    registry.register(smallint, TargetType::Float32, |v| Ok(SqlValue::Float32(int16(v)?.into())));
    registry.register(smallint, TargetType::Decimal, |v| Ok(SqlValue::Decimal(int16(v)?.into())));
    registry.register(smallint, TargetType::Text, |v| Ok(SqlValue::Text(int16(v)?.to_string())));
    registry.register(smallint, TargetType::Void, |_| Ok(SqlValue::Int16(0)));

    let tinyint = ColumnType::TinyInt;
    registry.register(tinyint, TargetType::Int128, |v| Ok(SqlValue::Int128(int8(v)?.into())));
    registry.register(tinyint, TargetType::Int64, |v| Ok(SqlValue::Int64(int8(v)?.into())));
    registry.register(tinyint, TargetType::Int32, |v| Ok(SqlValue::Int32(int8(v)?.into())));
    registry.register(tinyint, TargetType::Int16, |v| Ok(SqlValue::Int16(int8(v)?.into())));
    registry.register(tinyint, TargetType::Int8, |v| Ok(SqlValue::Int8(int8(v)?)));
    registry.register(tinyint, TargetType::Float64, |v| Ok(SqlValue::Float64(int8(v)?.into())));
    registry.register(tinyint, TargetType::Float32, |v| Ok(SqlValue::Float32(int8(v)?.into())));
    registry.register(tinyint, TargetType::Decimal, |v| Ok(SqlValue::Decimal(int8(v)?.into())));
    registry.register(tinyint, TargetType::Text, |v| Ok(SqlValue::Text(int8(v)?.to_string())));
    registry.register(tinyint, TargetType::Void, |_| Ok(SqlValue::Int8(0)));
}

// Float to integer casts truncate toward zero and saturate at the bounds.
fn register_floats(registry: &mut TypeRegistry) {
    for source in [ColumnType::Double, ColumnType::Float] {
        registry.register(source, TargetType::Int64, |v| Ok(SqlValue::Int64(float64(v)? as i64)));
        registry.register(source, TargetType::Int32, |v| Ok(SqlValue::Int32(float64(v)? as i32)));
        registry.register(source, TargetType::Int16, |v| Ok(SqlValue::Int16(float64(v)? as i16)));
        registry.register(source, TargetType::Float64, |v| Ok(SqlValue::Float64(float64(v)?)));
        registry.register(source, TargetType::Float32, |v| Ok(SqlValue::Float32(float64(v)? as f32)));
        registry.register(source, TargetType::Decimal, |v| {
            let f = float64(v)?;
            Decimal::from_f64(f)
                .map(SqlValue::Decimal)
                .ok_or_else(|| out_of_range(f, "decimal"))
        });
        registry.register(source, TargetType::Text, |v| Ok(SqlValue::Text(float64(v)?.to_string())));
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Float64(0.0)));
    }

    let real = ColumnType::Real;
    registry.register(real, TargetType::Int64, |v| Ok(SqlValue::Int64(float32(v)? as i64)));
    registry.register(real, TargetType::Int32, |v| Ok(SqlValue::Int32(float32(v)? as i32)));
    registry.register(real, TargetType::Int16, |v| Ok(SqlValue::Int16(float32(v)? as i16)));
    registry.register(real, TargetType::Float64, |v| Ok(SqlValue::Float64(float32(v)?.into())));
    registry.register(real, TargetType::Float32, |v| Ok(SqlValue::Float32(float32(v)?)));
    registry.register(real, TargetType::Decimal, |v| {
        let f = float32(v)?;
        Decimal::from_f32(f)
            .map(SqlValue::Decimal)
            .ok_or_else(|| out_of_range(f, "decimal"))
    });
    registry.register(real, TargetType::Text, |v| Ok(SqlValue::Text(float32(v)?.to_string())));
    registry.register(real, TargetType::Void, |_| Ok(SqlValue::Float32(0.0)));
}

fn register_booleans(registry: &mut TypeRegistry) {
    for source in [ColumnType::Boolean, ColumnType::Bit] {
        registry.register(source, TargetType::Bool, |v| Ok(SqlValue::Bool(boolean(v)?)));
        registry.register(source, TargetType::Text, |v| {
            let s = if boolean(v)? { "true" } else { "false" };
            Ok(SqlValue::Text(s.to_string()))
        });
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Bool(false)));
    }
}

fn register_temporals(registry: &mut TypeRegistry) {
    let date_type = ColumnType::Date;
    registry.register(date_type, TargetType::Date, |v| Ok(SqlValue::Date(date(v)?)));
    registry.register(date_type, TargetType::Text, |v| Ok(SqlValue::Text(date(v)?.to_string())));
    registry.register(date_type, TargetType::Void, |_| {
        Ok(SqlValue::Date(DateTime::<Utc>::UNIX_EPOCH.date_naive()))
    });

    for source in [ColumnType::Time, ColumnType::TimeWithTimezone] {
        registry.register(source, TargetType::Time, |v| Ok(SqlValue::Time(time(v)?)));
        registry.register(source, TargetType::Text, |v| Ok(SqlValue::Text(time(v)?.to_string())));
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Time(NaiveTime::MIN)));
    }

    for source in [ColumnType::Timestamp, ColumnType::TimestampWithTimezone] {
        registry.register(source, TargetType::Timestamp, |v| Ok(SqlValue::Timestamp(timestamp(v)?)));
        registry.register(source, TargetType::Int64, |v| {
            Ok(SqlValue::Int64(timestamp(v)?.timestamp_millis()))
        });
        registry.register(source, TargetType::Text, |v| {
            Ok(SqlValue::Text(timestamp(v)?.to_rfc3339()))
        });
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Timestamp(DateTime::<Utc>::UNIX_EPOCH)));
    }
}

fn register_text(registry: &mut TypeRegistry) {
    for source in [
        ColumnType::VarChar,
        ColumnType::LongVarChar,
        ColumnType::NVarChar,
        ColumnType::LongNVarChar,
        ColumnType::NChar,
    ] {
        registry.register(source, TargetType::Text, |v| Ok(SqlValue::Text(text(v)?)));
        registry.register(source, TargetType::Chars, |v| Ok(SqlValue::Chars(chars(v)?)));
        registry.register(source, TargetType::CharStream, |v| {
            Ok(SqlValue::CharStream(char_stream(v)?))
        });
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Text(String::new())));
    }

    // CHAR values reach the registry already padded to the column width.
    let fixed = ColumnType::Char;
    registry.register(fixed, TargetType::Text, |v| Ok(SqlValue::Text(text(v)?)));
    registry.register(fixed, TargetType::Chars, |v| Ok(SqlValue::Chars(chars(v)?)));
    registry.register(fixed, TargetType::Void, |_| Ok(SqlValue::Chars(Vec::new())));
}

fn register_binary(registry: &mut TypeRegistry) {
    for source in [
        ColumnType::Binary,
        ColumnType::VarBinary,
        ColumnType::LongVarBinary,
    ] {
        registry.register(source, TargetType::Bytes, |v| Ok(SqlValue::Bytes(bytes(v)?)));
        registry.register(source, TargetType::Int128, |v| {
            Ok(SqlValue::Int128(int128_from_be(&bytes(v)?)?))
        });
        registry.register(source, TargetType::BinaryStream, |v| {
            Ok(SqlValue::BinaryStream(binary_stream(v)?))
        });
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::Bytes(Vec::new())));
    }
}

fn register_streams(registry: &mut TypeRegistry) {
    let blob = ColumnType::Blob;
    registry.register(blob, TargetType::BinaryStream, |v| {
        Ok(SqlValue::BinaryStream(binary_stream(v)?))
    });
    registry.register(blob, TargetType::Bytes, |v| {
        let stream = binary_stream(v)?;
        stream
            .read_all()
            .map(SqlValue::Bytes)
            .map_err(|e| e.to_string())
    });
    registry.register(blob, TargetType::Void, |_| Ok(SqlValue::BinaryStream(BinaryStream::empty())));

    for source in [ColumnType::Clob, ColumnType::NClob] {
        registry.register(source, TargetType::CharStream, |v| {
            Ok(SqlValue::CharStream(char_stream(v)?))
        });
        registry.register(source, TargetType::Text, |v| {
            let stream = char_stream(v)?;
            stream
                .read_all()
                .map(SqlValue::Text)
                .map_err(|e| e.to_string())
        });
        registry.register(source, TargetType::Void, |_| Ok(SqlValue::CharStream(CharStream::empty())));
    }
}
