//! Binding of rewritten query values onto a prepared statement.

use rust_decimal::Decimal;

use crate::error::{RdaxError, Result};
use crate::registry::TypeRegistry;
use crate::traits::ParameterBinder;
use crate::types::{ColumnType, SqlValue, TargetType};

/// Binds `values` to positions `1..=n` of `binder`, in order.
///
/// Each value goes through the setter for its kind. Fixed-width character
/// data is bound as text through the registry's CHAR conversion, and 128-bit
/// integers as decimals with scale 0.
pub fn bind<B>(registry: &TypeRegistry, binder: &mut B, values: Vec<SqlValue>) -> Result<()>
where
    B: ParameterBinder + ?Sized,
{
    for (offset, value) in values.into_iter().enumerate() {
        let position = offset + 1;
        match value {
            SqlValue::Null => binder.bind_null(position)?,
            SqlValue::Bool(v) => binder.bind_bool(position, v)?,
            SqlValue::Int8(v) => binder.bind_i8(position, v)?,
            SqlValue::Int16(v) => binder.bind_i16(position, v)?,
            SqlValue::Int32(v) => binder.bind_i32(position, v)?,
            SqlValue::Int64(v) => binder.bind_i64(position, v)?,
            SqlValue::Int128(v) => {
                let decimal = Decimal::try_from_i128_with_scale(v, 0)
                    .map_err(|e| RdaxError::bind(position, e.to_string()))?;
                binder.bind_decimal(position, decimal)?
            }
            SqlValue::Float32(v) => binder.bind_f32(position, v)?,
            SqlValue::Float64(v) => binder.bind_f64(position, v)?,
            SqlValue::Decimal(v) => binder.bind_decimal(position, v)?,
            SqlValue::Text(v) => binder.bind_text(position, v)?,
            chars @ SqlValue::Chars(_) => {
                let text = match registry.coerce(chars, ColumnType::Char, TargetType::Text) {
                    Ok(SqlValue::Text(text)) => text,
                    Ok(other) => {
                        return Err(RdaxError::bind(
                            position,
                            format!("character data converted to {}", other.kind_name()),
                        ))
                    }
                    Err(e) => return Err(RdaxError::bind(position, e.to_string())),
                };
                binder.bind_text(position, text)?
            }
            SqlValue::Bytes(v) => binder.bind_bytes(position, v)?,
            SqlValue::Date(v) => binder.bind_date(position, v)?,
            SqlValue::Time(v) => binder.bind_time(position, v)?,
            SqlValue::Timestamp(v) => binder.bind_timestamp(position, v)?,
            SqlValue::BinaryStream(v) => binder.bind_binary_stream(position, v)?,
            SqlValue::CharStream(v) => binder.bind_char_stream(position, v)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BinaryStream, CharStream};
    use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
    use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

    /// Records what each setter received.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(usize, SqlValue)>,
    }

    impl Recorder {
        fn record(&mut self, position: usize, value: SqlValue) -> Result<()> {
            self.calls.push((position, value));
            Ok(())
        }
    }

    impl ParameterBinder for Recorder {
        fn bind_null(&mut self, position: usize) -> Result<()> {
            self.record(position, SqlValue::Null)
        }
        fn bind_bool(&mut self, position: usize, value: bool) -> Result<()> {
            self.record(position, SqlValue::Bool(value))
        }
        fn bind_i8(&mut self, position: usize, value: i8) -> Result<()> {
            self.record(position, SqlValue::Int8(value))
        }
        fn bind_i16(&mut self, position: usize, value: i16) -> Result<()> {
            self.record(position, SqlValue::Int16(value))
        }
        fn bind_i32(&mut self, position: usize, value: i32) -> Result<()> {
            self.record(position, SqlValue::Int32(value))
        }
        fn bind_i64(&mut self, position: usize, value: i64) -> Result<()> {
            self.record(position, SqlValue::Int64(value))
        }
        fn bind_f32(&mut self, position: usize, value: f32) -> Result<()> {
            self.record(position, SqlValue::Float32(value))
        }
        fn bind_f64(&mut self, position: usize, value: f64) -> Result<()> {
            self.record(position, SqlValue::Float64(value))
        }
        fn bind_decimal(&mut self, position: usize, value: Decimal) -> Result<()> {
            self.record(position, SqlValue::Decimal(value))
        }
        fn bind_text(&mut self, position: usize, value: String) -> Result<()> {
            self.record(position, SqlValue::Text(value))
        }
        fn bind_bytes(&mut self, position: usize, value: Vec<u8>) -> Result<()> {
            self.record(position, SqlValue::Bytes(value))
        }
        fn bind_date(&mut self, position: usize, value: NaiveDate) -> Result<()> {
            self.record(position, SqlValue::Date(value))
        }
        fn bind_time(&mut self, position: usize, value: NaiveTime) -> Result<()> {
            self.record(position, SqlValue::Time(value))
        }
        fn bind_timestamp(&mut self, position: usize, value: DateTime<Utc>) -> Result<()> {
            self.record(position, SqlValue::Timestamp(value))
        }
    }

    #[test]
    fn test_binds_one_based_by_kind() {
        let registry = TypeRegistry::standard();
        let mut recorder = Recorder::default();
        bind(
            &registry,
            &mut recorder,
            vec![
                SqlValue::Int32(1),
                SqlValue::Null,
                "a".into(),
                SqlValue::Chars(vec!['x', 'y']),
                SqlValue::Int128(42),
            ],
        )
        .unwrap();

        assert_eq!(
            recorder.calls,
            vec![
                (1, SqlValue::Int32(1)),
                (2, SqlValue::Null),
                (3, SqlValue::Text("a".to_string())),
                (4, SqlValue::Text("xy".to_string())),
                (5, SqlValue::Decimal(Decimal::from(42))),
            ]
        );
    }

    /// Reads a raw column value into its host kind and binds it back.
    fn read_then_bind(raw: SqlValue, column_type: ColumnType, target: TargetType) -> SqlValue {
        let registry = TypeRegistry::standard();
        let host = registry.coerce(raw, column_type, target).unwrap();
        let mut recorder = Recorder::default();
        bind(&registry, &mut recorder, vec![host]).unwrap();
        assert_eq!(recorder.calls.len(), 1);
        recorder.calls.remove(0).1
    }

    #[test]
    fn test_read_values_bind_back_unchanged() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let noon = NaiveTime::from_hms_opt(12, 30, 15).unwrap();
        let instant = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let cases = vec![
            (SqlValue::Float64(1.5), ColumnType::Double, TargetType::Float64, SqlValue::Float64(1.5)),
            (SqlValue::Float32(0.25), ColumnType::Real, TargetType::Float64, SqlValue::Float64(0.25)),
            (SqlValue::Int32(7), ColumnType::Integer, TargetType::Int64, SqlValue::Int64(7)),
            (SqlValue::Int16(-3), ColumnType::SmallInt, TargetType::Int32, SqlValue::Int32(-3)),
            (SqlValue::Int64(9), ColumnType::BigInt, TargetType::Int64, SqlValue::Int64(9)),
            ("hello".into(), ColumnType::VarChar, TargetType::Text, "hello".into()),
            (SqlValue::Chars(vec!['a', 'b', ' ']), ColumnType::Char, TargetType::Chars, "ab ".into()),
            (SqlValue::Bool(true), ColumnType::Boolean, TargetType::Bool, SqlValue::Bool(true)),
            (SqlValue::Date(day), ColumnType::Date, TargetType::Date, SqlValue::Date(day)),
            (SqlValue::Time(noon), ColumnType::Time, TargetType::Time, SqlValue::Time(noon)),
            (
                SqlValue::Timestamp(instant),
                ColumnType::Timestamp,
                TargetType::Timestamp,
                SqlValue::Timestamp(instant),
            ),
            (
                SqlValue::Bytes(vec![0, 1, 255]),
                ColumnType::VarBinary,
                TargetType::Bytes,
                SqlValue::Bytes(vec![0, 1, 255]),
            ),
            (
                SqlValue::Decimal(Decimal::new(12345, 2)),
                ColumnType::Numeric,
                TargetType::Decimal,
                SqlValue::Decimal(Decimal::new(12345, 2)),
            ),
        ];

        for (raw, column_type, target, expected) in cases {
            let bound = read_then_bind(raw, column_type, target);
            assert_eq!(bound, expected, "{} -> {:?}", column_type, target);
        }
    }

    #[test]
    fn test_decimal_and_float_bind_back_within_tolerance() {
        let d = Decimal::new(1, 1);
        match read_then_bind(SqlValue::Decimal(d), ColumnType::Decimal, TargetType::Float64) {
            SqlValue::Float64(f) => {
                let back = Decimal::from_f64(f).unwrap();
                assert!((back - d).abs() < Decimal::new(1, 9));
            }
            other => panic!("Expected Float64, got {:?}", other),
        }

        match read_then_bind(SqlValue::Float64(2.75), ColumnType::Double, TargetType::Decimal) {
            SqlValue::Decimal(d) => assert!((d.to_f64().unwrap() - 2.75).abs() < 1e-9),
            other => panic!("Expected Decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_int128_read_from_binary_binds_as_decimal() {
        let bound = read_then_bind(SqlValue::Bytes(vec![0x01, 0x00]), ColumnType::Binary, TargetType::Int128);
        assert_eq!(bound, SqlValue::Decimal(Decimal::from(256)));
    }

    #[test]
    fn test_streams_unsupported_by_default() {
        let registry = TypeRegistry::standard();
        let mut recorder = Recorder::default();
        let err = bind(
            &registry,
            &mut recorder,
            vec![
                SqlValue::Bool(true),
                SqlValue::BinaryStream(BinaryStream::from_bytes(vec![1])),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RdaxError::Bind { position: 2, .. }));

        let err = bind(
            &registry,
            &mut recorder,
            vec![SqlValue::CharStream(CharStream::from_string("x".to_string()))],
        )
        .unwrap_err();
        assert!(matches!(err, RdaxError::Bind { position: 1, .. }));
    }

    #[test]
    fn test_int128_beyond_decimal_range() {
        let registry = TypeRegistry::standard();
        let mut recorder = Recorder::default();
        let err = bind(&registry, &mut recorder, vec![SqlValue::Int128(i128::MAX)]).unwrap_err();
        assert!(matches!(err, RdaxError::Bind { position: 1, .. }));
    }
}
