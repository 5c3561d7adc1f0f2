use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::error::{RdaxError, Result};
use crate::types::{BinaryStream, CharStream};

/// Typed positional setters of a prepared statement. Positions are 1-based.
///
/// Drivers that cannot stream large objects keep the default stream setters,
/// which reject the parameter.
pub trait ParameterBinder {
    fn bind_null(&mut self, position: usize) -> Result<()>;
    fn bind_bool(&mut self, position: usize, value: bool) -> Result<()>;
    fn bind_i8(&mut self, position: usize, value: i8) -> Result<()>;
    fn bind_i16(&mut self, position: usize, value: i16) -> Result<()>;
    fn bind_i32(&mut self, position: usize, value: i32) -> Result<()>;
    fn bind_i64(&mut self, position: usize, value: i64) -> Result<()>;
    fn bind_f32(&mut self, position: usize, value: f32) -> Result<()>;
    fn bind_f64(&mut self, position: usize, value: f64) -> Result<()>;
    fn bind_decimal(&mut self, position: usize, value: Decimal) -> Result<()>;
    fn bind_text(&mut self, position: usize, value: String) -> Result<()>;
    fn bind_bytes(&mut self, position: usize, value: Vec<u8>) -> Result<()>;
    fn bind_date(&mut self, position: usize, value: NaiveDate) -> Result<()>;
    fn bind_time(&mut self, position: usize, value: NaiveTime) -> Result<()>;
    fn bind_timestamp(&mut self, position: usize, value: DateTime<Utc>) -> Result<()>;

    fn bind_binary_stream(&mut self, position: usize, _value: BinaryStream) -> Result<()> {
        Err(RdaxError::bind(position, "unsupported type: binary stream"))
    }

    fn bind_char_stream(&mut self, position: usize, _value: CharStream) -> Result<()> {
        Err(RdaxError::bind(position, "unsupported type: character stream"))
    }
}
