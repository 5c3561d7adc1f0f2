use std::any::type_name;
use std::vec::IntoIter;

use crate::error::{RdaxError, Result};
use crate::types::{FromSqlValue, SqlValue, TargetType};

/// One field of a value object, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub target: TargetType,
}

impl Field {
    pub const fn new(name: &'static str, target: TargetType) -> Self {
        Self { name, target }
    }
}

/// A plain record whose fields map positionally onto query parameters and
/// result columns.
///
/// # Example
/// ```ignore
/// struct Person {
///     id: i64,
///     name: Option<String>,
/// }
///
/// impl ValueObject for Person {
///     fn fields() -> &'static [Field] {
///         const FIELDS: &[Field] = &[
///             Field::new("id", TargetType::Int64),
///             Field::new("name", TargetType::Text),
///         ];
///         FIELDS
///     }
///
///     fn values(&self) -> Vec<SqlValue> {
///         vec![self.id.into(), self.name.clone().into()]
///     }
///
///     fn from_values(values: Vec<SqlValue>) -> Result<Self> {
///         let mut reader = FieldReader::new(Self::fields(), values);
///         Ok(Person {
///             id: reader.next()?,
///             name: reader.next()?,
///         })
///     }
/// }
/// ```
pub trait ValueObject: Sized {
    fn fields() -> &'static [Field];

    /// Field values in declaration order, used as query parameters.
    fn values(&self) -> Vec<SqlValue>;

    /// Builds the object from values already coerced to each field's target.
    fn from_values(values: Vec<SqlValue>) -> Result<Self>;
}

/// Reads coerced values field by field when assembling a [`ValueObject`].
pub struct FieldReader {
    fields: &'static [Field],
    values: IntoIter<SqlValue>,
    position: usize,
}

impl FieldReader {
    pub fn new(fields: &'static [Field], values: Vec<SqlValue>) -> Self {
        Self {
            fields,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next value as `T`.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: FromSqlValue>(&mut self) -> Result<T> {
        let name = self
            .fields
            .get(self.position)
            .map(|f| f.name)
            .unwrap_or("?");
        self.position += 1;
        let value = self.values.next().ok_or_else(|| {
            RdaxError::ValueObject(format!("no value left for field '{}'", name))
        })?;
        let kind = value.kind_name();
        T::from_sql_value(value).ok_or_else(|| {
            RdaxError::ValueObject(format!(
                "field '{}' cannot be read from {} as {}",
                name,
                kind,
                type_name::<T>()
            ))
        })
    }
}
