use crate::error::{RdaxError, Result};
use crate::registry::TypeRegistry;
use crate::traits::RawResult;
use crate::types::{ColumnType, SqlValue, TargetType};

/// Generated identities of an insert, one per inserted row, in the order the
/// driver reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identities {
    values: Vec<(ColumnType, SqlValue)>,
}

impl Identities {
    pub fn new(values: Vec<(ColumnType, SqlValue)>) -> Self {
        Self { values }
    }

    /// Drains a generated-keys result, taking the first column of each row.
    pub(crate) async fn read(result: &mut dyn RawResult) -> Result<Self> {
        let column_type = result
            .columns()
            .first()
            .map(|c| c.column_type)
            .unwrap_or(ColumnType::Null);
        let mut values = Vec::new();
        while result.next().await? {
            values.push((column_type, result.value(0)?));
        }
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.values.get(index).map(|(t, _)| *t)
    }

    /// The raw identity value.
    pub fn raw(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index).map(|(_, v)| v)
    }

    /// The identity as an integer, converted by `registry` from its column
    /// type. Column types with no integer conversion are read as text and
    /// parsed.
    pub fn as_i64(&self, registry: &TypeRegistry, index: usize) -> Result<i64> {
        let (column_type, value) = self.present(index, TargetType::Int64)?;
        if registry.is_compatible(column_type, TargetType::Int64) {
            return match registry.coerce(value, column_type, TargetType::Int64)? {
                SqlValue::Int64(v) => Ok(v),
                other => Err(RdaxError::coercion(
                    column_type,
                    TargetType::Int64,
                    format!("converted to {}", other.kind_name()),
                )),
            };
        }
        let text = self.as_string(registry, index)?;
        text.trim().parse().map_err(|_| {
            RdaxError::coercion(column_type, TargetType::Int64, format!("'{}' is not an integer", text))
        })
    }

    /// The identity rendered as text by `registry`.
    pub fn as_string(&self, registry: &TypeRegistry, index: usize) -> Result<String> {
        let (column_type, value) = self.present(index, TargetType::Text)?;
        match registry.coerce(value, column_type, TargetType::Text)? {
            SqlValue::Text(v) => Ok(v),
            other => Err(RdaxError::coercion(
                column_type,
                TargetType::Text,
                format!("converted to {}", other.kind_name()),
            )),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ColumnType, SqlValue)> {
        self.values.iter()
    }

    fn entry(&self, index: usize) -> Result<(ColumnType, &SqlValue)> {
        self.values
            .get(index)
            .map(|(t, v)| (*t, v))
            .ok_or_else(|| {
                RdaxError::ColumnNotFound(format!(
                    "identity {} (insert returned {})",
                    index,
                    self.values.len()
                ))
            })
    }

    // A generated key is never read as the column's zero value.
    fn present(&self, index: usize, target: TargetType) -> Result<(ColumnType, SqlValue)> {
        let (column_type, value) = self.entry(index)?;
        if value.is_null() {
            return Err(RdaxError::coercion(column_type, target, "identity is null"));
        }
        Ok((column_type, value.clone()))
    }
}

/// Outcome of an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResults {
    /// Affected row count
    pub count: u64,
    /// Generated identities, when they were requested
    pub identities: Option<Identities>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::InMemoryResult;
    use crate::types::ColumnMeta;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_read_first_column_of_each_row() {
        let mut result = InMemoryResult::new(
            vec![
                ColumnMeta::new("id", ColumnType::BigInt),
                ColumnMeta::new("other", ColumnType::VarChar),
            ],
            vec![
                vec![SqlValue::Int64(10), "a".into()],
                vec![SqlValue::Int64(11), "b".into()],
            ],
        );
        let identities = Identities::read(&mut result).await.unwrap();
        let registry = TypeRegistry::standard();
        assert_eq!(identities.len(), 2);
        assert_eq!(identities.column_type(1), Some(ColumnType::BigInt));
        assert_eq!(identities.as_i64(&registry, 1).unwrap(), 11);
        assert_eq!(identities.as_string(&registry, 0).unwrap(), "10");
    }

    #[test]
    fn test_text_identity_parses() {
        let registry = TypeRegistry::standard();
        let identities = Identities::new(vec![(ColumnType::VarChar, " 42 ".into())]);
        assert_eq!(identities.as_i64(&registry, 0).unwrap(), 42);

        let identities = Identities::new(vec![(ColumnType::VarChar, "abc".into())]);
        assert!(matches!(identities.as_i64(&registry, 0), Err(RdaxError::Coercion { .. })));
    }

    #[test]
    fn test_numeric_identity_follows_registry_rules() {
        let registry = TypeRegistry::standard();
        let identities = Identities::new(vec![
            (ColumnType::Numeric, SqlValue::Decimal(Decimal::new(-4299, 2))),
            (ColumnType::Numeric, SqlValue::Decimal(Decimal::MAX)),
            (ColumnType::Char, SqlValue::Chars(vec!['7', ' '])),
        ]);
        // Decimals truncate toward zero, as they do when read from a cursor.
        assert_eq!(identities.as_i64(&registry, 0).unwrap(), -42);
        assert_eq!(identities.as_string(&registry, 0).unwrap(), "-42.99");
        assert!(matches!(
            identities.as_i64(&registry, 1),
            Err(RdaxError::Coercion { target: TargetType::Int64, .. })
        ));
        assert_eq!(identities.as_i64(&registry, 2).unwrap(), 7);
        assert_eq!(identities.as_string(&registry, 2).unwrap(), "7 ");
    }

    #[test]
    fn test_identity_conversion_uses_custom_registry() {
        let mut registry = TypeRegistry::standard();
        registry.register(ColumnType::Other(1111), TargetType::Text, |v| match v {
            SqlValue::Bytes(b) => Ok(SqlValue::Text(b.len().to_string())),
            other => Err(format!("unexpected {}", other.kind_name())),
        });
        let identities = Identities::new(vec![(ColumnType::Other(1111), SqlValue::Bytes(vec![1, 2, 3]))]);
        assert_eq!(identities.as_i64(&registry, 0).unwrap(), 3);
        assert!(identities.as_i64(&TypeRegistry::standard(), 0).is_err());
    }

    #[test]
    fn test_null_identity_is_an_error() {
        let registry = TypeRegistry::standard();
        let identities = Identities::new(vec![(ColumnType::BigInt, SqlValue::Null)]);
        assert!(matches!(identities.as_i64(&registry, 0), Err(RdaxError::Coercion { .. })));
        assert!(matches!(identities.as_string(&registry, 0), Err(RdaxError::Coercion { .. })));
    }

    #[test]
    fn test_missing_identity() {
        let registry = TypeRegistry::standard();
        let identities = Identities::default();
        assert!(identities.is_empty());
        assert!(matches!(identities.as_i64(&registry, 0), Err(RdaxError::ColumnNotFound(_))));
        assert_eq!(identities.raw(0), None);
    }
}
