use async_trait::async_trait;

use crate::error::Result;
use crate::traits::ParameterBinder;
use crate::types::{ColumnMeta, SqlValue};

/// Which generated identity columns an insert should report back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeneratedKeys {
    /// Do not request generated keys.
    #[default]
    None,
    /// Request every generated column.
    All,
    /// Request the named columns only.
    Columns(Vec<String>),
}

impl GeneratedKeys {
    pub fn is_requested(&self) -> bool {
        !matches!(self, GeneratedKeys::None)
    }
}

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Connecting to the database
/// - Preparing SQL that uses positional `?` placeholders
/// - Converting bound parameters to native types
/// - Exposing results as typed raw values through [`RawResult`]
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Prepares a statement. `keys` says whether the statement should make
    /// generated identities available after an update.
    async fn prepare(&self, sql: &str, keys: GeneratedKeys) -> Result<Box<dyn PreparedStatement>>;
}

/// A prepared statement with positional parameters, bound 1-based.
#[async_trait]
pub trait PreparedStatement: ParameterBinder + Send {
    /// Runs the statement and returns its rows.
    async fn execute_query(&mut self) -> Result<Box<dyn RawResult>>;

    /// Runs the statement and returns the affected row count.
    async fn execute_update(&mut self) -> Result<u64>;

    /// The generated identities of the last update, if keys were requested
    /// when the statement was prepared.
    async fn generated_identities(&mut self) -> Result<Option<Box<dyn RawResult>>>;

    /// Releases driver resources. Must be safe to call more than once.
    fn close(&mut self) {}
}

/// A forward-only raw result as produced by a driver.
#[async_trait]
pub trait RawResult: Send {
    fn columns(&self) -> &[ColumnMeta];

    /// Moves to the next row. Returns `false` once the rows are exhausted.
    async fn next(&mut self) -> Result<bool>;

    /// The raw value of the current row at a 0-based column index.
    fn value(&self, index: usize) -> Result<SqlValue>;

    fn close(&mut self) {}
}
