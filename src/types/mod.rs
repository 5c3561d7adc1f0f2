mod column;
mod from_sql;
mod identities;
mod row;
mod sql_value;

pub use column::{ColumnMeta, ColumnType};
pub use from_sql::FromSqlValue;
pub use identities::{Identities, InsertResults};
pub use row::{ColumnIndex, CursorState, ResultRows};
pub use sql_value::{BinaryStream, CharStream, SqlValue, TargetType};
