//! rdax - templated SQL with typed result coercion over async database drivers
//!
//! Queries are written as templates with positional markers (`?` binds a
//! value, `??` expands an IN list, `#` skips a value, `#text` inlines text).
//! Result columns are read through a [`TypeRegistry`] that converts each
//! column type into the host type the caller asks for.
//!
//! # Example
//! ```ignore
//! use rdax::{RdaxClient, SqlValue};
//!
//! // Connect to database
//! let client = RdaxClient::connect("postgres://localhost/mydb").await?;
//! let dao = client.dao();
//!
//! // Insert, skipping the first value so the database generates the id
//! let id = dao
//!     .insert_one(
//!         "insert into person (name, age) values (#, ?, ?)",
//!         vec![SqlValue::Null, "John".into(), 42.into()],
//!         &["id"],
//!     )
//!     .await?;
//!
//! // Execute a SELECT query
//! let mut rows = dao
//!     .select("select name, age from person where id in (??)", vec![], vec![vec![id.into()]])
//!     .await?;
//!
//! while rows.advance().await? {
//!     let name: String = rows.get("name")?;
//!     let age: Option<i64> = rows.get(1)?;
//! }
//! ```

pub mod bind;
pub mod config;
pub mod drivers;
pub mod error;
pub mod registry;
pub mod template;
pub mod traits;
pub mod types;

mod client;
mod dao;

// Re-export main types for convenient access
pub use client::RdaxClient;
pub use crate::config::{Features, RdaxConfig};
pub use dao::Dao;
pub use error::{RdaxError, Result};
pub use registry::TypeRegistry;
pub use template::{rewrite, QueryInputs};
pub use traits::{
    DatabaseDriver, Field, FieldReader, GeneratedKeys, ParameterBinder, PreparedStatement,
    RawResult, ValueObject,
};
pub use types::{
    BinaryStream, CharStream, ColumnMeta, ColumnType, CursorState, FromSqlValue, Identities,
    InsertResults, ResultRows, SqlValue, TargetType,
};
