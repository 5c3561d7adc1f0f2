mod binder;
mod driver;
mod value_object;

pub use binder::ParameterBinder;
pub use driver::{DatabaseDriver, GeneratedKeys, PreparedStatement, RawResult};
pub use value_object::{Field, FieldReader, ValueObject};
