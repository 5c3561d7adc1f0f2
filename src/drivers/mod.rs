mod tokio_postgres;

pub use self::in_memory_test::{
    InMemoryResult, InMemoryRows, InMemoryTestDriver, InMemoryTestResponse,
    InMemoryTestResponseBuilder, RecordedQuery,
};
pub use self::tokio_postgres::TokioPostgresDriver;
