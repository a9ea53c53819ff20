//! Persistence layer — SQLite-backed storage for scripts, calls, and operators.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, OperatorRecord, OperatorRole};
