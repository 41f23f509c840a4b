//! Core types shared by every storage engine and by the queue layer: the
//! engine tag set, the unified error taxonomy, connection configuration and
//! string building, the prepared-statement cache, the engine-adapter trait,
//! and the connection handle that ties them together.

pub mod adapter;
pub mod connection_config;
pub mod connection_handle;
pub mod engine_kind;
pub mod error;
pub mod prepared_statement;
pub mod query;
pub mod queue_class;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use adapter::{EngineAdapter, EnginePrivate, ExecuteOutcome};
pub use connection_config::{build_connection_string, ConnectionConfig};
pub use connection_handle::{ConnectionHandle, ConnectionStatus, StatementToken};
pub use engine_kind::EngineKind;
pub use error::{HydrogenError, HydrogenErrorKind, HydrogenResult};
pub use prepared_statement::{EngineStmtHandle, LruTicketSource, PreparedStatement, PreparedStatementCache};
pub use query::DatabaseQuery;
pub use queue_class::QueueClass;
