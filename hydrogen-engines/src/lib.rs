//! One [`hydrogen_db_core::EngineAdapter`] implementation per
//! [`hydrogen_db_core::EngineKind`], selected at build time through Cargo
//! features rather than dynamic-library loading: a static registry of
//! adapter implementations chosen at build time, instead of a runtime
//! symbol lookup against a dynamically loaded driver library.

#[cfg(feature = "ai")]
pub mod ai_adapter;
#[cfg(feature = "db2")]
pub mod db2_adapter;
#[cfg(feature = "mysql")]
pub mod mysql_adapter;
#[cfg(feature = "postgresql")]
pub mod postgres_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;

pub mod registry;

pub use registry::EngineRegistry;
