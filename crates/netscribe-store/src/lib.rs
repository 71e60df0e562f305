//! Netscribe Store — extension-local persistence shared by every context.
//!
//! Scalar settings and append-only log collections live behind the
//! [`Storage`] trait. Every write is announced on a broadcast channel so
//! each context can keep its own mirror of the configuration current.

pub mod keys;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::*;
