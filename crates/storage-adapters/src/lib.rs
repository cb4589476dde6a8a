//! echohub/crates/storage-adapters/src/lib.rs
//!
//! Persistence adapters for the repository ports.
//!
//! * `memory`: always compiled. One lock over every table, so multi-table
//!   mutations are atomic by construction. Used by tests and single-node runs.
//! * `postgres`: feature `db-postgres`. Every multi-table mutation runs in one
//!   transaction.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
