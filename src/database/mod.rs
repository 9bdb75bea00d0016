//! Postgres connection pool and schema migrations for the persisted store

pub mod migrations;
mod pool;

pub use pool::Database;
