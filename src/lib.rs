//! Vigil - proxy health-check service
//!
//! Keeps a persisted collection of proxy endpoints and their last known
//! health, probing them in bounded batches through an external probe service.
//!
//! ## Features
//!
//! - Manual full refresh and background stale sweeps, one cycle at a time
//! - Results merged and persisted batch by batch
//! - Staleness-aware status: a check older than ten minutes reads as unknown
//! - Bulk import of `ip,port,country,org` lists
//! - JSON API and static dashboard
//! - PostgreSQL or in-memory key-value persistence

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod models;
pub mod repository;
pub mod services;

pub use config::Config;
pub use database::Database;
pub use error::{Result, VigilError};
