//! HTTP front door
//!
//! JSON API under `/api`, a liveness probe, and static files for everything else.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{ApiServer, AppState};
