//! Background services

pub mod stale_sweep;

pub use stale_sweep::{StaleSweepHandle, StaleSweepService};
