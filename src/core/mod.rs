//! Core abstractions shared by providers, the scheduler and the CLI

pub mod config;
pub mod display;
pub mod error;
pub mod log;
pub mod rate;

// Re-export main types for cleaner imports
pub use display::Display;
pub use error::{CycleError, FetchError};
pub use rate::{FetchAttempt, RateProvider, RateReading};
