//! Core utilities: configuration, error types, logging, and process
//! helpers shared across the download engine.

pub mod config;
pub mod error;
pub mod logging;
pub mod process;

pub use config::SupervisorConfig;
pub use error::{SubmitError, SubmitResult};
