//! Shared utilities for the backup guardian.

pub mod errors;
pub mod logger;

pub use errors::{GuardianError, Result};
