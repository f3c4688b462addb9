//! Domain model for objaddr
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Checked address arithmetic
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{FramePtr, ModuleRecord, ObjectFrame, SafeObjectFrame};

pub use errors::{ImageBaseError, LocateError, MapsError};
