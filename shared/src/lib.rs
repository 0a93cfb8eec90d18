//! Shared types for the Boleta printing engine
//!
//! Data model exchanged between the POS front end and the printing
//! service: sale records, per-request print options and the uniform
//! transport result.

pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};
