//! Data models
//!
//! Shared between the printing service and the front end (via JSON).
//! Money amounts are integer pesos (`i64`), no decimals.

pub mod device;
pub mod print_options;
pub mod print_result;
pub mod sale;

// Re-exports
pub use device::*;
pub use print_options::*;
pub use print_result::*;
pub use sale::*;
