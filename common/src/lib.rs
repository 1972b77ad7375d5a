//! Common Utilities and Types Library
//! 
//! This crate provides shared radio types and numeric helpers used by the
//! FAPI translation layer.

pub mod types;
pub mod utils;

// Re-export commonly used items
pub use types::*;
pub use utils::*;
