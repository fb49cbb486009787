//! Handler module declarations and re-exports

pub mod drc;
pub mod layout;
pub mod query;

// Re-export all handlers for convenient access
pub use drc::*;
pub use layout::*;
pub use query::*;
