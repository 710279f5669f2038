// Status API modules
pub mod api;
pub mod types;


// Re-export all public types for easy access
pub use api::*;
pub use types::*;
