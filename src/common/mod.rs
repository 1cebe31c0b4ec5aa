//! Common types and utilities shared across the render core.

// Submodule declarations
pub mod error;
pub mod escape;

// Re-exports for convenience
pub use error::{Error, Result};
pub use escape::{escape_html, strip_tags, unescape_html};
