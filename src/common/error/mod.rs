//! Unified error type for the render core.
//!
//! Every failure a render attempt can produce is a variant of [`Error`]. The
//! type is `Clone` because a single outcome is shared between all callers
//! that joined the same in-flight render.

// Submodule declarations
pub mod types;

// Re-exports
pub use types::{Error, Result};
