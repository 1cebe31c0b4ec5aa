//! Pure string analysis performed before any render attempt.
//!
//! - [`classify`]: decides whether a string is text, simple math, complex
//!   math or prose with embedded math, and scores its complexity
//! - [`normalize`]: repairs duplicated delimiters, stray whitespace and
//!   markdown artifacts; idempotent
//! - [`split`]: breaks mixed content into ordered text and math parts
//! - [`Fingerprint`]: cache key over normalized content and options
//!
//! None of these functions can fail; input without recognizable structure
//! is simply classified as text.

mod classify;
mod fingerprint;
mod normalize;
mod split;

pub use classify::{
    COMPLEXITY_THRESHOLD, Classification, ContentKind, PROSE_WORD_THRESHOLD, classify,
    complexity_score,
};
pub use fingerprint::Fingerprint;
pub use normalize::normalize;
pub use split::{ContentPart, ContentParts, split};

pub(crate) use split::{Segment, has_math, looks_like_tex, segments};
