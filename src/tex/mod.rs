//! Pure-Rust TeX handling: the HTML translator behind the built-in engines
//! and the degraded converters used by the fallback path.

mod html;
mod lexer;
mod plain;
pub mod symbols;
pub mod unicode;

pub use html::{Strictness, render_math, translate};
pub use plain::{to_plain_text, to_simplified_html};
