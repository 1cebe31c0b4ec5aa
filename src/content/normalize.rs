//! Repair of common malformations in math-bearing text.
use once_cell::sync::Lazy;
use regex::Regex;

use super::split::{Segment, segments};

static DOLLAR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\${3,}").expect("valid dollar-run pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));
static STRONG_STARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+?)\*\*").expect("valid strong-star pattern"));
static STRONG_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^_]+?)__").expect("valid strong-underscore pattern"));
static EMPHASIS_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").expect("valid emphasis pattern"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid code pattern"));

/// Repair a content string before any render attempt.
///
/// Rules, in order: runs of three or more dollars collapse to `$$`; markdown
/// emphasis and inline-code markers outside math are stripped (their text
/// kept); whitespace runs collapse to one space, including just inside
/// delimiters; delimiter pairs with nothing but whitespace between them are
/// dropped.
///
/// The rules are applied until the string stops changing, so the function is
/// idempotent: `normalize(&normalize(s)) == normalize(s)`. It never fails; an
/// empty input yields an empty output.
///
/// # Examples
///
/// ```rust
/// use mathrender::content::normalize;
///
/// assert_eq!(normalize("**Sonuç:** $$$ x^2 $$$"), "Sonuç: $$x^2$$");
/// assert_eq!(normalize("a $$ $$ b"), "a b");
/// ```
pub fn normalize(content: &str) -> String {
    if content.is_empty() {
        return String::new();
    }
    let mut current = normalize_pass(content);
    // Every pass that changes the string shortens it or turns a non-space
    // whitespace character into a space, so this converges.
    for _ in 0..=2 * content.len() {
        let next = normalize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn normalize_pass(content: &str) -> String {
    let collapsed = DOLLAR_RUN.replace_all(content, "$$$$");
    let mut out = String::with_capacity(collapsed.len());

    for segment in segments(&collapsed) {
        match segment {
            Segment::Text(text) => out.push_str(&strip_markdown(text)),
            Segment::Math {
                open, inner, close, ..
            } => {
                let inner = WHITESPACE.replace_all(inner, " ");
                let inner = inner.trim();
                if inner.is_empty() {
                    continue;
                }
                out.push_str(open);
                out.push_str(inner);
                out.push_str(close);
            },
        }
    }

    WHITESPACE.replace_all(&out, " ").trim().to_string()
}

fn strip_markdown(text: &str) -> String {
    let text = STRONG_STARS.replace_all(text, "$1");
    let text = STRONG_UNDERSCORES.replace_all(&text, "$1");
    let text = EMPHASIS_STAR.replace_all(&text, "$1");
    INLINE_CODE.replace_all(&text, "$1").into_owned()
}
