use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

// Static initialization: automaton is built only once, thread-safe
static HTML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build HTML escaper")
});

// Use LeftmostLongest to ensure longer entities are matched first (e.g., &amp; instead of &lt;)
static HTML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&#39;", "&nbsp;"])
        .expect("Failed to build HTML unescaper")
});

/// Escape HTML special characters.
///
/// # Examples
///
/// ```
/// use mathrender::common::escape_html;
/// assert_eq!(escape_html("a < b & c"), "a &lt; b &amp; c");
/// ```
#[inline]
pub fn escape_html(s: &str) -> String {
    HTML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"])
}

/// Unescape the entities produced by [`escape_html`] plus `&nbsp;`.
///
/// Unknown or malformed entities are left unchanged.
#[inline]
pub fn unescape_html(s: &str) -> String {
    HTML_UNESCAPER.replace_all(s, &["&", "<", ">", "\"", "'", " "])
}

/// Drop every `<...>` tag and unescape what remains.
pub fn strip_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for ch in markup.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {},
        }
    }
    unescape_html(&out)
}
