//! Splitting mixed prose/notation strings into ordered parts.
//!
//! The scanner walks the input once, left to right, and recognizes four
//! delimiter forms: `$$...$$` and `\[...\]` (display), `$...$` and `\(...\)`
//! (inline). An escaped dollar (`\$`) is ordinary text, and an opening
//! delimiter without a matching close is kept as text.
use smallvec::SmallVec;

/// One piece of a mixed-content string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Prose, rendered as escaped text
    Text(String),
    /// Notation with its delimiters stripped
    Math { tex: String, display: bool },
}

impl ContentPart {
    #[inline]
    pub fn is_math(&self) -> bool {
        matches!(self, ContentPart::Math { .. })
    }

    /// The part's content without delimiters.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            ContentPart::Text(text) => text,
            ContentPart::Math { tex, .. } => tex,
        }
    }
}

/// Ordered parts of one input string; most inputs have only a handful.
pub type ContentParts = SmallVec<[ContentPart; 8]>;

/// Lossless view of the input used by the splitter and the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Text(&'a str),
    Math {
        open: &'static str,
        inner: &'a str,
        close: &'static str,
        display: bool,
    },
}

const DELIMITERS: [(&str, &str, bool); 4] = [
    ("$$", "$$", true),
    ("\\[", "\\]", true),
    ("\\(", "\\)", false),
    ("$", "$", false),
];

/// Scan `content` into text and math segments.
///
/// Concatenating every segment (text as-is, math as `open + inner + close`)
/// reproduces the input exactly.
pub(crate) fn segments(content: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let bytes = content.as_bytes();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        // Escaped dollar stays in the text run.
        if bytes[pos] == b'\\' && bytes.get(pos + 1) == Some(&b'$') {
            pos += 2;
            continue;
        }

        let mut matched = None;
        for (open, close, display) in DELIMITERS {
            if !content[pos..].starts_with(open) {
                continue;
            }
            let inner_start = pos + open.len();
            if let Some(offset) = find_close(&content[inner_start..], close) {
                matched = Some((open, close, display, inner_start, inner_start + offset));
            }
            // The longest opening form decides, matched or not.
            break;
        }

        match matched {
            Some((open, close, display, inner_start, inner_end)) => {
                if text_start < pos {
                    out.push(Segment::Text(&content[text_start..pos]));
                }
                out.push(Segment::Math {
                    open,
                    inner: &content[inner_start..inner_end],
                    close,
                    display,
                });
                pos = inner_end + close.len();
                text_start = pos;
            },
            None => {
                pos += next_char_len(content, pos);
            },
        }
    }

    if text_start < content.len() {
        out.push(Segment::Text(&content[text_start..]));
    }
    out
}

/// Whether any segment is delimited math.
#[inline]
pub(crate) fn has_math(segments: &[Segment<'_>]) -> bool {
    segments.iter().any(|s| matches!(s, Segment::Math { .. }))
}

/// Whether undelimited content carries TeX syntax.
#[inline]
pub(crate) fn looks_like_tex(content: &str) -> bool {
    let bytes = content.as_bytes();
    memchr::memchr3(b'\\', b'^', b'_', bytes).is_some() || memchr::memchr(b'{', bytes).is_some()
}

fn find_close(haystack: &str, close: &str) -> Option<usize> {
    if close != "$" {
        return haystack.find(close);
    }
    // A single-dollar span ends at the next unescaped dollar.
    let bytes = haystack.as_bytes();
    let mut index = 0;
    while let Some(offset) = memchr::memchr(b'$', &bytes[index..]) {
        let at = index + offset;
        if at > 0 && bytes[at - 1] == b'\\' {
            index = at + 1;
            continue;
        }
        return Some(at);
    }
    None
}

#[inline]
fn next_char_len(content: &str, pos: usize) -> usize {
    content[pos..].chars().next().map_or(1, char::len_utf8)
}

/// Split a string into ordered text and math parts.
///
/// Math parts have their delimiters stripped; text parts that are entirely
/// whitespace are dropped, as are math parts with blank content. The order of
/// the returned parts is the order of appearance in `content`.
///
/// # Examples
///
/// ```rust
/// use mathrender::content::{split, ContentPart};
///
/// let parts = split("Area: $a^2$ units");
/// assert_eq!(parts[1], ContentPart::Math { tex: "a^2".to_string(), display: false });
/// ```
pub fn split(content: &str) -> ContentParts {
    let mut parts = ContentParts::new();
    for segment in segments(content) {
        match segment {
            Segment::Text(text) => {
                if !text.trim().is_empty() {
                    parts.push(ContentPart::Text(text.to_string()));
                }
            },
            Segment::Math { inner, display, .. } => {
                let tex = inner.trim();
                if !tex.is_empty() {
                    parts.push(ContentPart::Math {
                        tex: tex.to_string(),
                        display,
                    });
                }
            },
        }
    }
    parts
}
