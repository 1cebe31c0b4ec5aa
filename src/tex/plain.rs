//! Degraded renderings used when every typeset attempt has failed.
//!
//! Neither function can fail. Control words become their Unicode symbol or
//! bare name, so the output never shows a raw backslash command.
use super::lexer::{Tok, Token, matching_close, tokenize};
use super::symbols;
use super::unicode::{Script, to_script};
use crate::common::escape_html;
use crate::content::{Segment, has_math, looks_like_tex, segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Plain,
    Html,
}

/// Readable plain text for mixed content.
///
/// Prose is kept, notation is converted, and whitespace is collapsed. The
/// result is unescaped text meant for a text node.
///
/// ```rust
/// use mathrender::tex::to_plain_text;
///
/// assert_eq!(to_plain_text("$x^2$"), "x²");
/// assert_eq!(to_plain_text(r"Oran \(\frac{a}{b}\) olur"), "Oran a/b olur");
/// assert_eq!(to_plain_text(r"\frac{1}{2} + \sqrt{x}"), "1/2 + √x");
/// ```
pub fn to_plain_text(content: &str) -> String {
    let segments = segments(content);
    if bare_tex(&segments, content) {
        return collapse_whitespace(&degrade(content, Style::Plain));
    }
    let mut out = String::with_capacity(content.len());
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Math { inner, .. } => out.push_str(&degrade(inner, Style::Plain)),
        }
    }
    collapse_whitespace(&out)
}

/// Minimal HTML for mixed content: escaped prose, `<sup>`/`<sub>` scripts
/// and slash fractions.
pub fn to_simplified_html(content: &str) -> String {
    let segments = segments(content);
    if bare_tex(&segments, content) {
        let body = collapse_whitespace(&degrade(content, Style::Html));
        return format!(r#"<span class="mr-fallback">{body}</span>"#);
    }
    let mut out = String::with_capacity(content.len() * 2);
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(&escape_html(text)),
            Segment::Math { inner, display, .. } => {
                let body = collapse_whitespace(&degrade(inner, Style::Html));
                let class = if display { "mr-fallback mr-display" } else { "mr-fallback" };
                out.push_str(&format!(r#"<span class="{class}">{body}</span>"#));
            },
        }
    }
    collapse_whitespace(&out)
}

/// Notation with no delimiters at all, such as a `math-content` source.
fn bare_tex(segments: &[Segment<'_>], content: &str) -> bool {
    !has_math(segments) && looks_like_tex(content)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn degrade(tex: &str, style: Style) -> String {
    let tokens = tokenize(tex);
    let mut walker = Walker {
        src: tex,
        tokens,
        pos: 0,
        style,
    };
    walker.run(None)
}

struct Walker<'a> {
    src: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    style: Style,
}

impl<'a> Walker<'a> {
    /// Walk until `stop` (exclusive) or the end of input.
    fn run(&mut self, stop: Option<usize>) -> String {
        let end = stop.unwrap_or(self.tokens.len());
        let mut out = String::new();
        while self.pos < end {
            let piece = self.item(end);
            out.push_str(&piece);
        }
        out
    }

    fn item(&mut self, end: usize) -> String {
        let token = self.tokens[self.pos];
        self.pos += 1;
        match token.tok {
            Tok::Space => " ".to_string(),
            Tok::Align => " ".to_string(),
            Tok::Close => String::new(),
            Tok::Open => self.group_body(self.pos - 1),
            Tok::Char(ch) => self.text(&ch.to_string()),
            Tok::Sup => self.script(Script::Super, end),
            Tok::Sub => self.script(Script::Sub, end),
            Tok::Command(name) => self.command(name, end),
        }
    }

    fn text(&self, text: &str) -> String {
        match self.style {
            Style::Plain => text.to_string(),
            Style::Html => escape_html(text),
        }
    }

    /// Contents of the group opening at `open`, leaving `pos` after it.
    fn group_body(&mut self, open: usize) -> String {
        let close = matching_close(&self.tokens, open).unwrap_or(self.tokens.len());
        self.pos = open + 1;
        let body = self.run(Some(close));
        self.pos = (close + 1).min(self.tokens.len());
        body
    }

    /// Next argument and whether it was a single simple token.
    fn arg(&mut self, end: usize) -> (String, bool) {
        while self.pos < end && self.tokens[self.pos].tok == Tok::Space {
            self.pos += 1;
        }
        if self.pos >= end {
            return (String::new(), true);
        }
        match self.tokens[self.pos].tok {
            Tok::Open => {
                let open = self.pos;
                let body = self.group_body(open);
                let simple = body.chars().count() <= 1
                    || body.chars().all(|c| c.is_alphanumeric() || c == '.');
                (body, simple)
            },
            _ => (self.item(end), true),
        }
    }

    fn raw_arg(&mut self, end: usize) -> String {
        while self.pos < end && self.tokens[self.pos].tok == Tok::Space {
            self.pos += 1;
        }
        if self.pos >= end {
            return String::new();
        }
        let token = self.tokens[self.pos];
        if token.tok != Tok::Open {
            self.pos += 1;
            return self.src[token.start..token.end].to_string();
        }
        let close = matching_close(&self.tokens, self.pos).unwrap_or(self.tokens.len());
        let raw_end = self.tokens.get(close).map_or(self.src.len(), |t| t.start);
        self.pos = (close + 1).min(self.tokens.len());
        self.src[token.end..raw_end].to_string()
    }

    fn script(&mut self, script: Script, end: usize) -> String {
        let (body, _) = self.arg(end);
        match self.style {
            Style::Html => match script {
                Script::Super => format!("<sup>{body}</sup>"),
                Script::Sub => format!("<sub>{body}</sub>"),
            },
            Style::Plain => match to_script(&body, script) {
                Some(converted) => converted,
                None if body.chars().count() == 1 => format!("{}{body}", script.operator()),
                None => format!("{}({body})", script.operator()),
            },
        }
    }

    fn command(&mut self, name: &'a str, end: usize) -> String {
        match name {
            "frac" | "dfrac" | "tfrac" | "cfrac" => {
                let (num, num_simple) = self.arg(end);
                let (den, den_simple) = self.arg(end);
                format!("{}/{}", wrap(num, num_simple), wrap(den, den_simple))
            },
            "sqrt" => {
                let (radicand, simple) = self.arg(end);
                format!("√{}", wrap(radicand, simple))
            },
            "\\" => "; ".to_string(),
            "begin" | "end" => {
                self.raw_arg(end);
                " ".to_string()
            },
            "left" | "right" => {
                while self.pos < end && self.tokens[self.pos].tok == Tok::Space {
                    self.pos += 1;
                }
                match self.tokens.get(self.pos).map(|t| t.tok) {
                    Some(Tok::Char('.')) => {
                        self.pos += 1;
                        String::new()
                    },
                    Some(_) if self.pos < end => self.item(end),
                    _ => String::new(),
                }
            },
            "mathbb" => {
                let raw = self.raw_arg(end);
                raw.chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| symbols::blackboard(c).map_or_else(|| c.to_string(), String::from))
                    .collect()
            },
            n if symbols::is_text_command(n) => {
                let raw = self.raw_arg(end);
                self.text(&raw)
            },
            n if symbols::is_font_command(n) || symbols::accent(n).is_some() => {
                if matches!(n, "displaystyle" | "textstyle") {
                    return String::new();
                }
                self.arg(end).0
            },
            n if symbols::is_function(n) => format!("{n} "),
            n => {
                if let Some(text) = symbols::symbol(n) {
                    return self.text(text);
                }
                if let Some(width) = symbols::spacing(n) {
                    return if width > 0.0 { " ".to_string() } else { String::new() };
                }
                if let Some(ch) = symbols::escaped_char(n) {
                    return self.text(&ch.to_string());
                }
                self.text(n)
            },
        }
    }
}

fn wrap(body: String, simple: bool) -> String {
    if simple { body } else { format!("({body})") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_scripts() {
        assert_eq!(to_plain_text("$x^2$"), "x²");
        assert_eq!(to_plain_text("$a_{n+1}$"), "aₙ₊₁");
        assert_eq!(to_plain_text("$e^{qx}$"), "e^(qx)");
        assert_eq!(to_plain_text("$y_b$"), "y_b");
    }

    #[test]
    fn test_plain_commands() {
        assert_eq!(to_plain_text(r"$\frac{a+b}{2}$"), "(a+b)/2");
        assert_eq!(to_plain_text(r"$\sqrt{x}$"), "√x");
        assert_eq!(to_plain_text(r"$\alpha \leq \beta$"), "α ≤ β");
        assert_eq!(to_plain_text(r"$\text{alan} = \pi r^2$"), "alan = π r²");
        assert_eq!(to_plain_text(r"$\foo{x}$"), "foox");
    }

    #[test]
    fn test_plain_keeps_prose() {
        assert_eq!(
            to_plain_text(r"Alan $a^2$ birimdir."),
            "Alan a² birimdir."
        );
        assert!(!to_plain_text(r"$$\int_0^1 f(x)\,dx$$").contains('\\'));
    }

    #[test]
    fn test_undelimited_notation_is_degraded() {
        assert_eq!(to_plain_text("x^2"), "x²");
        assert_eq!(to_plain_text(r"\frac{1}{2} + \sqrt{x}"), "1/2 + √x");
        let integral = to_plain_text(r"\int_0^1 x^2\,dx");
        assert!(!integral.contains('\\'));
        assert!(integral.starts_with('∫'));
        assert_eq!(to_plain_text("sadece metin"), "sadece metin");
        assert_eq!(
            to_simplified_html(r"\frac{1}{2}"),
            r#"<span class="mr-fallback">1/2</span>"#
        );
    }

    #[test]
    fn test_plain_environment() {
        let text = to_plain_text(r"$\begin{pmatrix} 1 & 0 \\ 0 & 1 \end{pmatrix}$");
        assert_eq!(text, "1 0 ; 0 1");
    }

    #[test]
    fn test_simplified_html() {
        assert_eq!(
            to_simplified_html("a < $x^2$"),
            r#"a &lt; <span class="mr-fallback">x<sup>2</sup></span>"#
        );
        assert_eq!(
            to_simplified_html(r"$$\frac{1}{2}$$"),
            r#"<span class="mr-fallback mr-display">1/2</span>"#
        );
    }

    #[test]
    fn test_unbalanced_input_never_panics() {
        assert_eq!(to_plain_text("${x^2$"), "x²");
        assert_eq!(to_plain_text("$x}$"), "x");
        assert_eq!(to_plain_text(r"$\frac$"), "/");
    }
}
