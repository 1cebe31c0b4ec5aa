//! TeX to HTML translation used by the built-in engines.
//!
//! The translator is a recursive-descent walk over the token stream that
//! writes markup as it goes. It runs in one of two modes:
//!
//! - [`Strictness::Strict`] rejects anything it does not fully understand
//!   (unknown commands, environments, unbalanced braces). The fast engine
//!   uses this mode so that hard input falls through to the robust engine.
//! - [`Strictness::Lenient`] handles environments as tables and degrades
//!   unknown commands to their names instead of failing.
use std::fmt::Write as _;

use super::lexer::{Tok, Token, matching_close, tokenize};
use super::symbols;
use crate::common::{Error, Result, escape_html};

const MAX_DEPTH: usize = 128;

/// How the translator reacts to input it cannot typeset faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    #[default]
    Strict,
    Lenient,
}

/// Translate math-mode TeX to an HTML fragment.
///
/// # Errors
///
/// In strict mode, returns [`Error::Unsupported`] for unknown commands,
/// environments and unbalanced braces. Both modes fail on nesting deeper
/// than an internal limit.
///
/// ```rust
/// use mathrender::tex::{Strictness, translate};
///
/// let html = translate("x^2", Strictness::Strict).unwrap();
/// assert_eq!(html, "<i>x</i><sup>2</sup>");
/// assert!(translate(r"\begin{cases} 1 \end{cases}", Strictness::Strict).is_err());
/// ```
pub fn translate(tex: &str, strictness: Strictness) -> Result<String> {
    let mut translator = Translator {
        src: tex,
        tokens: tokenize(tex),
        pos: 0,
        strictness,
        depth: 0,
    };
    let (html, _) = translator.list(Scope::Top)?;
    Ok(html)
}

/// Translate and wrap in the inline or display container.
pub fn render_math(tex: &str, display: bool, strictness: Strictness) -> Result<String> {
    let body = translate(tex, strictness)?;
    let mode = if display { "mr-display" } else { "mr-inline" };
    Ok(format!(r#"<span class="mr-math {mode}">{body}</span>"#))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Top,
    Group,
    Cell,
    Fenced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum End {
    Eof,
    Close,
    Align,
    Row,
    Environment,
    Right(String),
}

struct Translator<'a> {
    src: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    strictness: Strictness,
    depth: usize,
}

impl<'a> Translator<'a> {
    #[inline]
    fn peek(&self) -> Option<Tok<'a>> {
        self.tokens.get(self.pos).map(|t| t.tok)
    }

    fn skip_space(&mut self) {
        while self.peek() == Some(Tok::Space) {
            self.pos += 1;
        }
    }

    /// Fail in strict mode, carry on in lenient mode.
    fn recover(&self, what: impl Into<String>) -> Result<()> {
        match self.strictness {
            Strictness::Strict => Err(Error::Unsupported(what.into())),
            Strictness::Lenient => Ok(()),
        }
    }

    fn list(&mut self, scope: Scope) -> Result<(String, End)> {
        let mut out = String::new();
        let end = loop {
            let Some(tok) = self.peek() else {
                break End::Eof;
            };
            match tok {
                Tok::Close => {
                    self.pos += 1;
                    if scope == Scope::Group {
                        break End::Close;
                    }
                    self.recover("unbalanced closing brace")?;
                },
                Tok::Align if scope == Scope::Cell => {
                    self.pos += 1;
                    break End::Align;
                },
                Tok::Command("\\") if scope == Scope::Cell => {
                    self.pos += 1;
                    break End::Row;
                },
                Tok::Command("end") if scope == Scope::Cell => {
                    self.pos += 1;
                    self.raw_arg()?;
                    break End::Environment;
                },
                Tok::Command("right") if scope == Scope::Fenced => {
                    self.pos += 1;
                    break End::Right(self.delimiter()?);
                },
                Tok::Align => {
                    self.pos += 1;
                    self.recover("alignment outside an environment")?;
                },
                Tok::Command("end") => {
                    self.pos += 1;
                    self.recover("unexpected \\end")?;
                    self.raw_arg()?;
                },
                Tok::Command("right") => {
                    self.pos += 1;
                    self.recover("\\right without \\left")?;
                    out.push_str(&self.delimiter()?);
                },
                Tok::Command("\\") => {
                    self.pos += 1;
                    out.push_str("<br>");
                },
                _ => out.push_str(&self.scripted()?),
            }
        };
        if end == End::Eof && scope != Scope::Top {
            self.recover("unterminated group")?;
        }
        Ok((out, end))
    }

    /// An atom followed by any superscript and subscript.
    fn scripted(&mut self) -> Result<String> {
        let base = match self.peek() {
            Some(Tok::Sup | Tok::Sub) => String::new(),
            _ => self.atom()?,
        };
        let mut sup = None;
        let mut sub = None;
        loop {
            self.skip_space();
            let is_sup = match self.peek() {
                Some(Tok::Sup) => true,
                Some(Tok::Sub) => false,
                _ => break,
            };
            self.pos += 1;
            let script = self.arg()?;
            let slot = if is_sup { &mut sup } else { &mut sub };
            if slot.is_some() {
                self.recover("double script")?;
            } else {
                *slot = Some(script);
            }
        }

        Ok(match (sup, sub) {
            (None, None) => base,
            (Some(sup), None) => format!("{base}<sup>{sup}</sup>"),
            (None, Some(sub)) => format!("{base}<sub>{sub}</sub>"),
            (Some(sup), Some(sub)) => {
                format!(r#"{base}<span class="mr-scripts"><sup>{sup}</sup><sub>{sub}</sub></span>"#)
            },
        })
    }

    /// A command or script argument: one token, or a braced group.
    fn arg(&mut self) -> Result<String> {
        self.skip_space();
        match self.peek() {
            None | Some(Tok::Close | Tok::Sup | Tok::Sub | Tok::Align) => {
                self.recover("missing argument")?;
                Ok(String::new())
            },
            Some(_) => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::Unsupported("nesting too deep".to_string()));
        }
        let result = self.atom_inner();
        self.depth -= 1;
        result
    }

    fn atom_inner(&mut self) -> Result<String> {
        let Some(token) = self.tokens.get(self.pos).copied() else {
            self.recover("missing argument")?;
            return Ok(String::new());
        };
        self.pos += 1;
        match token.tok {
            Tok::Space => Ok(String::new()),
            Tok::Open => Ok(self.list(Scope::Group)?.0),
            Tok::Char(ch) => Ok(char_markup(ch)),
            Tok::Command(name) => self.command(name),
            Tok::Close | Tok::Sup | Tok::Sub | Tok::Align => {
                self.recover("misplaced token")?;
                Ok(String::new())
            },
        }
    }

    /// Verbatim source of the next argument, braces stripped.
    fn raw_arg(&mut self) -> Result<String> {
        self.skip_space();
        let Some(token) = self.tokens.get(self.pos).copied() else {
            self.recover("missing argument")?;
            return Ok(String::new());
        };
        if token.tok != Tok::Open {
            self.pos += 1;
            return Ok(self.src[token.start..token.end].to_string());
        }
        match matching_close(&self.tokens, self.pos) {
            Some(close) => {
                let raw = &self.src[token.end..self.tokens[close].start];
                self.pos = close + 1;
                Ok(raw.to_string())
            },
            None => {
                self.recover("unterminated group")?;
                self.pos = self.tokens.len();
                Ok(self.src[token.end..].to_string())
            },
        }
    }

    /// Delimiter after `\left` or `\right`, as escaped text.
    fn delimiter(&mut self) -> Result<String> {
        self.skip_space();
        let text = match self.peek() {
            Some(Tok::Char('.')) => String::new(),
            Some(Tok::Char(ch)) => ch.to_string(),
            Some(Tok::Command(name)) => {
                match symbols::escaped_char(name).map(String::from).or_else(|| {
                    symbols::symbol(name).map(String::from)
                }) {
                    Some(text) => text,
                    None => {
                        self.recover(format!("unknown delimiter \\{name}"))?;
                        String::new()
                    },
                }
            },
            _ => {
                self.recover("missing delimiter")?;
                return Ok(String::new());
            },
        };
        self.pos += 1;
        Ok(escape_html(&text))
    }

    fn command(&mut self, name: &'a str) -> Result<String> {
        match name {
            "frac" | "dfrac" | "tfrac" | "cfrac" => {
                let num = self.arg()?;
                let den = self.arg()?;
                Ok(fraction(&num, &den))
            },
            "binom" => {
                let top = self.arg()?;
                let bottom = self.arg()?;
                Ok(format!(
                    r#"<span class="mr-fenced">({})</span>"#,
                    fraction(&top, &bottom).replacen("mr-frac", "mr-frac mr-binom", 1)
                ))
            },
            "sqrt" => self.root(),
            "left" => self.fenced(),
            "begin" => self.environment(),
            "not" => {
                let negated = self.arg()?;
                Ok(format!("{negated}\u{0338}"))
            },
            "mathbb" => {
                let raw = self.raw_arg()?;
                Ok(raw
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| symbols::blackboard(c).map_or_else(|| escape_html(&c.to_string()), String::from))
                    .collect())
            },
            "displaystyle" | "textstyle" | "limits" | "nolimits" => Ok(String::new()),
            n if symbols::is_text_command(n) => {
                let raw = self.raw_arg()?;
                let class = if n == "operatorname" { "mr-fn" } else { "mr-text" };
                Ok(format!(r#"<span class="{class}">{}</span>"#, escape_html(&raw)))
            },
            n if symbols::is_font_command(n) => {
                let inner = self.arg()?;
                Ok(format!(r#"<span class="mr-{n}">{inner}</span>"#))
            },
            n if symbols::accent(n).is_some() => {
                let inner = self.arg()?;
                Ok(format!(r#"<span class="mr-accent mr-{n}">{inner}</span>"#))
            },
            n if symbols::is_function(n) => Ok(format!(r#"<span class="mr-fn">{n}</span>"#)),
            n if symbols::is_large_operator(n) => {
                let glyph = symbols::symbol(n).unwrap_or(n);
                Ok(format!(r#"<span class="mr-op mr-largeop">{glyph}</span>"#))
            },
            n => {
                if let Some(text) = symbols::symbol(n) {
                    return Ok(escape_html(text));
                }
                if let Some(width) = symbols::spacing(n) {
                    return Ok(space(width));
                }
                if let Some(ch) = symbols::escaped_char(n) {
                    return Ok(escape_html(&ch.to_string()));
                }
                self.recover(format!("\\{n}"))?;
                Ok(format!(r#"<span class="mr-text mr-unknown">{}</span>"#, escape_html(n)))
            },
        }
    }

    fn root(&mut self) -> Result<String> {
        self.skip_space();
        let mut index = None;
        if self.peek() == Some(Tok::Char('[')) {
            self.pos += 1;
            let mut out = String::new();
            loop {
                match self.peek() {
                    Some(Tok::Char(']')) => {
                        self.pos += 1;
                        break;
                    },
                    None | Some(Tok::Close) => {
                        self.recover("unterminated root index")?;
                        break;
                    },
                    Some(_) => out.push_str(&self.scripted()?),
                }
            }
            index = Some(out);
        }
        let radicand = self.arg()?;
        let mut out = String::from(r#"<span class="mr-sqrt">"#);
        if let Some(index) = index {
            let _ = write!(out, r#"<sup class="mr-root-index">{index}</sup>"#);
        }
        let _ = write!(out, r#"√<span class="mr-radicand">{radicand}</span></span>"#);
        Ok(out)
    }

    fn fenced(&mut self) -> Result<String> {
        let open = self.delimiter()?;
        let (inner, end) = self.list(Scope::Fenced)?;
        let close = match end {
            End::Right(close) => close,
            _ => String::new(),
        };
        Ok(format!(
            r#"<span class="mr-fenced"><span class="mr-delim">{open}</span>{inner}<span class="mr-delim">{close}</span></span>"#
        ))
    }

    fn environment(&mut self) -> Result<String> {
        let name = self.raw_arg()?;
        let name = name.trim();
        if self.strictness == Strictness::Strict {
            return Err(Error::Unsupported(format!("environment {name}")));
        }
        if name == "array" {
            // Column specification
            self.raw_arg()?;
        }
        let (open, close) = match name.trim_end_matches('*') {
            "pmatrix" => ("(", ")"),
            "bmatrix" => ("[", "]"),
            "Bmatrix" => ("{", "}"),
            "vmatrix" => ("|", "|"),
            "Vmatrix" => ("‖", "‖"),
            "cases" => ("{", ""),
            _ => ("", ""),
        };

        let mut rows: Vec<Vec<String>> = vec![Vec::new()];
        loop {
            let (cell, end) = self.list(Scope::Cell)?;
            if let Some(row) = rows.last_mut() {
                row.push(cell);
            }
            match end {
                End::Align => {},
                End::Row => rows.push(Vec::new()),
                _ => break,
            }
        }
        // A trailing `\\` leaves one empty cell behind.
        if rows.len() > 1 && rows.last().is_some_and(|r| r.len() == 1 && r[0].is_empty()) {
            rows.pop();
        }

        let mut out = String::new();
        let _ = write!(out, r#"<span class="mr-env mr-{}">"#, escape_html(name));
        if !open.is_empty() {
            let _ = write!(out, r#"<span class="mr-delim">{}</span>"#, escape_html(open));
        }
        out.push_str("<table>");
        for row in rows {
            out.push_str("<tr>");
            for cell in row {
                let _ = write!(out, "<td>{cell}</td>");
            }
            out.push_str("</tr>");
        }
        out.push_str("</table>");
        if !close.is_empty() {
            let _ = write!(out, r#"<span class="mr-delim">{}</span>"#, escape_html(close));
        }
        out.push_str("</span>");
        Ok(out)
    }
}

fn fraction(num: &str, den: &str) -> String {
    format!(
        r#"<span class="mr-frac"><span class="mr-num">{num}</span><span class="mr-den">{den}</span></span>"#
    )
}

fn space(width: f32) -> String {
    if width <= 0.0 {
        String::new()
    } else {
        format!(r#"<span class="mr-space" style="margin-right:{width}em"></span>"#)
    }
}

fn char_markup(ch: char) -> String {
    match ch {
        'a'..='z' | 'A'..='Z' => format!("<i>{ch}</i>"),
        '-' => r#"<span class="mr-op">−</span>"#.to_string(),
        '+' | '=' | '<' | '>' | '*' => {
            format!(r#"<span class="mr-op">{}</span>"#, escape_html(&ch.to_string()))
        },
        '\'' => "′".to_string(),
        '~' => "&nbsp;".to_string(),
        _ => escape_html(&ch.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict(tex: &str) -> Result<String> {
        translate(tex, Strictness::Strict)
    }

    fn lenient(tex: &str) -> String {
        translate(tex, Strictness::Lenient).unwrap()
    }

    #[test]
    fn test_scripts() {
        assert_eq!(strict("x^2").unwrap(), "<i>x</i><sup>2</sup>");
        assert_eq!(strict("a_n").unwrap(), "<i>a</i><sub><i>n</i></sub>");
        assert_eq!(
            strict("x_i^{2}").unwrap(),
            r#"<i>x</i><span class="mr-scripts"><sup>2</sup><sub><i>i</i></sub></span>"#
        );
    }

    #[test]
    fn test_fraction_and_root() {
        assert_eq!(
            strict(r"\frac{1}{2}").unwrap(),
            r#"<span class="mr-frac"><span class="mr-num">1</span><span class="mr-den">2</span></span>"#
        );
        let root = strict(r"\sqrt[3]{8}").unwrap();
        assert!(root.contains(r#"<sup class="mr-root-index">3</sup>"#));
        assert!(root.contains(r#"<span class="mr-radicand">8</span>"#));
    }

    #[test]
    fn test_symbols_and_functions() {
        assert_eq!(strict(r"\alpha\leq\beta").unwrap(), "α≤β");
        assert_eq!(strict(r"\sin").unwrap(), r#"<span class="mr-fn">sin</span>"#);
        assert!(strict(r"\sum_{i=1}^n i").unwrap().contains("mr-largeop"));
        assert_eq!(strict(r"\mathbb{R}").unwrap(), "ℝ");
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(
            strict(r"\text{a < b}").unwrap(),
            r#"<span class="mr-text">a &lt; b</span>"#
        );
        assert_eq!(strict("a<b").unwrap(), r#"<i>a</i><span class="mr-op">&lt;</span><i>b</i>"#);
    }

    #[test]
    fn test_fenced() {
        let html = strict(r"\left( x \right)").unwrap();
        assert!(html.starts_with(r#"<span class="mr-fenced"><span class="mr-delim">(</span>"#));
        assert!(html.ends_with(r#"<span class="mr-delim">)</span></span>"#));
    }

    #[test]
    fn test_strict_rejections() {
        assert!(matches!(strict(r"\foo"), Err(Error::Unsupported(_))));
        assert!(strict("{x").is_err());
        assert!(strict("x}").is_err());
        assert!(strict(r"\begin{pmatrix} 1 \end{pmatrix}").is_err());
        assert!(strict("a & b").is_err());
    }

    #[test]
    fn test_lenient_environment_table() {
        let html = lenient(r"\begin{pmatrix} 1 & 0 \\ 0 & 1 \end{pmatrix}");
        assert!(html.starts_with(r#"<span class="mr-env mr-pmatrix"><span class="mr-delim">(</span><table>"#));
        assert_eq!(html.matches("<tr>").count(), 2);
        assert_eq!(html.matches("<td>").count(), 4);
    }

    #[test]
    fn test_lenient_trailing_row_separator() {
        let html = lenient(r"\begin{cases} x & y \\ \end{cases}");
        assert_eq!(html.matches("<tr>").count(), 1);
    }

    #[test]
    fn test_lenient_degrades_unknown() {
        assert_eq!(lenient(r"\foo"), r#"<span class="mr-text mr-unknown">foo</span>"#);
        assert_eq!(lenient("{x"), "<i>x</i>");
        assert_eq!(lenient("x}"), "<i>x</i>");
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}x{}", "{".repeat(500), "}".repeat(500));
        assert!(translate(&deep, Strictness::Lenient).is_err());
    }

    #[test]
    fn test_render_math_wrapper() {
        assert_eq!(
            render_math("x", true, Strictness::Strict).unwrap(),
            r#"<span class="mr-math mr-display"><i>x</i></span>"#
        );
    }
}
