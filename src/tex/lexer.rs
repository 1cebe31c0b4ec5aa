//! Tokenizer for math-mode TeX.

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tok<'a> {
    /// `\name` or a control symbol such as `\,` or `\\`
    Command(&'a str),
    Char(char),
    Open,
    Close,
    Sup,
    Sub,
    Align,
    Space,
}

/// A token with its byte span in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub tok: Tok<'a>,
    pub start: usize,
    pub end: usize,
}

pub(crate) fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::with_capacity(src.len());
    let mut chars = src.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        let tok = match ch {
            '\\' => match chars.peek().copied() {
                Some((name_start, next)) if next.is_ascii_alphabetic() => {
                    let mut end = name_start;
                    while let Some(&(i, c)) = chars.peek() {
                        if !c.is_ascii_alphabetic() {
                            break;
                        }
                        end = i + c.len_utf8();
                        chars.next();
                    }
                    Tok::Command(&src[name_start..end])
                },
                Some((name_start, next)) => {
                    chars.next();
                    Tok::Command(&src[name_start..name_start + next.len_utf8()])
                },
                None => Tok::Char('\\'),
            },
            '{' => Tok::Open,
            '}' => Tok::Close,
            '^' => Tok::Sup,
            '_' => Tok::Sub,
            '&' => Tok::Align,
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
                    chars.next();
                }
                Tok::Space
            },
            c => Tok::Char(c),
        };
        let end = chars.peek().map_or(src.len(), |&(i, _)| i);
        tokens.push(Token { tok, start, end });
    }

    tokens
}

/// Index of the `Close` matching the `Open` at `open`, if any.
pub(crate) fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.tok {
            Tok::Open => depth += 1,
            Tok::Close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index);
                }
            },
            _ => {},
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok<'_>> {
        tokenize(src).into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_tokenize_commands_and_symbols() {
        assert_eq!(
            kinds(r"\frac{a}{b}"),
            vec![
                Tok::Command("frac"),
                Tok::Open,
                Tok::Char('a'),
                Tok::Close,
                Tok::Open,
                Tok::Char('b'),
                Tok::Close,
            ]
        );
        assert_eq!(kinds(r"a\,b\\"), vec![
            Tok::Char('a'),
            Tok::Command(","),
            Tok::Char('b'),
            Tok::Command("\\"),
        ]);
    }

    #[test]
    fn test_tokenize_scripts_and_space() {
        assert_eq!(kinds("x^2 _i  &"), vec![
            Tok::Char('x'),
            Tok::Sup,
            Tok::Char('2'),
            Tok::Space,
            Tok::Sub,
            Tok::Char('i'),
            Tok::Space,
            Tok::Align,
        ]);
    }

    #[test]
    fn test_spans_cover_source() {
        let src = r"\alpha + ç";
        let tokens = tokenize(src);
        assert_eq!(&src[tokens[0].start..tokens[0].end], r"\alpha");
        assert_eq!(tokens.last().map(|t| t.end), Some(src.len()));
    }

    #[test]
    fn test_matching_close() {
        let tokens = tokenize("{a{b}c}d");
        assert_eq!(matching_close(&tokens, 0), Some(6));
        assert_eq!(matching_close(&tokenize("{a"), 0), None);
    }
}
