//! Content shape detection and complexity scoring.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::split::{Segment, segments};

/// Score above which notation counts as complex.
pub const COMPLEXITY_THRESHOLD: u32 = 5;

/// Words outside math above which inline notation counts as embedded in prose.
pub const PROSE_WORD_THRESHOLD: usize = 5;

static COMMAND_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([A-Za-z]+)").expect("valid command pattern"));
static ENVIRONMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\begin\{[^}]*\}").expect("valid environment pattern"));
static MATRIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\begin\{(?:[pbvBV]?matrix|smallmatrix|array)\}").expect("valid matrix pattern")
});

/// Command names that mark a string as notation.
static MATH_COMMANDS: phf::Set<&'static str> = phf::phf_set! {
    "frac", "dfrac", "tfrac", "sqrt", "sum", "prod", "coprod", "int", "iint", "iiint", "oint",
    "lim", "limsup", "liminf", "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos",
    "arctan", "sinh", "cosh", "tanh", "log", "ln", "exp", "alpha", "beta", "gamma", "delta",
    "epsilon", "varepsilon", "zeta", "eta", "theta", "vartheta", "iota", "kappa", "lambda", "mu",
    "nu", "xi", "pi", "varpi", "rho", "sigma", "tau", "upsilon", "phi", "varphi", "chi", "psi",
    "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi",
    "Omega", "begin",
};

#[inline]
fn is_large_operator(name: &str) -> bool {
    matches!(name, "sum" | "prod" | "int" | "iint" | "iiint" | "oint")
}

#[inline]
fn is_limit(name: &str) -> bool {
    matches!(name, "lim" | "limsup" | "liminf")
}

#[inline]
fn is_fraction(name: &str) -> bool {
    matches!(name, "frac" | "dfrac" | "tfrac")
}

fn command_names(content: &str) -> impl Iterator<Item = &str> {
    COMMAND_TOKEN
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Shape of a content string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// No recognizable notation
    Text,
    /// Notation a fast engine handles
    SimpleMath,
    /// Notation needing the capable engine
    ComplexMath,
    /// Prose with embedded inline notation
    Mixed,
}

/// Result of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ContentKind,
    pub complexity: u32,
    pub word_count: usize,
}

impl Classification {
    #[inline]
    pub fn is_math(&self) -> bool {
        matches!(self.kind, ContentKind::SimpleMath | ContentKind::ComplexMath)
    }
}

#[derive(Debug, Default)]
struct Signals {
    inline_math: bool,
    display_math: bool,
    commands: bool,
    large_operator: bool,
    prose_script: bool,
    word_count: usize,
}

/// Decide the shape and complexity of `content`.
///
/// Commands or display delimiters make it math: complex when the score
/// exceeds [`COMPLEXITY_THRESHOLD`] or a large operator (integral, sum,
/// product) appears, simple otherwise. Inline math with prose around it
/// (non-ASCII letters or more than [`PROSE_WORD_THRESHOLD`] words) is mixed;
/// inline math alone is simple; anything else is text.
///
/// # Examples
///
/// ```rust
/// use mathrender::content::{classify, ContentKind};
///
/// assert_eq!(classify("$x+1$").kind, ContentKind::SimpleMath);
/// assert_eq!(classify("\\int_0^1 x^2\\,dx").kind, ContentKind::ComplexMath);
/// assert_eq!(classify("just words").kind, ContentKind::Text);
/// ```
pub fn classify(content: &str) -> Classification {
    let complexity = complexity_score(content);
    let signals = collect_signals(content);

    let kind = if signals.commands || signals.display_math {
        if complexity > COMPLEXITY_THRESHOLD || signals.large_operator {
            ContentKind::ComplexMath
        } else {
            ContentKind::SimpleMath
        }
    } else if signals.inline_math
        && (signals.prose_script || signals.word_count > PROSE_WORD_THRESHOLD)
    {
        ContentKind::Mixed
    } else if signals.inline_math {
        ContentKind::SimpleMath
    } else {
        ContentKind::Text
    };

    Classification {
        kind,
        complexity,
        word_count: signals.word_count,
    }
}

/// Weighted structural complexity of TeX notation.
///
/// Environments +3 each, matrix-like environments +2 more, integrals, sums
/// and products +2 each, limits +1, fractions +1, and one point per level of
/// brace nesting beyond the first.
pub fn complexity_score(content: &str) -> u32 {
    if memchr::memchr2(b'\\', b'{', content.as_bytes()).is_none() {
        return 0;
    }
    let count = |re: &Regex| u32::try_from(re.find_iter(content).count()).unwrap_or(u32::MAX);
    let mut score = count(&ENVIRONMENT).saturating_mul(3);
    score = score.saturating_add(count(&MATRIX).saturating_mul(2));
    for name in command_names(content) {
        let weight = if is_large_operator(name) {
            2
        } else if is_limit(name) || is_fraction(name) {
            1
        } else {
            0
        };
        score = score.saturating_add(weight);
    }
    score.saturating_add(brace_depth(content).saturating_sub(1))
}

fn brace_depth(content: &str) -> u32 {
    let mut depth = 0u32;
    let mut max_depth = 0u32;
    let mut escaped = false;
    for ch in content.chars() {
        match ch {
            '\\' => {
                escaped = !escaped;
                continue;
            },
            '{' if !escaped => {
                depth += 1;
                max_depth = max_depth.max(depth);
            },
            '}' if !escaped => depth = depth.saturating_sub(1),
            _ => {},
        }
        escaped = false;
    }
    max_depth
}

fn collect_signals(content: &str) -> Signals {
    let mut signals = Signals::default();
    for name in command_names(content) {
        signals.commands |= MATH_COMMANDS.contains(name);
        signals.large_operator |= is_large_operator(name);
    }

    for segment in segments(content) {
        match segment {
            Segment::Text(text) => {
                signals.word_count += text.split_whitespace().count();
                signals.prose_script |= text.chars().any(is_prose_letter);
            },
            Segment::Math { inner, display, .. } => {
                if inner.trim().is_empty() {
                    continue;
                }
                if display {
                    signals.display_math = true;
                } else {
                    signals.inline_math = true;
                }
            },
        }
    }

    signals
}

/// Alphabetic characters outside ASCII and outside the Greek block, which is
/// notation more often than prose.
#[inline]
fn is_prose_letter(ch: char) -> bool {
    ch.is_alphabetic() && !ch.is_ascii() && !('\u{0370}'..='\u{03FF}').contains(&ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_mixed_turkish_sentence() {
        let c = classify("Bir karenin alanı $a^2$'dir ve çevresi $4a$ olur çünkü her kenar eşittir.");
        assert_eq!(c.kind, ContentKind::Mixed);
        assert!(c.word_count > 5);
    }

    #[test]
    fn test_classify_integral_is_complex() {
        let c = classify("\\int_0^1 x^2\\,dx");
        assert_eq!(c.kind, ContentKind::ComplexMath);
        assert!(c.complexity >= 2);
    }

    #[test]
    fn test_classify_inline_only() {
        assert_eq!(classify("$x+1$").kind, ContentKind::SimpleMath);
    }

    #[test]
    fn test_classify_simple_command() {
        let c = classify("\\frac{1}{2} + \\alpha");
        assert_eq!(c.kind, ContentKind::SimpleMath);
        assert_eq!(c.complexity, 1);
    }

    #[test]
    fn test_classify_display_delimiters() {
        assert_eq!(classify("$$a+b$$").kind, ContentKind::SimpleMath);
    }

    #[test]
    fn test_classify_plain_text() {
        let c = classify("Merhaba dünya, bugün hava güzel.");
        assert_eq!(c.kind, ContentKind::Text);
        assert_eq!(c.complexity, 0);
    }

    #[test]
    fn test_classify_commands_win_over_prose() {
        let c = classify("Önce $\\frac{a}{b}$ ifadesini sadeleştirin.");
        assert_eq!(c.kind, ContentKind::SimpleMath);
        assert_eq!(c.complexity, 1);
    }

    #[test]
    fn test_complexity_weights() {
        assert_eq!(complexity_score("\\begin{cases} x \\end{cases}"), 3);
        assert_eq!(complexity_score("\\begin{pmatrix} 1 \\end{pmatrix}"), 5);
        assert_eq!(complexity_score("\\sum_{i=1}^{n} \\prod_k"), 4);
        assert_eq!(complexity_score("\\lim_{x \\to 0}"), 1);
        assert_eq!(complexity_score("{{{x}}}"), 2);
        assert_eq!(complexity_score("\\{ \\{ x"), 0);
    }

    #[test]
    fn test_complex_matrix_system() {
        let c = classify("\\begin{bmatrix} \\frac{1}{2} & 0 \\\\ 0 & 1 \\end{bmatrix}");
        assert_eq!(c.kind, ContentKind::ComplexMath);
        assert!(c.complexity > COMPLEXITY_THRESHOLD);
    }
}
