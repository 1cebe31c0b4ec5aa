//! Unicode superscript and subscript forms.
//!
//! The plain-text fallback writes `x^2` as `x²` and `a_n` as `aₙ` when every
//! character of the script has a Unicode form, and keeps `^(...)` otherwise.
use phf::phf_map;

/// Vertical placement of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Super,
    Sub,
}

impl Script {
    /// The TeX operator introducing this script.
    #[inline]
    pub fn operator(self) -> char {
        match self {
            Script::Super => '^',
            Script::Sub => '_',
        }
    }

    #[inline]
    fn table(self) -> &'static phf::Map<char, char> {
        match self {
            Script::Super => &SUPERSCRIPTS,
            Script::Sub => &SUBSCRIPTS,
        }
    }
}

static SUPERSCRIPTS: phf::Map<char, char> = phf_map! {
    '0' => '⁰', '1' => '¹', '2' => '²', '3' => '³', '4' => '⁴',
    '5' => '⁵', '6' => '⁶', '7' => '⁷', '8' => '⁸', '9' => '⁹',
    'a' => 'ᵃ', 'b' => 'ᵇ', 'c' => 'ᶜ', 'd' => 'ᵈ', 'e' => 'ᵉ', 'f' => 'ᶠ', 'g' => 'ᵍ',
    'h' => 'ʰ', 'i' => 'ⁱ', 'j' => 'ʲ', 'k' => 'ᵏ', 'l' => 'ˡ', 'm' => 'ᵐ', 'n' => 'ⁿ',
    'o' => 'ᵒ', 'p' => 'ᵖ', 'r' => 'ʳ', 's' => 'ˢ', 't' => 'ᵗ', 'u' => 'ᵘ', 'v' => 'ᵛ',
    'w' => 'ʷ', 'x' => 'ˣ', 'y' => 'ʸ', 'z' => 'ᶻ',
    'A' => 'ᴬ', 'B' => 'ᴮ', 'D' => 'ᴰ', 'E' => 'ᴱ', 'G' => 'ᴳ', 'H' => 'ᴴ', 'I' => 'ᴵ',
    'J' => 'ᴶ', 'K' => 'ᴷ', 'L' => 'ᴸ', 'M' => 'ᴹ', 'N' => 'ᴺ', 'O' => 'ᴼ', 'P' => 'ᴾ',
    'R' => 'ᴿ', 'T' => 'ᵀ', 'U' => 'ᵁ', 'W' => 'ᵂ',
    'β' => 'ᵝ', 'γ' => 'ᵞ', 'δ' => 'ᵟ', 'φ' => 'ᵠ', 'χ' => 'ᵡ',
    '+' => '⁺', '-' => '⁻', '−' => '⁻', '=' => '⁼', '(' => '⁽', ')' => '⁾',
    '′' => '′',
};

static SUBSCRIPTS: phf::Map<char, char> = phf_map! {
    '0' => '₀', '1' => '₁', '2' => '₂', '3' => '₃', '4' => '₄',
    '5' => '₅', '6' => '₆', '7' => '₇', '8' => '₈', '9' => '₉',
    'a' => 'ₐ', 'e' => 'ₑ', 'h' => 'ₕ', 'i' => 'ᵢ', 'j' => 'ⱼ', 'k' => 'ₖ', 'l' => 'ₗ',
    'm' => 'ₘ', 'n' => 'ₙ', 'o' => 'ₒ', 'p' => 'ₚ', 'r' => 'ᵣ', 's' => 'ₛ', 't' => 'ₜ',
    'u' => 'ᵤ', 'v' => 'ᵥ', 'x' => 'ₓ',
    'β' => 'ᵦ', 'γ' => 'ᵧ', 'ρ' => 'ᵨ', 'φ' => 'ᵩ', 'χ' => 'ᵪ',
    '+' => '₊', '-' => '₋', '−' => '₋', '=' => '₌', '(' => '₍', ')' => '₎',
};

/// Unicode form of one character in the given script position.
#[inline]
pub fn script_char(ch: char, script: Script) -> Option<char> {
    script.table().get(&ch).copied()
}

/// Convert a whole script, or `None` if any character lacks a Unicode form.
///
/// Spaces are dropped, since TeX ignores them inside scripts.
///
/// ```rust
/// use mathrender::tex::unicode::{Script, to_script};
///
/// assert_eq!(to_script("n+1", Script::Super).as_deref(), Some("ⁿ⁺¹"));
/// assert_eq!(to_script("ij", Script::Sub).as_deref(), Some("ᵢⱼ"));
/// assert_eq!(to_script("q", Script::Super), None);
/// ```
pub fn to_script(text: &str, script: Script) -> Option<String> {
    let mut out = String::with_capacity(text.len() * 2);
    for ch in text.chars().filter(|c| !c.is_whitespace()) {
        out.push(script_char(ch, script)?);
    }
    if out.is_empty() { None } else { Some(out) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_characters() {
        assert_eq!(script_char('2', Script::Super), Some('²'));
        assert_eq!(script_char('0', Script::Sub), Some('₀'));
        assert_eq!(script_char('q', Script::Super), None);
        assert_eq!(script_char('b', Script::Sub), None);
    }

    #[test]
    fn test_whole_script_is_all_or_nothing() {
        assert_eq!(to_script("2", Script::Super).as_deref(), Some("²"));
        assert_eq!(to_script("i + 1", Script::Sub).as_deref(), Some("ᵢ₊₁"));
        assert_eq!(to_script("abc", Script::Sub), None);
        assert_eq!(to_script("", Script::Super), None);
    }

    #[test]
    fn test_operator() {
        assert_eq!(Script::Super.operator(), '^');
        assert_eq!(Script::Sub.operator(), '_');
    }
}
