// Command tables for the TeX translators
//
// Maps control-word names to the Unicode text they stand for, and classifies
// the names that need structural handling (functions, large operators,
// accents, font switches).

// Greek letters
static GREEK: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "alpha" => "α", "beta" => "β", "gamma" => "γ", "delta" => "δ",
    "epsilon" => "ϵ", "varepsilon" => "ε", "zeta" => "ζ", "eta" => "η",
    "theta" => "θ", "vartheta" => "ϑ", "iota" => "ι", "kappa" => "κ",
    "lambda" => "λ", "mu" => "μ", "nu" => "ν", "xi" => "ξ", "pi" => "π",
    "varpi" => "ϖ", "rho" => "ρ", "varrho" => "ϱ", "sigma" => "σ",
    "varsigma" => "ς", "tau" => "τ", "upsilon" => "υ", "phi" => "ϕ",
    "varphi" => "φ", "chi" => "χ", "psi" => "ψ", "omega" => "ω",
    "Gamma" => "Γ", "Delta" => "Δ", "Theta" => "Θ", "Lambda" => "Λ",
    "Xi" => "Ξ", "Pi" => "Π", "Sigma" => "Σ", "Upsilon" => "Υ",
    "Phi" => "Φ", "Psi" => "Ψ", "Omega" => "Ω",
};

// Operators, relations, arrows and miscellany
static SYMBOLS: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "times" => "×", "div" => "÷", "cdot" => "⋅", "pm" => "±", "mp" => "∓",
    "ast" => "∗", "star" => "⋆", "circ" => "∘", "bullet" => "•",
    "cap" => "∩", "cup" => "∪", "setminus" => "∖", "wedge" => "∧", "land" => "∧",
    "vee" => "∨", "lor" => "∨", "oplus" => "⊕", "otimes" => "⊗",
    "leq" => "≤", "le" => "≤", "geq" => "≥", "ge" => "≥", "neq" => "≠", "ne" => "≠",
    "approx" => "≈", "equiv" => "≡", "sim" => "∼", "simeq" => "≃", "cong" => "≅",
    "propto" => "∝", "ll" => "≪", "gg" => "≫", "perp" => "⊥", "parallel" => "∥",
    "mid" => "∣", "in" => "∈", "notin" => "∉", "ni" => "∋",
    "subset" => "⊂", "supset" => "⊃", "subseteq" => "⊆", "supseteq" => "⊇",
    "to" => "→", "rightarrow" => "→", "leftarrow" => "←", "gets" => "←",
    "leftrightarrow" => "↔", "Rightarrow" => "⇒", "Leftarrow" => "⇐",
    "Leftrightarrow" => "⇔", "implies" => "⟹", "iff" => "⟺", "mapsto" => "↦",
    "uparrow" => "↑", "downarrow" => "↓",
    "infty" => "∞", "partial" => "∂", "nabla" => "∇", "forall" => "∀",
    "exists" => "∃", "nexists" => "∄", "emptyset" => "∅", "varnothing" => "∅",
    "neg" => "¬", "lnot" => "¬", "angle" => "∠", "triangle" => "△",
    "degree" => "°", "prime" => "′", "ldots" => "…", "dots" => "…",
    "cdots" => "⋯", "vdots" => "⋮", "ddots" => "⋱", "hbar" => "ℏ", "ell" => "ℓ",
    "Re" => "ℜ", "Im" => "ℑ", "aleph" => "ℵ", "therefore" => "∴", "because" => "∵",
    "langle" => "⟨", "rangle" => "⟩", "lfloor" => "⌊", "rfloor" => "⌋",
    "lceil" => "⌈", "rceil" => "⌉", "vert" => "|", "Vert" => "‖",
    "lbrace" => "{", "rbrace" => "}", "backslash" => "\\",
    "sum" => "∑", "prod" => "∏", "coprod" => "∐", "int" => "∫", "iint" => "∬",
    "iiint" => "∭", "oint" => "∮", "bigcup" => "⋃", "bigcap" => "⋂",
};

// Upright function names
static FUNCTIONS: phf::Set<&'static str> = phf::phf_set! {
    "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan",
    "sinh", "cosh", "tanh", "coth", "log", "ln", "lg", "exp", "lim", "limsup",
    "liminf", "max", "min", "sup", "inf", "det", "gcd", "deg", "dim", "ker",
    "arg", "Pr", "mod",
};

static BLACKBOARD: phf::Map<char, &'static str> = phf::phf_map! {
    'N' => "ℕ", 'Z' => "ℤ", 'Q' => "ℚ", 'R' => "ℝ", 'C' => "ℂ", 'P' => "ℙ",
    'H' => "ℍ",
};

/// Unicode text for a control word, if it is a plain symbol.
#[inline]
pub fn symbol(name: &str) -> Option<&'static str> {
    GREEK.get(name).or_else(|| SYMBOLS.get(name)).copied()
}

#[inline]
pub fn is_function(name: &str) -> bool {
    FUNCTIONS.contains(name)
}

/// Summation-like operators whose scripts sit above and below in display style.
#[inline]
pub fn is_large_operator(name: &str) -> bool {
    matches!(
        name,
        "sum" | "prod" | "coprod" | "int" | "iint" | "iiint" | "oint" | "bigcup" | "bigcap"
    )
}

/// Double-struck capital for `\mathbb{X}`.
#[inline]
pub fn blackboard(ch: char) -> Option<&'static str> {
    BLACKBOARD.get(&ch).copied()
}

/// Combining mark for accent commands.
pub fn accent(name: &str) -> Option<char> {
    match name {
        "hat" | "widehat" => Some('\u{0302}'),
        "bar" | "overline" => Some('\u{0305}'),
        "vec" | "overrightarrow" => Some('\u{20D7}'),
        "dot" => Some('\u{0307}'),
        "ddot" => Some('\u{0308}'),
        "tilde" | "widetilde" => Some('\u{0303}'),
        _ => None,
    }
}

/// Width of an explicit spacing command, in em.
pub fn spacing(name: &str) -> Option<f32> {
    match name {
        "," | "thinspace" => Some(0.17),
        ":" | ">" | "medspace" => Some(0.22),
        ";" | "thickspace" => Some(0.28),
        " " => Some(0.25),
        "quad" => Some(1.0),
        "qquad" => Some(2.0),
        "!" | "negthinspace" => Some(0.0),
        _ => None,
    }
}

/// Text-style commands whose argument is read verbatim.
#[inline]
pub fn is_text_command(name: &str) -> bool {
    matches!(
        name,
        "text" | "textrm" | "textit" | "textbf" | "mathrm" | "operatorname" | "mbox"
    )
}

/// Font switches whose argument is still math.
#[inline]
pub fn is_font_command(name: &str) -> bool {
    matches!(
        name,
        "mathbf" | "mathit" | "mathsf" | "mathtt" | "mathcal" | "boldsymbol" | "displaystyle"
            | "textstyle"
    )
}

/// Characters that `\{`-style escapes stand for.
#[inline]
pub fn escaped_char(name: &str) -> Option<char> {
    match name {
        "{" | "}" | "%" | "$" | "&" | "#" | "_" | "|" => name.chars().next(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        assert_eq!(symbol("alpha"), Some("α"));
        assert_eq!(symbol("Omega"), Some("Ω"));
        assert_eq!(symbol("leq"), Some("≤"));
        assert_eq!(symbol("int"), Some("∫"));
        assert_eq!(symbol("frac"), None);
    }

    #[test]
    fn test_classifiers() {
        assert!(is_function("sin"));
        assert!(!is_function("alpha"));
        assert!(is_large_operator("sum"));
        assert_eq!(blackboard('R'), Some("ℝ"));
        assert_eq!(accent("vec"), Some('\u{20D7}'));
        assert_eq!(spacing("quad"), Some(1.0));
        assert_eq!(escaped_char("%"), Some('%'));
        assert!(is_text_command("text"));
    }
}
