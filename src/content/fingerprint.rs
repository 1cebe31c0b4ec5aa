//! Deterministic cache keys for rendered content.
use std::fmt;

use serde::Serialize;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[inline]
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

/// Hash of normalized content plus hash of the serialized render options.
///
/// Two fingerprints are equal only when both halves are; the cache never
/// compares them any other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
    pub content: u64,
    pub options: u64,
}

impl Fingerprint {
    /// Compute the fingerprint of already-normalized content.
    pub fn new(normalized: &str, options_key: &str) -> Self {
        Self {
            content: fnv1a(normalized.as_bytes()),
            options: fnv1a(options_key.as_bytes()),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{:08x}", self.content, self.options as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fingerprint_distinguishes_options() {
        let inline = Fingerprint::new("x^2", "display=false");
        let display = Fingerprint::new("x^2", "display=true");
        assert_eq!(inline.content, display.content);
        assert_ne!(inline, display);
    }

    #[test]
    fn test_fingerprint_display_is_short_hex() {
        let text = Fingerprint::new("a", "b").to_string();
        assert_eq!(text.len(), 25);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() || c == '-'));
    }

    proptest! {
        #[test]
        fn prop_fingerprint_is_deterministic(content in ".{0,64}", options in "[a-z=;]{0,16}") {
            prop_assert_eq!(Fingerprint::new(&content, &options), Fingerprint::new(&content, &options));
        }
    }
}
