// ── Token normalization ──
//
// Camera-decoded and hand-typed credentials must compare equal, so every
// comparison and every backend call uses the normalized form.

use std::fmt;

/// Canonical form of a scanned credential.
///
/// Only ASCII alphanumerics survive, upper-cased. `Debug` and `Display`
/// show a redacted fingerprint; use [`as_str`](Self::as_str) for the
/// single validation request that needs the full value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NormalizedToken(String);

impl NormalizedToken {
    /// Canonicalize raw scan or keyboard input.
    ///
    /// Total and pure: trims, drops every character outside the token
    /// alphabet (separators, whitespace, punctuation), upper-cases the rest.
    pub fn normalize(raw: &str) -> Self {
        Self(
            raw.trim()
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last four characters, safe for logs.
    pub fn fingerprint(&self) -> String {
        let skip = self.0.len().saturating_sub(4);
        format!("…{}", &self.0[skip..])
    }
}

impl fmt::Debug for NormalizedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NormalizedToken")
            .field(&self.fingerprint())
            .finish()
    }
}

impl fmt::Display for NormalizedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_differences_normalize_identically() {
        let a = NormalizedToken::normalize("abc-123 ");
        let b = NormalizedToken::normalize("ABC123");
        let c = NormalizedToken::normalize("  a b c_1.2:3\n");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.as_str(), "ABC123");
    }

    #[test]
    fn separators_only_is_empty() {
        assert!(NormalizedToken::normalize(" -- \t").is_empty());
        assert!(NormalizedToken::normalize("").is_empty());
    }

    #[test]
    fn non_ascii_is_stripped() {
        assert_eq!(NormalizedToken::normalize("é1ß2").as_str(), "12");
    }

    #[test]
    fn debug_never_shows_full_token() {
        let token = NormalizedToken::normalize("SECRETTOKEN9876");
        let shown = format!("{token:?} {token}");
        assert!(!shown.contains("SECRETTOKEN"));
        assert!(shown.contains("9876"));
    }

    #[test]
    fn fingerprint_of_short_token() {
        assert_eq!(NormalizedToken::normalize("ab").fingerprint(), "…AB");
    }
}
