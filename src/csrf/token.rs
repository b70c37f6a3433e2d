//! # CSRF Token Codec
//!
//! Generation, length validation, and comparison of synchronizer tokens.
//!
//! A token is `N` bytes read from the operating system random source and
//! encoded with standard Base64 (with padding). Because Base64 never emits
//! NUL bytes, tokens are safe to store as session values.
//!
//! # Example
//! ```rust
//! use wzs_csrf::csrf::token::{compare_token, generate_token, TokenLength};
//!
//! let len = TokenLength::new(32).unwrap();
//! let token = generate_token(len).unwrap();
//! assert_eq!(token.len(), len.encoded_len());
//! assert!(compare_token(&token, &token));
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::{TryRngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

use crate::error::csrf::CsrfError;

/// Smallest accepted raw token length in bytes.
pub const MIN_TOKEN_LENGTH: usize = 32;

/// Largest accepted raw token length in bytes.
pub const MAX_TOKEN_LENGTH: usize = 512;

/// A raw token length validated against `[32, 512]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenLength(usize);

impl TokenLength {
    /// Validates `length`.
    ///
    /// # Errors
    /// Returns [`CsrfError::InvalidTokenLength`] when `length` is outside
    /// `[MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH]`.
    pub fn new(length: usize) -> Result<Self, CsrfError> {
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&length) {
            return Err(CsrfError::InvalidTokenLength { length });
        }
        Ok(Self(length))
    }

    /// Number of random bytes per token.
    pub fn raw(self) -> usize {
        self.0
    }

    /// Length of the encoded token string.
    pub fn encoded_len(self) -> usize {
        expected_encoded_len(self.0)
    }
}

impl Default for TokenLength {
    fn default() -> Self {
        Self(MIN_TOKEN_LENGTH)
    }
}

/// Length of the padded standard Base64 encoding of `raw_len` bytes.
pub fn expected_encoded_len(raw_len: usize) -> usize {
    raw_len.div_ceil(3) * 4
}

/// Generates a new token of `len` random bytes.
///
/// # Errors
/// Returns [`CsrfError::RandomUnavailable`] if the OS random source fails.
pub fn generate_token(len: TokenLength) -> Result<String, CsrfError> {
    let mut bytes = vec![0u8; len.raw()];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(CsrfError::RandomUnavailable)?;
    Ok(STANDARD.encode(bytes))
}

/// Draws one byte from the OS random source to check it works.
///
/// Intended for startup, so an unavailable source stops the service before
/// the first request needs a token.
///
/// # Errors
/// Returns [`CsrfError::RandomUnavailable`] if the OS random source fails.
pub fn ensure_random_source() -> Result<(), CsrfError> {
    let mut byte = [0u8; 1];
    OsRng
        .try_fill_bytes(&mut byte)
        .map_err(CsrfError::RandomUnavailable)
}

/// Compares a client-sent token with the session token.
///
/// Length is checked first (it is not secret); equal-length inputs are
/// compared in constant time.
pub fn compare_token(sent: &str, expected: &str) -> bool {
    if sent.len() != expected.len() {
        return false;
    }
    sent.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_length_accepts_bounds() {
        assert_eq!(TokenLength::new(32).unwrap().raw(), 32);
        assert_eq!(TokenLength::new(512).unwrap().raw(), 512);
        assert_eq!(TokenLength::default().raw(), 32);
    }

    #[test]
    fn token_length_rejects_out_of_range() {
        for bad in [0, 1, 31, 513, 4096] {
            let err = TokenLength::new(bad).unwrap_err();
            assert!(
                matches!(err, CsrfError::InvalidTokenLength { length } if length == bad),
                "expected {bad} to be rejected"
            );
        }
    }

    #[test]
    fn expected_encoded_len_matches_padded_base64() {
        assert_eq!(expected_encoded_len(32), 44);
        assert_eq!(expected_encoded_len(33), 44);
        assert_eq!(expected_encoded_len(34), 48);
        assert_eq!(expected_encoded_len(512), 684);
    }

    #[test]
    fn generated_tokens_have_expected_length_and_alphabet() {
        for raw in [32, 33, 34, 100, 511, 512] {
            let len = TokenLength::new(raw).unwrap();
            let token = generate_token(len).unwrap();

            assert_eq!(token.len(), len.encoded_len(), "raw length {raw}");
            assert!(
                token
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')),
                "unexpected character in {token:?}"
            );
            assert_eq!(STANDARD.decode(&token).unwrap().len(), raw);
        }
    }

    #[test]
    fn generated_tokens_differ() {
        let len = TokenLength::default();
        let a = generate_token(len).unwrap();
        let b = generate_token(len).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn random_source_is_available() {
        assert!(ensure_random_source().is_ok());
    }

    #[test]
    fn compare_token_requires_equal_length_and_content() {
        assert!(compare_token("abcd", "abcd"));
        assert!(!compare_token("abcd", "abce"));
        assert!(!compare_token("xbcd", "abcd"));
        assert!(!compare_token("abc", "abcd"));
        assert!(!compare_token("", "abcd"));
        assert!(compare_token("", ""));
    }
}
