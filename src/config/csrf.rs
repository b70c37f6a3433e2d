//! # CSRF Configuration
//!
//! Resolved once at startup and shared read-only by every request.
//!
//! The configuration reads from environment variables:
//! - `CSRF_TOKEN_LENGTH` — raw token bytes in `[32, 512]` (default: `32`)
//! - `CSRF_AJAX` — accept the token from the `X-CSRF-Token` header
//!   (default: `false`)
//! - `CSRF_FORBIDDEN` — redirect target for rejected requests; unset means
//!   `403` (default: unset)
//! - `CSRF_ERR_NO_REFERER`, `CSRF_ERR_BAD_REFERER`, `CSRF_ERR_BAD_TOKEN` —
//!   message overrides
//! - `CSRF_SECRET` — base string used to derive the cookie signing key (if
//!   missing, a random key is generated and sessions end with the process)
//! - `CSRF_COOKIE_SECURE` — `Secure` flag of the session cookie (default: `true`)
//! - `CSRF_COOKIE_HTTPONLY` — `HttpOnly` flag of the session cookie
//!   (default: `true`)
//! - `CSRF_TRUST_FORWARDED_PROTO` — take the scheme from `X-Forwarded-Proto`
//!   (default: `false`)
//! - `CSRF_ASSUME_HTTPS` — treat requests without an explicit scheme as
//!   `https` (default: `false`)
//! - `CSRF_MAX_BODY_BYTES` — largest form body buffered to find the token
//!   (default: `2097152`)
//! - `CSRF_EXEMPT_PATHS`, `CSRF_EXEMPT_ACTIONS`, `CSRF_EXEMPT_GLOBS` —
//!   comma-separated exemptions
//!
//! # Examples
//! ```rust
//! use wzs_csrf::config::csrf::CsrfConfig;
//!
//! let cfg = CsrfConfig::from_env_with(|_| None).unwrap();
//! assert_eq!(cfg.token_length.raw(), 32);
//! assert!(!cfg.ajax);
//! assert!(cfg.forbidden_redirect.is_none());
//! assert_eq!(cfg.secret.len(), 64);
//! ```

use axum_extra::extract::cookie::Key;
use rand::RngCore;
use sha2::{Digest, Sha512};

use crate::config::env::{read_flag_from, read_list_from, read_string_from, read_usize_from};
use crate::csrf::exemption::ExemptionRegistry;
use crate::csrf::token::{MIN_TOKEN_LENGTH, TokenLength};
use crate::error::csrf::CsrfError;

/// Default for [`CsrfConfig::max_body_bytes`].
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub const DEFAULT_ERR_NO_REFERER: &str =
    "A secure request contained no Referer or its value was malformed!";
pub const DEFAULT_ERR_BAD_REFERER: &str = "Same-origin policy failure!";
pub const DEFAULT_ERR_BAD_TOKEN: &str = "Tokens mismatch!";

/// User-facing messages attached to each rejection reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfMessages {
    pub no_referer: String,
    pub bad_referer: String,
    pub bad_token: String,
}

impl Default for CsrfMessages {
    fn default() -> Self {
        Self {
            no_referer: DEFAULT_ERR_NO_REFERER.into(),
            bad_referer: DEFAULT_ERR_BAD_REFERER.into(),
            bad_token: DEFAULT_ERR_BAD_TOKEN.into(),
        }
    }
}

/// Configuration for CSRF protection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfConfig {
    pub token_length: TokenLength,
    pub ajax: bool,
    /// `None` rejects with `403`; `Some(target)` redirects there with a flash message.
    pub forbidden_redirect: Option<String>,
    pub messages: CsrfMessages,
    /// Key material signing the session cookie.
    pub secret: [u8; 64],
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    /// Honour `X-Forwarded-Proto`. Enable only behind a proxy that sets it.
    pub trust_forwarded_proto: bool,
    /// Scheme for requests whose URI carries none (and no trusted proxy
    /// header): `https` when set, `http` otherwise.
    pub assume_https: bool,
    pub max_body_bytes: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_length: TokenLength::default(),
            ajax: false,
            forbidden_redirect: None,
            messages: CsrfMessages::default(),
            secret: random_secret(),
            cookie_secure: true,
            cookie_http_only: true,
            trust_forwarded_proto: false,
            assume_https: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CsrfConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// See [`CsrfConfig::from_env_with`].
    pub fn from_env() -> Result<Self, CsrfError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Loads configuration using a custom key provider (for testing/mocking).
    ///
    /// # Errors
    /// - [`CsrfError::InvalidConfig`] if `CSRF_TOKEN_LENGTH` or
    ///   `CSRF_MAX_BODY_BYTES` is not a number
    /// - [`CsrfError::InvalidTokenLength`] if the length lies outside `[32, 512]`
    pub fn from_env_with<F>(get: F) -> Result<Self, CsrfError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_len = read_usize_from(&get, "CSRF_TOKEN_LENGTH", MIN_TOKEN_LENGTH)?;
        let token_length = TokenLength::new(raw_len)?;

        let defaults = CsrfMessages::default();
        let messages = CsrfMessages {
            no_referer: read_string_from(&get, "CSRF_ERR_NO_REFERER")
                .unwrap_or(defaults.no_referer),
            bad_referer: read_string_from(&get, "CSRF_ERR_BAD_REFERER")
                .unwrap_or(defaults.bad_referer),
            bad_token: read_string_from(&get, "CSRF_ERR_BAD_TOKEN")
                .unwrap_or(defaults.bad_token),
        };

        let secret = match read_string_from(&get, "CSRF_SECRET") {
            Some(s) => derive_secret_from_string(&s),
            None => random_secret(),
        };

        Ok(Self {
            token_length,
            ajax: read_flag_from(&get, "CSRF_AJAX", false),
            forbidden_redirect: read_string_from(&get, "CSRF_FORBIDDEN"),
            messages,
            secret,
            cookie_secure: read_flag_from(&get, "CSRF_COOKIE_SECURE", true),
            cookie_http_only: read_flag_from(&get, "CSRF_COOKIE_HTTPONLY", true),
            trust_forwarded_proto: read_flag_from(&get, "CSRF_TRUST_FORWARDED_PROTO", false),
            assume_https: read_flag_from(&get, "CSRF_ASSUME_HTTPS", false),
            max_body_bytes: read_usize_from(&get, "CSRF_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }

    /// Returns the key signing the session cookie.
    pub fn cookie_key(&self) -> Key {
        Key::from(&self.secret[..])
    }
}

/// Derives a deterministic 64-byte secret from a string.
///
/// Converts an environment string (e.g. `CSRF_SECRET`) into key material of
/// the size [`Key`] expects.
pub fn derive_secret_from_string(s: &str) -> [u8; 64] {
    let digest = Sha512::digest(s.as_bytes());
    let mut key = [0u8; 64];
    key.copy_from_slice(&digest);
    key
}

/// Generates a new random 64-byte secret.
pub fn random_secret() -> [u8; 64] {
    let mut key = [0u8; 64];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Exemptions declared through the environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExemptionConfig {
    pub paths: Vec<String>,
    pub actions: Vec<String>,
    pub globs: Vec<String>,
}

impl ExemptionConfig {
    /// Loads exemptions from the process environment.
    ///
    /// # Example
    /// ```rust
    /// use wzs_csrf::config::csrf::ExemptionConfig;
    ///
    /// let ex = ExemptionConfig::from_env();
    /// assert!(ex.into_registry().is_ok());
    /// ```
    pub fn from_env() -> Self {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Loads exemptions using a custom key provider.
    pub fn from_env_with<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            paths: read_list_from(&get, "CSRF_EXEMPT_PATHS"),
            actions: read_list_from(&get, "CSRF_EXEMPT_ACTIONS"),
            globs: read_list_from(&get, "CSRF_EXEMPT_GLOBS"),
        }
    }

    /// Builds a registry from the declared exemptions.
    ///
    /// # Errors
    /// Returns [`CsrfError::MalformedGlob`] for the first invalid pattern.
    pub fn into_registry(self) -> Result<ExemptionRegistry, CsrfError> {
        let mut registry = ExemptionRegistry::new();
        registry.add_exact_paths(&self.paths);
        registry.add_actions(&self.actions);
        registry.add_globs(&self.globs)?;
        Ok(registry)
    }
}
