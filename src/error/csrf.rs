use thiserror::Error;

/// Errors raised while configuring CSRF protection.
///
/// Every variant is fatal: it is returned from startup code and must stop
/// the service from serving traffic. Per-request failures are not errors;
/// they are reported as [`Rejection`](crate::csrf::engine::Rejection) values.
///
/// # Example
/// ```
/// use wzs_csrf::error::csrf::CsrfError;
///
/// let err = CsrfError::InvalidTokenLength { length: 16 };
/// assert_eq!(
///     err.to_string(),
///     "csrf token length 16 is out of range, expected a length in [32..512]"
/// );
/// ```
#[derive(Debug, Error)]
pub enum CsrfError {
    /// Configured raw token length lies outside `[32, 512]`.
    #[error("csrf token length {length} is out of range, expected a length in [32..512]")]
    InvalidTokenLength { length: usize },

    /// The operating system random source could not be read.
    #[error("secure random source is unavailable")]
    RandomUnavailable(#[source] rand::rand_core::OsError),

    /// An exemption glob could not be compiled.
    #[error("malformed csrf exemption glob {pattern:?}")]
    MalformedGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidConfig { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_token_length_display() {
        let err = CsrfError::InvalidTokenLength { length: 600 };
        assert!(err.to_string().contains("600"));
        assert!(err.to_string().contains("[32..512]"));
    }

    #[test]
    fn malformed_glob_keeps_pattern_and_source() {
        let source = glob::Pattern::new("/[a").unwrap_err();
        let err = CsrfError::MalformedGlob {
            pattern: "/[a".into(),
            source,
        };

        assert!(err.to_string().contains("\"/[a\""));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_config_names_the_key() {
        let err = CsrfError::InvalidConfig {
            key: "CSRF_TOKEN_LENGTH",
            value: "abc".into(),
        };
        assert_eq!(err.to_string(), "invalid value \"abc\" for CSRF_TOKEN_LENGTH");
    }
}
