//! # Environment Variable Helpers
//!
//! Typed readers used by the configuration loaders. Every reader has a
//! `*_from` variant taking a provider closure, so tests never touch the
//! process environment.
//!
//! # Examples
//! ```rust
//! use wzs_csrf::config::env::{read_flag_from, read_list_from};
//!
//! assert!(read_flag_from(|_| Some("yes".into()), "CSRF_AJAX", false));
//! assert_eq!(
//!     read_list_from(|_| Some("/a, /b,,".into()), "CSRF_EXEMPT_PATHS"),
//!     vec!["/a".to_string(), "/b".to_string()]
//! );
//! ```

use crate::error::csrf::CsrfError;

/// Reads a boolean flag through `provider`.
///
/// `"1"`, `"true"`, `"yes"`, `"on"` (case-insensitive, optionally quoted)
/// are truthy; any other present value is falsy.
pub fn read_flag_from<F>(provider: F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match provider(name) {
        Some(v) => {
            let s = v.trim().trim_matches(|c| c == '"' || c == '\'');
            matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        }
        None => default,
    }
}

/// Reads a `usize` through `provider`.
///
/// A missing or blank value yields `default`.
///
/// # Errors
/// Returns [`CsrfError::InvalidConfig`] when the value is not a number, so
/// a typo never silently falls back to the default.
pub fn read_usize_from<F>(
    provider: F,
    name: &'static str,
    default: usize,
) -> Result<usize, CsrfError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = provider(name) else {
        return Ok(default);
    };
    let s = raw.trim();
    if s.is_empty() {
        return Ok(default);
    }
    s.parse::<usize>().map_err(|_| CsrfError::InvalidConfig {
        key: name,
        value: raw.clone(),
    })
}

/// Reads a non-empty string through `provider`, trimming whitespace.
pub fn read_string_from<F>(provider: F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    provider(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reads a comma-separated list through `provider`, dropping empty items.
pub fn read_list_from<F>(provider: F, name: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    provider(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
