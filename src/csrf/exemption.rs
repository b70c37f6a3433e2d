//! # CSRF Exemptions
//!
//! Allow-list of requests that bypass the token check even though their
//! method is unsafe. Three independent tiers are consulted:
//!
//! - exact paths, compared case-insensitively
//! - action names of the form `Controller.Action`, compared exactly
//! - glob patterns with `path.Match` syntax, where `*` and `?` never
//!   cross a `/`
//!
//! The registry is filled during startup and then handed to
//! [`CsrfEngine`](crate::csrf::engine::CsrfEngine), which only reads it.
//!
//! # Example
//! ```rust
//! use wzs_csrf::csrf::exemption::ExemptionRegistry;
//!
//! let mut reg = ExemptionRegistry::new();
//! reg.add_exact_path("/webhooks/stripe");
//! reg.add_action("Api.Callback");
//! reg.add_glob("/public/*").unwrap();
//!
//! assert!(reg.is_exempt("/Webhooks/Stripe", ""));
//! assert!(reg.is_exempt("/anything", "Api.Callback"));
//! assert!(reg.is_exempt("/public/form", ""));
//! assert!(!reg.is_exempt("/public/a/b", ""));
//! ```

use std::collections::HashSet;

use glob::{MatchOptions, Pattern, PatternError};
use tracing::{debug, info};

use crate::error::csrf::CsrfError;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Paths, actions, and patterns exempted from CSRF checks.
#[derive(Clone, Debug, Default)]
pub struct ExemptionRegistry {
    paths: HashSet<String>,
    actions: HashSet<String>,
    globs: Vec<Pattern>,
}

impl ExemptionRegistry {
    /// Creates a registry that exempts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exempts an exact path. Paths not starting with `/` are ignored.
    pub fn add_exact_path(&mut self, path: &str) {
        if !path.starts_with('/') {
            debug!(path, "ignoring csrf exemption without leading slash");
            return;
        }
        info!(path, "adding csrf path exemption");
        self.paths.insert(path.to_lowercase());
    }

    /// Calls [`add_exact_path`](Self::add_exact_path) for each item.
    ///
    /// # Example
    /// ```rust
    /// use wzs_csrf::csrf::exemption::ExemptionRegistry;
    ///
    /// let mut reg = ExemptionRegistry::new();
    /// reg.add_exact_paths(["/hook", "no-slash"]);
    /// assert!(reg.is_exempt("/HOOK", ""));
    /// assert!(!reg.is_exempt("no-slash", ""));
    /// ```
    pub fn add_exact_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for p in paths {
            self.add_exact_path(p.as_ref());
        }
    }

    /// Exempts an action such as `"App.Upload"`.
    ///
    /// Anything other than two non-empty dot-separated segments is ignored.
    pub fn add_action(&mut self, action: &str) {
        let valid = matches!(
            action.split_once('.'),
            Some((controller, name))
                if !controller.is_empty() && !name.is_empty() && !name.contains('.')
        );
        if !valid {
            debug!(action, "ignoring malformed csrf action exemption");
            return;
        }
        info!(action, "adding csrf action exemption");
        self.actions.insert(action.to_string());
    }

    /// Calls [`add_action`](Self::add_action) for each item.
    ///
    /// # Example
    /// ```rust
    /// use wzs_csrf::csrf::exemption::ExemptionRegistry;
    ///
    /// let mut reg = ExemptionRegistry::new();
    /// reg.add_actions(["Api.Callback", "Broken"]);
    /// assert!(reg.is_exempt("/any", "Api.Callback"));
    /// assert!(!reg.is_exempt("/any", "Broken"));
    /// ```
    pub fn add_actions<I, S>(&mut self, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for a in actions {
            self.add_action(a.as_ref());
        }
    }

    /// Exempts every path matching `pattern`.
    ///
    /// Syntax follows `path.Match`: `*` (any run of non-`/` characters,
    /// `**` included), `?`, `[...]` classes negated with `[^...]`, and `\`
    /// escapes outside classes.
    ///
    /// # Errors
    /// Returns [`CsrfError::MalformedGlob`] if the pattern is invalid, or
    /// uses `[!...]`, whose meaning differs between glob dialects.
    ///
    /// # Example
    /// ```rust
    /// use wzs_csrf::csrf::exemption::ExemptionRegistry;
    ///
    /// let mut reg = ExemptionRegistry::new();
    /// reg.add_glob("/[^m]ail").unwrap();
    /// assert!(reg.is_exempt("/nail", ""));
    /// assert!(!reg.is_exempt("/mail", ""));
    /// assert!(reg.add_glob("/[unterminated").is_err());
    /// ```
    pub fn add_glob(&mut self, pattern: &str) -> Result<(), CsrfError> {
        let malformed = |source| CsrfError::MalformedGlob {
            pattern: pattern.to_string(),
            source,
        };
        let normalized = normalize_glob(pattern).map_err(malformed)?;
        let compiled = Pattern::new(&normalized).map_err(malformed)?;
        if self.globs.iter().any(|g| g.as_str() == compiled.as_str()) {
            return Ok(());
        }
        info!(pattern, "adding csrf glob exemption");
        self.globs.push(compiled);
        Ok(())
    }

    /// # Errors
    /// Stops at the first malformed pattern; earlier ones stay registered.
    pub fn add_globs<I, S>(&mut self, patterns: I) -> Result<(), CsrfError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for p in patterns {
            self.add_glob(p.as_ref())?;
        }
        Ok(())
    }

    /// Returns `true` if the request path or action is exempted.
    pub fn is_exempt(&self, path: &str, action: &str) -> bool {
        if self.paths.contains(&path.to_lowercase()) {
            info!(path, "skipping csrf check for exempted path");
            return true;
        }
        if self.actions.contains(action) {
            info!(path, action, "skipping csrf check for exempted action");
            return true;
        }
        if self.globs.iter().any(|g| g.matches_with(path, GLOB_OPTIONS)) {
            info!(path, "skipping csrf check for path matching exempted glob");
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.actions.is_empty() && self.globs.is_empty()
    }
}

/// Rewrites `path.Match` syntax into the dialect understood by [`Pattern`].
///
/// Runs of `*` collapse to one star so that `**` cannot span `/`, `[^` turns
/// into `[!`, and an escaped wildcard becomes a one-character class.
fn normalize_glob(pattern: &str) -> Result<String, PatternError> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.char_indices().peekable();
    let mut in_class = false;
    // true while no member of the current class has been read yet
    let mut class_start = false;
    // true only for the character right after `[`
    let mut class_first = false;

    while let Some((pos, c)) = chars.next() {
        if in_class {
            let first = std::mem::take(&mut class_first);
            match c {
                '^' if first => {
                    out.push('!');
                    continue;
                }
                '!' if first => {
                    return Err(PatternError {
                        pos,
                        msg: "ambiguous `[!` class, use `[^` to negate",
                    });
                }
                ']' if !class_start => in_class = false,
                '\\' => {
                    return Err(PatternError {
                        pos,
                        msg: "escapes inside character classes are not supported",
                    });
                }
                _ => {}
            }
            out.push(c);
            class_start = false;
            continue;
        }

        match c {
            '*' => {
                out.push('*');
                while chars.next_if(|&(_, n)| n == '*').is_some() {}
            }
            '[' => {
                in_class = true;
                class_start = true;
                class_first = true;
                out.push('[');
            }
            '\\' => match chars.next() {
                Some((_, e @ ('*' | '?' | '['))) => {
                    out.push('[');
                    out.push(e);
                    out.push(']');
                }
                Some((_, e)) => out.push(e),
                None => {
                    return Err(PatternError {
                        pos,
                        msg: "trailing escape character",
                    });
                }
            },
            _ => out.push(c),
        }
    }
    Ok(out)
}
