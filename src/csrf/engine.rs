//! # CSRF Engine
//!
//! Per-request decision pipeline of the synchronizer token pattern:
//!
//! 1. resolve the session token, generating one when missing or stale
//! 2. allow safe methods and exempted requests
//! 3. for `https` requests, require a same-origin `Referer`
//! 4. read the sent token (header when AJAX is enabled, then form/query)
//! 5. compare it with the session token in constant time
//!
//! The engine never builds HTTP responses; it returns a [`Verdict`] that the
//! web layer turns into one (see [`crate::web::middleware`]).
//!
//! # Example
//! ```rust
//! use url::Url;
//! use wzs_csrf::config::csrf::CsrfConfig;
//! use wzs_csrf::csrf::engine::{CsrfEngine, Decision, RequestContext};
//! use wzs_csrf::csrf::exemption::ExemptionRegistry;
//! use wzs_csrf::csrf::store::MemorySession;
//!
//! let engine = CsrfEngine::new(CsrfConfig::default(), ExemptionRegistry::new()).unwrap();
//! let mut session = MemorySession::new();
//!
//! let get = RequestContext::new("GET", Url::parse("http://example.com/form").unwrap());
//! let verdict = engine.check(&get, &mut session).unwrap();
//! assert_eq!(verdict.decision, Decision::Allow);
//!
//! let post = RequestContext::new("POST", Url::parse("http://example.com/form").unwrap())
//!     .with_form_token(verdict.token.clone());
//! assert_eq!(engine.check(&post, &mut session).unwrap().decision, Decision::Allow);
//! ```

use std::fmt;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::app::AppConfig;
use crate::config::csrf::CsrfConfig;
use crate::csrf::exemption::ExemptionRegistry;
use crate::csrf::method::is_safe_method;
use crate::csrf::origin::same_origin;
use crate::csrf::store::{SessionStore, load_token, store_token};
use crate::csrf::token::{compare_token, ensure_random_source, generate_token};
use crate::error::csrf::CsrfError;

/// Why a request was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrfFailure {
    /// Secure request with an empty or unparsable `Referer`.
    NoReferer,
    /// Secure request whose `Referer` is cross-origin.
    BadReferer,
    /// Sent token missing or different from the session token.
    BadToken,
}

impl fmt::Display for CsrfFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoReferer => "no_referer",
            Self::BadReferer => "bad_referer",
            Self::BadToken => "bad_token",
        })
    }
}

/// A terminal rejection, with the message and delivery mode to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub failure: CsrfFailure,
    pub message: String,
    /// Redirect target; `None` means respond with `403 Forbidden`.
    pub redirect: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Rejection),
}

/// Outcome of [`CsrfEngine::check`].
///
/// `token` is always the current session token, whatever the decision, so
/// the host can expose it to templates and AJAX clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub token: String,
    pub decision: Decision,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self.decision, Decision::Allow)
    }
}

/// The parts of an HTTP request the engine looks at.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: String,
    /// Absolute request URL (scheme, host, path).
    pub url: Url,
    pub referer: Option<String>,
    /// Value of the `X-CSRF-Token` header.
    pub header_token: Option<String>,
    /// Value of the `csrf_token` form or query parameter.
    pub form_token: Option<String>,
    /// Action identifier such as `"App.Upload"`; empty if unknown.
    pub action: String,
}

impl RequestContext {
    /// Starts a context with no referer, tokens, or action.
    ///
    /// # Example
    /// ```rust
    /// use wzs_csrf::csrf::engine::RequestContext;
    /// use wzs_csrf::url::Url;
    ///
    /// let url = Url::parse("https://example.com/submit").unwrap();
    /// let req = RequestContext::new("POST", url)
    ///     .with_referer("https://example.com/form")
    ///     .with_form_token("token-from-the-form")
    ///     .with_action("Posts.Create");
    /// assert_eq!(req.action, "Posts.Create");
    /// assert!(req.header_token.is_none());
    /// ```
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            referer: None,
            header_token: None,
            form_token: None,
            action: String::new(),
        }
    }

    /// Sets the `Referer` header value.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sets the token sent in the `X-CSRF-Token` header.
    pub fn with_header_token(mut self, token: impl Into<String>) -> Self {
        self.header_token = Some(token.into());
        self
    }

    /// Sets the token sent as a form field or query parameter.
    pub fn with_form_token(mut self, token: impl Into<String>) -> Self {
        self.form_token = Some(token.into());
        self
    }

    /// Sets the action identifier consulted by action exemptions.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }
}

/// Immutable CSRF checker shared by all requests.
#[derive(Clone, Debug)]
pub struct CsrfEngine {
    config: CsrfConfig,
    exemptions: ExemptionRegistry,
}

impl CsrfEngine {
    /// Builds an engine after checking that the OS random source works.
    ///
    /// # Errors
    /// Returns [`CsrfError::RandomUnavailable`] if no secure randomness is
    /// available.
    pub fn new(config: CsrfConfig, exemptions: ExemptionRegistry) -> Result<Self, CsrfError> {
        ensure_random_source()?;
        Ok(Self { config, exemptions })
    }

    /// Builds an engine from the loaded application configuration.
    ///
    /// # Errors
    /// Fails on malformed exemption globs or an unavailable random source.
    pub fn from_app_config(cfg: AppConfig) -> Result<Self, CsrfError> {
        let exemptions = cfg.exemptions.into_registry()?;
        Self::new(cfg.csrf, exemptions)
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    pub fn exemptions(&self) -> &ExemptionRegistry {
        &self.exemptions
    }

    /// Returns the session token, replacing it when missing or stale.
    ///
    /// A stored value of the wrong length (tampering, a changed token size,
    /// or a fresh session) is silently regenerated.
    ///
    /// # Errors
    /// Returns [`CsrfError::RandomUnavailable`] if generation fails.
    pub fn resolve_token<S: SessionStore + ?Sized>(
        &self,
        session: &mut S,
    ) -> Result<String, CsrfError> {
        let expected = self.config.token_length.encoded_len();
        match load_token(session) {
            Some(token) if token.len() == expected => return Ok(token),
            Some(token) => warn!(
                found = token.len(),
                expected, "bad csrf token length in session, regenerating"
            ),
            None => {}
        }

        let token = generate_token(self.config.token_length)?;
        info!(length = token.len(), "generated new csrf token");
        store_token(session, token.clone());
        Ok(token)
    }

    /// Runs the full check for one request.
    ///
    /// # Errors
    /// Only token generation can fail; rejections are reported through
    /// [`Verdict::decision`].
    pub fn check<S: SessionStore + ?Sized>(
        &self,
        req: &RequestContext,
        session: &mut S,
    ) -> Result<Verdict, CsrfError> {
        let token = self.resolve_token(session)?;
        let decision = self.decide(req, &token);
        Ok(Verdict { token, decision })
    }

    fn decide(&self, req: &RequestContext, real_token: &str) -> Decision {
        if is_safe_method(&req.method) || self.exemptions.is_exempt(req.url.path(), &req.action) {
            return Decision::Allow;
        }
        info!(method = %req.method, path = req.url.path(), "processing unsafe request");

        if req.url.scheme() == "https" {
            if let Err(failure) = check_referer(req) {
                return self.deny(failure);
            }
        }

        let sent = self.sent_token(req);
        debug!(length = sent.len(), "csrf token received from client");

        if !compare_token(sent, real_token) {
            return self.deny(CsrfFailure::BadToken);
        }
        debug!("csrf token successfully checked");
        Decision::Allow
    }

    fn sent_token<'a>(&self, req: &'a RequestContext) -> &'a str {
        let header = if self.config.ajax {
            req.header_token.as_deref().unwrap_or_default()
        } else {
            ""
        };
        if !header.is_empty() {
            return header;
        }
        req.form_token.as_deref().unwrap_or_default()
    }

    fn deny(&self, failure: CsrfFailure) -> Decision {
        let messages = &self.config.messages;
        let message = match failure {
            CsrfFailure::NoReferer => &messages.no_referer,
            CsrfFailure::BadReferer => &messages.bad_referer,
            CsrfFailure::BadToken => &messages.bad_token,
        };
        let redirect = self.config.forbidden_redirect.clone();
        warn!(%failure, redirect = redirect.as_deref(), "rejecting request: {message}");
        Decision::Deny(Rejection {
            failure,
            message: message.clone(),
            redirect,
        })
    }
}

fn check_referer(req: &RequestContext) -> Result<(), CsrfFailure> {
    let referer = req
        .referer
        .as_deref()
        .filter(|r| !r.is_empty())
        .and_then(|r| Url::parse(r).ok())
        .ok_or(CsrfFailure::NoReferer)?;

    if !same_origin(&referer, &req.url) {
        return Err(CsrfFailure::BadReferer);
    }
    Ok(())
}
