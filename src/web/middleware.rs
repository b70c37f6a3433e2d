//! # CSRF Middleware
//!
//! Adapts axum requests to [`CsrfEngine`] and its verdicts back to HTTP.
//!
//! The session is the request's signed cookie jar: the token lives in the
//! `csrf_token` cookie, signed with [`CsrfConfig::cookie_key`] and flagged
//! according to [`CsrfConfig`].
//!
//! The token is searched for in urlencoded and `multipart/form-data`
//! bodies. Either kind is buffered up to [`CsrfConfig::max_body_bytes`] and
//! handed on unchanged to the route.
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! ```

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CONTENT_TYPE, HOST, REFERER},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, cookie::SignedCookieJar};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{debug, error};
use url::{Url, form_urlencoded};

use crate::config::csrf::CsrfConfig;
use crate::csrf::engine::{CsrfEngine, Decision, RequestContext};
use crate::csrf::method::is_safe_method;
use crate::csrf::store::CookieSession;
use crate::web::token::{CSRF_FIELD_NAME, CsrfToken};

const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");
const FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Action identifier (`"Controller.Action"`) for action-based exemptions.
///
/// Insert it into the request extensions from a layer placed outside the
/// CSRF middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionName(pub String);

impl ActionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Axum middleware enforcing CSRF protection.
///
/// Use with [`axum::middleware::from_fn_with_state`] and an
/// `Arc<CsrfEngine>` state. With AJAX support enabled, every response
/// (rejections included) carries the session token in `X-CSRF-Token`.
pub async fn csrf_middleware(
    State(engine): State<Arc<CsrfEngine>>,
    request: Request,
    next: Next,
) -> Response {
    let cfg = engine.config();
    let (mut parts, body) = request.into_parts();

    let jar = SignedCookieJar::from_headers(&parts.headers, cfg.cookie_key());
    let mut session = CookieSession::new(jar, cfg.cookie_secure, cfg.cookie_http_only);

    let Some(url) = request_url(&parts, cfg) else {
        debug!(uri = %parts.uri, "cannot determine request url");
        return (StatusCode::BAD_REQUEST, "Missing Host header").into_response();
    };

    let (form_token, body) = if is_safe_method(parts.method.as_str()) {
        (None, body)
    } else {
        match read_form_token(&parts.headers, body, cfg.max_body_bytes).await {
            Ok(v) => v,
            Err(resp) => return resp,
        }
    };

    let ctx = RequestContext {
        method: parts.method.as_str().to_string(),
        referer: header_str(&parts.headers, &REFERER),
        header_token: header_str(&parts.headers, &CSRF_HEADER),
        form_token: form_token.or_else(|| query_param(&url, CSRF_FIELD_NAME)),
        action: parts
            .extensions
            .get::<ActionName>()
            .map(|a| a.0.clone())
            .unwrap_or_default(),
        url,
    };

    let verdict = match engine.check(&ctx, &mut session) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "csrf token generation failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let jar = session.into_jar();
    let token = verdict.token;

    let mut res = match verdict.decision {
        Decision::Deny(rejection) => rejection.into_response_with(cfg),
        Decision::Allow => {
            parts.extensions.insert(CsrfToken::new(token.clone()));
            next.run(Request::from_parts(parts, body)).await
        }
    };

    if cfg.ajax {
        if let Ok(v) = HeaderValue::from_str(&token) {
            res.headers_mut().insert(CSRF_HEADER, v);
        }
    }
    (jar, res).into_response()
}

/// Rebuilds the absolute URL of the request.
///
/// Origin-form URIs take their host from the `Host` header. Their scheme
/// comes from `X-Forwarded-Proto` when the proxy is trusted, otherwise from
/// [`CsrfConfig::assume_https`].
fn request_url(parts: &Parts, cfg: &CsrfConfig) -> Option<Url> {
    let uri = &parts.uri;
    let scheme = match uri.scheme_str() {
        Some(s) => s.to_string(),
        None => cfg
            .trust_forwarded_proto
            .then(|| forwarded_proto(&parts.headers))
            .flatten()
            .unwrap_or_else(|| {
                let fallback = if cfg.assume_https { "https" } else { "http" };
                fallback.to_string()
            }),
    };
    let host = match uri.authority() {
        Some(a) => a.as_str().to_string(),
        None => header_str(&parts.headers, &HOST)?,
    };
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    Url::parse(&format!("{scheme}://{host}{path}")).ok()
}

/// First hop of `X-Forwarded-Proto`, lowercased.
fn forwarded_proto(headers: &HeaderMap) -> Option<String> {
    header_str(headers, &FORWARDED_PROTO)
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_ascii_lowercase()))
        .filter(|s| !s.is_empty())
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FormKind {
    UrlEncoded,
    Multipart,
}

/// Classifies the body by media type, ignoring case and parameters.
fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let ct = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = ct.split(';').next().unwrap_or_default().trim();
    if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        Some(FormKind::UrlEncoded)
    } else if essence.eq_ignore_ascii_case("multipart/form-data") {
        Some(FormKind::Multipart)
    } else {
        None
    }
}

/// Buffers a form body to read the token field, then hands the body back
/// for the downstream handler.
async fn read_form_token(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<(Option<String>, Body), Response> {
    let Some(kind) = form_kind(headers) else {
        return Ok((None, body));
    };

    let bytes = buffer_body(body, limit).await?;

    let token = match kind {
        FormKind::UrlEncoded => form_urlencoded::parse(&bytes)
            .find(|(k, _)| k == CSRF_FIELD_NAME)
            .map(|(_, v)| v.into_owned()),
        FormKind::Multipart => multipart_token(headers, bytes.clone()).await,
    };

    Ok((token, Body::from(bytes)))
}

/// Collects at most `limit` bytes.
///
/// Oversized bodies map to `413`; any other read failure to `400`.
async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, Response> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            debug!(limit, "form body exceeds limit");
            Err((StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response())
        }
        Err(e) => {
            debug!(error = %e, "failed to read form body");
            Err((StatusCode::BAD_REQUEST, "Failed to read request body").into_response())
        }
    }
}

/// Parses a buffered multipart body and returns the `csrf_token` field.
///
/// A body that does not parse yields no token, which the engine rejects.
async fn multipart_token(headers: &HeaderMap, bytes: Bytes) -> Option<String> {
    let mut req = Request::new(Body::from(bytes));
    if let Some(ct) = headers.get(CONTENT_TYPE) {
        req.headers_mut().insert(CONTENT_TYPE, ct.clone());
    }

    let mut multipart = match Multipart::from_request(req, &()).await {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "malformed multipart body");
            return None;
        }
    };

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(CSRF_FIELD_NAME) {
            return field.text().await.ok();
        }
    }
    None
}
