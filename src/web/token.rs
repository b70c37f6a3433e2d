//! # Token Exposure
//!
//! [`csrf_middleware`](crate::web::middleware::csrf_middleware) stores the
//! current token in the request extensions as a [`CsrfToken`]. Handlers
//! extract it to embed the token in forms, or serve it to JavaScript through
//! [`csrf_handler`].
//!
//! # Example
//! ```rust,no_run
//! use axum::response::Html;
//! use wzs_csrf::web::token::CsrfToken;
//!
//! async fn form(csrf: CsrfToken) -> Html<String> {
//!     Html(format!(
//!         r#"<form method="post">{}<button>Send</button></form>"#,
//!         csrf.as_hidden_field()
//!     ))
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
        request::Parts,
    },
};
use serde::Serialize;

/// Form field carrying the token in submitted forms.
pub const CSRF_FIELD_NAME: &str = "csrf_token";

/// HTTP header carrying the token for AJAX requests.
pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

/// The current session token, as resolved by the middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wraps an already issued token.
    ///
    /// # Example
    /// ```rust
    /// use wzs_csrf::web::token::CsrfToken;
    ///
    /// let token = CsrfToken::new("c2VjcmV0".into());
    /// assert_eq!(token.token(), "c2VjcmV0");
    /// ```
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Returns the encoded token, as compared against submitted values.
    pub fn token(&self) -> &str {
        &self.0
    }

    /// `<input type="hidden" name="csrf_token" value="...">`
    pub fn as_hidden_field(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            CSRF_FIELD_NAME,
            html_escape(&self.0)
        )
    }

    /// `<meta name="csrf-token" content="...">`, for scripts that copy it
    /// into the `X-CSRF-Token` header.
    pub fn as_meta_tag(&self) -> String {
        format!(
            r#"<meta name="csrf-token" content="{}">"#,
            html_escape(&self.0)
        )
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CsrfToken>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "CSRF middleware is not installed",
        ))
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// JSON response schema returned by [`csrf_handler`].
#[derive(Debug, Serialize)]
pub struct CsrfResponse {
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
}

/// Axum handler returning the current token as JSON.
///
/// Mount it behind the CSRF middleware, e.g. at `GET /csrf`.
pub async fn csrf_handler(token: CsrfToken) -> (StatusCode, HeaderMap, Json<CsrfResponse>) {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let json = Json(CsrfResponse {
        csrf_token: token.0,
    });

    (StatusCode::OK, headers, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn hidden_field_and_meta_tag_embed_token() {
        let token = CsrfToken::new("ab+/cd==".into());

        assert_eq!(
            token.as_hidden_field(),
            r#"<input type="hidden" name="csrf_token" value="ab+/cd==">"#
        );
        assert_eq!(
            token.as_meta_tag(),
            r#"<meta name="csrf-token" content="ab+/cd==">"#
        );
    }

    #[test]
    fn html_is_escaped() {
        let token = CsrfToken::new(r#""><script>"#.into());
        assert!(!token.as_hidden_field().contains("<script>"));
        assert!(token.as_hidden_field().contains("&quot;&gt;&lt;script&gt;"));
    }

    #[tokio::test]
    async fn extractor_reads_extension() {
        let (mut parts, _) = Request::new(()).into_parts();
        parts.extensions.insert(CsrfToken::new("tok".into()));

        let token = CsrfToken::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(token.token(), "tok");
    }

    #[tokio::test]
    async fn extractor_fails_without_middleware() {
        let (mut parts, _) = Request::new(()).into_parts();

        let err = CsrfToken::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn csrf_handler_returns_token_with_no_store() {
        let (status, headers, body) = csrf_handler(CsrfToken::new("tok".into())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get(CACHE_CONTROL).unwrap(),
            "no-store, no-cache, must-revalidate"
        );
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body.csrf_token, "tok");
        assert_eq!(
            serde_json::to_string(&body.0).unwrap(),
            r#"{"csrfToken":"tok"}"#
        );
    }
}
