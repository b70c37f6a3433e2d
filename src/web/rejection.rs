//! HTTP rendering of CSRF rejections.
//!
//! Without a redirect target a rejection is a plain-text `403 Forbidden`.
//! With one, it is a `302 Found` to that target carrying the message in the
//! `flash_error` cookie, for the target page to display. The flash cookie
//! takes the `Secure` / `HttpOnly` flags of the session cookie.

use axum::{
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::csrf::CsrfConfig;
use crate::csrf::engine::Rejection;

/// Cookie carrying the rejection message in redirect mode.
pub const FLASH_COOKIE_NAME: &str = "flash_error";

impl Rejection {
    /// Renders the rejection, flagging the flash cookie like the session
    /// cookie described by `cfg`.
    pub fn into_response_with(self, cfg: &CsrfConfig) -> Response {
        self.render(cfg.cookie_secure, cfg.cookie_http_only)
    }

    fn render(self, secure: bool, http_only: bool) -> Response {
        match self.redirect {
            None => (StatusCode::FORBIDDEN, self.message).into_response(),
            Some(target) => {
                let flash = Cookie::build((FLASH_COOKIE_NAME, self.message))
                    .path("/")
                    .same_site(SameSite::Lax)
                    .secure(secure)
                    .http_only(http_only)
                    .build();
                (
                    StatusCode::FOUND,
                    CookieJar::new().add(flash),
                    [(LOCATION, target)],
                )
                    .into_response()
            }
        }
    }
}

/// Renders with `Secure` and `HttpOnly` flash cookies.
impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        self.render(true, true)
    }
}

/// Reads the flash message left by a redirecting rejection.
///
/// Returns the jar with the flash cookie removed, so the message is shown
/// only once.
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<String>) {
    let message = jar.get(FLASH_COOKIE_NAME).map(|c| c.value().to_string());
    if message.is_none() {
        return (jar, None);
    }
    let jar = jar.remove(Cookie::build(FLASH_COOKIE_NAME).path("/"));
    (jar, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csrf::engine::CsrfFailure;
    use axum::http::header::SET_COOKIE;
    use http_body_util::BodyExt;

    fn rejection(redirect: Option<&str>) -> Rejection {
        Rejection {
            failure: CsrfFailure::BadToken,
            message: "Tokens mismatch!".into(),
            redirect: redirect.map(String::from),
        }
    }

    #[tokio::test]
    async fn forbidden_when_no_redirect_target() {
        let res = rejection(None).into_response();

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert!(res.headers().get(SET_COOKIE).is_none());

        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Tokens mismatch!");
    }

    #[test]
    fn redirect_with_flash_when_target_configured() {
        let res = rejection(Some("/denied")).into_response();

        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/denied");

        let cookie = res
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("flash_error="), "got {cookie}");
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
    }

    fn flash_cookie(res: &Response) -> String {
        res.headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn flash_cookie_follows_session_cookie_flags() {
        let relaxed = CsrfConfig {
            cookie_secure: false,
            cookie_http_only: false,
            ..CsrfConfig::default()
        };
        let cookie = flash_cookie(&rejection(Some("/denied")).into_response_with(&relaxed));
        assert!(cookie.starts_with("flash_error="), "got {cookie}");
        assert!(!cookie.contains("Secure"), "got {cookie}");
        assert!(!cookie.contains("HttpOnly"), "got {cookie}");

        let strict = CsrfConfig::default();
        let cookie = flash_cookie(&rejection(Some("/denied")).into_response_with(&strict));
        assert!(cookie.contains("Secure"), "got {cookie}");
        assert!(cookie.contains("HttpOnly"), "got {cookie}");
    }

    #[test]
    fn take_flash_returns_message_once() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE_NAME, "Tokens mismatch!"));

        let (jar, message) = take_flash(jar);
        assert_eq!(message.as_deref(), Some("Tokens mismatch!"));
        assert!(jar.get(FLASH_COOKIE_NAME).is_none());

        let (_, message) = take_flash(jar);
        assert!(message.is_none());
    }
}
