//! # Session Token Store
//!
//! The engine only needs to read and write one named value in the host's
//! session. [`SessionStore`] is that contract; [`MemorySession`] and
//! [`CookieSession`] are the two bundled implementations.
//!
//! [`CookieSession`] signs its cookies. A token cookie planted by another
//! site (or a sibling subdomain) fails verification and reads as absent,
//! so the attacker cannot choose the value the submitted token is compared
//! against.

use std::collections::HashMap;

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};

/// Session key under which the token is stored.
pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// Minimal key/value view of a host session.
pub trait SessionStore {
    /// Returns the value bound to `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Creates or overwrites the value bound to `key`.
    fn set(&mut self, key: &str, value: String);
}

/// Reads the token bound to the session.
pub fn load_token<S: SessionStore + ?Sized>(session: &S) -> Option<String> {
    session.get(CSRF_SESSION_KEY)
}

/// Binds `token` to the session.
pub fn store_token<S: SessionStore + ?Sized>(session: &mut S, token: String) {
    session.set(CSRF_SESSION_KEY, token);
}

/// In-memory session, mostly useful for tests and non-HTTP hosts.
#[derive(Clone, Debug, Default)]
pub struct MemorySession {
    values: HashMap<String, String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

/// Session backed by an `axum_extra` [`SignedCookieJar`].
///
/// Values written through [`SessionStore::set`] become signed cookies with
/// path `/`, `SameSite=Lax`, and the configured `Secure` / `HttpOnly` flags.
/// Cookies whose signature does not verify are ignored by
/// [`SessionStore::get`].
#[derive(Clone)]
pub struct CookieSession {
    jar: SignedCookieJar,
    secure: bool,
    http_only: bool,
}

impl CookieSession {
    /// Wraps `jar`; new cookies get the given `Secure` / `HttpOnly` flags.
    pub fn new(jar: SignedCookieJar, secure: bool, http_only: bool) -> Self {
        Self {
            jar,
            secure,
            http_only,
        }
    }

    /// Returns the jar, including any cookies added during the request.
    pub fn into_jar(self) -> SignedCookieJar {
        self.jar
    }
}

impl SessionStore for CookieSession {
    fn get(&self, key: &str) -> Option<String> {
        self.jar.get(key).map(|c| c.value().to_string())
    }

    fn set(&mut self, key: &str, value: String) {
        let cookie = Cookie::build((key.to_string(), value))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .http_only(self.http_only)
            .build();
        self.jar = self.jar.clone().add(cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header::{COOKIE, SET_COOKIE}};
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::Key;

    fn key() -> Key {
        Key::from(&[7u8; 64][..])
    }

    fn jar_with_header(cookie: &str, key: Key) -> SignedCookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        SignedCookieJar::from_headers(&headers, key)
    }

    /// Returns the `name=value` pair the jar sends in `Set-Cookie`.
    fn set_cookie_pair(jar: SignedCookieJar) -> String {
        let res = jar.into_response();
        res.headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    #[test]
    fn memory_session_round_trips_token() {
        let mut session = MemorySession::new();
        assert_eq!(load_token(&session), None);

        store_token(&mut session, "abc".into());
        assert_eq!(load_token(&session).as_deref(), Some("abc"));

        store_token(&mut session, "def".into());
        assert_eq!(load_token(&session).as_deref(), Some("def"));
    }

    #[test]
    fn cookie_session_reads_existing_cookie() {
        let jar = SignedCookieJar::new(key()).add(Cookie::new(CSRF_SESSION_KEY, "preset"));
        let session = CookieSession::new(jar, true, true);

        assert_eq!(load_token(&session).as_deref(), Some("preset"));
    }

    #[test]
    fn cookie_session_ignores_unsigned_cookie() {
        let planted = format!("{CSRF_SESSION_KEY}={}", "A".repeat(44));
        let session = CookieSession::new(jar_with_header(&planted, key()), true, true);

        assert_eq!(load_token(&session), None);
    }

    #[test]
    fn cookie_session_round_trips_through_headers() {
        let mut session = CookieSession::new(SignedCookieJar::new(key()), true, true);
        store_token(&mut session, "fresh".into());
        let pair = set_cookie_pair(session.into_jar());
        assert_ne!(pair, format!("{CSRF_SESSION_KEY}=fresh"), "value must be signed");

        let session = CookieSession::new(jar_with_header(&pair, key()), true, true);
        assert_eq!(load_token(&session).as_deref(), Some("fresh"));

        let other = Key::from(&[9u8; 64][..]);
        let session = CookieSession::new(jar_with_header(&pair, other), true, true);
        assert_eq!(load_token(&session), None, "signature from another key must fail");
    }

    #[test]
    fn cookie_session_sets_attributes() {
        let mut session = CookieSession::new(SignedCookieJar::new(key()), true, true);
        store_token(&mut session, "fresh".into());

        let jar = session.into_jar();
        let c = jar.get(CSRF_SESSION_KEY).expect("cookie set");
        assert_eq!(c.value(), "fresh");
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.http_only(), Some(true));

        let mut session = CookieSession::new(SignedCookieJar::new(key()), false, false);
        store_token(&mut session, "fresh".into());
        let jar = session.into_jar();
        let c = jar.get(CSRF_SESSION_KEY).expect("cookie set (flags)");
        assert_eq!(c.secure(), Some(false));
        assert_eq!(c.http_only(), Some(false));
    }
}
