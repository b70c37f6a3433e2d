/// Methods that never require a token.
///
/// See <https://en.wikipedia.org/wiki/Hypertext_Transfer_Protocol#Safe_methods>.
/// WebSocket handshakes are `GET` requests and are covered by this list.
pub const SAFE_METHODS: [&str; 4] = ["GET", "HEAD", "OPTIONS", "TRACE"];

/// Returns `true` for `GET`, `HEAD`, `OPTIONS`, and `TRACE`.
///
/// The comparison is exact: method tokens are case-sensitive.
pub fn is_safe_method(method: &str) -> bool {
    SAFE_METHODS.contains(&method)
}
