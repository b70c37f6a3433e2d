use url::Url;

/// Returns `true` if both URLs share scheme, host, and port.
///
/// Path, query, and fragment are ignored. Default ports are normalized by
/// [`Url`], so `https://a.example:443` and `https://a.example` are the same
/// origin.
///
/// # Example
/// ```rust
/// use url::Url;
/// use wzs_csrf::csrf::origin::same_origin;
///
/// let a = Url::parse("https://example.com/form").unwrap();
/// let b = Url::parse("https://example.com/submit?x=1").unwrap();
/// assert!(same_origin(&a, &b));
/// ```
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port() == b.port()
}
