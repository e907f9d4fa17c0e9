//! HTTP header constants for ghproxy.
//!
//! Names are lowercase, as `http::HeaderName` stores them, so they can be
//! compared directly against `HeaderName::as_str`.

/// Host header.
pub const HOST: &str = "host";

/// Content-Type header.
pub const CONTENT_TYPE: &str = "content-type";

/// Content-Length header.
pub const CONTENT_LENGTH: &str = "content-length";

/// Content-Disposition header, inspected to detect `.gitmodules` downloads.
pub const CONTENT_DISPOSITION: &str = "content-disposition";

/// Location header (redirects).
pub const LOCATION: &str = "location";

/// Authorization header, dropped when a followed redirect changes origin.
pub const AUTHORIZATION: &str = "authorization";

/// Cookie header, dropped when a followed redirect changes origin.
pub const COOKIE: &str = "cookie";

/// X-Forwarded-Proto header, set by a TLS-terminating front proxy.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Content-Security-Policy header (stripped from upstream responses).
pub const CONTENT_SECURITY_POLICY: &str = "content-security-policy";

/// Referrer-Policy header (stripped from upstream responses).
pub const REFERRER_POLICY: &str = "referrer-policy";

/// Strict-Transport-Security header (stripped from upstream responses).
pub const STRICT_TRANSPORT_SECURITY: &str = "strict-transport-security";

/// Connection header (hop-by-hop).
pub const CONNECTION: &str = "connection";

/// Keep-Alive header (hop-by-hop).
pub const KEEP_ALIVE: &str = "keep-alive";

/// Proxy-Authenticate header (hop-by-hop).
pub const PROXY_AUTHENTICATE: &str = "proxy-authenticate";

/// Proxy-Authorization header (hop-by-hop).
pub const PROXY_AUTHORIZATION: &str = "proxy-authorization";

/// TE header (hop-by-hop).
pub const TE: &str = "te";

/// Trailers header (hop-by-hop).
pub const TRAILERS: &str = "trailers";

/// Transfer-Encoding header (hop-by-hop).
pub const TRANSFER_ENCODING: &str = "transfer-encoding";

/// Upgrade header (hop-by-hop).
pub const UPGRADE: &str = "upgrade";

/// Upstream response headers that would stop browsers or git clients from
/// using proxied content.
pub const STRIPPED_RESPONSE_HEADERS: &[&str] = &[
    CONTENT_SECURITY_POLICY,
    REFERRER_POLICY,
    STRICT_TRANSPORT_SECURITY,
];

/// List of all hop-by-hop headers that should not be forwarded.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    CONNECTION,
    KEEP_ALIVE,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILERS,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Check if a header is a hop-by-hop header that shouldn't be forwarded.
///
/// # Arguments
///
/// * `header_name` - The header name to check (lowercase).
///
/// # Example
///
/// ```
/// use ghproxy_core::headers::is_hop_by_hop;
///
/// assert!(is_hop_by_hop("connection"));
/// assert!(is_hop_by_hop("transfer-encoding"));
/// assert!(!is_hop_by_hop("content-type"));
/// ```
pub fn is_hop_by_hop(header_name: &str) -> bool {
    HOP_BY_HOP_HEADERS.contains(&header_name)
}

/// Check if an upstream response header is removed before reaching the client.
///
/// ```
/// use ghproxy_core::headers::is_stripped_response_header;
///
/// assert!(is_stripped_response_header("strict-transport-security"));
/// assert!(!is_stripped_response_header("etag"));
/// ```
pub fn is_stripped_response_header(header_name: &str) -> bool {
    STRIPPED_RESPONSE_HEADERS.contains(&header_name)
}
