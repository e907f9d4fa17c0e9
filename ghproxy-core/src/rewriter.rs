//! `.gitmodules` rewriting.
//!
//! When GitHub serves a `.gitmodules` file (detected from the
//! `Content-Disposition` filename), every `url = https://github.com/owner/repo`
//! entry is prefixed with the proxy's own origin so that
//! `git submodule update` fetches the submodules through the proxy too.
//! These files are small, so the body is buffered and `Content-Length` is
//! recomputed.

use bytes::Bytes;
use hyper::HeaderMap;
use hyper::header::{HeaderName, HeaderValue};
use hyper::http::request::Parts;
use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};

use crate::headers;

/// Filename token that marks a `.gitmodules` download. Matched literally.
const GITMODULES_TOKEN: &str = "\".gitmodules\"";

static SUBMODULE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([ \t]*url[ \t]*=[ \t]*)(https?://(?:www\.)?github\.com/[^/\s]+/[^/\s]+)")
        .expect("valid submodule url pattern")
});

/// Scheme and authority clients use to reach this proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOrigin {
    pub scheme: &'static str,
    pub host: String,
}

impl ProxyOrigin {
    /// Derives the origin from the inbound request.
    ///
    /// The scheme is `https` when the inbound connection was TLS or a
    /// TLS-terminating front proxy says so through `X-Forwarded-Proto`.
    /// The host comes from the `Host` header, falling back to the request
    /// URI authority. Returns `None` when neither is present.
    pub fn from_request(parts: &Parts, inbound_tls: bool) -> Option<Self> {
        let forwarded_https = parts
            .headers
            .get(headers::X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        let scheme = if inbound_tls || forwarded_https {
            "https"
        } else {
            "http"
        };

        let host = parts
            .headers
            .get(headers::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .filter(|host| !host.is_empty())?;

        Some(Self { scheme, host })
    }
}

/// Returns `true` when the upstream response is a `.gitmodules` file.
pub fn is_gitmodules(headers: &HeaderMap) -> bool {
    headers
        .get(headers::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|disposition| disposition.contains(GITMODULES_TOKEN))
}

/// Prefixes every GitHub submodule URL in `body` with `origin`.
///
/// ```
/// use ghproxy_core::rewriter::{rewrite_submodule_urls, ProxyOrigin};
///
/// let origin = ProxyOrigin { scheme: "https", host: "proxy.example".into() };
/// let body = b"[submodule \"b\"]\n\turl = https://github.com/a/b.git\n";
/// let out = rewrite_submodule_urls(body, &origin);
/// assert_eq!(
///     out,
///     b"[submodule \"b\"]\n\turl = https://proxy.example/https://github.com/a/b.git\n".to_vec()
/// );
/// ```
pub fn rewrite_submodule_urls(body: &[u8], origin: &ProxyOrigin) -> Vec<u8> {
    let prefix = format!("{}://{}/", origin.scheme, origin.host);
    SUBMODULE_URL
        .replace_all(body, |caps: &Captures<'_>| {
            let mut out = caps[1].to_vec();
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(&caps[2]);
            out
        })
        .into_owned()
}

/// Rewrites a buffered `.gitmodules` body and fixes `Content-Length`.
pub fn rewrite_gitmodules(
    response_headers: &mut HeaderMap,
    body: &[u8],
    origin: &ProxyOrigin,
) -> Bytes {
    let rewritten = Bytes::from(rewrite_submodule_urls(body, origin));
    response_headers.insert(
        HeaderName::from_static(headers::CONTENT_LENGTH),
        HeaderValue::from(rewritten.len()),
    );
    rewritten
}
