//! HTTP request handling and proxying.
//!
//! This module contains the proxy engine: it turns an inbound request into a
//! GitHub (or permitted arbitrary) target, applies the access policy, issues
//! the upstream request and relays the response.
//!
//! # Architecture
//!
//! The request handling flow:
//! 1. Normalize the request path into a target URL
//! 2. Classify the target and check it against the current policy snapshot
//! 3. Rewrite `/blob/` file views to `/raw/` downloads
//! 4. Forward the request upstream, once per redirect hop
//! 5. Refuse bodies whose declared length exceeds the size ceiling
//! 6. Strip security headers, then either hand a GitHub-shaped redirect back
//!    to the client, follow a foreign redirect internally, rewrite a
//!    `.gitmodules` file, or stream the body through untouched
//!
//! # Request Bodies
//!
//! A request body is only held in memory when its size is known and at most
//! `replay_buffer_limit`; such bodies are resent on every redirect hop.
//! Other bodies are streamed to the first hop as they arrive, so a large
//! upload never sits in proxy memory. See [`RequestBody`].
//!
//! # Connection Pooling
//!
//! The module accepts a shared [`reqwest::Client`] built by
//! [`build_http_client`]. Automatic redirects are disabled on that client:
//! every hop goes through the loop in [`forward`] so redirect targets are
//! classified the same way inbound targets are.
//!
//! # Cancellation
//!
//! Upstream requests, request body streams and response streams are owned
//! by the future serving the inbound request. When the client disconnects,
//! hyper drops that future and the upstream transfer is aborted with it.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, Limited, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode};
use reqwest::Url;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{DenyReason, GhProxyError, Result};
use crate::policy::{PolicySnapshot, PolicyStore};
use crate::rewriter::{self, ProxyOrigin};
use crate::types::{ConfigProvider, UpstreamConfig};
use crate::{access, classifier, headers};

/// Error type carried by proxied response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of every response ghproxy produces: streamed upstream bytes, a
/// buffered rewrite, or a plain-text error.
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// Builds the shared upstream client from the transport configuration.
///
/// # Example
///
/// ```
/// use ghproxy_core::UpstreamConfig;
/// use ghproxy_core::request_handler::build_http_client;
///
/// let client = build_http_client(&UpstreamConfig::default()).unwrap();
/// # drop(client);
/// ```
pub fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .tcp_keepalive(config.tcp_keepalive)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Handles an incoming HTTP request through the proxy pipeline.
///
/// This is the main entry point for request processing. It performs:
/// - Target normalization, classification and access control
/// - Blob-to-raw rewriting for approved GitHub file views
/// - Upstream forwarding with redirect resolution
///
/// # Arguments
///
/// * `req` - The incoming HTTP request
/// * `inbound_tls` - Whether the client connection was TLS
/// * `policy` - The shared policy store; one snapshot is used for the whole request
/// * `config` - Configuration provider for transport settings
/// * `http_client` - HTTP client for forwarding requests (with connection pooling)
///
/// # Returns
///
/// Always returns `Ok` with either:
/// - The upstream response (streamed, or rewritten for `.gitmodules`)
/// - An error response (403, 413, 500)
pub async fn handle_request<B, C>(
    req: Request<B>,
    inbound_tls: bool,
    policy: Arc<PolicyStore>,
    config: Arc<C>,
    http_client: reqwest::Client,
) -> std::result::Result<Response<ProxyBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
    C: ConfigProvider,
{
    let snapshot = policy.snapshot();
    let (parts, body) = req.into_parts();

    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let target = match resolve_target(path_and_query, &snapshot) {
        Ok(target) => target,
        Err(reason) => return Ok(error_response(&reason.into())),
    };

    let upstream = Upstream {
        client: &http_client,
        config: config.upstream_config(),
    };

    let body = match RequestBody::from_inbound(body, upstream.config.replay_buffer_limit).await {
        Ok(body) => body,
        Err(err) => {
            warn!(target = %target, error = %err, "Failed to read request body");
            return Ok(error_response(&err));
        }
    };

    let origin = ProxyOrigin::from_request(&parts, inbound_tls);

    match forward(&parts, body, &target, &snapshot, &upstream, origin.as_ref()).await {
        Ok(response) => Ok(response),
        Err(err) => {
            if err.is_server_error() {
                warn!(target = %target, error = %err, "Proxy request failed");
            } else {
                debug!(target = %target, error = %err, "Proxy request refused");
            }
            Ok(error_response(&err))
        }
    }
}

/// Turns the inbound path into the URL that will be fetched.
///
/// The target is classified and authorized as requested; the
/// `/blob/` → `/raw/` rewrite is applied only once the policy approved it.
///
/// ```
/// use ghproxy_core::policy::PolicySnapshot;
/// use ghproxy_core::request_handler::resolve_target;
///
/// let policy = PolicySnapshot::default();
/// assert_eq!(
///     resolve_target("/github.com/foo/bar/blob/main/a.txt", &policy).unwrap(),
///     "https://github.com/foo/bar/raw/main/a.txt"
/// );
/// ```
pub fn resolve_target(
    path_and_query: &str,
    policy: &PolicySnapshot,
) -> std::result::Result<String, DenyReason> {
    let target = classifier::normalize_target(path_and_query);
    let classification = classifier::classify(&target);
    access::authorize(classification.as_ref(), &target, policy)?;
    Ok(classifier::blob_to_raw(&target))
}

/// Outbound request body.
///
/// Small bodies of known size are read up front so every redirect hop can
/// resend them. Anything else is streamed to the first hop as it arrives and
/// cannot be sent a second time.
pub enum RequestBody {
    /// Fully read; resent on every hop. Empty for bodiless requests.
    Buffered(Bytes),
    /// Forwarded as it arrives; `None` once a hop has consumed it.
    Streaming {
        body: Option<reqwest::Body>,
        length: Option<u64>,
    },
}

impl RequestBody {
    /// Chooses between buffering and streaming from the body's size hint.
    ///
    /// Buffering goes through [`Limited`], so a body that sends more than it
    /// announced fails instead of growing past `replay_limit`.
    pub async fn from_inbound<B>(body: B, replay_limit: usize) -> Result<Self>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        if body.is_end_stream() {
            return Ok(Self::Buffered(Bytes::new()));
        }

        let hint = body.size_hint();
        match hint.upper() {
            Some(upper) if upper <= replay_limit as u64 => {
                let collected = Limited::new(body, replay_limit)
                    .collect()
                    .await
                    .map_err(|e| GhProxyError::BodyRead(e.to_string()))?;
                Ok(Self::Buffered(collected.to_bytes()))
            }
            _ => Ok(Self::Streaming {
                body: Some(reqwest::Body::wrap_stream(body.into_data_stream())),
                length: hint.exact(),
            }),
        }
    }

    /// Returns `true` when the body can be sent again on a redirect hop.
    pub fn is_replayable(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }
}

/// The shared client together with its transport settings.
pub struct Upstream<'a> {
    pub client: &'a reqwest::Client,
    pub config: &'a UpstreamConfig,
}

/// Forwards a request to `target`, following redirects as needed.
///
/// Each iteration of the loop is one hop. A `Location` that points at a
/// GitHub-shaped URL is rewritten to `/<location>` and handed back so the
/// client re-enters the proxy (and its access control) with it. Any other
/// location is fetched directly, up to `max_redirect_hops` times.
pub async fn forward(
    parts: &Parts,
    mut body: RequestBody,
    target: &str,
    policy: &PolicySnapshot,
    upstream: &Upstream<'_>,
    origin: Option<&ProxyOrigin>,
) -> Result<Response<ProxyBody>> {
    let mut url = Url::parse(target)
        .map_err(|e| GhProxyError::InvalidTarget(format!("{target}: {e}")))?;
    let mut outbound_headers = forward_headers(&parts.headers);
    let mut hops = 0;

    loop {
        let response =
            send_upstream(&parts.method, &outbound_headers, &mut body, &url, upstream).await?;

        check_declared_size(response.headers(), policy.size_limit)?;

        let status = response.status();
        let mut response_headers = filter_response_headers(response.headers());

        if let Some(location) = response_headers
            .get(headers::LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            let next = url
                .join(location)
                .map_err(|e| bad_redirect(location, &e))?;

            if classifier::classify(next.as_str()).is_some() {
                let through_proxy = HeaderValue::from_str(&format!("/{next}"))
                    .map_err(|e| bad_redirect(next.as_str(), &e))?;
                response_headers.insert(HeaderName::from_static(headers::LOCATION), through_proxy);
                debug!(from = %url, to = %next, "Handing GitHub redirect back to client");
                return Ok(build_response(status, response_headers, stream_body(response)));
            }

            if hops >= upstream.config.max_redirect_hops {
                return Err(GhProxyError::TooManyRedirects(hops));
            }
            hops += 1;

            if next.origin() != url.origin() {
                strip_credentials(&mut outbound_headers);
            }
            debug!(from = %url, to = %next, hop = hops, "Following redirect");
            url = next;
            continue;
        }

        if rewriter::is_gitmodules(&response_headers)
            && let Some(origin) = origin
        {
            let raw = response
                .bytes()
                .await
                .map_err(|e| GhProxyError::BodyRead(e.to_string()))?;
            let rewritten = rewriter::rewrite_gitmodules(&mut response_headers, &raw, origin);
            debug!(url = %url, bytes = rewritten.len(), "Rewrote .gitmodules");
            return Ok(build_response(status, response_headers, full_body(rewritten)));
        }

        return Ok(build_response(status, response_headers, stream_body(response)));
    }
}

fn bad_redirect(location: &str, err: &dyn std::fmt::Display) -> GhProxyError {
    GhProxyError::UpstreamFailure(format!("bad redirect {location}: {err}"))
}

/// Issues one upstream request, waiting at most the configured time for headers.
async fn send_upstream(
    method: &hyper::Method,
    outbound_headers: &HeaderMap,
    body: &mut RequestBody,
    url: &Url,
    upstream: &Upstream<'_>,
) -> Result<reqwest::Response> {
    let mut req_builder = upstream
        .client
        .request(method.clone(), url.clone())
        .headers(outbound_headers.clone());

    match body {
        RequestBody::Buffered(bytes) => {
            if !bytes.is_empty() {
                req_builder = req_builder.body(bytes.clone());
            }
        }
        RequestBody::Streaming { body: pending, length } => {
            let stream = pending.take().ok_or_else(|| {
                GhProxyError::UpstreamFailure(format!(
                    "streamed request body cannot be resent to {url}"
                ))
            })?;
            if let Some(length) = length {
                let declared = HeaderValue::from(*length);
                req_builder = req_builder.header(headers::CONTENT_LENGTH, declared);
            }
            req_builder = req_builder.body(stream);
        }
    }

    let timeout = upstream.config.response_header_timeout;
    match tokio::time::timeout(timeout, req_builder.send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) if err.is_connect() => Err(GhProxyError::UpstreamFailure(format!(
            "could not connect to {}: {err}",
            url.host_str().unwrap_or_default()
        ))),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(GhProxyError::UpstreamTimeout(format!(
            "no response headers from {url} within {}s",
            timeout.as_secs()
        ))),
    }
}

/// Copies inbound headers for the upstream request.
///
/// `Host` is dropped so the client derives it from the target URL, and
/// `Content-Length` is dropped because it is set again from the
/// [`RequestBody`]. Hop-by-hop headers describe the inbound connection only.
fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        let name_str = name.as_str();
        if name_str != headers::HOST
            && name_str != headers::CONTENT_LENGTH
            && !headers::is_hop_by_hop(name_str)
        {
            outbound.append(name.clone(), value.clone());
        }
    }
    outbound
}

/// Removes credentials before a redirect crosses to another origin.
fn strip_credentials(outbound: &mut HeaderMap) {
    outbound.remove(headers::AUTHORIZATION);
    outbound.remove(headers::COOKIE);
    outbound.remove(headers::PROXY_AUTHORIZATION);
}

/// Fails when the upstream declares a body larger than `size_limit`.
///
/// Only the declared `Content-Length` is consulted; chunked responses are
/// not measured.
fn check_declared_size(response_headers: &HeaderMap, size_limit: u64) -> Result<()> {
    let declared = response_headers
        .get(headers::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match declared {
        Some(size) if size > size_limit => Err(GhProxyError::PayloadTooLarge {
            size,
            max: size_limit,
        }),
        _ => Ok(()),
    }
}

/// Copies upstream response headers minus the stripped security headers and
/// hop-by-hop headers.
fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream.iter() {
        let name_str = name.as_str();
        if !headers::is_stripped_response_header(name_str) && !headers::is_hop_by_hop(name_str) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

fn build_response(
    status: StatusCode,
    response_headers: HeaderMap,
    body: ProxyBody,
) -> Response<ProxyBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

fn stream_body(response: reqwest::Response) -> ProxyBody {
    let frames = response
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(BoxError::from);
    StreamBody::new(frames).boxed_unsync()
}

fn full_body(bytes: Bytes) -> ProxyBody {
    Full::new(bytes)
        .map_err(|never| match never {})
        .boxed_unsync()
}

fn error_response(err: &GhProxyError) -> Response<ProxyBody> {
    create_error_response(err.status_code(), &err.user_message())
}

/// Creates a standardized error response.
///
/// Builds an HTTP response with the given status code and plain text message.
///
/// # Example
///
/// ```
/// use ghproxy_core::request_handler::create_error_response;
/// use hyper::StatusCode;
///
/// let response = create_error_response(StatusCode::FORBIDDEN, "Forbidden by white list.");
/// assert_eq!(response.status(), StatusCode::FORBIDDEN);
/// ```
pub fn create_error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        HeaderName::from_static(headers::CONTENT_TYPE),
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    build_response(
        status,
        response_headers,
        full_body(Bytes::from(message.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestConfig;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn body_text(response: Response<ProxyBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn open_policy() -> PolicySnapshot {
        PolicySnapshot {
            allow_proxy_all: true,
            ..PolicySnapshot::default()
        }
    }

    async fn proxy<B>(
        req: Request<B>,
        policy: PolicySnapshot,
        config: TestConfig,
    ) -> Response<ProxyBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let client = build_http_client(&config.upstream).unwrap();
        let store = Arc::new(PolicyStore::new(policy, "unused.json"));
        handle_request(req, false, store, Arc::new(config), client)
            .await
            .unwrap()
    }

    fn get(uri: String) -> Request<Full<Bytes>> {
        Request::get(uri)
            .header("host", "proxy.example")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    // ===========================================
    // resolve_target tests
    // ===========================================

    #[test]
    fn test_resolve_target_rewrites_blob_after_approval() {
        let policy = PolicySnapshot {
            white_list: vec!["foo/bar".into()],
            ..PolicySnapshot::default()
        };
        assert_eq!(
            resolve_target("/https://github.com/foo/bar/blob/main/a.txt", &policy),
            Ok("https://github.com/foo/bar/raw/main/a.txt".to_string())
        );
    }

    #[test]
    fn test_resolve_target_denied_blob_is_not_rewritten() {
        let policy = PolicySnapshot {
            black_list: vec!["foo/bar".into()],
            ..PolicySnapshot::default()
        };
        assert_eq!(
            resolve_target("/https://github.com/foo/bar/blob/main/a.txt", &policy),
            Err(DenyReason::ForbiddenBlacklist)
        );
    }

    #[test]
    fn test_resolve_target_arbitrary_disallowed() {
        assert_eq!(
            resolve_target("/example.com/x", &PolicySnapshot::default()),
            Err(DenyReason::InvalidInput)
        );
        assert_eq!(
            resolve_target("/example.com/x", &open_policy()),
            Ok("https://example.com/x".to_string())
        );
    }

    // ===========================================
    // header helpers
    // ===========================================

    #[test]
    fn test_forward_headers_drops_host_and_hop_by_hop() {
        let mut inbound = HeaderMap::new();
        inbound.insert("host", HeaderValue::from_static("proxy.example"));
        inbound.insert("content-length", HeaderValue::from_static("4"));
        inbound.insert("connection", HeaderValue::from_static("keep-alive"));
        inbound.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        inbound.insert("git-protocol", HeaderValue::from_static("version=2"));
        inbound.append("accept", HeaderValue::from_static("a/b"));
        inbound.append("accept", HeaderValue::from_static("c/d"));

        let outbound = forward_headers(&inbound);

        assert!(outbound.get("host").is_none());
        assert!(outbound.get("content-length").is_none());
        assert!(outbound.get("connection").is_none());
        assert!(outbound.get("transfer-encoding").is_none());
        assert_eq!(outbound.get("git-protocol").unwrap(), "version=2");
        assert_eq!(outbound.get_all("accept").iter().count(), 2);
    }

    #[test]
    fn test_filter_response_headers_strips_security_headers() {
        let mut upstream = HeaderMap::new();
        upstream.insert("content-security-policy", HeaderValue::from_static("default-src 'none'"));
        upstream.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
        upstream.insert("strict-transport-security", HeaderValue::from_static("max-age=1"));
        upstream.insert("etag", HeaderValue::from_static("\"abc\""));
        upstream.append("set-cookie", HeaderValue::from_static("a=1"));
        upstream.append("set-cookie", HeaderValue::from_static("b=2"));

        let filtered = filter_response_headers(&upstream);

        assert!(filtered.get("content-security-policy").is_none());
        assert!(filtered.get("referrer-policy").is_none());
        assert!(filtered.get("strict-transport-security").is_none());
        assert_eq!(filtered.get("etag").unwrap(), "\"abc\"");
        assert_eq!(filtered.get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_check_declared_size() {
        let mut headers = HeaderMap::new();
        assert!(check_declared_size(&headers, 10).is_ok());

        headers.insert("content-length", HeaderValue::from_static("10"));
        assert!(check_declared_size(&headers, 10).is_ok());

        headers.insert("content-length", HeaderValue::from_static("11"));
        assert!(matches!(
            check_declared_size(&headers, 10),
            Err(GhProxyError::PayloadTooLarge { size: 11, max: 10 })
        ));

        headers.insert("content-length", HeaderValue::from_static("not-a-number"));
        assert!(check_declared_size(&headers, 10).is_ok());
    }

    #[test]
    fn test_strip_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("token x"));
        headers.insert("cookie", HeaderValue::from_static("a=1"));
        headers.insert("accept", HeaderValue::from_static("*/*"));
        strip_credentials(&mut headers);
        assert!(headers.get("authorization").is_none());
        assert!(headers.get("cookie").is_none());
        assert!(headers.get("accept").is_some());
    }

    // ===========================================
    // RequestBody tests
    // ===========================================

    #[tokio::test]
    async fn test_request_body_buffers_small_sized_bodies() {
        let empty = RequestBody::from_inbound(Full::new(Bytes::new()), 8).await.unwrap();
        assert!(matches!(&empty, RequestBody::Buffered(bytes) if bytes.is_empty()));

        let small = RequestBody::from_inbound(Full::new(Bytes::from_static(b"12345678")), 8)
            .await
            .unwrap();
        assert!(small.is_replayable());
        assert!(matches!(&small, RequestBody::Buffered(bytes) if bytes.as_ref() == b"12345678"));
    }

    #[tokio::test]
    async fn test_request_body_streams_large_or_unsized_bodies() {
        let large = RequestBody::from_inbound(Full::new(Bytes::from_static(b"123456789")), 8)
            .await
            .unwrap();
        assert!(!large.is_replayable());
        assert!(matches!(large, RequestBody::Streaming { length: Some(9), .. }));

        let frames = futures_util::stream::iter(vec![Ok::<_, Infallible>(Frame::data(
            Bytes::from_static(b"x"),
        ))]);
        let unsized_body = RequestBody::from_inbound(StreamBody::new(frames), 8)
            .await
            .unwrap();
        assert!(matches!(unsized_body, RequestBody::Streaming { length: None, .. }));
    }

    // ===========================================
    // create_error_response tests
    // ===========================================

    #[tokio::test]
    async fn test_create_error_response() {
        let response = create_error_response(StatusCode::FORBIDDEN, "Forbidden by black list.");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "Forbidden by black list.");
    }

    // ===========================================
    // handle_request: policy
    // ===========================================

    #[tokio::test]
    async fn test_whitelist_miss_returns_403() {
        let policy = PolicySnapshot {
            white_list: vec!["foo/bar".into()],
            ..PolicySnapshot::default()
        };
        let response = proxy(
            get("/https://github.com/baz/qux/releases/download/v1/a.tgz".into()),
            policy,
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Forbidden by white list.");
    }

    #[tokio::test]
    async fn test_arbitrary_target_disallowed_returns_403() {
        let server = MockServer::start().await;
        let response = proxy(
            get(format!("/{}/file", server.uri())),
            PolicySnapshot::default(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, "Invalid input.");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    // ===========================================
    // handle_request: forwarding
    // ===========================================

    #[tokio::test]
    async fn test_streams_body_and_strips_security_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-security-policy", "default-src 'none'")
                    .insert_header("strict-transport-security", "max-age=31536000")
                    .insert_header("x-github-request-id", "ABC")
                    .set_body_string("hello"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/file", server.uri())),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-security-policy").is_none());
        assert!(response.headers().get("strict-transport-security").is_none());
        assert_eq!(response.headers().get("x-github-request-id").unwrap(), "ABC");
        assert_eq!(body_text(response).await, "hello");
    }

    #[tokio::test]
    async fn test_upstream_status_passes_through() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/missing", server.uri())),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Not Found");
    }

    #[tokio::test]
    async fn test_host_header_is_recomputed_and_others_forwarded() {
        let server = MockServer::start().await;
        let upstream_host = server.address().to_string();
        Mock::given(path("/file"))
            .and(header("host", upstream_host.as_str()))
            .and(header("git-protocol", "version=2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let req = Request::get(format!("/{}/file", server.uri()))
            .header("host", "proxy.example")
            .header("git-protocol", "version=2")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = proxy(req, open_policy(), TestConfig::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_method_and_body_are_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/git-upload-pack"))
            .and(body_string("0032want deadbeef"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ACK"))
            .expect(1)
            .mount(&server)
            .await;

        let req = Request::post(format!("/{}/git-upload-pack", server.uri()))
            .header("host", "proxy.example")
            .body(Full::new(Bytes::from_static(b"0032want deadbeef")))
            .unwrap();
        let response = proxy(req, open_policy(), TestConfig::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "ACK");
    }

    #[tokio::test]
    async fn test_large_body_is_streamed_with_its_length() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/git-receive-pack"))
            .and(header("content-length", "17"))
            .and(body_string("0032want deadbeef"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let req = Request::post(format!("/{}/git-receive-pack", server.uri()))
            .header("host", "proxy.example")
            .header("content-length", "17")
            .body(Full::new(Bytes::from_static(b"0032want deadbeef")))
            .unwrap();
        let config = TestConfig::new().with_replay_buffer_limit(4);
        let response = proxy(req, open_policy(), config).await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upstream_receives_body_before_inbound_body_ends() {
        use tokio::io::AsyncReadExt;
        use tokio::time::{Duration, timeout};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(4);
        let frames = futures_util::stream::unfold(rx, |mut rx| async move {
            let chunk = rx.recv().await?;
            Some((Ok::<_, Infallible>(Frame::data(chunk)), rx))
        });
        let req = Request::post(format!("/http://{addr}/upload"))
            .header("host", "proxy.example")
            .body(StreamBody::new(frames))
            .unwrap();
        let pending = tokio::spawn(proxy(req, open_policy(), TestConfig::new()));

        tx.send(Bytes::from(vec![b'a'; 1024])).await.unwrap();

        let (mut socket, _) = timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("proxy did not connect upstream")
            .unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = timeout(Duration::from_secs(5), socket.read(&mut buf))
                .await
                .expect("upstream saw no body while the inbound body was open")
                .unwrap();
            assert!(n > 0, "proxy closed the upstream connection");
            received.extend_from_slice(&buf[..n]);

            let head_end = received.windows(4).position(|w| w == b"\r\n\r\n");
            if let Some(end) = head_end {
                let body_bytes = received[end + 4..].iter().filter(|b| **b == b'a').count();
                if body_bytes >= 1024 {
                    break;
                }
            }
        }

        let request = String::from_utf8_lossy(&received).to_ascii_lowercase();
        assert!(request.starts_with("post /upload http/1.1\r\n"));
        assert!(request.contains("transfer-encoding: chunked"));
        assert!(!pending.is_finished());

        pending.abort();
        drop(tx);
    }

    #[tokio::test]
    async fn test_streamed_body_is_not_resent_on_redirect() {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(307).insert_header("location", "/final"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/final"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let frames = futures_util::stream::iter(vec![Ok::<_, Infallible>(Frame::data(
            Bytes::from_static(b"payload"),
        ))]);
        let req = Request::post(format!("/{}/start", server.uri()))
            .header("host", "proxy.example")
            .body(StreamBody::new(frames))
            .unwrap();
        let response = proxy(req, open_policy(), TestConfig::new()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("cannot be resent"));
    }

    #[tokio::test]
    async fn test_buffered_body_is_resent_on_redirect() {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(307).insert_header("location", "/final"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/final"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
            .expect(1)
            .mount(&server)
            .await;

        let req = Request::post(format!("/{}/start", server.uri()))
            .header("host", "proxy.example")
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap();
        let response = proxy(req, open_policy(), TestConfig::new()).await;

        assert_eq!(body_text(response).await, "stored");
    }

    #[tokio::test]
    async fn test_declared_size_over_ceiling_returns_413() {
        let server = MockServer::start().await;
        Mock::given(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100)))
            .mount(&server)
            .await;

        let policy = PolicySnapshot {
            size_limit: 10,
            ..open_policy()
        };
        let response = proxy(
            get(format!("/{}/big", server.uri())),
            policy,
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_text(response).await, "File too large.");
    }

    #[tokio::test]
    async fn test_connection_failure_returns_500() {
        // Bind then drop to get a port with nothing listening
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let response = proxy(
            get(format!("/http://127.0.0.1:{port}/file")),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.starts_with("server error"));
    }

    #[tokio::test]
    async fn test_slow_response_headers_time_out() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
            .mount(&server)
            .await;

        let config =
            TestConfig::new().with_response_header_timeout(std::time::Duration::from_millis(200));
        let response = proxy(get(format!("/{}/slow", server.uri())), open_policy(), config).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("timeout"));
    }

    // ===========================================
    // handle_request: redirects
    // ===========================================

    #[tokio::test]
    async fn test_foreign_redirect_is_followed_internally() {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/final", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(path("/final"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .expect(1)
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/start", server.uri())),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("location").is_none());
        assert_eq!(body_text(response).await, "done");
    }

    #[tokio::test]
    async fn test_relative_redirect_is_resolved() {
        let server = MockServer::start().await;
        Mock::given(path("/dir/start"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "../final"))
            .mount(&server)
            .await;
        Mock::given(path("/final"))
            .respond_with(ResponseTemplate::new(200).set_body_string("resolved"))
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/dir/start", server.uri())),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(body_text(response).await, "resolved");
    }

    #[tokio::test]
    async fn test_github_redirect_is_returned_to_client() {
        let server = MockServer::start().await;
        let location = "https://github.com/foo/bar/releases/download/v1/a.tgz";
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", location))
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/start", server.uri())),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get("location").unwrap(),
            &format!("/{location}")
        );
    }

    #[tokio::test]
    async fn test_redirect_loop_hits_hop_ceiling() {
        let server = MockServer::start().await;
        Mock::given(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/loop", server.uri())),
            open_policy(),
            TestConfig::new().with_max_redirect_hops(3),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Too many redirects.");
        // The first request plus three followed hops
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_cross_origin_redirect_drops_credentials() {
        let first = MockServer::start().await;
        let second = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/asset", second.uri())),
            )
            .mount(&first)
            .await;
        Mock::given(path("/asset"))
            .respond_with(ResponseTemplate::new(200).set_body_string("asset"))
            .mount(&second)
            .await;

        let req = Request::get(format!("/{}/start", first.uri()))
            .header("host", "proxy.example")
            .header("authorization", "token secret")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = proxy(req, open_policy(), TestConfig::new()).await;
        assert_eq!(body_text(response).await, "asset");

        let first_requests = first.received_requests().await.unwrap();
        assert!(first_requests[0].headers.get("authorization").is_some());
        let second_requests = second.received_requests().await.unwrap();
        assert!(second_requests[0].headers.get("authorization").is_none());
    }

    // ===========================================
    // handle_request: .gitmodules
    // ===========================================

    #[tokio::test]
    async fn test_gitmodules_is_rewritten_with_exact_length() {
        let server = MockServer::start().await;
        Mock::given(path("/.gitmodules"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\".gitmodules\"")
                    .insert_header("content-security-policy", "default-src 'none'")
                    .set_body_string("[submodule \"b\"]\n\turl = https://github.com/a/b.git\n"),
            )
            .mount(&server)
            .await;

        let req = Request::get(format!("/{}/.gitmodules", server.uri()))
            .header("host", "proxy.example")
            .header("x-forwarded-proto", "https")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = proxy(req, open_policy(), TestConfig::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-security-policy").is_none());
        let declared: usize = response
            .headers()
            .get("content-length")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();

        let body = body_text(response).await;
        assert_eq!(
            body,
            "[submodule \"b\"]\n\turl = https://proxy.example/https://github.com/a/b.git\n"
        );
        assert_eq!(declared, body.len());
    }

    #[tokio::test]
    async fn test_other_files_are_not_rewritten() {
        let server = MockServer::start().await;
        Mock::given(path("/notes.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"notes.txt\"")
                    .set_body_string("url = https://github.com/a/b.git"),
            )
            .mount(&server)
            .await;

        let response = proxy(
            get(format!("/{}/notes.txt", server.uri())),
            open_policy(),
            TestConfig::new(),
        )
        .await;

        assert_eq!(body_text(response).await, "url = https://github.com/a/b.git");
    }
}
