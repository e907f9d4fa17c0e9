//! Error types for ghproxy.
//!
//! This module provides a unified error type for all ghproxy operations,
//! enabling better error handling and propagation throughout the codebase.

use thiserror::Error;

/// Result type alias for ghproxy operations.
pub type Result<T> = std::result::Result<T, GhProxyError>;

/// Why the access-control engine refused a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The target is not GitHub-shaped and arbitrary proxying is disabled.
    InvalidInput,
    /// The whitelist is configured and no entry matched.
    ForbiddenWhitelist,
    /// A blacklist entry matched.
    ForbiddenBlacklist,
}

impl DenyReason {
    /// The plain-text body returned to the client.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Invalid input.",
            Self::ForbiddenWhitelist => "Forbidden by white list.",
            Self::ForbiddenBlacklist => "Forbidden by black list.",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::InvalidInput => "invalid-input",
            Self::ForbiddenWhitelist => "forbidden-whitelist",
            Self::ForbiddenBlacklist => "forbidden-blacklist",
        };
        f.write_str(tag)
    }
}

/// Unified error type for ghproxy operations.
///
/// This enum covers all error cases that can occur during request processing,
/// configuration loading, and proxying operations.
///
/// # Example
///
/// ```
/// use ghproxy_core::error::{DenyReason, GhProxyError};
/// use hyper::StatusCode;
///
/// let err = GhProxyError::PolicyDenied(DenyReason::ForbiddenBlacklist);
/// assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
/// assert_eq!(err.user_message(), "Forbidden by black list.");
/// ```
#[derive(Debug, Error)]
pub enum GhProxyError {
    /// Target refused by the access policy.
    #[error("Policy denied: {0}")]
    PolicyDenied(DenyReason),

    /// Upstream declared a body larger than the configured ceiling.
    #[error("Response too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        /// Declared Content-Length in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        max: u64,
    },

    /// Target could not be turned into an outbound request.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Upstream exchange failed.
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    /// Upstream did not send response headers in time.
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Redirect chain exceeded the configured hop ceiling.
    #[error("Too many redirects: gave up after {0} hops")]
    TooManyRedirects(usize),

    /// Failed to read request or response body.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// Policy file missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigLoad(String),

    /// HTTP client error (from reqwest).
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl GhProxyError {
    /// Returns the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> hyper::StatusCode {
        use hyper::StatusCode;

        match self {
            Self::PolicyDenied(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidTarget(_)
            | Self::UpstreamFailure(_)
            | Self::UpstreamTimeout(_)
            | Self::TooManyRedirects(_)
            | Self::BodyRead(_)
            | Self::ConfigLoad(_)
            | Self::HttpClient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message sent to the client.
    ///
    /// Local and transport failures carry their diagnostic, mirroring the
    /// `server error <detail>` body git clients print on failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::PolicyDenied(reason) => reason.message().to_string(),
            Self::PayloadTooLarge { .. } => "File too large.".to_string(),
            Self::TooManyRedirects(_) => "Too many redirects.".to_string(),
            Self::ConfigLoad(_) => "Internal server error".to_string(),
            other => format!("server error {other}"),
        }
    }

    /// Returns true if this error should be logged at error level.
    ///
    /// Policy denials and size refusals are expected and only
    /// logged at debug level.
    pub fn is_server_error(&self) -> bool {
        !matches!(self, Self::PolicyDenied(_) | Self::PayloadTooLarge { .. })
    }
}

impl From<DenyReason> for GhProxyError {
    fn from(reason: DenyReason) -> Self {
        Self::PolicyDenied(reason)
    }
}
