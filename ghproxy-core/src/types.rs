//! Type definitions for ghproxy configuration.
//!
//! This module contains the static (process-lifetime) configuration types
//! and the provider traits through which they are injected. The reloadable
//! access policy lives in [`crate::policy`].

use std::time::Duration;

use crate::defaults;

// ============================================================================
// Composable Configuration Traits (Interface Segregation Principle)
// ============================================================================

/// Configuration for the upstream HTTP client.
///
/// Implement this trait to customize how ghproxy talks to GitHub.
pub trait UpstreamProvider: Send + Sync {
    /// Returns the upstream transport configuration.
    fn upstream_config(&self) -> &UpstreamConfig;
}

/// Configuration for inbound connection limits.
pub trait ConnectionProvider: Send + Sync {
    /// Returns the maximum number of concurrent connections (0 = unlimited).
    fn max_connections(&self) -> usize;

    /// Returns how often the policy file is re-read.
    fn reload_interval(&self) -> Duration;
}

// ============================================================================
// ConfigProvider - Aggregated trait for full configuration
// ============================================================================

/// Trait for complete configuration injection.
///
/// This trait combines all specialized configuration traits into one.
/// Implement [`UpstreamProvider`] and [`ConnectionProvider`] to provide
/// configuration from any source: environment variables, files, tests.
///
/// # Example
///
/// ```
/// use ghproxy_core::{ConnectionProvider, UpstreamConfig, UpstreamProvider};
/// use std::time::Duration;
///
/// struct MyConfig {
///     upstream: UpstreamConfig,
/// }
///
/// impl UpstreamProvider for MyConfig {
///     fn upstream_config(&self) -> &UpstreamConfig { &self.upstream }
/// }
///
/// impl ConnectionProvider for MyConfig {
///     fn max_connections(&self) -> usize { 10_000 }
///     fn reload_interval(&self) -> Duration { Duration::from_secs(600) }
/// }
///
/// fn assert_provider<C: ghproxy_core::ConfigProvider>(_: &C) {}
/// assert_provider(&MyConfig { upstream: UpstreamConfig::default() });
/// ```
pub trait ConfigProvider: UpstreamProvider + ConnectionProvider {}

// Blanket implementation: any type implementing all sub-traits is a ConfigProvider
impl<T> ConfigProvider for T where T: UpstreamProvider + ConnectionProvider {}

/// Transport settings for the shared upstream client.
///
/// Tuned for large, slow GitHub downloads: long-lived idle connections and a
/// generous wait for response headers, with bounded connection setup.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ghproxy_core::UpstreamConfig;
///
/// let config = UpstreamConfig {
///     max_redirect_hops: 5,
///     ..UpstreamConfig::default()
/// };
///
/// assert!(config.is_valid());
/// assert_eq!(config.connect_timeout, Duration::from_secs(30));
/// ```
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// Bound on TCP connect plus TLS handshake
    pub connect_timeout: Duration,
    /// Bound on the wait between sending a request and receiving headers
    pub response_header_timeout: Duration,
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,
    /// Maximum idle pooled connections per upstream host
    pub pool_max_idle_per_host: usize,
    /// TCP keep-alive interval for upstream sockets
    pub tcp_keepalive: Duration,
    /// Maximum number of redirects followed inside one request
    pub max_redirect_hops: usize,
    /// Request bodies up to this size are buffered and replayed on redirects
    pub replay_buffer_limit: usize,
}

impl UpstreamConfig {
    /// Returns `true` if the configuration is valid.
    ///
    /// Connection setup and header wait must be bounded.
    pub fn is_valid(&self) -> bool {
        !self.connect_timeout.is_zero() && !self.response_header_timeout.is_zero()
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS),
            response_header_timeout: Duration::from_secs(defaults::RESPONSE_HEADER_TIMEOUT_SECS),
            pool_idle_timeout: Duration::from_secs(defaults::POOL_IDLE_TIMEOUT_SECS),
            pool_max_idle_per_host: defaults::POOL_MAX_IDLE_PER_HOST,
            tcp_keepalive: Duration::from_secs(defaults::TCP_KEEPALIVE_SECS),
            max_redirect_hops: defaults::MAX_REDIRECT_HOPS,
            replay_buffer_limit: defaults::REPLAY_BUFFER_LIMIT,
        }
    }
}
