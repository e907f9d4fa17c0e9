//! Test utilities for ghproxy-core.
//!
//! Shared configuration used by unit tests. Only compiled with `#[cfg(test)]`.

use crate::types::{ConnectionProvider, UpstreamConfig, UpstreamProvider};
use std::time::Duration;

/// Shared test configuration for unit tests.
///
/// Uses short timeouts so a misbehaving upstream fails the test quickly
/// instead of hanging it.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub upstream: UpstreamConfig,
    pub max_connections: usize,
    pub reload_interval: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig {
                connect_timeout: Duration::from_secs(5),
                response_header_timeout: Duration::from_secs(10),
                ..UpstreamConfig::default()
            },
            max_connections: 100,
            reload_interval: Duration::from_secs(600),
        }
    }
}

impl TestConfig {
    /// Create a new test configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the redirect hop ceiling.
    pub fn with_max_redirect_hops(mut self, hops: usize) -> Self {
        self.upstream.max_redirect_hops = hops;
        self
    }

    /// Configure the largest request body replayed on redirects.
    pub fn with_replay_buffer_limit(mut self, limit: usize) -> Self {
        self.upstream.replay_buffer_limit = limit;
        self
    }

    /// Configure the response header timeout.
    pub fn with_response_header_timeout(mut self, timeout: Duration) -> Self {
        self.upstream.response_header_timeout = timeout;
        self
    }
}

impl UpstreamProvider for TestConfig {
    fn upstream_config(&self) -> &UpstreamConfig {
        &self.upstream
    }
}

impl ConnectionProvider for TestConfig {
    fn max_connections(&self) -> usize {
        self.max_connections
    }

    fn reload_interval(&self) -> Duration {
        self.reload_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TestConfig::new();
        assert!(config.upstream.is_valid());
        assert_eq!(config.upstream.max_redirect_hops, 10);
        assert_eq!(config.max_connections(), 100);
    }

    #[test]
    fn test_builder_methods() {
        let config = TestConfig::new()
            .with_max_redirect_hops(2)
            .with_response_header_timeout(Duration::from_millis(200));

        assert_eq!(config.upstream_config().max_redirect_hops, 2);
        assert_eq!(
            config.upstream_config().response_header_timeout,
            Duration::from_millis(200)
        );
    }
}
