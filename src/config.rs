//! Configuration management for ghproxy.
//!
//! Process-lifetime settings (upstream transport, connection limits, reload
//! period) come from environment variables, are computed once at first
//! access and cached for the lifetime of the application using
//! `once_cell::sync::Lazy`. The access policy is not configured here: it
//! lives in the JSON policy file and is reloaded by
//! [`ghproxy_core::PolicyStore`].
//!
//! # Example
//!
//! ```
//! use ghproxy::config;
//!
//! let upstream = config::get_upstream_config();
//! println!("Connect timeout: {:?}", upstream.connect_timeout);
//! println!("Reload every {:?}", config::get_reload_interval());
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::warn;

use crate::env_vars;
use ghproxy_core::{ConnectionProvider, UpstreamConfig, UpstreamProvider, defaults};

// ============================================================================
// Cached Configuration (computed once at first access)
// ============================================================================

static UPSTREAM_CONFIG: Lazy<UpstreamConfig> =
    Lazy::new(|| compute_upstream_config(|key| env::var(key)));
static MAX_CONNECTIONS: Lazy<usize> = Lazy::new(|| {
    parse_env_var_or_default(
        |key| env::var(key),
        env_vars::MAX_CONNECTIONS,
        defaults::MAX_CONNECTIONS,
    )
});
static RELOAD_INTERVAL: Lazy<Duration> = Lazy::new(|| compute_reload_interval(|key| env::var(key)));

// ============================================================================
// Internal Helpers
// ============================================================================

/// Parses an environment variable with fallback to a default value.
///
/// Logs a warning if the value exists but cannot be parsed.
fn parse_env_var_or_default<F, T>(env_var: F, var_name: &str, default: T) -> T
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr + Copy,
{
    match env_var(var_name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = var_name, value = %value, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn secs<F>(env_var: &F, var_name: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    Duration::from_secs(parse_env_var_or_default(env_var, var_name, default))
}

// ============================================================================
// Public Configuration Getters
// ============================================================================

/// Returns the cached upstream transport configuration.
///
/// Configuration is read from environment variables on first access:
/// - `PROXY_CONNECT_TIMEOUT_SECS`: TCP connect plus TLS handshake (default: 30)
/// - `PROXY_RESPONSE_HEADER_TIMEOUT_SECS`: Wait for response headers (default: 300)
/// - `PROXY_POOL_IDLE_TIMEOUT_SECS`: Idle pooled connection lifetime (default: 90)
/// - `PROXY_POOL_MAX_IDLE_PER_HOST`: Idle pooled connections per host (default: 1000)
/// - `PROXY_TCP_KEEPALIVE_SECS`: TCP keep-alive interval (default: 30)
/// - `MAX_REDIRECT_HOPS`: Redirects followed per request (default: 10)
/// - `PROXY_REPLAY_BUFFER_BYTES`: Largest request body replayed on redirects (default: 1 MiB)
pub fn get_upstream_config() -> &'static UpstreamConfig {
    &UPSTREAM_CONFIG
}

/// Computes the upstream configuration; invalid values fall back to defaults.
fn compute_upstream_config<F>(env_var: F) -> UpstreamConfig
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    let config = UpstreamConfig {
        connect_timeout: secs(
            &env_var,
            env_vars::PROXY_CONNECT_TIMEOUT_SECS,
            defaults::CONNECT_TIMEOUT_SECS,
        ),
        response_header_timeout: secs(
            &env_var,
            env_vars::PROXY_RESPONSE_HEADER_TIMEOUT_SECS,
            defaults::RESPONSE_HEADER_TIMEOUT_SECS,
        ),
        pool_idle_timeout: secs(
            &env_var,
            env_vars::PROXY_POOL_IDLE_TIMEOUT_SECS,
            defaults::POOL_IDLE_TIMEOUT_SECS,
        ),
        pool_max_idle_per_host: parse_env_var_or_default(
            &env_var,
            env_vars::PROXY_POOL_MAX_IDLE_PER_HOST,
            defaults::POOL_MAX_IDLE_PER_HOST,
        ),
        tcp_keepalive: secs(
            &env_var,
            env_vars::PROXY_TCP_KEEPALIVE_SECS,
            defaults::TCP_KEEPALIVE_SECS,
        ),
        max_redirect_hops: parse_env_var_or_default(
            &env_var,
            env_vars::MAX_REDIRECT_HOPS,
            defaults::MAX_REDIRECT_HOPS,
        ),
        replay_buffer_limit: parse_env_var_or_default(
            &env_var,
            env_vars::PROXY_REPLAY_BUFFER_BYTES,
            defaults::REPLAY_BUFFER_LIMIT,
        ),
    };

    if !config.is_valid() {
        warn!("Invalid upstream configuration, using defaults");
        return UpstreamConfig::default();
    }

    config
}

/// Returns the cached maximum number of concurrent connections.
///
/// Read from `MAX_CONNECTIONS` on first access.
///
/// # Returns
///
/// - `0`: Unlimited connections
/// - `> 0`: Maximum number of concurrent connections
///
/// **Default**: `10000`
pub fn get_max_connections() -> usize {
    *MAX_CONNECTIONS
}

/// Returns the cached policy reload period.
///
/// Read from `CONFIG_RELOAD_INTERVAL_SECS` on first access (default: 600).
/// Zero disables periodic reloading.
pub fn get_reload_interval() -> Duration {
    *RELOAD_INTERVAL
}

fn compute_reload_interval<F>(env_var: F) -> Duration
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    secs(
        &env_var,
        env_vars::CONFIG_RELOAD_INTERVAL_SECS,
        defaults::RELOAD_INTERVAL_SECS,
    )
}

// ============================================================================
// EnvVarConfig - provider implementation using environment variables
// ============================================================================

/// Configuration provider that reads from environment variables.
///
/// This is the default configuration provider for the ghproxy CLI.
/// All values come from the global lazy statics.
///
/// # Example
///
/// ```
/// use ghproxy::config::EnvVarConfig;
/// use ghproxy_core::UpstreamProvider;
///
/// let config = EnvVarConfig::new();
/// println!("Max hops: {}", config.upstream_config().max_redirect_hops);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EnvVarConfig {
    _private: (),
}

impl EnvVarConfig {
    /// Creates a new configuration provider from environment variables.
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl UpstreamProvider for EnvVarConfig {
    fn upstream_config(&self) -> &UpstreamConfig {
        get_upstream_config()
    }
}

impl ConnectionProvider for EnvVarConfig {
    fn max_connections(&self) -> usize {
        get_max_connections()
    }

    fn reload_interval(&self) -> Duration {
        get_reload_interval()
    }
}
