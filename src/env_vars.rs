//! Environment variable names used throughout ghproxy configuration

/// Upstream transport configuration
pub const PROXY_CONNECT_TIMEOUT_SECS: &str = "PROXY_CONNECT_TIMEOUT_SECS";
pub const PROXY_RESPONSE_HEADER_TIMEOUT_SECS: &str = "PROXY_RESPONSE_HEADER_TIMEOUT_SECS";
pub const PROXY_POOL_IDLE_TIMEOUT_SECS: &str = "PROXY_POOL_IDLE_TIMEOUT_SECS";
pub const PROXY_POOL_MAX_IDLE_PER_HOST: &str = "PROXY_POOL_MAX_IDLE_PER_HOST";
pub const PROXY_TCP_KEEPALIVE_SECS: &str = "PROXY_TCP_KEEPALIVE_SECS";
pub const MAX_REDIRECT_HOPS: &str = "MAX_REDIRECT_HOPS";
pub const PROXY_REPLAY_BUFFER_BYTES: &str = "PROXY_REPLAY_BUFFER_BYTES";

/// Connection limits
pub const MAX_CONNECTIONS: &str = "MAX_CONNECTIONS";

/// Policy reload period
pub const CONFIG_RELOAD_INTERVAL_SECS: &str = "CONFIG_RELOAD_INTERVAL_SECS";

/// Get all environment variable names for documentation/validation
pub fn all_env_vars() -> &'static [&'static str] {
    &[
        PROXY_CONNECT_TIMEOUT_SECS,
        PROXY_RESPONSE_HEADER_TIMEOUT_SECS,
        PROXY_POOL_IDLE_TIMEOUT_SECS,
        PROXY_POOL_MAX_IDLE_PER_HOST,
        PROXY_TCP_KEEPALIVE_SECS,
        MAX_REDIRECT_HOPS,
        PROXY_REPLAY_BUFFER_BYTES,
        MAX_CONNECTIONS,
        CONFIG_RELOAD_INTERVAL_SECS,
    ]
}
